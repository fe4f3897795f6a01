//! 引擎配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, EngineConfig};

/// 配置常量
pub mod constants {
    // 查询服务
    pub const DEFAULT_API_BASE_URL: &str = "https://chrome.yizhiweb.top";
    pub const TRANSLATE_ENDPOINT: &str = "/wx/chrome/crx/translate";
    pub const PHONETICS_ENDPOINT: &str = "/wx/chrome/crx/phonetics";
    pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 10_000;
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_MAX_RETRY_ATTEMPTS: usize = 2;
    pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 0;
    pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 3;

    // 选词限制
    pub const WORD_COUNT_LIMIT: usize = 99;
    pub const MAX_SELECTION_CHARS: usize = 1000;
    pub const MAX_MARKED_WORDS: usize = 8000;

    // 扫描上限
    pub const MAX_TEXT_NODES: usize = 2000;
    pub const RESCAN_MAX_NODES: usize = 500;
    pub const FANOUT_MAX_NODES: usize = 200;
    pub const SCAN_BATCH_SIZE: usize = 50;

    // 时间窗口（毫秒）
    pub const DEBOUNCE_MS: u64 = 1000;
    pub const WATCHER_RESUME_MS: u64 = 100;
    pub const SELECTION_ARM_DELAY_MS: u64 = 250;
    pub const TOOLTIP_LINGER_MS: u64 = 300;

    // 标记元素
    pub const MARK_TAG: &str = "span";
    pub const MARK_CLASS: &str = "wordmark-marked";
    pub const MARK_ID_ATTR: &str = "data-word-id";
    pub const MARK_TRANSLATION_ATTR: &str = "data-translation";
    pub const MARK_STATE_ATTR: &str = "data-state";
    pub const FADE_IN_CLASS: &str = "wordmark-fade-in";

    // 占位文本
    pub const PENDING_PLACEHOLDER: &str = "翻译中...";
    pub const QUEUED_PLACEHOLDER: &str = "排队中...";
    pub const FALLBACK_SUFFIX: &str = "的翻译";

    // 跳过的元素（非正文容器）
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "noscript", "template", "textarea", "code", "pre", "head", "title",
        "meta", "link", "svg", "math", "canvas", "iframe", "object", "embed", "select", "option",
        "input", "button",
    ];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "wordmark.toml",
        ".wordmark.toml",
        "wordmark.json",
        "~/.config/wordmark/config.toml",
        "/etc/wordmark/config.toml",
    ];
}

/// 生成查询失败时的占位翻译
pub fn fallback_translation(word: &str) -> String {
    format!("{}{}", word, constants::FALLBACK_SUFFIX)
}

/// 向后兼容的配置加载函数：失败时回退到默认配置
pub fn load_engine_config() -> EngineConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.get_config().clone(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            EngineConfig::default()
        }
    }
}
