//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::error::{AnnotatorError, AnnotatorResult};

/// 标注引擎配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    // 查询服务
    pub api_base_url: String,
    pub lookup_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_retry_attempts: usize,
    /// 重试前的基础等待时间，每次翻倍
    pub retry_backoff_ms: u64,
    pub max_concurrent_lookups: usize,

    // 选词限制
    pub word_count_limit: usize,
    pub max_selection_chars: usize,

    // 扫描
    pub max_text_nodes: usize,
    pub rescan_max_nodes: usize,
    pub fanout_max_nodes: usize,
    pub scan_batch_size: usize,

    // 时间窗口
    pub debounce_ms: u64,
    pub watcher_resume_ms: u64,
    pub selection_arm_delay_ms: u64,
    pub tooltip_linger_ms: u64,

    // 展示
    pub fade_in: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: constants::DEFAULT_API_BASE_URL.to_string(),
            lookup_timeout_ms: constants::DEFAULT_LOOKUP_TIMEOUT_MS,
            request_timeout_ms: constants::DEFAULT_REQUEST_TIMEOUT_MS,
            max_retry_attempts: constants::DEFAULT_MAX_RETRY_ATTEMPTS,
            retry_backoff_ms: constants::DEFAULT_RETRY_BACKOFF_MS,
            max_concurrent_lookups: constants::DEFAULT_MAX_CONCURRENT_LOOKUPS,

            word_count_limit: constants::WORD_COUNT_LIMIT,
            max_selection_chars: constants::MAX_SELECTION_CHARS,

            max_text_nodes: constants::MAX_TEXT_NODES,
            rescan_max_nodes: constants::RESCAN_MAX_NODES,
            fanout_max_nodes: constants::FANOUT_MAX_NODES,
            scan_batch_size: constants::SCAN_BATCH_SIZE,

            debounce_ms: constants::DEBOUNCE_MS,
            watcher_resume_ms: constants::WATCHER_RESUME_MS,
            selection_arm_delay_ms: constants::SELECTION_ARM_DELAY_MS,
            tooltip_linger_ms: constants::TOOLTIP_LINGER_MS,

            fade_in: false,
        }
    }
}

impl EngineConfig {
    /// 验证配置
    pub fn validate(&self) -> AnnotatorResult<()> {
        if self.max_concurrent_lookups == 0 {
            return Err(AnnotatorError::Config("最大并发数不能为0".to_string()));
        }

        if self.max_retry_attempts == 0 {
            return Err(AnnotatorError::Config("查询次数至少为1".to_string()));
        }

        if self.scan_batch_size == 0 {
            return Err(AnnotatorError::Config("扫描批次大小不能为0".to_string()));
        }

        if self.word_count_limit == 0 {
            return Err(AnnotatorError::Config("单词数量限制不能为0".to_string()));
        }

        if self.rescan_max_nodes > self.max_text_nodes {
            return Err(AnnotatorError::Config(
                "重新扫描的节点上限不能超过全页扫描上限".to_string(),
            ));
        }

        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(AnnotatorError::Config(format!(
                "API地址必须以http://或https://开头: {}",
                self.api_base_url
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{lookup, marking, EnvVar};

        if let Ok(url) = lookup::ApiBaseUrl::get() {
            self.api_base_url = url;
            tracing::info!("环境变量覆盖 API 地址: {}", self.api_base_url);
        }

        if let Ok(timeout) = lookup::Timeout::get() {
            self.lookup_timeout_ms = timeout.as_millis() as u64;
        }

        if let Ok(attempts) = lookup::MaxRetryAttempts::get() {
            self.max_retry_attempts = attempts;
        }

        if let Ok(cap) = lookup::MaxConcurrentLookups::get() {
            self.max_concurrent_lookups = cap;
        }

        if let Ok(limit) = marking::WordCountLimit::get() {
            self.word_count_limit = limit;
        }

        if let Ok(max_nodes) = marking::MaxTextNodes::get() {
            self.max_text_nodes = max_nodes;
            self.rescan_max_nodes = self.rescan_max_nodes.min(max_nodes);
            self.fanout_max_nodes = self.fanout_max_nodes.min(max_nodes);
        }

        if let Ok(debounce) = marking::Debounce::get() {
            self.debounce_ms = debounce.as_millis() as u64;
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn watcher_resume(&self) -> Duration {
        Duration::from_millis(self.watcher_resume_ms)
    }

    pub fn selection_arm_delay(&self) -> Duration {
        Duration::from_millis(self.selection_arm_delay_ms)
    }

    pub fn tooltip_linger(&self) -> Duration {
        Duration::from_millis(self.tooltip_linger_ms)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: EngineConfig,
}

impl ConfigManager {
    /// 从默认搜索路径、.env 文件和环境变量构建配置
    pub fn new() -> AnnotatorResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 从指定文件构建配置（仍然应用环境变量覆盖）
    pub fn from_path(path: &str) -> AnnotatorResult<Self> {
        Self::load_dotenv();
        let expanded = shellexpand::tilde(path);
        let mut config = Self::load_from_file(&expanded)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    fn load_config() -> AnnotatorResult<EngineConfig> {
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(EngineConfig::default())
    }

    fn load_from_file(path: &str) -> AnnotatorResult<EngineConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnnotatorError::Config(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .map_err(|e| AnnotatorError::Config(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| AnnotatorError::Config(format!("解析TOML配置失败: {}", e)))
        }
    }

    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> AnnotatorResult<()> {
        let config = EngineConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| AnnotatorError::Config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| AnnotatorError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.word_count_limit, 99);
        assert_eq!(config.max_text_nodes, 2000);
        assert!(config.rescan_max_nodes < config.max_text_nodes);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = EngineConfig {
            max_concurrent_lookups: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AnnotatorError::Config(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("word_count_limit = 50\n").unwrap();
        assert_eq!(config.word_count_limit, 50);
        assert_eq!(config.debounce_ms, constants::DEBOUNCE_MS);
    }

    #[test]
    fn test_example_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wordmark.toml");
        let path = path.to_str().unwrap();

        ConfigManager::generate_example_config(path).unwrap();
        let manager = ConfigManager::from_path(path).unwrap();
        assert_eq!(manager.get_config().scan_batch_size, constants::SCAN_BATCH_SIZE);
    }
}
