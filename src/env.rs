//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，用于覆盖引擎配置

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取并解析变量；未设置时返回错误，由调用方决定是否保留默认值
    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Err(EnvError {
                variable: Self::NAME.to_string(),
                message: "Environment variable not set".to_string(),
            }),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "WORDMARK_LOG_LEVEL";
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 查询服务相关环境变量
pub mod lookup {
    use super::*;

    /// 翻译服务基础地址
    pub struct ApiBaseUrl;
    impl EnvVar<String> for ApiBaseUrl {
        const NAME: &'static str = "WORDMARK_API_BASE_URL";
        const DESCRIPTION: &'static str = "Base URL of the translation/phonetics service";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim().trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// 单次查询超时
    pub struct Timeout;
    impl EnvVar<Duration> for Timeout {
        const NAME: &'static str = "WORDMARK_LOOKUP_TIMEOUT_MS";
        const DESCRIPTION: &'static str = "Per-lookup timeout in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis = parse_positive_u64(value, Self::NAME, 100, 120_000)?;
            Ok(Duration::from_millis(millis))
        }
    }

    /// 最大重试次数
    pub struct MaxRetryAttempts;
    impl EnvVar<usize> for MaxRetryAttempts {
        const NAME: &'static str = "WORDMARK_MAX_RETRY_ATTEMPTS";
        const DESCRIPTION: &'static str = "Maximum attempts per remote lookup (including the first)";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 10)
        }
    }

    /// 最大并发查询数
    pub struct MaxConcurrentLookups;
    impl EnvVar<usize> for MaxConcurrentLookups {
        const NAME: &'static str = "WORDMARK_MAX_CONCURRENT_LOOKUPS";
        const DESCRIPTION: &'static str = "Maximum translation lookups in flight";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 16)
        }
    }
}

/// 选词和扫描相关环境变量
pub mod marking {
    use super::*;

    /// 单次选中单词数量限制
    pub struct WordCountLimit;
    impl EnvVar<usize> for WordCountLimit {
        const NAME: &'static str = "WORDMARK_WORD_COUNT_LIMIT";
        const DESCRIPTION: &'static str = "Maximum words in a single selection";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1000)
        }
    }

    /// 最大处理文本节点数量
    pub struct MaxTextNodes;
    impl EnvVar<usize> for MaxTextNodes {
        const NAME: &'static str = "WORDMARK_MAX_TEXT_NODES";
        const DESCRIPTION: &'static str = "Text node ceiling for the initial full-page scan";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 10, 100_000)
        }
    }

    /// 变更去抖窗口
    pub struct Debounce;
    impl EnvVar<Duration> for Debounce {
        const NAME: &'static str = "WORDMARK_DEBOUNCE_MS";
        const DESCRIPTION: &'static str = "Debounce window for re-scans after document changes";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis = parse_positive_u64(value, Self::NAME, 10, 60_000)?;
            Ok(Duration::from_millis(millis))
        }
    }
}

/// 解析正整数并检查范围
fn parse_positive_usize(value: &str, name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let parsed: usize = value.trim().parse().map_err(|_| EnvError {
        variable: name.to_string(),
        message: "Must be a valid positive integer".to_string(),
    })?;

    if parsed < min || parsed > max {
        return Err(EnvError {
            variable: name.to_string(),
            message: format!("Value must be between {} and {}", min, max),
        });
    }

    Ok(parsed)
}

fn parse_positive_u64(value: &str, name: &str, min: u64, max: u64) -> EnvResult<u64> {
    let parsed: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: name.to_string(),
        message: "Must be a valid number of milliseconds".to_string(),
    })?;

    if parsed < min || parsed > max {
        return Err(EnvError {
            variable: name.to_string(),
            message: format!("Value must be between {} and {}", min, max),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert!(core::LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert_eq!(
            lookup::ApiBaseUrl::parse("https://api.example.com/").unwrap(),
            "https://api.example.com"
        );
        assert!(lookup::ApiBaseUrl::parse("ftp://example.com").is_err());
    }

    #[test]
    fn test_numeric_validation() {
        assert_eq!(marking::WordCountLimit::parse("50").unwrap(), 50);
        assert!(marking::WordCountLimit::parse("0").is_err());
        assert!(lookup::MaxConcurrentLookups::parse("many").is_err());
        assert_eq!(
            marking::Debounce::parse("1000").unwrap(),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_unset_variable_falls_back() {
        // 该变量名不会在测试环境中设置
        assert_eq!(lookup::MaxRetryAttempts::get_or_default(2), 2);
    }
}
