//! 标注引擎统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。引擎内部的任何错误都不会抛给宿主页面：
//! 查询失败会退化为占位翻译，上下文失效会让组件静默停止，过期的文本范围只跳过单个操作。

use std::fmt;

use thiserror::Error;

/// 标注引擎错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotatorError {
    /// 远程查询失败（网络、服务端错误、响应无法解析）
    #[error("查询失败: {0}")]
    Lookup(String),

    /// 查询超时
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 宿主执行上下文已失效
    #[error("执行上下文已失效")]
    HostInvalidated,

    /// 之前计算的文本范围与当前文档内容不一致
    #[error("文本范围已过期: {0}")]
    StaleRange(String),

    /// 标记状态机中不允许的状态转换
    #[error("非法状态转换: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// 指定的标记不存在
    #[error("标记不存在: {0}")]
    MarkNotFound(String),

    /// 存储错误
    #[error("存储错误: {0}")]
    Storage(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(String),
}

impl AnnotatorError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            AnnotatorError::Lookup(_) => true,
            AnnotatorError::Timeout(_) => true,
            AnnotatorError::Storage(_) => true,
            AnnotatorError::Io(_) => true,
            AnnotatorError::HostInvalidated => false,
            AnnotatorError::StaleRange(_) => false,
            AnnotatorError::InvalidTransition { .. } => false,
            AnnotatorError::MarkNotFound(_) => false,
            AnnotatorError::Config(_) => false,
            AnnotatorError::Parse(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AnnotatorError::Lookup(_) => ErrorSeverity::Warning,
            AnnotatorError::Timeout(_) => ErrorSeverity::Warning,
            AnnotatorError::HostInvalidated => ErrorSeverity::Info,
            AnnotatorError::StaleRange(_) => ErrorSeverity::Info,
            AnnotatorError::InvalidTransition { .. } => ErrorSeverity::Error,
            AnnotatorError::MarkNotFound(_) => ErrorSeverity::Info,
            AnnotatorError::Storage(_) => ErrorSeverity::Warning,
            AnnotatorError::Config(_) => ErrorSeverity::Critical,
            AnnotatorError::Parse(_) => ErrorSeverity::Error,
            AnnotatorError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnnotatorError::Lookup(_) | AnnotatorError::Timeout(_) => {
                ErrorCategory::TransientLookup
            }
            AnnotatorError::HostInvalidated => ErrorCategory::Host,
            AnnotatorError::StaleRange(_) | AnnotatorError::MarkNotFound(_) => {
                ErrorCategory::Document
            }
            AnnotatorError::InvalidTransition { .. } => ErrorCategory::Internal,
            AnnotatorError::Storage(_) | AnnotatorError::Io(_) => ErrorCategory::Storage,
            AnnotatorError::Config(_) => ErrorCategory::Configuration,
            AnnotatorError::Parse(_) => ErrorCategory::Parsing,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let new_msg = |msg: &str| format!("{} (上下文: {})", msg, context);

        match &mut self {
            AnnotatorError::Lookup(ref mut msg)
            | AnnotatorError::Timeout(ref mut msg)
            | AnnotatorError::StaleRange(ref mut msg)
            | AnnotatorError::MarkNotFound(ref mut msg)
            | AnnotatorError::Storage(ref mut msg)
            | AnnotatorError::Config(ref mut msg)
            | AnnotatorError::Parse(ref mut msg)
            | AnnotatorError::Io(ref mut msg) => *msg = new_msg(msg),
            AnnotatorError::HostInvalidated | AnnotatorError::InvalidTransition { .. } => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    TransientLookup,
    Host,
    Document,
    Storage,
    Configuration,
    Parsing,
    Internal,
}

impl From<std::io::Error> for AnnotatorError {
    fn from(error: std::io::Error) -> Self {
        AnnotatorError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AnnotatorError {
    fn from(error: serde_json::Error) -> Self {
        AnnotatorError::Parse(format!("JSON解析错误: {}", error))
    }
}

impl From<toml::de::Error> for AnnotatorError {
    fn from(error: toml::de::Error) -> Self {
        AnnotatorError::Config(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for AnnotatorError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        AnnotatorError::Timeout(format!("异步操作超时: {}", error))
    }
}

impl From<regex::Error> for AnnotatorError {
    fn from(error: regex::Error) -> Self {
        AnnotatorError::Parse(format!("正则表达式错误: {}", error))
    }
}

/// 错误结果类型别名
pub type AnnotatorResult<T> = Result<T, AnnotatorError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误，不向上传播
    pub fn log_error(error: &AnnotatorError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::debug!("标注信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("标注警告: {}", error),
            ErrorSeverity::Error => tracing::error!("标注错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("标注严重错误: {}", error),
        }
    }

    /// 记录并吞掉错误，用于不允许失败外泄的路径
    pub fn swallow<T>(result: AnnotatorResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                log_error(&error);
                None
            }
        }
    }

    /// 创建范围过期错误
    pub fn stale_range<T: fmt::Display>(msg: T) -> AnnotatorError {
        AnnotatorError::StaleRange(msg.to_string())
    }
}
