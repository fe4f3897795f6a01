//! # Wordmark
//!
//! 在 HTML 文档中标记生词并附加翻译的标注引擎。用户标记过的术语在文档内容
//! 变化后（初次加载、懒加载内容、单页应用跳转）会被重新识别并自动标注。
//!
//! ## 模块组织
//!
//! - `engine` - 标注引擎：术语匹配、文档扫描、标记生命周期、翻译调度、变更监听、选词控制
//! - `services` - 外部协作者接口（翻译、存储、通知）及参考实现
//! - `parsers` - HTML 解析与 DOM 操作
//! - `domain` - 域名排除规则
//! - `config` / `env` - 配置文件与环境变量
//! - `error` - 统一错误类型

pub mod config;
pub mod domain;
pub mod engine;
pub mod env;
pub mod error;
pub mod parsers;
pub mod services;

// Re-export commonly used items for convenience
pub use config::{ConfigManager, EngineConfig};
pub use engine::{Annotator, Collaborators, EngineCommand, MarkId, StartOutcome};
pub use error::{AnnotatorError, AnnotatorResult};
pub use parsers::{html_to_dom, serialize_document};
