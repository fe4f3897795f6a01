//! 外部协作者接口
//!
//! 引擎本身不关心数据存在哪里、翻译从哪里来。它只通过下面三个 trait
//! 与外界交互；这里同时提供可直接使用的参考实现：
//!
//! - `memory` - 内存中的标记与单词本存储，支持 JSON 文件持久化
//! - `remote` - 基于 HTTP 的翻译/音标查询客户端（`remote` 特性）
//! - `background` - 把远程查询包装成会写入单词本的翻译服务，并处理类型化消息
//! - `notifier` - 通知输出

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AnnotatorResult;

pub mod background;
pub mod memory;
pub mod notifier;
#[cfg(feature = "remote")]
pub mod remote;

pub use background::{
    Background, BackgroundMessage, BackgroundResponse, OfflineLookup, RemoteLookup,
};
pub use memory::{MemoryStore, StoreSnapshot, DEFAULT_REVIEW_LIMIT};
pub use notifier::{LogNotifier, RecordingNotifier};
#[cfg(feature = "remote")]
pub use remote::{HttpLookup, RetryPolicy};

/// 持久化的标记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMark {
    pub id: String,
    pub text: String,
    pub translation: String,
    /// 毫秒时间戳
    pub timestamp: i64,
}

/// 单词本条目，每个唯一词条一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryEntry {
    pub word: String,
    pub translation: String,
    #[serde(default)]
    pub phonetics: String,
    pub added: i64,
    #[serde(default)]
    pub reviewed: u32,
    #[serde(default)]
    pub correct_reviews: u32,
    #[serde(default)]
    pub last_reviewed: Option<i64>,
    pub last_modified: i64,
}

impl DictionaryEntry {
    pub fn new(word: &str, translation: &str, now_ms: i64) -> Self {
        Self {
            word: word.to_string(),
            translation: translation.to_string(),
            phonetics: String::new(),
            added: now_ms,
            reviewed: 0,
            correct_reviews: 0,
            last_reviewed: None,
            last_modified: now_ms,
        }
    }
}

/// 翻译能力
#[async_trait(?Send)]
pub trait Translator {
    /// 查询翻译，提供方负责把词条写入单词本
    async fn translate(&self, word: &str) -> AnnotatorResult<String>;

    /// 查询翻译但不写入单词本（悬停时的临时查询）
    async fn translate_without_persisting(&self, word: &str) -> AnnotatorResult<String>;

    /// 查询音标，失败时返回空字符串
    async fn get_phonetics(&self, word: &str) -> String;
}

/// 标记与单词本存储
#[async_trait(?Send)]
pub trait MarkStore {
    async fn get_marks(&self) -> AnnotatorResult<HashMap<String, PersistedMark>>;

    async fn save_mark(&self, mark: PersistedMark) -> AnnotatorResult<()>;

    async fn remove_mark(&self, id: &str) -> AnnotatorResult<()>;

    async fn remove_all_marks_for_word(&self, word: &str) -> AnnotatorResult<()>;

    async fn delete_word(&self, word: &str) -> AnnotatorResult<()>;

    /// 返回更新后的复习次数
    async fn update_review_count(&self, word: &str, is_correct: bool) -> AnnotatorResult<u32>;

    async fn get_excluded_domains(&self) -> AnnotatorResult<Vec<String>>;
}

/// 用户可见的通知
pub trait Notifier {
    fn show_notification(&self, title: &str, message: &str);
}

/// 当前毫秒时间戳
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
