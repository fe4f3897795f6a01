//! 标记登记表
//!
//! 以 `MarkId` 为键保存页面上所有标记的记录。每个渲染出来的标记在这里都有且只有一条记录。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::config::constants;
use crate::error::{AnnotatorError, AnnotatorResult};

static NEXT_MARK_ID: AtomicU64 = AtomicU64::new(1);

/// 进程内唯一的标记标识，在文档中渲染为 `wm-<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkId(u64);

impl MarkId {
    pub fn next() -> Self {
        MarkId(NEXT_MARK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// 解析 `data-word-id` 属性值
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().strip_prefix("wm-")?.parse().ok().map(MarkId)
    }
}

impl fmt::Display for MarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wm-{}", self.0)
    }
}

/// 翻译状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationState {
    Pending,
    Queued,
    Resolved,
}

impl TranslationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationState::Pending => "pending",
            TranslationState::Queued => "queued",
            TranslationState::Resolved => "resolved",
        }
    }

    /// 状态机允许的转换
    pub fn can_transition_to(&self, next: TranslationState) -> bool {
        matches!(
            (self, next),
            (TranslationState::Pending, TranslationState::Queued)
                | (TranslationState::Queued, TranslationState::Pending)
                | (TranslationState::Pending, TranslationState::Resolved)
        )
    }
}

impl fmt::Display for TranslationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个标记的记录
#[derive(Debug, Clone, PartialEq)]
pub struct MarkRecord {
    pub id: MarkId,
    /// 文档中匹配到的原文，保留大小写
    pub text: String,
    pub state: TranslationState,
    pub translation_text: Option<String>,
    /// 包装元素替换掉的原始文本
    pub original_content: String,
    pub created_at: DateTime<Utc>,
}

impl MarkRecord {
    pub fn new(id: MarkId, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            state: TranslationState::Pending,
            translation_text: None,
            original_content: text.to_string(),
            created_at: Utc::now(),
        }
    }

    /// 提示框中显示的文本
    pub fn display_text(&self) -> &str {
        match self.state {
            TranslationState::Resolved => self
                .translation_text
                .as_deref()
                .unwrap_or(constants::PENDING_PLACEHOLDER),
            TranslationState::Queued => constants::QUEUED_PLACEHOLDER,
            TranslationState::Pending => constants::PENDING_PLACEHOLDER,
        }
    }

    pub fn matches_text(&self, text: &str) -> bool {
        self.text.to_lowercase() == text.to_lowercase()
    }
}

/// 标记登记表
#[derive(Debug, Default)]
pub struct MarkRegistry {
    records: HashMap<MarkId, MarkRecord>,
}

impl MarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新记录，标识已存在时拒绝
    pub fn insert(&mut self, record: MarkRecord) -> AnnotatorResult<()> {
        if let Some(existing) = self.records.get(&record.id) {
            return Err(AnnotatorError::InvalidTransition {
                from: existing.state.to_string(),
                to: record.state.to_string(),
            });
        }
        self.records.insert(record.id, record);
        Ok(())
    }

    pub fn get(&self, id: MarkId) -> Option<&MarkRecord> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: MarkId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn remove(&mut self, id: MarkId) -> Option<MarkRecord> {
        self.records.remove(&id)
    }

    /// 执行状态转换
    pub fn transition(&mut self, id: MarkId, next: TranslationState) -> AnnotatorResult<()> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| AnnotatorError::MarkNotFound(id.to_string()))?;

        if !record.state.can_transition_to(next) {
            return Err(AnnotatorError::InvalidTransition {
                from: record.state.to_string(),
                to: next.to_string(),
            });
        }

        tracing::trace!("{}: {} -> {}", id, record.state, next);
        record.state = next;
        Ok(())
    }

    pub fn set_translation(&mut self, id: MarkId, translation: &str) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.translation_text = Some(translation.to_string());
                true
            }
            None => false,
        }
    }

    /// 文本相同（不区分大小写）的全部记录
    pub fn ids_for_text(&self, text: &str) -> Vec<MarkId> {
        let mut ids: Vec<MarkId> = self
            .records
            .values()
            .filter(|record| record.matches_text(text))
            .map(|record| record.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn contains_text(&self, text: &str) -> bool {
        self.records.values().any(|record| record.matches_text(text))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarkRecord> {
        self.records.values()
    }
}
