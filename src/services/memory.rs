//! 内存存储
//!
//! 标记、单词本和排除域名都保存在内存中，可整体导出为 JSON 文件并重新加载。

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{now_millis, DictionaryEntry, MarkStore, PersistedMark};
use crate::error::{AnnotatorError, AnnotatorResult};

/// 默认复习候选数量
pub const DEFAULT_REVIEW_LIMIT: usize = 20;

/// 存储快照，对应磁盘上的 JSON 结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSnapshot {
    pub word_marks: HashMap<String, PersistedMark>,
    pub word_dictionary: HashMap<String, DictionaryEntry>,
    pub excluded_domains: Vec<String>,
}

/// 单线程内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    marks: RefCell<HashMap<String, PersistedMark>>,
    dictionary: RefCell<HashMap<String, DictionaryEntry>>,
    excluded_domains: RefCell<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            marks: RefCell::new(snapshot.word_marks),
            dictionary: RefCell::new(snapshot.word_dictionary),
            excluded_domains: RefCell::new(snapshot.excluded_domains),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            word_marks: self.marks.borrow().clone(),
            word_dictionary: self.dictionary.borrow().clone(),
            excluded_domains: self.excluded_domains.borrow().clone(),
        }
    }

    /// 整体替换存储内容
    pub fn replace(&self, snapshot: StoreSnapshot) {
        *self.marks.borrow_mut() = snapshot.word_marks;
        *self.dictionary.borrow_mut() = snapshot.word_dictionary;
        *self.excluded_domains.borrow_mut() = snapshot.excluded_domains;
    }

    /// 从 JSON 文件加载，文件不存在时返回空存储
    pub fn load_from_path(path: &Path) -> AnnotatorResult<Self> {
        if !path.exists() {
            tracing::info!("存储文件不存在，使用空存储: {}", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AnnotatorError::Storage(format!("读取存储文件失败: {}", e)))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;

        tracing::info!(
            "已加载存储: {} 个单词, {} 个标记",
            snapshot.word_dictionary.len(),
            snapshot.word_marks.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// 写入 JSON 文件
    pub fn save_to_path(&self, path: &Path) -> AnnotatorResult<()> {
        let content = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| AnnotatorError::Storage(format!("序列化存储失败: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
            .map_err(|e| AnnotatorError::Storage(format!("写入存储文件失败: {}", e)))
    }

    /// 保存单词，已存在时保持原条目不变
    pub fn save_word(&self, word: &str, translation: &str) {
        let mut dictionary = self.dictionary.borrow_mut();
        if !dictionary.contains_key(word) {
            dictionary.insert(
                word.to_string(),
                DictionaryEntry::new(word, translation, now_millis()),
            );
            tracing::debug!("单词已加入单词本: {}", word);
        }
    }

    /// 修改已有单词的翻译，返回是否存在该单词
    pub fn update_translation(&self, word: &str, translation: &str) -> bool {
        match self.dictionary.borrow_mut().get_mut(word) {
            Some(entry) => {
                entry.translation = translation.to_string();
                entry.last_modified = now_millis();
                true
            }
            None => false,
        }
    }

    /// 修改已有单词的音标，返回是否存在该单词
    pub fn update_phonetic(&self, word: &str, phonetic: &str) -> bool {
        match self.dictionary.borrow_mut().get_mut(word) {
            Some(entry) => {
                entry.phonetics = phonetic.to_string();
                entry.last_modified = now_millis();
                true
            }
            None => false,
        }
    }

    pub fn dictionary(&self) -> HashMap<String, DictionaryEntry> {
        self.dictionary.borrow().clone()
    }

    pub fn set_excluded_domains(&self, domains: Vec<String>) {
        *self.excluded_domains.borrow_mut() = domains;
    }

    /// 挑选复习候选
    ///
    /// 复习次数少、加入时间早的单词权重低，排在前面。
    pub fn review_candidates(&self, limit: usize) -> Vec<DictionaryEntry> {
        self.review_candidates_at(limit, now_millis())
    }

    pub fn review_candidates_at(&self, limit: usize, now_ms: i64) -> Vec<DictionaryEntry> {
        let weight = |entry: &DictionaryEntry| {
            let age_ms = (now_ms - entry.added).max(0) as f64;
            entry.reviewed as f64 * 0.7 + age_ms * 0.3 / 1_000_000.0
        };

        let mut entries: Vec<DictionaryEntry> = self.dictionary.borrow().values().cloned().collect();
        entries.sort_by(|a, b| {
            weight(a)
                .total_cmp(&weight(b))
                .then_with(|| a.word.cmp(&b.word))
        });
        entries.truncate(limit);
        entries
    }
}

#[async_trait(?Send)]
impl MarkStore for MemoryStore {
    async fn get_marks(&self) -> AnnotatorResult<HashMap<String, PersistedMark>> {
        Ok(self.marks.borrow().clone())
    }

    async fn save_mark(&self, mark: PersistedMark) -> AnnotatorResult<()> {
        self.marks.borrow_mut().insert(mark.id.clone(), mark);
        Ok(())
    }

    async fn remove_mark(&self, id: &str) -> AnnotatorResult<()> {
        self.marks.borrow_mut().remove(id);
        Ok(())
    }

    async fn remove_all_marks_for_word(&self, word: &str) -> AnnotatorResult<()> {
        let word = word.to_lowercase();
        self.marks
            .borrow_mut()
            .retain(|_, mark| mark.text.to_lowercase() != word);
        Ok(())
    }

    async fn delete_word(&self, word: &str) -> AnnotatorResult<()> {
        let removed = self.dictionary.borrow_mut().remove(word).is_some();
        self.marks.borrow_mut().retain(|_, mark| mark.text != word);
        if !removed {
            tracing::debug!("单词本中没有该单词: {}", word);
        }
        Ok(())
    }

    async fn update_review_count(&self, word: &str, is_correct: bool) -> AnnotatorResult<u32> {
        let mut dictionary = self.dictionary.borrow_mut();
        let Some(entry) = dictionary.get_mut(word) else {
            return Ok(0);
        };

        let now = now_millis();
        entry.reviewed += 1;
        if is_correct {
            entry.correct_reviews += 1;
        }
        entry.last_reviewed = Some(now);
        entry.last_modified = now;
        Ok(entry.reviewed)
    }

    async fn get_excluded_domains(&self) -> AnnotatorResult<Vec<String>> {
        Ok(self.excluded_domains.borrow().clone())
    }
}
