//! 后台服务
//!
//! 把远程查询包装成翻译服务：查询结果（或失败时的占位翻译）会写入单词本。
//! 同时负责分发类型化的后台消息。

use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DictionaryEntry, MarkStore, MemoryStore, Notifier, PersistedMark, Translator};
use crate::config::fallback_translation;
use crate::error::{helpers, AnnotatorError, AnnotatorResult};

/// 远程查询能力
#[async_trait(?Send)]
pub trait RemoteLookup {
    async fn lookup_translation(&self, word: &str) -> AnnotatorResult<String>;

    async fn lookup_phonetics(&self, word: &str) -> AnnotatorResult<String>;
}

/// 离线查询，总是失败，翻译退化为占位文本
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLookup;

#[async_trait(?Send)]
impl RemoteLookup for OfflineLookup {
    async fn lookup_translation(&self, word: &str) -> AnnotatorResult<String> {
        Err(AnnotatorError::Lookup(format!("离线模式: {}", word)))
    }

    async fn lookup_phonetics(&self, word: &str) -> AnnotatorResult<String> {
        Err(AnnotatorError::Lookup(format!("离线模式: {}", word)))
    }
}

/// 后台消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackgroundMessage {
    Translate {
        word: String,
    },
    TranslateNoSave {
        word: String,
    },
    SaveWord {
        word: String,
        translation: String,
    },
    GetDictionary,
    SaveDictionary {
        dictionary: HashMap<String, DictionaryEntry>,
    },
    DeleteWord {
        word: String,
    },
    UpdateTranslation {
        word: String,
        translation: String,
    },
    UpdatePhonetic {
        word: String,
        phonetic: String,
    },
    UpdateReviewCount {
        word: String,
        #[serde(default)]
        is_correct: bool,
    },
    SaveMark {
        mark: PersistedMark,
    },
    GetMarks,
    RemoveMark {
        mark_id: String,
    },
    GetPhonetics {
        word: String,
    },
    ShowNotification {
        title: String,
        message: String,
    },
}

/// 后台消息的应答
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BackgroundResponse {
    Success {
        success: bool,
    },
    Translation {
        translation: String,
    },
    Dictionary {
        dictionary: HashMap<String, DictionaryEntry>,
    },
    Marks {
        marks: HashMap<String, PersistedMark>,
    },
    Phonetics {
        #[serde(rename = "phoneticText")]
        phonetic_text: String,
    },
    ReviewCount {
        reviewed: u32,
    },
}

impl BackgroundResponse {
    fn from_result(result: AnnotatorResult<()>) -> Self {
        BackgroundResponse::Success {
            success: helpers::swallow(result).is_some(),
        }
    }
}

/// 后台服务
pub struct Background<R> {
    remote: R,
    store: Rc<MemoryStore>,
    notifier: Rc<dyn Notifier>,
}

impl<R: RemoteLookup> Background<R> {
    pub fn new(remote: R, store: Rc<MemoryStore>, notifier: Rc<dyn Notifier>) -> Self {
        Self {
            remote,
            store,
            notifier,
        }
    }

    pub fn store(&self) -> &Rc<MemoryStore> {
        &self.store
    }

    /// 分发一条后台消息
    pub async fn handle(&self, message: BackgroundMessage) -> BackgroundResponse {
        match message {
            BackgroundMessage::Translate { word } => BackgroundResponse::Translation {
                translation: self.translate_and_save(&word).await,
            },
            BackgroundMessage::TranslateNoSave { word } => BackgroundResponse::Translation {
                translation: self.lookup_or_fallback(&word).await,
            },
            BackgroundMessage::SaveWord { word, translation } => {
                self.store.save_word(&word, &translation);
                BackgroundResponse::Success { success: true }
            }
            BackgroundMessage::GetDictionary => BackgroundResponse::Dictionary {
                dictionary: self.store.dictionary(),
            },
            BackgroundMessage::SaveDictionary { dictionary } => {
                let mut snapshot = self.store.snapshot();
                snapshot.word_dictionary = dictionary;
                self.store.replace(snapshot);
                BackgroundResponse::Success { success: true }
            }
            BackgroundMessage::DeleteWord { word } => {
                BackgroundResponse::from_result(self.store.delete_word(&word).await)
            }
            BackgroundMessage::UpdateTranslation { word, translation } => {
                BackgroundResponse::Success {
                    success: self.store.update_translation(&word, &translation),
                }
            }
            BackgroundMessage::UpdatePhonetic { word, phonetic } => BackgroundResponse::Success {
                success: self.store.update_phonetic(&word, &phonetic),
            },
            BackgroundMessage::UpdateReviewCount { word, is_correct } => {
                let reviewed = helpers::swallow(self.store.update_review_count(&word, is_correct).await)
                    .unwrap_or_default();
                BackgroundResponse::ReviewCount { reviewed }
            }
            BackgroundMessage::SaveMark { mark } => {
                BackgroundResponse::from_result(self.store.save_mark(mark).await)
            }
            BackgroundMessage::GetMarks => BackgroundResponse::Marks {
                marks: helpers::swallow(self.store.get_marks().await).unwrap_or_default(),
            },
            BackgroundMessage::RemoveMark { mark_id } => {
                BackgroundResponse::from_result(self.store.remove_mark(&mark_id).await)
            }
            BackgroundMessage::GetPhonetics { word } => BackgroundResponse::Phonetics {
                phonetic_text: self.get_phonetics(&word).await,
            },
            BackgroundMessage::ShowNotification { title, message } => {
                self.notifier.show_notification(&title, &message);
                BackgroundResponse::Success { success: true }
            }
        }
    }

    async fn lookup_or_fallback(&self, word: &str) -> String {
        match self.remote.lookup_translation(word).await {
            Ok(translation) => translation,
            Err(error) => {
                tracing::warn!("翻译失败，使用占位翻译: {} ({})", word, error);
                fallback_translation(word)
            }
        }
    }

    async fn translate_and_save(&self, word: &str) -> String {
        let translation = self.lookup_or_fallback(word).await;
        self.store.save_word(word, &translation);
        translation
    }
}

#[async_trait(?Send)]
impl<R: RemoteLookup> Translator for Background<R> {
    async fn translate(&self, word: &str) -> AnnotatorResult<String> {
        Ok(self.translate_and_save(word).await)
    }

    async fn translate_without_persisting(&self, word: &str) -> AnnotatorResult<String> {
        self.remote.lookup_translation(word).await
    }

    async fn get_phonetics(&self, word: &str) -> String {
        // 词组没有音标
        if word.is_empty() || word.contains(char::is_whitespace) {
            return String::new();
        }

        match self.remote.lookup_phonetics(word).await {
            Ok(phonetics) => phonetics,
            Err(error) => {
                tracing::debug!("获取音标失败: {} ({})", word, error);
                String::new()
            }
        }
    }
}
