//! 翻译调度
//!
//! 限制同时进行的翻译查询数量，超出的请求按先进先出排队。查询完成后把翻译
//! 复用到文档中同一术语的其他未标记出现处，不再发起新的查询。

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use super::context::EngineContext;
use super::document::{term_lookup_from, DocumentScanner, ScanReport};
use super::lifecycle::MarkLifecycleManager;
use super::pattern::compile;
use super::registry::{MarkId, TranslationState};
use crate::config::{fallback_translation, EngineConfig};
use crate::error::{helpers, AnnotatorError};
use crate::services::{now_millis, MarkStore, PersistedMark, Translator};

/// 翻译请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub mark_id: MarkId,
    pub text: String,
}

pub struct TranslationScheduler {
    cap: usize,
    timeout: Duration,
    fanout_max_nodes: usize,
    active: Cell<usize>,
    queue: RefCell<VecDeque<TranslationRequest>>,
    context: EngineContext,
    lifecycle: Rc<MarkLifecycleManager>,
    scanner: Rc<DocumentScanner>,
    translator: Rc<dyn Translator>,
    store: Rc<dyn MarkStore>,
}

impl TranslationScheduler {
    pub fn new(
        config: &EngineConfig,
        context: EngineContext,
        lifecycle: Rc<MarkLifecycleManager>,
        scanner: Rc<DocumentScanner>,
        translator: Rc<dyn Translator>,
        store: Rc<dyn MarkStore>,
    ) -> Self {
        Self {
            cap: config.max_concurrent_lookups.max(1),
            timeout: config.lookup_timeout(),
            fanout_max_nodes: config.fanout_max_nodes,
            active: Cell::new(0),
            queue: RefCell::new(VecDeque::new()),
            context,
            lifecycle,
            scanner,
            translator,
            store,
        }
    }

    /// 提交翻译请求
    pub fn request(self: &Rc<Self>, mark_id: MarkId, text: &str) {
        if !self.context.is_valid() {
            return;
        }

        let request = TranslationRequest {
            mark_id,
            text: text.to_string(),
        };

        if self.active.get() < self.cap {
            self.dispatch(request);
            return;
        }

        tracing::debug!("查询已满 {}，排队: {}", self.cap, request.text);
        if let Err(error) = self.lifecycle.set_state(mark_id, TranslationState::Queued) {
            helpers::log_error(&error);
        }
        self.queue.borrow_mut().push_back(request);
    }

    pub fn active_count(&self) -> usize {
        self.active.get()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.borrow().len()
    }

    fn dispatch(self: &Rc<Self>, request: TranslationRequest) {
        self.active.set(self.active.get() + 1);

        let scheduler = Rc::clone(self);
        tokio::task::spawn_local(async move {
            scheduler.resolve(request).await;
            scheduler.finish();
        });
    }

    fn finish(self: &Rc<Self>) {
        self.active.set(self.active.get().saturating_sub(1));
        if !self.context.is_valid() {
            return;
        }

        let next = self.queue.borrow_mut().pop_front();
        if let Some(next) = next {
            self.dispatch(next);
        }
    }

    async fn resolve(&self, request: TranslationRequest) {
        let TranslationRequest { mark_id, text } = request;

        // 排队期间标记可能已被删除，此时不再占用查询
        if !self.context.is_valid() || !self.lifecycle.has_record(mark_id) {
            tracing::debug!("标记已不存在，跳过查询: {} ({})", mark_id, text);
            return;
        }

        let was_queued = self
            .lifecycle
            .record(mark_id)
            .is_some_and(|record| record.state == TranslationState::Queued);
        if was_queued {
            if let Err(error) = self.lifecycle.set_state(mark_id, TranslationState::Pending) {
                helpers::log_error(&error);
            }
        }

        tracing::debug!("开始查询: {}", text);
        let translation = match tokio::time::timeout(self.timeout, self.translator.translate(&text)).await {
            Ok(Ok(translation)) => translation,
            Ok(Err(error)) => {
                tracing::warn!("翻译失败，使用占位翻译: {} ({})", text, error);
                fallback_translation(&text)
            }
            Err(elapsed) => {
                let error = AnnotatorError::from(elapsed).with_context(&text);
                tracing::warn!("{}，使用占位翻译", error);
                fallback_translation(&text)
            }
        };

        if !self.context.is_valid() || !self.lifecycle.has_record(mark_id) {
            tracing::debug!("查询完成时标记已不存在: {}", mark_id);
            return;
        }

        self.lifecycle.update_mark_translation(mark_id, &translation);
        if let Err(error) = self.lifecycle.set_state(mark_id, TranslationState::Resolved) {
            helpers::log_error(&error);
            return;
        }
        self.lifecycle.remember_term(&text, &translation);

        let mark = PersistedMark {
            id: mark_id.to_string(),
            text: text.clone(),
            translation: translation.clone(),
            timestamp: now_millis(),
        };
        helpers::swallow(self.store.save_mark(mark).await);

        if self.context.is_valid() {
            let report = self.fan_out(&text, &translation).await;
            if !report.marks_created.is_empty() {
                tracing::debug!("复用翻译 {:?}: 新增 {} 个标记", text, report.marks_created.len());
            }
        }
    }

    /// 为同一术语的其他出现创建已解析的标记
    ///
    /// 模式包含全部已知术语，保证较长的术语优先占位；只有命中本术语的片段被标记。
    async fn fan_out(&self, text: &str, translation: &str) -> ScanReport {
        let known = self.lifecycle.term_lookup();
        let mut terms: Vec<&str> = known.values().map(|term| term.text.as_str()).collect();
        terms.push(text);
        let pattern = compile(&terms);
        let lookup = term_lookup_from([(text, translation)]);
        self.scanner
            .scan(self.lifecycle.root(), &pattern, &lookup, self.fanout_max_nodes)
            .await
    }
}
