//! 标记生命周期
//!
//! 负责在文档中创建和删除标记包装元素、维护登记表、显示提示框。
//! 创建前总是对照当前文档重新校验文本范围，范围过期时只跳过这一个操作。

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use futures::future::{abortable, AbortHandle};
use markup5ever_rcdom::Handle;

use super::context::EngineContext;
use super::document::{KnownTerm, TermLookup};
use super::registry::{MarkId, MarkRecord, MarkRegistry, TranslationState};
use super::tooltip::{Rect, Tooltip, TooltipView, Viewport};
use super::watcher::ChangeWatcher;
use crate::config::{constants, EngineConfig};
use crate::error::{helpers, AnnotatorError, AnnotatorResult};
use crate::parsers::html::{
    append_child, create_element, create_text_node, get_node_attr, get_text, index_in_parent,
    insert_child, is_attached, is_mark_wrapper, normalize_text_children, replace_node,
    set_node_attr, set_text, text_content,
};
use crate::services::{MarkStore, Translator};

/// 文本节点中的一段范围（字节偏移）
#[derive(Debug, Clone)]
pub struct TextRange {
    pub node: Handle,
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(node: Handle, start: usize, end: usize) -> Self {
        Self { node, start, end }
    }
}

pub struct MarkLifecycleManager {
    root: Handle,
    context: EngineContext,
    registry: RefCell<MarkRegistry>,
    known_terms: RefCell<TermLookup>,
    tooltip: RefCell<Tooltip>,
    hover_lookup: RefCell<Option<(MarkId, AbortHandle)>>,
    watcher: Rc<ChangeWatcher>,
    store: Rc<dyn MarkStore>,
    translator: Rc<dyn Translator>,
    fade_in: bool,
    watcher_resume: Duration,
    tooltip_linger: Duration,
}

impl MarkLifecycleManager {
    pub fn new(
        root: Handle,
        config: &EngineConfig,
        context: EngineContext,
        watcher: Rc<ChangeWatcher>,
        store: Rc<dyn MarkStore>,
        translator: Rc<dyn Translator>,
    ) -> Self {
        Self {
            root,
            context,
            registry: RefCell::new(MarkRegistry::new()),
            known_terms: RefCell::new(TermLookup::new()),
            tooltip: RefCell::new(Tooltip::default()),
            hover_lookup: RefCell::new(None),
            watcher,
            store,
            translator,
            fade_in: config.fade_in,
            watcher_resume: config.watcher_resume(),
            tooltip_linger: config.tooltip_linger(),
        }
    }

    pub fn root(&self) -> &Handle {
        &self.root
    }

    /// 用标记包装元素替换文本范围
    ///
    /// 给出翻译时记录直接进入 `Resolved`，否则停留在 `Pending` 并显示占位文本。
    pub fn create_mark(
        &self,
        range: &TextRange,
        text: &str,
        translation: Option<&str>,
        id: MarkId,
    ) -> AnnotatorResult<Handle> {
        self.context.ensure_valid()?;

        let content = self.validate_range(range, text)?;
        let (parent, index) = index_in_parent(&range.node)
            .ok_or_else(|| helpers::stale_range("文本节点已脱离文档"))?;
        let matched = &content[range.start..range.end];

        let mut record = MarkRecord::new(id, matched);
        if let Some(translation) = translation {
            record.translation_text = Some(translation.to_string());
        }
        self.registry.borrow_mut().insert(record)?;
        if translation.is_some() {
            self.registry
                .borrow_mut()
                .transition(id, TranslationState::Resolved)?;
        }

        let (display, state) = {
            let registry = self.registry.borrow();
            let record = registry
                .get(id)
                .ok_or_else(|| AnnotatorError::MarkNotFound(id.to_string()))?;
            (record.display_text().to_string(), record.state)
        };

        let id_value = id.to_string();
        let wrapper = create_element(
            constants::MARK_TAG,
            &[
                ("class", constants::MARK_CLASS),
                (constants::MARK_ID_ATTR, id_value.as_str()),
                (constants::MARK_TRANSLATION_ATTR, display.as_str()),
                (constants::MARK_STATE_ATTR, state.as_str()),
            ],
        );
        append_child(&wrapper, create_text_node(matched));

        // 原节点保留前缀，这样同一节点中靠前的匹配偏移不变
        let prefix = &content[..range.start];
        let suffix = &content[range.end..];
        let suffix_at = if prefix.is_empty() {
            replace_node(&range.node, wrapper.clone());
            index + 1
        } else {
            set_text(&range.node, prefix);
            insert_child(&parent, index + 1, wrapper.clone());
            index + 2
        };
        if !suffix.is_empty() {
            insert_child(&parent, suffix_at, create_text_node(suffix));
        }

        tracing::trace!("已创建标记 {}: {}", id, matched);
        Ok(wrapper)
    }

    fn validate_range(&self, range: &TextRange, text: &str) -> AnnotatorResult<String> {
        let content = get_text(&range.node).ok_or_else(|| helpers::stale_range("不是文本节点"))?;

        if !is_attached(&range.node, &self.root) {
            return Err(helpers::stale_range("文本节点已脱离文档"));
        }
        if range.start >= range.end || range.end > content.len() {
            return Err(helpers::stale_range(format!(
                "范围 {}..{} 超出长度 {}",
                range.start,
                range.end,
                content.len()
            )));
        }
        if !content.is_char_boundary(range.start) || !content.is_char_boundary(range.end) {
            return Err(helpers::stale_range("范围不在字符边界上"));
        }
        if content[range.start..range.end].to_lowercase() != text.to_lowercase() {
            return Err(helpers::stale_range(format!(
                "范围内容与 {:?} 不一致",
                text
            )));
        }

        Ok(content)
    }

    /// 状态转换，同时刷新包装元素上的状态和显示文本
    pub fn set_state(&self, id: MarkId, next: TranslationState) -> AnnotatorResult<()> {
        let display = {
            let mut registry = self.registry.borrow_mut();
            registry.transition(id, next)?;
            registry
                .get(id)
                .map(|record| record.display_text().to_string())
                .unwrap_or_default()
        };

        for wrapper in self.wrappers_for_id(id) {
            set_node_attr(&wrapper, constants::MARK_STATE_ATTR, Some(next.as_str().to_string()));
            set_node_attr(&wrapper, constants::MARK_TRANSLATION_ATTR, Some(display.clone()));
        }
        self.tooltip.borrow_mut().update_text(id, &display);
        Ok(())
    }

    /// 更新标记的翻译文本，不涉及持久化
    pub fn update_mark_translation(&self, id: MarkId, translation: &str) {
        if !self.registry.borrow_mut().set_translation(id, translation) {
            tracing::debug!("更新翻译时标记已不存在: {}", id);
        }

        for wrapper in self.wrappers_for_id(id) {
            set_node_attr(
                &wrapper,
                constants::MARK_TRANSLATION_ATTR,
                Some(translation.to_string()),
            );
        }
        self.tooltip.borrow_mut().update_text(id, translation);
    }

    /// 删除标记所对应术语的全部出现
    pub async fn remove_mark(&self, id: MarkId) -> usize {
        let text = self
            .registry
            .borrow()
            .get(id)
            .map(|record| record.text.clone())
            .or_else(|| {
                self.wrappers_for_id(id)
                    .first()
                    .map(|wrapper| text_content(wrapper))
            });

        match text {
            Some(text) => self.remove_all_occurrences(&text).await,
            None => {
                tracing::debug!("要删除的标记不存在: {}", id);
                0
            }
        }
    }

    /// 删除术语的全部标记并还原原始文本，返回删除的包装元素数量
    pub async fn remove_all_occurrences(&self, text: &str) -> usize {
        if !self.context.is_valid() {
            return 0;
        }

        let removed: Vec<MarkRecord> = {
            let mut registry = self.registry.borrow_mut();
            registry
                .ids_for_text(text)
                .into_iter()
                .filter_map(|id| registry.remove(id))
                .collect()
        };
        let originals: HashMap<MarkId, String> = removed
            .iter()
            .map(|record| (record.id, record.original_content.clone()))
            .collect();

        let lower = text.to_lowercase();
        let wrappers: Vec<Handle> = self
            .mark_wrappers()
            .into_iter()
            .filter(|wrapper| text_content(wrapper).to_lowercase() == lower)
            .collect();

        self.watcher.pause();

        let mut parents: Vec<Handle> = Vec::new();
        let mut removed_ids: HashSet<MarkId> = originals.keys().copied().collect();
        for wrapper in &wrappers {
            let id = get_node_attr(wrapper, constants::MARK_ID_ATTR).and_then(|raw| MarkId::parse(&raw));
            let original = id
                .and_then(|id| originals.get(&id).cloned())
                .unwrap_or_else(|| text_content(wrapper));
            if let Some(id) = id {
                removed_ids.insert(id);
            }

            let replacement = if self.fade_in {
                let span = create_element("span", &[("class", constants::FADE_IN_CLASS)]);
                append_child(&span, create_text_node(&original));
                span
            } else {
                create_text_node(&original)
            };

            if let Some((parent, _)) = index_in_parent(wrapper) {
                replace_node(wrapper, replacement);
                if !parents.iter().any(|p| Rc::ptr_eq(p, &parent)) {
                    parents.push(parent);
                }
            }
        }
        for parent in &parents {
            normalize_text_children(parent);
        }

        {
            let mut tooltip = self.tooltip.borrow_mut();
            if tooltip
                .view()
                .is_some_and(|view| removed_ids.contains(&view.mark_id))
            {
                tooltip.hide();
            }
        }
        self.forget_term(text);
        self.watcher.resume_after(self.watcher_resume);

        tracing::info!("已删除 {:?} 的 {} 处标记", text, wrappers.len());

        let mut spellings: Vec<String> = removed.iter().map(|record| record.text.clone()).collect();
        spellings.push(text.to_string());
        spellings.sort();
        spellings.dedup();

        if self.context.is_valid() {
            helpers::swallow(self.store.remove_all_marks_for_word(text).await);
        }
        for spelling in &spellings {
            if !self.context.is_valid() {
                break;
            }
            helpers::swallow(self.store.delete_word(spelling).await);
        }

        wrappers.len()
    }

    /// 鼠标移入标记
    pub fn hover_enter(self: &Rc<Self>, id: MarkId, anchor: Rect, viewport: Viewport) {
        if !self.context.is_valid() {
            return;
        }
        let Some(record) = self.record(id) else {
            return;
        };

        self.abort_hover_lookup();
        self.tooltip
            .borrow_mut()
            .show(id, record.display_text(), anchor, viewport);

        if record.state == TranslationState::Resolved {
            return;
        }

        let translator = Rc::clone(&self.translator);
        let word = record.text.clone();
        let (lookup, handle) =
            abortable(async move { translator.translate_without_persisting(&word).await });
        *self.hover_lookup.borrow_mut() = Some((id, handle.clone()));

        let manager = Rc::clone(self);
        tokio::task::spawn_local(async move {
            let outcome = lookup.await;
            if handle.is_aborted() {
                return;
            }
            manager.clear_hover_lookup(id);

            match outcome {
                Ok(Ok(translation)) => {
                    let still_unresolved = manager
                        .registry
                        .borrow()
                        .get(id)
                        .is_some_and(|record| record.state != TranslationState::Resolved);
                    if manager.context.is_valid() && still_unresolved {
                        manager.tooltip.borrow_mut().update_text(id, &translation);
                    }
                }
                Ok(Err(error)) => tracing::debug!("悬停查询失败: {}", error),
                Err(_) => {}
            }
        });
    }

    /// 鼠标移出标记：取消临时查询，延迟隐藏提示框
    pub fn hover_leave(self: &Rc<Self>, id: MarkId) {
        let matches = self
            .hover_lookup
            .borrow()
            .as_ref()
            .is_some_and(|(current, _)| *current == id);
        if matches {
            self.abort_hover_lookup();
        }
        self.schedule_tooltip_hide();
    }

    /// 鼠标移入提示框，保持显示
    pub fn tooltip_enter(&self) {
        self.tooltip.borrow_mut().cancel_hide();
    }

    pub fn tooltip_leave(self: &Rc<Self>) {
        self.schedule_tooltip_hide();
    }

    fn schedule_tooltip_hide(self: &Rc<Self>) {
        let generation = self.tooltip.borrow_mut().schedule_hide();
        let manager = Rc::clone(self);
        let linger = self.tooltip_linger;
        tokio::task::spawn_local(async move {
            tokio::time::sleep(linger).await;
            manager.tooltip.borrow_mut().hide_if_current(generation);
        });
    }

    fn abort_hover_lookup(&self) {
        if let Some((id, handle)) = self.hover_lookup.borrow_mut().take() {
            tracing::trace!("取消悬停查询: {}", id);
            handle.abort();
        }
    }

    fn clear_hover_lookup(&self, id: MarkId) {
        let mut slot = self.hover_lookup.borrow_mut();
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
        }
    }

    pub fn tooltip(&self) -> Option<TooltipView> {
        self.tooltip.borrow().view().cloned()
    }

    pub fn record(&self, id: MarkId) -> Option<MarkRecord> {
        self.registry.borrow().get(id).cloned()
    }

    pub fn has_record(&self, id: MarkId) -> bool {
        self.registry.borrow().contains(id)
    }

    pub fn records(&self) -> Vec<MarkRecord> {
        let mut records: Vec<MarkRecord> = self.registry.borrow().iter().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }

    pub fn mark_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// 术语是否已有标记（不区分大小写）
    pub fn is_term_marked(&self, text: &str) -> bool {
        self.registry.borrow().contains_text(text)
    }

    pub fn seed_terms(&self, terms: TermLookup) {
        self.known_terms.borrow_mut().extend(terms);
    }

    pub fn remember_term(&self, text: &str, translation: &str) {
        self.known_terms.borrow_mut().insert(
            text.to_lowercase(),
            KnownTerm {
                text: text.to_string(),
                translation: translation.to_string(),
            },
        );
    }

    pub fn forget_term(&self, text: &str) {
        self.known_terms.borrow_mut().remove(&text.to_lowercase());
    }

    pub fn term_lookup(&self) -> TermLookup {
        self.known_terms.borrow().clone()
    }

    /// 文档中全部标记包装元素
    pub fn mark_wrappers(&self) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_mark_wrappers(&self.root, &mut found);
        found
    }

    fn wrappers_for_id(&self, id: MarkId) -> Vec<Handle> {
        let id_value = id.to_string();
        self.mark_wrappers()
            .into_iter()
            .filter(|wrapper| {
                get_node_attr(wrapper, constants::MARK_ID_ATTR).as_deref() == Some(id_value.as_str())
            })
            .collect()
    }
}

fn collect_mark_wrappers(node: &Handle, found: &mut Vec<Handle>) {
    if is_mark_wrapper(node) {
        found.push(node.clone());
        return;
    }
    for child in node.children.borrow().iter() {
        collect_mark_wrappers(child, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::{find_elements, html_to_dom};
    use crate::services::{Background, MemoryStore, OfflineLookup, RecordingNotifier};
    use markup5ever_rcdom::RcDom;
    use tokio::task::LocalSet;

    fn manager(html: &str, fade_in: bool) -> (RcDom, Rc<MarkLifecycleManager>) {
        let dom = html_to_dom(html.as_bytes(), "utf-8").unwrap();
        let config = EngineConfig {
            fade_in,
            ..EngineConfig::default()
        };
        let context = EngineContext::new();
        let store = Rc::new(MemoryStore::new());
        let translator = Rc::new(Background::new(
            OfflineLookup,
            store.clone(),
            Rc::new(RecordingNotifier::new()),
        ));
        let watcher = Rc::new(ChangeWatcher::new(config.debounce(), context.clone()));
        let manager = MarkLifecycleManager::new(
            dom.document.clone(),
            &config,
            context,
            watcher,
            store,
            translator,
        );
        (dom, Rc::new(manager))
    }

    fn paragraph_text(dom: &RcDom) -> Handle {
        let p = find_elements(&dom.document, "p").remove(0);
        let first = p.children.borrow()[0].clone();
        first
    }

    #[test]
    fn test_create_mark_splits_text_node() {
        let (dom, manager) = manager("<p>I like apple pie.</p>", false);
        let node = paragraph_text(&dom);

        let wrapper = manager
            .create_mark(&TextRange::new(node.clone(), 7, 12), "apple", None, MarkId::next())
            .unwrap();

        assert_eq!(text_content(&wrapper), "apple");
        assert_eq!(get_text(&node).unwrap(), "I like ");
        let p = find_elements(&dom.document, "p").remove(0);
        assert_eq!(p.children.borrow().len(), 3);
        assert_eq!(
            get_node_attr(&wrapper, constants::MARK_STATE_ATTR).as_deref(),
            Some("pending")
        );
    }

    #[test]
    fn test_mark_at_node_start_replaces_node() {
        let (dom, manager) = manager("<p>apple pie</p>", false);
        let node = paragraph_text(&dom);

        let id = MarkId::next();
        manager
            .create_mark(&TextRange::new(node.clone(), 0, 5), "apple", Some("苹果"), id)
            .unwrap();

        assert!(!is_attached(&node, &dom.document));
        assert_eq!(manager.record(id).unwrap().state, TranslationState::Resolved);
        let p = find_elements(&dom.document, "p").remove(0);
        assert_eq!(p.children.borrow().len(), 2);
    }

    #[test]
    fn test_stale_range_is_rejected() {
        let (dom, manager) = manager("<p>I like apple pie.</p>", false);
        let node = paragraph_text(&dom);

        let mismatch = manager.create_mark(&TextRange::new(node.clone(), 0, 5), "apple", None, MarkId::next());
        assert!(matches!(mismatch, Err(AnnotatorError::StaleRange(_))));

        let out_of_bounds =
            manager.create_mark(&TextRange::new(node.clone(), 7, 99), "apple", None, MarkId::next());
        assert!(matches!(out_of_bounds, Err(AnnotatorError::StaleRange(_))));

        let detached = create_text_node("apple");
        let result = manager.create_mark(&TextRange::new(detached, 0, 5), "apple", None, MarkId::next());
        assert!(matches!(result, Err(AnnotatorError::StaleRange(_))));

        assert_eq!(manager.mark_count(), 0);
        assert!(manager.mark_wrappers().is_empty());
    }

    #[tokio::test]
    async fn test_removal_with_fade_in() {
        LocalSet::new()
            .run_until(async {
                let (dom, manager) = manager("<p>I like apple pie.</p>", true);
                let node = paragraph_text(&dom);
                let id = MarkId::next();
                manager
                    .create_mark(&TextRange::new(node, 7, 12), "apple", Some("苹果"), id)
                    .unwrap();

                assert_eq!(manager.remove_mark(id).await, 1);
                assert_eq!(manager.mark_count(), 0);

                let spans = find_elements(&dom.document, "span");
                assert_eq!(spans.len(), 1);
                assert!(crate::parsers::html::has_class(&spans[0], constants::FADE_IN_CLASS));
                assert_eq!(text_content(&find_elements(&dom.document, "p")[0]), "I like apple pie.");
            })
            .await;
    }

    #[test]
    fn test_invalid_context_blocks_creation() {
        let (dom, manager) = manager("<p>apple</p>", false);
        let node = paragraph_text(&dom);
        manager.context.invalidate();

        let result = manager.create_mark(&TextRange::new(node, 0, 5), "apple", None, MarkId::next());
        assert!(matches!(result, Err(AnnotatorError::HostInvalidated)));
    }
}
