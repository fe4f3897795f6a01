//! 选词控制
//!
//! 把用户的选择和复制手势转换为标记请求。选择通过校验后不会立即创建标记，
//! 而是等待一小段时间，期间的复制或取消手势可以抢先撤销它。

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;

use super::context::EngineContext;
use super::lifecycle::{MarkLifecycleManager, TextRange};
use crate::config::EngineConfig;
use crate::parsers::html::get_text;
use crate::services::Notifier;

/// 选择限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimits {
    pub max_words: usize,
    pub max_chars: usize,
}

impl SelectionLimits {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_words: config.word_count_limit,
            max_chars: config.max_selection_chars,
        }
    }
}

/// 选择被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    WholeDocument,
    TooManyWords { count: usize, limit: usize },
    TooLong { chars: usize, limit: usize },
    UrlLike,
    DisallowedScript,
}

impl Rejection {
    /// 超出大小限制，需要通知用户
    pub fn is_oversized(&self) -> bool {
        matches!(self, Rejection::TooManyWords { .. } | Rejection::TooLong { .. })
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Empty => write!(f, "选择为空"),
            Rejection::WholeDocument => write!(f, "全选整个文档"),
            Rejection::TooManyWords { count, limit } => {
                write!(f, "选择了 {} 个单词，最多 {} 个", count, limit)
            }
            Rejection::TooLong { chars, limit } => {
                write!(f, "选择了 {} 个字符，最多 {} 个", chars, limit)
            }
            Rejection::UrlLike => write!(f, "选择的是网址"),
            Rejection::DisallowedScript => write!(f, "包含不支持的文字"),
        }
    }
}

/// 通过校验的选择
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedSelection {
    pub text: String,
    pub word_count: usize,
}

/// 判断选择是否可以标记
pub fn is_eligible_selection(
    text: &str,
    whole_document: bool,
    limits: &SelectionLimits,
) -> Result<AcceptedSelection, Rejection> {
    if whole_document {
        return Err(Rejection::WholeDocument);
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Rejection::Empty);
    }

    let word_count = trimmed.split_whitespace().count();
    if word_count > limits.max_words {
        return Err(Rejection::TooManyWords {
            count: word_count,
            limit: limits.max_words,
        });
    }

    let chars = trimmed.chars().count();
    if chars > limits.max_chars {
        return Err(Rejection::TooLong {
            chars,
            limit: limits.max_chars,
        });
    }

    if is_url_like(trimmed) {
        return Err(Rejection::UrlLike);
    }
    if trimmed.chars().any(is_disallowed_char) {
        return Err(Rejection::DisallowedScript);
    }

    Ok(AcceptedSelection {
        text: trimmed.to_string(),
        word_count,
    })
}

/// 是否像网址：带协议、以 www. 开头，或者是单个域名形式的词
pub fn is_url_like(text: &str) -> bool {
    let lower = text.to_lowercase();
    if lower.contains("://") || lower.starts_with("www.") {
        return true;
    }
    if text.contains(char::is_whitespace) {
        return false;
    }

    let host = lower.split(['/', '?', '#']).next().unwrap_or_default();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld_ok = labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));

    labels_ok && tld_ok
}

/// 中日韩文字不做标记
pub fn is_disallowed_char(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'   // 平假名
        | '\u{30A0}'..='\u{30FF}' // 片假名
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{1100}'..='\u{11FF}' // 韩文字母
        | '\u{3130}'..='\u{318F}'
        | '\u{AC00}'..='\u{D7AF}'
    )
}

/// 宿主报告的选择结束事件
///
/// 选择落在单个文本节点内，`start`/`end` 是节点文本中的字节偏移。
#[derive(Debug, Clone)]
pub struct SelectionEvent {
    pub node: Handle,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub whole_document: bool,
}

/// 等待创建的选择
#[derive(Debug, Clone)]
pub struct PendingSelection {
    pub range: TextRange,
    pub text: String,
}

/// 选择处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Rejected(Rejection),
    AlreadyMarked,
    Stale,
    Armed,
}

type SelectionHandler = Rc<dyn Fn(PendingSelection)>;

pub struct SelectionController {
    limits: SelectionLimits,
    arm_delay: Duration,
    context: EngineContext,
    lifecycle: Rc<MarkLifecycleManager>,
    notifier: Rc<dyn Notifier>,
    generation: Cell<u64>,
    pending: RefCell<Option<PendingSelection>>,
    handler: RefCell<Option<SelectionHandler>>,
}

impl SelectionController {
    pub fn new(
        config: &EngineConfig,
        context: EngineContext,
        lifecycle: Rc<MarkLifecycleManager>,
        notifier: Rc<dyn Notifier>,
    ) -> Self {
        Self {
            limits: SelectionLimits::from_config(config),
            arm_delay: config.selection_arm_delay(),
            context,
            lifecycle,
            notifier,
            generation: Cell::new(0),
            pending: RefCell::new(None),
            handler: RefCell::new(None),
        }
    }

    pub fn set_mark_handler(&self, handler: impl Fn(PendingSelection) + 'static) {
        *self.handler.borrow_mut() = Some(Rc::new(handler));
    }

    pub fn limits(&self) -> &SelectionLimits {
        &self.limits
    }

    /// 处理选择结束
    pub fn on_selection_end(self: &Rc<Self>, event: SelectionEvent) -> SelectionOutcome {
        if !self.context.is_valid() {
            return SelectionOutcome::Stale;
        }

        if let Err(rejection) = is_eligible_selection(&event.text, event.whole_document, &self.limits) {
            match &rejection {
                Rejection::TooManyWords { limit, .. } => self
                    .notifier
                    .show_notification("选择过长", &format!("一次最多只能标记 {} 个单词", limit)),
                Rejection::TooLong { limit, .. } => self
                    .notifier
                    .show_notification("选择过长", &format!("一次最多只能标记 {} 个字符", limit)),
                _ => tracing::debug!("忽略选择: {}", rejection),
            }
            return SelectionOutcome::Rejected(rejection);
        }

        let Some(range) = trimmed_range(&event) else {
            return SelectionOutcome::Stale;
        };
        let Some(content) = get_text(&range.node) else {
            return SelectionOutcome::Stale;
        };
        let text = content[range.start..range.end].to_string();
        // 偏移对应的文字必须就是通过校验的文字
        if text.to_lowercase() != event.text.trim().to_lowercase() {
            tracing::debug!("选择偏移与文字不一致: {:?} / {:?}", text, event.text);
            return SelectionOutcome::Stale;
        }

        if self.lifecycle.is_term_marked(&text) {
            tracing::debug!("已经标记过: {}", text);
            return SelectionOutcome::AlreadyMarked;
        }

        self.arm(PendingSelection { range, text });
        SelectionOutcome::Armed
    }

    /// 复制手势：复制的正好是已标记的术语时删除它
    pub fn on_copy(self: &Rc<Self>, copied: &str) -> bool {
        let text = copied.trim();
        if text.is_empty() || !self.context.is_valid() || !self.lifecycle.is_term_marked(text) {
            return false;
        }

        self.cancel();
        let lifecycle = Rc::clone(&self.lifecycle);
        let text = text.to_string();
        tokio::task::spawn_local(async move {
            lifecycle.remove_all_occurrences(&text).await;
        });
        true
    }

    /// 取消等待中的选择
    pub fn cancel(&self) {
        self.generation.set(self.generation.get() + 1);
        if self.pending.borrow_mut().take().is_some() {
            tracing::trace!("已取消等待中的选择");
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    fn arm(self: &Rc<Self>, selection: PendingSelection) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        *self.pending.borrow_mut() = Some(selection);

        let controller = Rc::clone(self);
        tokio::task::spawn_local(async move {
            tokio::time::sleep(controller.arm_delay).await;
            if controller.generation.get() != generation || !controller.context.is_valid() {
                return;
            }

            let Some(selection) = controller.pending.borrow_mut().take() else {
                return;
            };
            let handler = controller.handler.borrow().clone();
            if let Some(handler) = handler {
                handler(selection);
            }
        });
    }
}

/// 对照当前节点内容重新计算去掉首尾空白后的范围
fn trimmed_range(event: &SelectionEvent) -> Option<TextRange> {
    let content = get_text(&event.node)?;

    let mut start = event.start.min(content.len());
    let mut end = event.end.min(content.len());
    while !content.is_char_boundary(start) {
        start -= 1;
    }
    while !content.is_char_boundary(end) {
        end += 1;
    }
    if start >= end {
        return None;
    }

    let slice = &content[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    let (start, end) = (start + leading, end - trailing);
    if start >= end {
        return None;
    }

    Some(TextRange::new(event.node.clone(), start, end))
}
