// 测试公共模块
//
// 提供集成测试中使用的 HTML 样本、模拟翻译服务和引擎构建辅助函数

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tokio::sync::oneshot;

use wordmark::engine::SelectionEvent;
use wordmark::error::{AnnotatorError, AnnotatorResult};
use wordmark::parsers::html::{get_node_attr, get_text, is_mark_wrapper, text_content};
use wordmark::services::{MemoryStore, PersistedMark, RecordingNotifier, Translator};
use wordmark::{html_to_dom, serialize_document, Annotator, Collaborators, EngineConfig};

/// HTML 样本
pub struct HtmlFixtures;

impl HtmlFixtures {
    pub fn apple_page() -> &'static str {
        r#"<!DOCTYPE html>
<html>
<head><title>Fruit</title></head>
<body>
    <p id="first">I like apple pie.</p>
    <p id="second">An apple a day keeps the doctor away.</p>
</body>
</html>"#
    }

    pub fn category_page() -> &'static str {
        r#"<html><body><p>the category of cat</p></body></html>"#
    }

    /// 包含脚本、样式和表单输入，它们的文本都不应该被标记
    pub fn mixed_page() -> &'static str {
        r#"<html>
<head>
    <style>.apple { color: red; }</style>
    <script>var apple = 1;</script>
</head>
<body>
    <p>Apple trees grow apples.</p>
    <textarea>apple</textarea>
    <pre>apple</pre>
</body>
</html>"#
    }

    pub fn long_paragraph(words: usize) -> String {
        let text = vec!["lorem"; words].join(" ");
        format!("<html><body><p>{}</p></body></html>", text)
    }
}

/// 模拟翻译服务
///
/// 每次查询都会挂起，直到测试调用 `resolve` 给出结果；
/// 丢弃挂起的查询会让它以错误结束。
#[derive(Default)]
pub struct MockTranslator {
    pending: RefCell<Vec<(String, oneshot::Sender<String>)>>,
    hover_pending: RefCell<Vec<(String, oneshot::Sender<String>)>>,
    calls: RefCell<Vec<String>>,
    hover_calls: Cell<usize>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 完成对 `word` 的最早一次查询，查询已被放弃时返回 false
    pub fn resolve(&self, word: &str, translation: &str) -> bool {
        let sender = {
            let mut pending = self.pending.borrow_mut();
            let position = pending.iter().position(|(w, _)| w == word);
            position.map(|index| pending.remove(index).1)
        };
        match sender {
            Some(sender) => sender.send(translation.to_string()).is_ok(),
            None => false,
        }
    }

    /// 让对 `word` 的最早一次查询失败
    pub fn fail(&self, word: &str) -> bool {
        let mut pending = self.pending.borrow_mut();
        match pending.iter().position(|(w, _)| w == word) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn resolve_hover(&self, word: &str, translation: &str) -> bool {
        let sender = {
            let mut pending = self.hover_pending.borrow_mut();
            let position = pending.iter().position(|(w, _)| w == word);
            position.map(|index| pending.remove(index).1)
        };
        match sender {
            Some(sender) => sender.send(translation.to_string()).is_ok(),
            None => false,
        }
    }

    /// 按发起顺序返回尚未完成的查询
    pub fn pending_words(&self) -> Vec<String> {
        self.pending.borrow().iter().map(|(w, _)| w.clone()).collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn hover_calls(&self) -> usize {
        self.hover_calls.get()
    }
}

#[async_trait(?Send)]
impl Translator for MockTranslator {
    async fn translate(&self, word: &str) -> AnnotatorResult<String> {
        self.calls.borrow_mut().push(word.to_string());
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push((word.to_string(), tx));
        rx.await
            .map_err(|_| AnnotatorError::Lookup(format!("查询被放弃: {}", word)))
    }

    async fn translate_without_persisting(&self, word: &str) -> AnnotatorResult<String> {
        self.hover_calls.set(self.hover_calls.get() + 1);
        let (tx, rx) = oneshot::channel();
        self.hover_pending.borrow_mut().push((word.to_string(), tx));
        rx.await
            .map_err(|_| AnnotatorError::Lookup(format!("查询被放弃: {}", word)))
    }

    async fn get_phonetics(&self, _word: &str) -> String {
        String::new()
    }
}

/// 测试引擎及其协作者
pub struct TestEngine {
    pub dom: RcDom,
    pub annotator: Annotator,
    pub store: Rc<MemoryStore>,
    pub notifier: Rc<RecordingNotifier>,
    pub translator: Rc<MockTranslator>,
}

impl TestEngine {
    pub fn new(html: &str) -> Self {
        Self::with_config(html, EngineConfig::default(), MemoryStore::new())
    }

    pub fn with_store(html: &str, store: MemoryStore) -> Self {
        Self::with_config(html, EngineConfig::default(), store)
    }

    pub fn with_config(html: &str, config: EngineConfig, store: MemoryStore) -> Self {
        let dom = html_to_dom(html.as_bytes(), "utf-8").expect("解析测试文档失败");
        let store = Rc::new(store);
        let notifier = Rc::new(RecordingNotifier::new());
        let translator = Rc::new(MockTranslator::new());

        let annotator = Annotator::new(
            dom.document.clone(),
            config,
            Collaborators {
                translator: translator.clone(),
                store: store.clone(),
                notifier: notifier.clone(),
            },
        );

        Self {
            dom,
            annotator,
            store,
            notifier,
            translator,
        }
    }

    pub fn root(&self) -> Handle {
        self.dom.document.clone()
    }

    pub fn html(&self) -> String {
        let bytes = serialize_document(&self.dom.document, "utf-8").expect("序列化失败");
        String::from_utf8(bytes).expect("输出不是UTF-8")
    }

    /// 文档中全部标记的 (文本, 翻译属性, 状态属性)
    pub fn marks(&self) -> Vec<(String, String, String)> {
        let mut found = Vec::new();
        collect_marks(&self.dom.document, &mut found);
        found
    }

    pub fn mark_texts(&self) -> Vec<String> {
        self.marks().into_iter().map(|(text, _, _)| text).collect()
    }

    /// 选中第一个包含 `needle` 的文本节点中的这段文字
    pub fn select(&self, needle: &str) -> SelectionEvent {
        let node = find_text_node(&self.dom.document, needle)
            .unwrap_or_else(|| panic!("文档中没有 {:?}", needle));
        let content = get_text(&node).unwrap_or_default();
        let start = content.find(needle).unwrap_or_default();
        SelectionEvent {
            node,
            start,
            end: start + needle.len(),
            text: needle.to_string(),
            whole_document: false,
        }
    }
}

fn collect_marks(node: &Handle, found: &mut Vec<(String, String, String)>) {
    if is_mark_wrapper(node) {
        found.push((
            text_content(node),
            get_node_attr(node, "data-translation").unwrap_or_default(),
            get_node_attr(node, "data-state").unwrap_or_default(),
        ));
        return;
    }
    for child in node.children.borrow().iter() {
        collect_marks(child, found);
    }
}

/// 深度优先查找第一个包含 `needle` 且不在标记内的文本节点
pub fn find_text_node(node: &Handle, needle: &str) -> Option<Handle> {
    if let NodeData::Text { contents } = &node.data {
        if contents.borrow().contains(needle) {
            return Some(node.clone());
        }
        return None;
    }
    if is_mark_wrapper(node) {
        return None;
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_text_node(child, needle))
}

pub fn persisted_mark(id: &str, text: &str, translation: &str, timestamp: i64) -> PersistedMark {
    PersistedMark {
        id: id.to_string(),
        text: text.to_string(),
        translation: translation.to_string(),
        timestamp,
    }
}

/// 让出执行权，等待本地任务推进（暂停时钟下只前进 1 毫秒）
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
