//! 文档扫描
//!
//! 遍历文档中的正文文本节点，分批查找已知术语并交给生命周期管理器创建标记。

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use super::chunked::run_chunked;
use super::context::EngineContext;
use super::lifecycle::{MarkLifecycleManager, TextRange};
use super::pattern::Pattern;
use super::registry::MarkId;
use super::scanner::find_matches;
use crate::error::helpers;
use crate::parsers::html::{get_text, is_attached, is_mark_wrapper, is_skipped_element, WHITESPACES};

/// 已知术语及其翻译
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownTerm {
    pub text: String,
    pub translation: String,
}

/// 小写术语到已知术语的映射
pub type TermLookup = HashMap<String, KnownTerm>;

/// 由 (术语, 翻译) 构建查找表，后出现的覆盖先出现的
pub fn term_lookup_from<I, S, T>(pairs: I) -> TermLookup
where
    I: IntoIterator<Item = (S, T)>,
    S: Into<String>,
    T: Into<String>,
{
    pairs
        .into_iter()
        .map(|(text, translation)| {
            let text = text.into();
            (
                text.to_lowercase(),
                KnownTerm {
                    text,
                    translation: translation.into(),
                },
            )
        })
        .filter(|(key, _)| !key.trim().is_empty())
        .collect()
}

/// 一次扫描的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub nodes_visited: usize,
    pub nodes_matched: usize,
    pub marks_created: Vec<MarkId>,
    pub batches: usize,
    /// 节点数超过上限被截断
    pub truncated: bool,
}

/// 收集正文文本节点，跳过非正文容器和已有标记
///
/// 返回的节点最多 `max_nodes` 个，第二个值表示是否还有更多节点被截断。
pub fn collect_text_nodes(root: &Handle, max_nodes: usize) -> (Vec<Handle>, bool) {
    let mut nodes = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        match &node.data {
            NodeData::Text { contents } => {
                if contents.borrow().trim_matches(WHITESPACES).is_empty() {
                    continue;
                }
                if nodes.len() >= max_nodes {
                    return (nodes, true);
                }
                nodes.push(node.clone());
                continue;
            }
            NodeData::Element { name, .. } => {
                if is_skipped_element(&name.local) || is_mark_wrapper(&node) {
                    continue;
                }
            }
            NodeData::Document => {}
            _ => continue,
        }

        for child in node.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }

    (nodes, false)
}

pub struct DocumentScanner {
    lifecycle: Rc<MarkLifecycleManager>,
    context: EngineContext,
    batch_size: usize,
}

impl DocumentScanner {
    pub fn new(lifecycle: Rc<MarkLifecycleManager>, context: EngineContext, batch_size: usize) -> Self {
        Self {
            lifecycle,
            context,
            batch_size,
        }
    }

    /// 扫描 `root` 下的文本节点并为已知术语创建标记
    pub async fn scan(
        &self,
        root: &Handle,
        pattern: &Pattern,
        term_lookup: &TermLookup,
        max_nodes: usize,
    ) -> ScanReport {
        let mut report = ScanReport::default();
        if pattern.is_empty() || term_lookup.is_empty() || !self.context.is_valid() {
            return report;
        }

        let (nodes, truncated) = collect_text_nodes(root, max_nodes);
        report.truncated = truncated;
        if truncated {
            tracing::debug!("文本节点超过上限 {}，只扫描前面部分", max_nodes);
        }

        let chunks = run_chunked(&nodes, self.batch_size, |batch| {
            for node in batch {
                if !self.context.is_valid() {
                    return ControlFlow::Break(());
                }
                report.nodes_visited += 1;
                self.scan_node(root, node, pattern, term_lookup, &mut report);
            }
            ControlFlow::Continue(())
        })
        .await;
        report.batches = chunks.chunks;

        tracing::debug!(
            "扫描完成: {} 批, {} 个节点, {} 个节点命中, 新建 {} 个标记",
            report.batches,
            report.nodes_visited,
            report.nodes_matched,
            report.marks_created.len()
        );
        report
    }

    fn scan_node(
        &self,
        root: &Handle,
        node: &Handle,
        pattern: &Pattern,
        term_lookup: &TermLookup,
        report: &mut ScanReport,
    ) {
        // 分批之间文档可能已经变化
        if !is_attached(node, root) {
            return;
        }
        let Some(content) = get_text(node) else {
            return;
        };

        let matches: Vec<_> = find_matches(&content, pattern)
            .into_iter()
            .filter_map(|span| {
                term_lookup
                    .get(&span.matched_text.to_lowercase())
                    .map(|known| (span, known))
            })
            .collect();
        if matches.is_empty() {
            return;
        }
        report.nodes_matched += 1;

        // 倒序应用，前面匹配的偏移不受影响
        for (span, known) in matches.into_iter().rev() {
            let id = MarkId::next();
            let range = TextRange::new(node.clone(), span.start, span.end());
            match self
                .lifecycle
                .create_mark(&range, &known.text, Some(&known.translation), id)
            {
                Ok(_) => report.marks_created.push(id),
                Err(error) => helpers::log_error(&error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::pattern::compile;
    use crate::engine::watcher::ChangeWatcher;
    use crate::parsers::html::{create_text_node, html_to_dom, replace_node, text_content};
    use crate::services::{Background, MemoryStore, OfflineLookup, RecordingNotifier};
    use markup5ever_rcdom::RcDom;
    use tokio::task::LocalSet;

    fn scanner(dom: &RcDom, batch_size: usize) -> (EngineContext, Rc<MarkLifecycleManager>, DocumentScanner) {
        let config = EngineConfig::default();
        let context = EngineContext::new();
        let store = Rc::new(MemoryStore::new());
        let translator = Rc::new(Background::new(
            OfflineLookup,
            store.clone(),
            Rc::new(RecordingNotifier::new()),
        ));
        let watcher = Rc::new(ChangeWatcher::new(config.debounce(), context.clone()));
        let lifecycle = Rc::new(MarkLifecycleManager::new(
            dom.document.clone(),
            &config,
            context.clone(),
            watcher,
            store,
            translator,
        ));
        let scanner = DocumentScanner::new(Rc::clone(&lifecycle), context.clone(), batch_size);
        (context, lifecycle, scanner)
    }

    fn paragraphs(count: usize) -> String {
        let body: String = (0..count).map(|i| format!("<p>apple {}</p>", i)).collect();
        format!("<html><body>{}</body></html>", body)
    }

    #[test]
    fn test_collect_text_nodes_truncates_at_ceiling() {
        let dom = html_to_dom(paragraphs(5).as_bytes(), "utf-8").unwrap();

        let (nodes, truncated) = collect_text_nodes(&dom.document, 3);
        assert_eq!(nodes.len(), 3);
        assert!(truncated);
        assert_eq!(get_text(&nodes[0]).unwrap(), "apple 0");
        assert_eq!(get_text(&nodes[2]).unwrap(), "apple 2");

        let (nodes, truncated) = collect_text_nodes(&dom.document, 5);
        assert_eq!(nodes.len(), 5);
        assert!(!truncated);
    }

    #[test]
    fn test_collect_text_nodes_skips_marks_and_non_content() {
        let html = concat!(
            "<html><head><title>t</title></head><body>",
            "<p>plain <span class=\"wordmark-marked\" data-word-id=\"wm-1\">apple</span></p>",
            "<script>apple()</script><p>   </p>",
            "</body></html>"
        );
        let dom = html_to_dom(html.as_bytes(), "utf-8").unwrap();

        let (nodes, truncated) = collect_text_nodes(&dom.document, 100);
        let texts: Vec<String> = nodes.iter().filter_map(get_text).collect();
        assert_eq!(texts, vec!["plain "]);
        assert!(!truncated);
    }

    #[test]
    fn test_default_ceilings_shrink_for_partial_scans() {
        let config = EngineConfig::default();
        assert!(config.rescan_max_nodes < config.max_text_nodes);
        assert!(config.fanout_max_nodes < config.max_text_nodes);
    }

    #[tokio::test]
    async fn test_scan_runs_in_batches() {
        LocalSet::new()
            .run_until(async {
                let dom = html_to_dom(paragraphs(5).as_bytes(), "utf-8").unwrap();
                let (_context, lifecycle, scanner) = scanner(&dom, 2);
                let lookup = term_lookup_from([("apple", "苹果")]);

                let report = scanner
                    .scan(&dom.document, &compile(&["apple"]), &lookup, 100)
                    .await;

                assert_eq!(report.batches, 3);
                assert_eq!(report.nodes_visited, 5);
                assert_eq!(report.marks_created.len(), 5);
                assert_eq!(lifecycle.mark_count(), 5);
                assert!(!report.truncated);
            })
            .await;
    }

    #[tokio::test]
    async fn test_scan_honours_ceiling() {
        LocalSet::new()
            .run_until(async {
                let dom = html_to_dom(paragraphs(5).as_bytes(), "utf-8").unwrap();
                let (_context, _lifecycle, scanner) = scanner(&dom, 50);
                let lookup = term_lookup_from([("apple", "苹果")]);

                let report = scanner
                    .scan(&dom.document, &compile(&["apple"]), &lookup, 2)
                    .await;

                assert!(report.truncated);
                assert_eq!(report.nodes_visited, 2);
                assert_eq!(report.marks_created.len(), 2);
            })
            .await;
    }

    /// 批次之间让出执行权，其他任务可以在扫描中途失效上下文
    #[tokio::test]
    async fn test_scan_yields_between_batches() {
        LocalSet::new()
            .run_until(async {
                let dom = html_to_dom(paragraphs(4).as_bytes(), "utf-8").unwrap();
                let (context, _lifecycle, scanner) = scanner(&dom, 1);
                let lookup = term_lookup_from([("apple", "苹果")]);

                let other = context.clone();
                tokio::task::spawn_local(async move {
                    other.invalidate();
                });

                let report = scanner
                    .scan(&dom.document, &compile(&["apple"]), &lookup, 100)
                    .await;

                assert_eq!(report.marks_created.len(), 1);
                assert_eq!(report.nodes_visited, 1);
            })
            .await;
    }

    /// 批次之间被移出文档的节点不再处理
    #[tokio::test]
    async fn test_scan_skips_detached_nodes() {
        LocalSet::new()
            .run_until(async {
                let dom = html_to_dom(paragraphs(2).as_bytes(), "utf-8").unwrap();
                let (_context, _lifecycle, scanner) = scanner(&dom, 1);
                let lookup = term_lookup_from([("apple", "苹果")]);

                let (nodes, _) = collect_text_nodes(&dom.document, 10);
                let second = nodes[1].clone();
                tokio::task::spawn_local(async move {
                    replace_node(&second, create_text_node("pear 1"));
                });

                let report = scanner
                    .scan(&dom.document, &compile(&["apple"]), &lookup, 100)
                    .await;

                assert_eq!(report.nodes_visited, 2);
                assert_eq!(report.marks_created.len(), 1);
                let p = crate::parsers::html::find_elements(&dom.document, "p").remove(1);
                assert_eq!(text_content(&p), "pear 1");
            })
            .await;
    }
}
