use std::rc::{Rc, Weak};

use markup5ever_rcdom::Handle;

use super::context::EngineContext;
use super::document::{term_lookup_from, DocumentScanner, ScanReport};
use super::lifecycle::MarkLifecycleManager;
use super::pattern::compile;
use super::registry::{MarkId, MarkRecord};
use super::scheduler::TranslationScheduler;
use super::selection::{PendingSelection, SelectionController};
use super::tooltip::TooltipView;
use super::watcher::ChangeWatcher;
use crate::config::EngineConfig;
use crate::domain::{is_domain_excluded, parse_rules};
use crate::error::{helpers, AnnotatorResult};
use crate::services::{MarkStore, Notifier, Translator};

/// 引擎依赖的外部协作者
#[derive(Clone)]
pub struct Collaborators {
    pub translator: Rc<dyn Translator>,
    pub store: Rc<dyn MarkStore>,
    pub notifier: Rc<dyn Notifier>,
}

/// 启动结果
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// 站点在排除列表中，引擎不工作
    Excluded { host: String },
    Started(ScanReport),
}

/// 单个文档上的标注引擎
///
/// 所有组件共享同一个文档树和上下文标志，必须在 `tokio::task::LocalSet` 中使用。
pub struct Annotator {
    config: EngineConfig,
    context: EngineContext,
    document: Handle,
    store: Rc<dyn MarkStore>,
    lifecycle: Rc<MarkLifecycleManager>,
    scanner: Rc<DocumentScanner>,
    scheduler: Rc<TranslationScheduler>,
    watcher: Rc<ChangeWatcher>,
    selection: Rc<SelectionController>,
}

impl Annotator {
    pub fn new(document: Handle, config: EngineConfig, collaborators: Collaborators) -> Self {
        let context = EngineContext::new();
        let Collaborators {
            translator,
            store,
            notifier,
        } = collaborators;

        let watcher = Rc::new(ChangeWatcher::new(config.debounce(), context.clone()));
        let lifecycle = Rc::new(MarkLifecycleManager::new(
            document.clone(),
            &config,
            context.clone(),
            Rc::clone(&watcher),
            Rc::clone(&store),
            Rc::clone(&translator),
        ));
        let scanner = Rc::new(DocumentScanner::new(
            Rc::clone(&lifecycle),
            context.clone(),
            config.scan_batch_size,
        ));
        let scheduler = Rc::new(TranslationScheduler::new(
            &config,
            context.clone(),
            Rc::clone(&lifecycle),
            Rc::clone(&scanner),
            translator,
            Rc::clone(&store),
        ));
        let selection = Rc::new(SelectionController::new(
            &config,
            context.clone(),
            Rc::clone(&lifecycle),
            notifier,
        ));

        let annotator = Self {
            config,
            context,
            document,
            store,
            lifecycle,
            scanner,
            scheduler,
            watcher,
            selection,
        };
        annotator.wire_handlers();
        annotator
    }

    fn wire_handlers(&self) {
        let lifecycle = Rc::downgrade(&self.lifecycle);
        let scanner = Rc::downgrade(&self.scanner);
        let max_nodes = self.config.rescan_max_nodes;
        self.watcher.set_rescan_handler(move || {
            let (Some(lifecycle), Some(scanner)) = (lifecycle.upgrade(), scanner.upgrade()) else {
                return;
            };
            tokio::task::spawn_local(async move {
                let report = scan_known_terms(&lifecycle, &scanner, max_nodes).await;
                tracing::info!("变更后重新扫描: 新增 {} 个标记", report.marks_created.len());
            });
        });

        let lifecycle: Weak<MarkLifecycleManager> = Rc::downgrade(&self.lifecycle);
        let scheduler = Rc::downgrade(&self.scheduler);
        self.selection.set_mark_handler(move |selection| {
            if let (Some(lifecycle), Some(scheduler)) = (lifecycle.upgrade(), scheduler.upgrade()) {
                mark_pending_selection(&lifecycle, &scheduler, selection);
            }
        });
    }

    /// 启动：检查域名排除规则，加载已保存的术语并扫描整个文档
    pub async fn start(&self, host: Option<&str>) -> AnnotatorResult<StartOutcome> {
        self.context.ensure_valid()?;

        if let Some(host) = host {
            let raw = helpers::swallow(self.store.get_excluded_domains().await).unwrap_or_default();
            if is_domain_excluded(host, &parse_rules(&raw)) {
                tracing::info!("站点已排除，不做标注: {}", host);
                self.context.invalidate();
                return Ok(StartOutcome::Excluded {
                    host: host.to_string(),
                });
            }
        }

        let mut marks: Vec<_> = helpers::swallow(self.store.get_marks().await)
            .unwrap_or_default()
            .into_values()
            .collect();
        marks.sort_by_key(|mark| mark.timestamp);
        self.lifecycle.seed_terms(term_lookup_from(
            marks.into_iter().map(|mark| (mark.text, mark.translation)),
        ));

        self.context.ensure_valid()?;
        let report = self.scan_all(self.config.max_text_nodes).await;
        tracing::info!(
            "初始扫描完成: {} 个节点, 新建 {} 个标记{}",
            report.nodes_visited,
            report.marks_created.len(),
            if report.truncated { "（已截断）" } else { "" }
        );
        Ok(StartOutcome::Started(report))
    }

    /// 用当前已知术语扫描文档
    pub async fn scan_all(&self, max_nodes: usize) -> ScanReport {
        scan_known_terms(&self.lifecycle, &self.scanner, max_nodes).await
    }

    /// 变更后的有界重新扫描
    pub async fn rescan(&self) -> ScanReport {
        self.scan_all(self.config.rescan_max_nodes).await
    }

    /// 为通过校验的选择创建标记并提交翻译
    pub fn mark_selection(&self, selection: PendingSelection) -> Option<MarkId> {
        mark_pending_selection(&self.lifecycle, &self.scheduler, selection)
    }

    pub fn invalidate(&self) {
        self.selection.cancel();
        self.context.invalidate();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn document(&self) -> &Handle {
        &self.document
    }

    pub fn lifecycle(&self) -> &Rc<MarkLifecycleManager> {
        &self.lifecycle
    }

    pub fn scheduler(&self) -> &Rc<TranslationScheduler> {
        &self.scheduler
    }

    pub fn watcher(&self) -> &Rc<ChangeWatcher> {
        &self.watcher
    }

    pub fn selection(&self) -> &Rc<SelectionController> {
        &self.selection
    }

    pub fn records(&self) -> Vec<MarkRecord> {
        self.lifecycle.records()
    }

    pub fn tooltip(&self) -> Option<TooltipView> {
        self.lifecycle.tooltip()
    }
}

async fn scan_known_terms(
    lifecycle: &MarkLifecycleManager,
    scanner: &DocumentScanner,
    max_nodes: usize,
) -> ScanReport {
    let lookup = lifecycle.term_lookup();
    let terms: Vec<&str> = lookup.values().map(|known| known.text.as_str()).collect();
    let pattern = compile(&terms);
    scanner
        .scan(lifecycle.root(), &pattern, &lookup, max_nodes)
        .await
}

fn mark_pending_selection(
    lifecycle: &MarkLifecycleManager,
    scheduler: &Rc<TranslationScheduler>,
    selection: PendingSelection,
) -> Option<MarkId> {
    let id = MarkId::next();
    match lifecycle.create_mark(&selection.range, &selection.text, None, id) {
        Ok(_) => {
            tracing::debug!("已标记选择 {}: {}", id, selection.text);
            scheduler.request(id, &selection.text);
            Some(id)
        }
        Err(error) => {
            helpers::log_error(&error);
            None
        }
    }
}
