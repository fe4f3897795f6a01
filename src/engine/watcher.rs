//! 文档变更监听
//!
//! 过滤结构变更，去抖后触发有界的重新扫描。引擎自己插入的标记和删除标记后
//! 留下的文本节点不算新内容。

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;

use super::context::EngineContext;
use crate::parsers::html::{is_mark_wrapper, is_text_node};

/// 一条结构变更记录
#[derive(Debug, Clone, Default)]
pub struct MutationRecord {
    pub added_nodes: Vec<Handle>,
}

impl MutationRecord {
    pub fn added(nodes: Vec<Handle>) -> Self {
        Self { added_nodes: nodes }
    }

    /// 是否新增了文本节点和标记之外的节点
    pub fn qualifies(&self) -> bool {
        self.added_nodes
            .iter()
            .any(|node| !is_text_node(node) && !is_mark_wrapper(node))
    }
}

type RescanHandler = Rc<dyn Fn()>;

pub struct ChangeWatcher {
    debounce: Duration,
    context: EngineContext,
    pause_depth: Cell<usize>,
    generation: Cell<u64>,
    armed: Cell<bool>,
    handler: RefCell<Option<RescanHandler>>,
}

impl ChangeWatcher {
    pub fn new(debounce: Duration, context: EngineContext) -> Self {
        Self {
            debounce,
            context,
            pause_depth: Cell::new(0),
            generation: Cell::new(0),
            armed: Cell::new(false),
            handler: RefCell::new(None),
        }
    }

    pub fn set_rescan_handler(&self, handler: impl Fn() + 'static) {
        *self.handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// 处理一批变更，返回是否（重新）开始计时
    pub fn observe(self: &Rc<Self>, records: &[MutationRecord]) -> bool {
        if self.is_paused() || !self.context.is_valid() {
            return false;
        }
        if !records.iter().any(MutationRecord::qualifies) {
            return false;
        }

        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.armed.set(true);

        let watcher = Rc::clone(self);
        tokio::task::spawn_local(async move {
            tokio::time::sleep(watcher.debounce).await;
            if watcher.generation.get() != generation {
                return;
            }
            watcher.armed.set(false);
            if !watcher.context.is_valid() {
                return;
            }

            tracing::debug!("文档变更已稳定，开始重新扫描");
            let handler = watcher.handler.borrow().clone();
            if let Some(handler) = handler {
                handler();
            }
        });
        true
    }

    pub fn pause(&self) {
        self.pause_depth.set(self.pause_depth.get() + 1);
    }

    pub fn resume(&self) {
        self.pause_depth.set(self.pause_depth.get().saturating_sub(1));
    }

    /// 延迟恢复，重叠的暂停会一直保持到最后一次恢复
    pub fn resume_after(self: &Rc<Self>, delay: Duration) {
        let watcher = Rc::clone(self);
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            watcher.resume();
        });
    }

    pub fn is_paused(&self) -> bool {
        self.pause_depth.get() > 0
    }

    /// 是否有尚未触发的重新扫描
    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }
}
