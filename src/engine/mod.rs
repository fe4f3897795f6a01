//! 标注引擎
//!
//! 组件按依赖顺序：
//!
//! - `pattern` / `scanner` - 术语模式编译与文本匹配
//! - `document` - 分批扫描文档中的文本节点
//! - `registry` / `lifecycle` - 标记记录、包装元素的创建和删除、提示框
//! - `scheduler` - 限制并发的翻译调度与同词复用
//! - `watcher` - 文档变更去抖与重新扫描
//! - `selection` - 选择与复制手势
//! - `command` - 宿主命令分发
//!
//! 引擎是单线程的，所有异步任务都通过 `spawn_local` 运行在同一个 `LocalSet` 上。

pub mod annotator;
pub mod chunked;
pub mod command;
pub mod context;
pub mod document;
pub mod lifecycle;
pub mod pattern;
pub mod registry;
pub mod scanner;
pub mod scheduler;
pub mod selection;
pub mod tooltip;
pub mod watcher;

pub use annotator::{Annotator, Collaborators, StartOutcome};
pub use command::{CommandOutcome, EngineCommand};
pub use context::EngineContext;
pub use document::{collect_text_nodes, term_lookup_from, DocumentScanner, KnownTerm, ScanReport, TermLookup};
pub use lifecycle::{MarkLifecycleManager, TextRange};
pub use pattern::{compile, Pattern};
pub use registry::{MarkId, MarkRecord, MarkRegistry, TranslationState};
pub use scanner::{find_matches, MatchSpan};
pub use scheduler::{TranslationRequest, TranslationScheduler};
pub use selection::{
    is_eligible_selection, AcceptedSelection, PendingSelection, Rejection, SelectionEvent,
    SelectionLimits, SelectionOutcome,
};
pub use tooltip::{Placement, Rect, TooltipView, Viewport};
pub use watcher::{ChangeWatcher, MutationRecord};
