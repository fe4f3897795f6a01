//! 宿主事件
//!
//! 宿主把用户手势和文档变化作为类型化命令交给引擎，每种命令对应一个处理分支。

use std::rc::Rc;

use super::annotator::Annotator;
use super::registry::MarkId;
use super::selection::{SelectionEvent, SelectionOutcome};
use super::tooltip::{Rect, Viewport};
use super::watcher::MutationRecord;

#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// 点击标记：删除该术语的全部标记
    Click { mark_id: MarkId },
    HoverEnter {
        mark_id: MarkId,
        anchor: Rect,
        viewport: Viewport,
    },
    HoverLeave { mark_id: MarkId },
    TooltipEnter,
    TooltipLeave,
    /// 开始新的选择
    SelectionStart,
    SelectionEnd(SelectionEvent),
    Copy { text: String },
    KeyDown { key: String, ctrl_or_meta: bool },
    Mutations(Vec<MutationRecord>),
    /// 宿主上下文失效，引擎永久停止
    InvalidateContext,
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::Click { .. } => "click",
            EngineCommand::HoverEnter { .. } => "hover_enter",
            EngineCommand::HoverLeave { .. } => "hover_leave",
            EngineCommand::TooltipEnter => "tooltip_enter",
            EngineCommand::TooltipLeave => "tooltip_leave",
            EngineCommand::SelectionStart => "selection_start",
            EngineCommand::SelectionEnd(_) => "selection_end",
            EngineCommand::Copy { .. } => "copy",
            EngineCommand::KeyDown { .. } => "key_down",
            EngineCommand::Mutations(_) => "mutations",
            EngineCommand::InvalidateContext => "invalidate_context",
        }
    }
}

/// 命令处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Handled,
    Ignored,
    Selection(SelectionOutcome),
    /// 变更是否触发了去抖计时
    RescanArmed(bool),
    /// 复制是否触发了删除
    CopyRemoval(bool),
}

/// Escape、Ctrl/Cmd+A、Ctrl/Cmd+C 取消等待中的选择
pub fn is_cancel_gesture(key: &str, ctrl_or_meta: bool) -> bool {
    if key.eq_ignore_ascii_case("escape") {
        return true;
    }
    ctrl_or_meta && (key.eq_ignore_ascii_case("a") || key.eq_ignore_ascii_case("c"))
}

impl Annotator {
    /// 处理一条宿主命令
    pub fn dispatch(&self, command: EngineCommand) -> CommandOutcome {
        if !self.context().is_valid() {
            return CommandOutcome::Ignored;
        }
        tracing::trace!("处理命令: {}", command.name());

        match command {
            EngineCommand::Click { mark_id } => {
                let lifecycle = Rc::clone(self.lifecycle());
                tokio::task::spawn_local(async move {
                    lifecycle.remove_mark(mark_id).await;
                });
                CommandOutcome::Handled
            }
            EngineCommand::HoverEnter {
                mark_id,
                anchor,
                viewport,
            } => {
                self.lifecycle().hover_enter(mark_id, anchor, viewport);
                CommandOutcome::Handled
            }
            EngineCommand::HoverLeave { mark_id } => {
                self.lifecycle().hover_leave(mark_id);
                CommandOutcome::Handled
            }
            EngineCommand::TooltipEnter => {
                self.lifecycle().tooltip_enter();
                CommandOutcome::Handled
            }
            EngineCommand::TooltipLeave => {
                self.lifecycle().tooltip_leave();
                CommandOutcome::Handled
            }
            EngineCommand::SelectionStart => {
                self.selection().cancel();
                CommandOutcome::Handled
            }
            EngineCommand::SelectionEnd(event) => {
                CommandOutcome::Selection(self.selection().on_selection_end(event))
            }
            EngineCommand::Copy { text } => {
                CommandOutcome::CopyRemoval(self.selection().on_copy(&text))
            }
            EngineCommand::KeyDown { key, ctrl_or_meta } => {
                if is_cancel_gesture(&key, ctrl_or_meta) {
                    self.selection().cancel();
                    CommandOutcome::Handled
                } else {
                    CommandOutcome::Ignored
                }
            }
            EngineCommand::Mutations(records) => {
                CommandOutcome::RescanArmed(self.watcher().observe(&records))
            }
            EngineCommand::InvalidateContext => {
                self.invalidate();
                CommandOutcome::Handled
            }
        }
    }
}
