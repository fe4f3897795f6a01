//! 翻译提示框
//!
//! 提示框默认显示在标记下方，下方放不下时翻到上方，水平方向限制在视口之内。

use super::registry::MarkId;

/// 提示框与标记之间的间距
pub const TOOLTIP_GAP: f64 = 5.0;
const TOOLTIP_MAX_WIDTH: f64 = 300.0;
const TOOLTIP_CHAR_WIDTH: f64 = 14.0;
const TOOLTIP_PADDING: f64 = 16.0;
const TOOLTIP_LINE_HEIGHT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// 计算出的提示框位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub above: bool,
}

/// 根据文本估算提示框尺寸
pub fn estimate_size(text: &str) -> Size {
    let content_width = text.chars().count() as f64 * TOOLTIP_CHAR_WIDTH;
    let width = (content_width + TOOLTIP_PADDING).min(TOOLTIP_MAX_WIDTH);
    let lines = (content_width / (TOOLTIP_MAX_WIDTH - TOOLTIP_PADDING)).ceil().max(1.0);
    Size {
        width,
        height: lines * TOOLTIP_LINE_HEIGHT + TOOLTIP_PADDING,
    }
}

/// 计算提示框位置
pub fn place(anchor: Rect, tooltip: Size, viewport: Viewport) -> Placement {
    let below = anchor.bottom() + TOOLTIP_GAP;
    let above_y = anchor.y - tooltip.height - TOOLTIP_GAP;

    let (y, above) = if below + tooltip.height > viewport.height && above_y >= 0.0 {
        (above_y, true)
    } else {
        (below, false)
    };

    let max_x = (viewport.width - tooltip.width).max(0.0);
    Placement {
        x: anchor.x.clamp(0.0, max_x),
        y,
        above,
    }
}

/// 提示框当前状态
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipView {
    pub mark_id: MarkId,
    pub text: String,
    pub placement: Placement,
}

/// 提示框状态，隐藏操作通过代数作废
#[derive(Debug, Default)]
pub struct Tooltip {
    view: Option<TooltipView>,
    hide_generation: u64,
}

impl Tooltip {
    pub fn show(&mut self, mark_id: MarkId, text: &str, anchor: Rect, viewport: Viewport) {
        let placement = place(anchor, estimate_size(text), viewport);
        self.cancel_hide();
        self.view = Some(TooltipView {
            mark_id,
            text: text.to_string(),
            placement,
        });
    }

    /// 仅当提示框正在显示该标记时更新文本
    pub fn update_text(&mut self, mark_id: MarkId, text: &str) -> bool {
        match self.view.as_mut() {
            Some(view) if view.mark_id == mark_id => {
                view.text = text.to_string();
                true
            }
            _ => false,
        }
    }

    /// 安排一次隐藏，返回本次隐藏的代数
    pub fn schedule_hide(&mut self) -> u64 {
        self.hide_generation += 1;
        self.hide_generation
    }

    pub fn cancel_hide(&mut self) {
        self.hide_generation += 1;
    }

    /// 代数仍然有效时隐藏
    pub fn hide_if_current(&mut self, generation: u64) -> bool {
        if generation == self.hide_generation && self.view.is_some() {
            self.view = None;
            return true;
        }
        false
    }

    pub fn hide(&mut self) {
        self.cancel_hide();
        self.view = None;
    }

    pub fn view(&self) -> Option<&TooltipView> {
        self.view.as_ref()
    }

    pub fn showing(&self, mark_id: MarkId) -> bool {
        self.view.as_ref().is_some_and(|view| view.mark_id == mark_id)
    }
}
