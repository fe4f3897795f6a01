use std::cell::Cell;
use std::rc::Rc;

use crate::error::{AnnotatorError, AnnotatorResult};

/// 宿主执行上下文是否仍然有效
///
/// 所有组件共享同一个标志。一旦失效就不再恢复。
#[derive(Debug, Clone)]
pub struct EngineContext {
    valid: Rc<Cell<bool>>,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineContext {
    pub fn new() -> Self {
        Self {
            valid: Rc::new(Cell::new(true)),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    pub fn invalidate(&self) {
        if self.valid.replace(false) {
            tracing::info!("宿主上下文已失效，引擎停止工作");
        }
    }

    pub fn ensure_valid(&self) -> AnnotatorResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(AnnotatorError::HostInvalidated)
        }
    }
}
