//! # 解析器模块
//!
//! HTML 文档解析与 DOM 操作。标注引擎在 `markup5ever_rcdom` 的文档树上工作，
//! 这里提供它需要的全部节点级操作。

pub mod html;

pub use html::{html_to_dom, serialize_document};
