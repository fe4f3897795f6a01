//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作（解析、属性、节点创建与替换、文本合并）
//! - `serializer`: 序列化功能
//! - `utils`: 元素分类工具

pub mod dom;
pub mod serializer;
pub mod utils;

pub use dom::{
    append_child, create_element, create_text_node, find_elements, get_node_attr, get_node_name,
    get_parent_node, get_text, has_class, html_to_dom, index_in_parent, insert_child, is_attached,
    is_text_node, normalize_text_children, replace_node, set_node_attr, set_text, text_content,
};
pub use serializer::serialize_document;
pub use utils::{is_mark_wrapper, is_skipped_element, WHITESPACES};
