use markup5ever_rcdom::Handle;

use crate::config::constants;

use super::dom::{get_node_attr, get_node_name, has_class};

/// ASCII 空白字符
pub const WHITESPACES: &[char] = &[' ', '\t', '\n', '\x0c', '\r'];

/// 是否为非正文容器（脚本、样式、代码、嵌入内容等）
pub fn is_skipped_element(tag_name: &str) -> bool {
    constants::SKIP_ELEMENTS
        .iter()
        .any(|skipped| skipped.eq_ignore_ascii_case(tag_name))
}

/// 是否为引擎创建的标记包装元素
pub fn is_mark_wrapper(node: &Handle) -> bool {
    get_node_name(node) == Some(constants::MARK_TAG)
        && has_class(node, constants::MARK_CLASS)
        && get_node_attr(node, constants::MARK_ID_ATTR).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::create_element;

    #[test]
    fn test_skipped_elements_case_insensitive() {
        assert!(is_skipped_element("SCRIPT"));
        assert!(is_skipped_element("code"));
        assert!(!is_skipped_element("p"));
    }

    #[test]
    fn test_mark_wrapper_requires_class_and_id() {
        let wrapper = create_element(
            "span",
            &[("class", constants::MARK_CLASS), (constants::MARK_ID_ATTR, "wm-1")],
        );
        let plain = create_element("span", &[("class", constants::MARK_CLASS)]);

        assert!(is_mark_wrapper(&wrapper));
        assert!(!is_mark_wrapper(&plain));
    }
}
