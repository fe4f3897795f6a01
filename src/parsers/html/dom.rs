use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

use crate::error::{AnnotatorError, AnnotatorResult};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> AnnotatorResult<RcDom> {
    let s: String = if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        string.into_owned()
    } else {
        String::from_utf8_lossy(data).into_owned()
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
        .map_err(|e| AnnotatorError::Parse(format!("HTML解析失败: {}", e)))
}

/// 查找指定名称的所有元素节点（深度优先）
pub fn find_elements(node: &Handle, node_name: &str) -> Vec<Handle> {
    let mut found_nodes = Vec::new();

    if let NodeData::Element { ref name, .. } = node.data {
        if &*name.local == node_name {
            found_nodes.push(node.clone());
        }
    }

    for child_node in node.children.borrow().iter() {
        found_nodes.append(&mut find_elements(child_node, node_name));
    }

    found_nodes
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
///
/// rcdom 把父指针存放在 `Cell` 中，只能取出再放回。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 设置节点属性，`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    attrs_mut[i].value.clear();
                    attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

/// 检查元素的 class 属性是否包含指定类名
pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_node_attr(node, "class")
        .map(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

/// 创建一个 HTML 元素节点
pub fn create_element(tag_name: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: format_tendril!("{}", value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag_name)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 是否为文本节点
pub fn is_text_node(node: &Handle) -> bool {
    matches!(node.data, NodeData::Text { .. })
}

/// 读取文本节点内容，非文本节点返回 `None`
pub fn get_text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 替换文本节点内容
pub fn set_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        *contents.borrow_mut() = StrTendril::from_slice(text);
    }
}

/// 递归拼接节点下的全部文本
pub fn text_content(node: &Handle) -> String {
    let mut buf = String::new();
    collect_text(node, &mut buf);
    buf
}

fn collect_text(node: &Handle, buf: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        buf.push_str(&contents.borrow());
        return;
    }
    for child in node.children.borrow().iter() {
        collect_text(child, buf);
    }
}

/// 节点在父节点中的位置
pub fn index_in_parent(node: &Handle) -> Option<(Handle, usize)> {
    let parent = get_parent_node(node)?;
    let index = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, node))?;
    Some((parent, index))
}

/// 节点是否仍挂在 `root` 之下
///
/// 每一级都同时检查父指针和父节点的子列表，被摘下的节点可能还残留父指针。
pub fn is_attached(node: &Handle, root: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if Rc::ptr_eq(&current, root) {
            return true;
        }
        match index_in_parent(&current) {
            Some((parent, _)) => current = parent,
            None => return false,
        }
    }
}

/// 在指定位置插入子节点
pub fn insert_child(parent: &Handle, index: usize, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    let mut children = parent.children.borrow_mut();
    let index = index.min(children.len());
    children.insert(index, child);
}

/// 追加子节点
pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 用新节点替换旧节点，返回是否成功
pub fn replace_node(old: &Handle, new: Handle) -> bool {
    let Some((parent, index)) = index_in_parent(old) else {
        return false;
    };
    new.parent.set(Some(Rc::downgrade(&parent)));
    parent.children.borrow_mut()[index] = new;
    old.parent.set(None);
    true
}

/// 合并相邻的文本节点并删除空文本节点
pub fn normalize_text_children(parent: &Handle) {
    let mut children = parent.children.borrow_mut();
    let mut merged: Vec<Handle> = Vec::with_capacity(children.len());

    for child in children.drain(..) {
        let Some(text) = get_text(&child) else {
            merged.push(child);
            continue;
        };
        if text.is_empty() {
            child.parent.set(None);
            continue;
        }
        match merged.last() {
            Some(previous) if is_text_node(previous) => {
                let combined = format!("{}{}", get_text(previous).unwrap_or_default(), text);
                set_text(previous, &combined);
                child.parent.set(None);
            }
            _ => merged.push(child),
        }
    }

    *children = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_text_node(node: &Handle) -> Option<Handle> {
        if is_text_node(node) && !get_text(node).unwrap_or_default().trim().is_empty() {
            return Some(node.clone());
        }
        node.children.borrow().iter().find_map(first_text_node)
    }

    #[test]
    fn test_html_to_dom_and_text_content() {
        let dom = html_to_dom(b"<html><body><p>Hello <b>world</b></p></body></html>", "utf-8")
            .unwrap();
        let p = find_elements(&dom.document, "p").remove(0);
        assert_eq!(text_content(&p), "Hello world");
    }

    #[test]
    fn test_get_parent_node_keeps_pointer() {
        let dom = html_to_dom(b"<p>text</p>", "utf-8").unwrap();
        let text = first_text_node(&dom.document).unwrap();
        let first = get_parent_node(&text).unwrap();
        let second = get_parent_node(&text).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(get_node_name(&first), Some("p"));
    }

    #[test]
    fn test_set_and_remove_attr() {
        let node = create_element("span", &[("class", "a")]);
        set_node_attr(&node, "class", Some("a b".to_string()));
        assert_eq!(get_node_attr(&node, "class").as_deref(), Some("a b"));
        assert!(has_class(&node, "b"));

        set_node_attr(&node, "class", None);
        assert_eq!(get_node_attr(&node, "class"), None);
    }

    #[test]
    fn test_replace_and_attachment() {
        let dom = html_to_dom(b"<p>one</p>", "utf-8").unwrap();
        let text = first_text_node(&dom.document).unwrap();
        let replacement = create_text_node("two");

        assert!(replace_node(&text, replacement.clone()));
        assert!(!is_attached(&text, &dom.document));
        assert!(is_attached(&replacement, &dom.document));
    }

    #[test]
    fn test_normalize_merges_adjacent_text() {
        let parent = create_element("p", &[]);
        append_child(&parent, create_text_node("The "));
        append_child(&parent, create_text_node(""));
        append_child(&parent, create_text_node("cat"));
        append_child(&parent, create_element("br", &[]));
        append_child(&parent, create_text_node(" sat."));

        normalize_text_children(&parent);

        let children = parent.children.borrow();
        assert_eq!(children.len(), 3);
        assert_eq!(get_text(&children[0]).as_deref(), Some("The cat"));
        assert_eq!(get_text(&children[2]).as_deref(), Some(" sat."));
    }
}
