//! Thin helpers over an html5ever `RcDom`: parsing, element queries and
//! serialization back to markup.

use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

pub fn parse_to_dom(input: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(input)
}

pub fn node_children(h: &Handle) -> Vec<Handle> {
    h.children.borrow().clone()
}

pub fn tag_lower(h: &Handle) -> Option<String> {
    match &h.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

pub fn is_tag(h: &Handle, tags: &[&str]) -> bool {
    tag_lower(h).map(|t| tags.contains(&t.as_str())).unwrap_or(false)
}

pub fn attr_get(h: &Handle, name: &str) -> Option<String> {
    match &h.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.to_string().eq_ignore_ascii_case(name))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Non-empty, trimmed attribute value.
pub fn attr_nonempty(h: &Handle, name: &str) -> Option<String> {
    attr_get(h, name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Replaces the value of an existing attribute. Returns false when the
/// element has no such attribute.
pub fn attr_set(h: &Handle, name: &str, value: &str) -> bool {
    let NodeData::Element { attrs, .. } = &h.data else {
        return false;
    };
    let mut attrs = attrs.borrow_mut();
    match attrs
        .iter_mut()
        .find(|a| a.name.local.to_string().eq_ignore_ascii_case(name))
    {
        Some(a) => {
            a.value = StrTendril::from_slice(value);
            true
        }
        None => false,
    }
}

pub fn has_class(h: &Handle, class: &str) -> bool {
    attr_get(h, "class")
        .map(|c| c.split_whitespace().any(|x| x.eq_ignore_ascii_case(class)))
        .unwrap_or(false)
}

/// Substring match on the raw class attribute.
pub fn class_contains(h: &Handle, needle: &str) -> bool {
    attr_get(h, "class")
        .map(|c| c.to_ascii_lowercase().contains(needle))
        .unwrap_or(false)
}

pub fn find_elem(node: &Handle, name: &str) -> Option<Handle> {
    if let NodeData::Element { name: q, .. } = &node.data {
        if q.local.to_string().eq_ignore_ascii_case(name) {
            return Some(node.clone());
        }
    }
    for c in node.children.borrow().iter() {
        if let Some(x) = find_elem(c, name) {
            return Some(x);
        }
    }
    None
}

/// All descendant elements (not `root` itself) in document order.
pub fn descendants(root: &Handle) -> Vec<Handle> {
    fn walk(node: &Handle, out: &mut Vec<Handle>) {
        for c in node.children.borrow().iter() {
            if matches!(c.data, NodeData::Element { .. }) {
                out.push(c.clone());
            }
            walk(c, out);
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

/// Descendants of `root` whose tag is one of `tags`.
pub fn descendants_by_tag(root: &Handle, tags: &[&str]) -> Vec<Handle> {
    descendants(root)
        .into_iter()
        .filter(|h| is_tag(h, tags))
        .collect()
}

/// Concatenated text of the node and its descendants.
pub fn text_content(node: &Handle) -> String {
    fn walk(node: &Handle, out: &mut String) {
        if let NodeData::Text { contents } = &node.data {
            out.push_str(&contents.borrow());
        }
        for c in node.children.borrow().iter() {
            walk(c, out);
        }
    }
    let mut out = String::new();
    walk(node, &mut out);
    out
}

fn esc_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

fn esc_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    out
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "noscript" | "xmp" | "iframe" | "noembed" | "noframes")
}

fn serialize_node(out: &mut String, node: &Handle, raw_text: bool) {
    match &node.data {
        NodeData::Document => serialize_children(out, node, false),
        NodeData::Doctype { name, .. } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        NodeData::Text { contents } => {
            let text = contents.borrow();
            if raw_text {
                out.push_str(&text);
            } else {
                out.push_str(&esc_text(&text));
            }
        }
        NodeData::Comment { contents } => {
            out.push_str("<!--");
            out.push_str(contents);
            out.push_str("-->");
        }
        NodeData::ProcessingInstruction { .. } => {}
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let tag = name.local.to_string();
            out.push('<');
            out.push_str(&tag);
            for a in attrs.borrow().iter() {
                out.push(' ');
                if let Some(prefix) = &a.name.prefix {
                    out.push_str(prefix);
                    out.push(':');
                }
                out.push_str(&a.name.local);
                out.push_str("=\"");
                out.push_str(&esc_attr(&a.value));
                out.push('"');
            }
            out.push('>');
            let lower = tag.to_ascii_lowercase();
            if is_void(&lower) {
                return;
            }
            if let Some(contents) = template_contents.borrow().as_ref() {
                serialize_children(out, contents, false);
            }
            serialize_children(out, node, is_raw_text(&lower));
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
    }
}

fn serialize_children(out: &mut String, node: &Handle, raw_text: bool) {
    for c in node.children.borrow().iter() {
        serialize_node(out, c, raw_text);
    }
}

/// Markup for the node itself.
pub fn outer_html(node: &Handle) -> String {
    let mut out = String::new();
    serialize_node(&mut out, node, false);
    out
}

/// Markup of the node's children.
pub fn inner_html(node: &Handle) -> String {
    let raw = tag_lower(node).map(|t| is_raw_text(&t)).unwrap_or(false);
    let mut out = String::new();
    serialize_children(&mut out, node, raw);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendants_keep_document_order() {
        let dom = parse_to_dom("<div><h1>a</h1><p>b<span>c</span></p><h1>d</h1></div>");
        let body = find_elem(&dom.document, "body").unwrap();
        let tags: Vec<String> = descendants(&body).iter().filter_map(tag_lower).collect();
        assert_eq!(tags, vec!["div", "h1", "p", "span", "h1"]);
        assert_eq!(descendants_by_tag(&body, &["h1"]).len(), 2);
    }

    #[test]
    fn inner_html_keeps_inline_markup() {
        let dom = parse_to_dom("<p>Hello <b>big</b> &amp; bold</p>");
        let p = find_elem(&dom.document, "p").unwrap();
        assert_eq!(inner_html(&p), "Hello <b>big</b> &amp; bold");
        assert_eq!(text_content(&p), "Hello big & bold");
    }

    #[test]
    fn script_text_is_not_escaped() {
        let dom = parse_to_dom("<script>if (a < b) { go(); }</script>");
        let script = find_elem(&dom.document, "script").unwrap();
        assert_eq!(outer_html(&script), "<script>if (a < b) { go(); }</script>");
    }

    #[test]
    fn attr_set_replaces_value() {
        let dom = parse_to_dom(r#"<img src="a.jpg" alt="x">"#);
        let img = find_elem(&dom.document, "img").unwrap();
        assert!(attr_set(&img, "SRC", "b.jpg"));
        assert!(!attr_set(&img, "poster", "c.jpg"));
        assert_eq!(outer_html(&img), r#"<img src="b.jpg" alt="x">"#);
    }

    #[test]
    fn svg_attributes_keep_their_prefix() {
        let html = r##"<svg xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 10 10"><use xlink:href="#icon"></use></svg>"##;
        let dom = parse_to_dom(html);
        let svg = find_elem(&dom.document, "svg").unwrap();
        assert_eq!(outer_html(&svg), html);
    }
}
