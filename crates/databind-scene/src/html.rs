use crate::{Document, NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

impl Document {
    /// Serializes the node and its subtree. Template content is serialized
    /// inside the `<template>` tags.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut html = String::new();
        self.write_html(node, &mut html);
        html
    }

    /// Serializes the node's children.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut html = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut html);
        }
        html
    }

    fn write_html(&self, node: NodeId, html: &mut String) {
        match self.kind(node) {
            Some(NodeKind::Element(element)) => {
                html.push('<');
                html.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    html.push(' ');
                    html.push_str(name);
                    html.push_str("=\"");
                    escape_into(value, true, html);
                    html.push('"');
                }
                html.push('>');
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    return;
                }
                for root in &element.content {
                    self.write_html(*root, html);
                }
                for child in self.children(node) {
                    self.write_html(*child, html);
                }
                html.push_str("</");
                html.push_str(&element.tag);
                html.push('>');
            }
            Some(NodeKind::Text(text)) => escape_into(text, false, html),
            Some(NodeKind::Comment(text)) => {
                html.push_str("<!--");
                html.push_str(text);
                html.push_str("-->");
            }
            None => {}
        }
    }
}

fn escape_into(text: &str, attribute: bool, html: &mut String) {
    for character in text.chars() {
        match character {
            '&' => html.push_str("&amp;"),
            '<' => html.push_str("&lt;"),
            '>' if !attribute => html.push_str("&gt;"),
            '"' if attribute => html.push_str("&quot;"),
            other => html.push(other),
        }
    }
}
