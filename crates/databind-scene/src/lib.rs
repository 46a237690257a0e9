//! In-memory host document.
//!
//! Mirrors the part of the DOM a template engine touches: elements with
//! attributes, properties and listener registrations, text and comment
//! nodes, `<template>` content fragments, a document-order tree walker and a
//! mutation journal. Nodes live in an arena and are addressed by [`NodeId`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

mod builder;
mod html;
mod mutation;
mod walker;

pub use builder::El;
pub use mutation::Mutation;
pub use walker::{Filter, Walk};

/// Property holding the concatenated text of a node.
pub const TEXT_CONTENT: &str = "textContent";

/// Arena handle of a node. Handles are never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque id chosen by whoever registers an event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Value stored in an element property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub properties: IndexMap<String, PropertyValue>,
    pub listeners: Vec<(String, ListenerId)>,
    /// Fragment roots of a `<template>` element. They have no parent.
    pub content: Vec<NodeId>,
}

impl ElementData {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            listeners: Vec::new(),
            content: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The host document: node arena plus mutation journal.
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<Option<NodeData>>,
    mutations: Vec<Mutation>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        }));
        id
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.index())?.as_ref()
    }

    fn data_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.index())?.as_mut()
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.data(node)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.data_mut(node)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Comment(text.into()))
    }

    /// Whether the node exists (was created and not removed).
    pub fn contains(&self, node: NodeId) -> bool {
        self.data(node).is_some()
    }

    /// Number of live nodes, template content included.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.data(node).map(|data| &data.kind)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag.as_str())
    }

    pub fn is_template(&self, node: NodeId) -> bool {
        self.tag(node) == Some("template")
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.data(node).map(|data| data.children.as_slice()).unwrap_or(&[])
    }

    pub fn first_element_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .find(|child| self.is_element(*child))
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|sibling| *sibling == node)?;
        siblings.get(position + 1).copied()
    }

    pub fn next_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|sibling| *sibling == node)?;
        siblings[position + 1..]
            .iter()
            .copied()
            .find(|sibling| self.is_element(*sibling))
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }

    fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.data(node)?.parent?;
        if let Some(parent_data) = self.data_mut(parent) {
            parent_data.children.retain(|child| *child != node);
        }
        if let Some(data) = self.data_mut(node) {
            data.parent = None;
        }
        Some(parent)
    }

    fn link(&mut self, parent: NodeId, index: usize, node: NodeId) {
        let Some(parent_data) = self.data_mut(parent) else {
            return;
        };
        let index = index.min(parent_data.children.len());
        parent_data.children.insert(index, node);
        if let Some(data) = self.data_mut(node) {
            data.parent = Some(parent);
        }
    }

    /// Appends `child` to `parent`, moving it out of its current parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.children(parent).len();
        self.place(parent, index, child);
    }

    /// Inserts `node` right after `after` (or as the first child when `after`
    /// is `None`). A node already inside `parent` is moved.
    pub fn insert_after(&mut self, parent: NodeId, after: Option<NodeId>, node: NodeId) {
        let moved = self.parent(node) == Some(parent);
        if moved {
            self.unlink(node);
        }
        let index = match after {
            None => 0,
            Some(after) => self
                .children(parent)
                .iter()
                .position(|child| *child == after)
                .map(|position| position + 1)
                .unwrap_or(self.children(parent).len()),
        };
        if moved {
            self.link(parent, index, node);
            self.mutations.push(Mutation::ChildMoved { parent, child: node });
        } else {
            self.place(parent, index, node);
        }
    }

    fn place(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if let Some(old_parent) = self.unlink(child) {
            self.mutations.push(Mutation::ChildRemoved {
                parent: old_parent,
                child,
            });
        }
        self.link(parent, index, child);
        self.mutations.push(Mutation::ChildInserted { parent, child });
    }

    /// Detaches the node from its parent without freeing it.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.unlink(node) {
            self.mutations.push(Mutation::ChildRemoved {
                parent,
                child: node,
            });
        }
    }

    /// Detaches and returns all children of `node`.
    pub fn detach_children(&mut self, node: NodeId) -> Vec<NodeId> {
        let children = self.children(node).to_vec();
        for child in &children {
            self.detach(*child);
        }
        children
    }

    /// Removes the node from its parent and frees its whole subtree.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
        self.free(node);
    }

    fn free(&mut self, node: NodeId) {
        let Some(data) = self.nodes.get_mut(node.index()).and_then(Option::take) else {
            return;
        };
        for child in data.children {
            self.free(child);
        }
        if let NodeKind::Element(element) = data.kind {
            for root in element.content {
                self.free(root);
            }
        }
    }

    /// Deep clone of the subtree rooted at `node`, detached. Attributes,
    /// children and template content are copied; properties and listeners
    /// are not.
    pub fn clone_subtree(&mut self, node: NodeId) -> Option<NodeId> {
        let data = self.data(node)?.clone();
        let kind = match data.kind {
            NodeKind::Element(element) => {
                let mut copy = ElementData::new(element.tag);
                copy.attributes = element.attributes;
                let content = element
                    .content
                    .iter()
                    .filter_map(|root| self.clone_subtree(*root))
                    .collect();
                copy.content = content;
                NodeKind::Element(copy)
            }
            other => other,
        };
        let copy = self.alloc(kind);
        for child in data.children {
            if let Some(child_copy) = self.clone_subtree(child) {
                let index = self.children(copy).len();
                self.link(copy, index, child_copy);
            }
        }
        Some(copy)
    }

    pub fn template_content(&self, node: NodeId) -> &[NodeId] {
        self.element(node)
            .map(|element| element.content.as_slice())
            .unwrap_or(&[])
    }

    /// Adds a detached node to the content fragment of a template element.
    pub fn append_content(&mut self, template: NodeId, node: NodeId) {
        self.unlink(node);
        if let Some(element) = self.element_mut(template) {
            element.content.push(node);
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self, node: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.element(node)
            .into_iter()
            .flat_map(|element| element.attributes.iter())
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn set_attribute(&mut self, node: NodeId, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let Some(element) = self.element_mut(node) else {
            return;
        };
        element.attributes.insert(name.clone(), value.clone());
        self.mutations.push(Mutation::AttributeSet { node, name, value });
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        if element.attributes.shift_remove(name).is_some() {
            self.mutations.push(Mutation::AttributeRemoved {
                node,
                name: name.to_owned(),
            });
        }
    }

    /// The element's `data-*` attributes keyed the way the DOM `dataset`
    /// keys them: `data-prop-text-content` becomes `propTextContent`.
    pub fn dataset(&self, node: NodeId) -> IndexMap<String, String> {
        self.attributes(node)
            .filter_map(|(name, value)| {
                let key = name.strip_prefix("data-")?;
                Some((dataset_key(key), value.to_owned()))
            })
            .collect()
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<PropertyValue> {
        if name == TEXT_CONTENT {
            return Some(PropertyValue::Text(self.text_content(node)));
        }
        self.element(node)?.properties.get(name).cloned()
    }

    /// Writes a property. `textContent` replaces all children with a single
    /// text node, like the DOM does.
    pub fn set_property(&mut self, node: NodeId, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        if !self.is_element(node) {
            return;
        }
        if name == TEXT_CONTENT {
            for child in self.children(node).to_vec() {
                self.remove(child);
            }
            let text = match &value {
                PropertyValue::Null => String::new(),
                other => other.to_string(),
            };
            if !text.is_empty() {
                let text_node = self.create_text(text);
                self.append_child(node, text_node);
            }
        }
        if let Some(element) = self.element_mut(node) {
            element.properties.insert(name.clone(), value.clone());
        }
        self.mutations.push(Mutation::PropertySet { node, name, value });
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let mut text = String::new();
        self.collect_text(node, &mut text);
        text
    }

    fn collect_text(&self, node: NodeId, text: &mut String) {
        match self.kind(node) {
            Some(NodeKind::Text(content)) => text.push_str(content),
            Some(NodeKind::Element(_)) => {
                for child in self.children(node) {
                    self.collect_text(*child, text);
                }
            }
            _ => {}
        }
    }

    pub fn add_event_listener(&mut self, node: NodeId, event_type: impl Into<String>, listener: ListenerId) {
        let event_type = event_type.into();
        let Some(element) = self.element_mut(node) else {
            return;
        };
        element.listeners.push((event_type.clone(), listener));
        self.mutations.push(Mutation::ListenerAdded {
            node,
            event_type,
            listener,
        });
    }

    pub fn remove_event_listener(&mut self, node: NodeId, listener: ListenerId) -> bool {
        let Some(element) = self.element_mut(node) else {
            return false;
        };
        let Some(position) = element.listeners.iter().position(|(_, id)| *id == listener) else {
            return false;
        };
        let (event_type, _) = element.listeners.remove(position);
        self.mutations.push(Mutation::ListenerRemoved {
            node,
            event_type,
            listener,
        });
        true
    }

    pub fn event_listeners(&self, node: NodeId, event_type: &str) -> Vec<ListenerId> {
        self.element(node)
            .map(|element| {
                element
                    .listeners
                    .iter()
                    .filter(|(registered, _)| registered == event_type)
                    .map(|(_, listener)| *listener)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Lazily walks the elements of the subtree rooted at `root` in document
    /// order, consulting `filter` once per element.
    pub fn walk<F>(&self, root: NodeId, filter: F) -> Walk<'_, F>
    where
        F: FnMut(&Document, NodeId) -> Filter,
    {
        Walk::new(self, root, filter)
    }

    /// Drains the mutation journal.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }
}

/// `prop-text-content` -> `propTextContent`
fn dataset_key(attribute: &str) -> String {
    let mut key = String::with_capacity(attribute.len());
    let mut characters = attribute.chars().peekable();
    while let Some(character) = characters.next() {
        match characters.peek() {
            Some(next) if character == '-' && next.is_ascii_lowercase() => {
                key.push(next.to_ascii_uppercase());
                characters.next();
            }
            _ => key.push(character),
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dataset_keys_follow_dom_rules() {
        assert_eq!(dataset_key("when"), "when");
        assert_eq!(dataset_key("prop-text-content"), "propTextContent");
        assert_eq!(dataset_key("prop-textContent"), "propTextContent");
        assert_eq!(dataset_key("on-click"), "onClick");
        assert_eq!(dataset_key("x-1"), "x-1");
    }

    #[test]
    fn insert_after_moves_existing_children() {
        let mut document = Document::new();
        let list = document.create_element("ul");
        let items: Vec<_> = (0..3).map(|_| document.create_element("li")).collect();
        for item in &items {
            document.append_child(list, *item);
        }
        document.take_mutations();

        document.insert_after(list, Some(items[0]), items[2]);

        assert_eq!(document.children(list), &[items[0], items[2], items[1]]);
        assert_eq!(
            document.take_mutations(),
            vec![Mutation::ChildMoved {
                parent: list,
                child: items[2]
            }]
        );
    }

    #[test]
    fn insert_after_none_prepends() {
        let mut document = Document::new();
        let list = document.create_element("ul");
        let first = document.create_element("li");
        let second = document.create_element("li");
        document.append_child(list, first);
        document.insert_after(list, None, second);
        assert_eq!(document.children(list), &[second, first]);
    }

    #[test]
    fn remove_frees_subtree() {
        let mut document = Document::new();
        let root = document.build(El::new("div").child(El::new("p").text("hello")));
        let paragraph = document.children(root)[0];
        assert_eq!(document.node_count(), 3);

        document.remove(paragraph);

        assert!(!document.contains(paragraph));
        assert_eq!(document.node_count(), 1);
        assert!(document.children(root).is_empty());
    }

    #[test]
    fn text_content_property_replaces_children() {
        let mut document = Document::new();
        let span = document.build(El::new("span").child(El::new("b").text("old")));
        document.set_property(span, TEXT_CONTENT, PropertyValue::Number(1.0));
        assert_eq!(document.text_content(span), "1");
        assert_eq!(document.children(span).len(), 1);
        assert_eq!(
            document.property(span, TEXT_CONTENT),
            Some(PropertyValue::Text("1".into()))
        );
    }

    #[test]
    fn clone_subtree_copies_attributes_and_content() {
        let mut document = Document::new();
        let template = document.build(
            El::new("template").child(El::new("li").attr("data-prop-text-content", "item")),
        );
        let copy = document.clone_subtree(template).unwrap();
        let content = document.template_content(copy).to_vec();
        assert_eq!(content.len(), 1);
        assert_ne!(content[0], document.template_content(template)[0]);
        assert_eq!(
            document.attribute(content[0], "data-prop-text-content"),
            Some("item")
        );
    }

    #[test]
    fn listeners_are_filtered_by_type() {
        let mut document = Document::new();
        let button = document.create_element("button");
        document.add_event_listener(button, "click", ListenerId(1));
        document.add_event_listener(button, "keydown", ListenerId(2));
        assert_eq!(document.event_listeners(button, "click"), vec![ListenerId(1)]);
        assert!(document.remove_event_listener(button, ListenerId(1)));
        assert!(document.event_listeners(button, "click").is_empty());
        assert!(!document.remove_event_listener(button, ListenerId(1)));
    }
}
