use crate::{Document, NodeId};

/// Declarative element description, turned into nodes by [`Document::build`].
///
/// ```
/// use databind_scene::{Document, El};
///
/// let mut document = Document::new();
/// let root = document.build(
///     El::new("ul").child(El::new("li").attr("data-prop-text-content", "name")),
/// );
/// assert_eq!(document.children(root).len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct El {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Child>,
}

#[derive(Debug, Clone)]
enum Child {
    Element(El),
    Text(String),
}

impl El {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, child: El) -> Self {
        self.children.push(Child::Element(child));
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = El>) -> Self {
        self.children
            .extend(children.into_iter().map(Child::Element));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Child::Text(text.into()));
        self
    }
}

impl Document {
    /// Creates the described subtree, detached. Children of a `template`
    /// element go into its content fragment. Nothing is journaled.
    pub fn build(&mut self, el: El) -> NodeId {
        let is_template = el.tag == "template";
        let node = self.create_element(el.tag);
        if let Some(element) = self.element_mut(node) {
            element.attributes.extend(el.attributes);
        }
        for child in el.children {
            let child_node = match child {
                Child::Element(child) => self.build(child),
                Child::Text(text) => self.create_text(text),
            };
            if is_template {
                self.append_content(node, child_node);
            } else {
                let index = self.children(node).len();
                self.link(node, index, child_node);
            }
        }
        node
    }
}
