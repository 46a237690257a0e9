//! Document-order element walker.
//!
//! The host-native traversal primitive: it visits elements only and asks a
//! filter what to do with each one, the way a DOM `TreeWalker` consults its
//! `NodeFilter`.

use crate::{Document, NodeId};

/// Verdict of a walk filter for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Yield the element and descend into its children.
    Accept,
    /// Do not yield the element, but descend into its children.
    Skip,
    /// Neither yield the element nor descend.
    Reject,
    /// Yield the element without descending.
    Prune,
}

impl Filter {
    fn yields(self) -> bool {
        matches!(self, Self::Accept | Self::Prune)
    }

    fn descends(self) -> bool {
        matches!(self, Self::Accept | Self::Skip)
    }
}

/// Single-pass iterator created by [`Document::walk`]. The root itself is a
/// candidate.
pub struct Walk<'doc, F> {
    document: &'doc Document,
    root: NodeId,
    upcoming: Option<NodeId>,
    filter: F,
}

impl<'doc, F> Walk<'doc, F>
where
    F: FnMut(&Document, NodeId) -> Filter,
{
    pub(crate) fn new(document: &'doc Document, root: NodeId, filter: F) -> Self {
        let upcoming = document.is_element(root).then_some(root);
        Self {
            document,
            root,
            upcoming,
            filter,
        }
    }

    fn following(&self, node: NodeId, descend: bool) -> Option<NodeId> {
        if descend {
            if let Some(child) = self.document.first_element_child(node) {
                return Some(child);
            }
        }
        let mut current = node;
        loop {
            if current == self.root {
                return None;
            }
            if let Some(sibling) = self.document.next_element_sibling(current) {
                return Some(sibling);
            }
            current = self.document.parent(current)?;
        }
    }
}

impl<F> Iterator for Walk<'_, F>
where
    F: FnMut(&Document, NodeId) -> Filter,
{
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(node) = self.upcoming {
            let verdict = (self.filter)(self.document, node);
            self.upcoming = self.following(node, verdict.descends());
            if verdict.yields() {
                return Some(node);
            }
        }
        None
    }
}
