use crate::directive::{Classification, classify};
use databind_scene::{Document, Filter, NodeId};
use std::cell::Cell;

/// An element carrying directives, found by [`scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveNode {
    pub node: NodeId,
    /// A `<template>` whose content is stamped next to it rather than inside.
    pub ephemeral: bool,
    pub classification: Classification,
}

/// Finds the directive elements under `root` (inclusive) in document order.
///
/// Unmarked elements are skipped but searched. Gates and repeats are yielded
/// without descending, since their subtree is materialized later under a
/// different scope. Each element is classified exactly once.
pub fn scan(document: &Document, root: NodeId) -> Vec<DirectiveNode> {
    let classified = Cell::new(None);
    document
        .walk(root, |document, node| {
            let Some(classification) = classify(&document.dataset(node)) else {
                return Filter::Skip;
            };
            let filter = classification.filter();
            classified.set(Some(classification));
            filter
        })
        .filter_map(|node| {
            Some(DirectiveNode {
                node,
                ephemeral: document.is_template(node),
                classification: classified.take()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use databind_scene::El;
    use pretty_assertions::assert_eq;

    fn nodes(found: &[DirectiveNode]) -> Vec<NodeId> {
        found.iter().map(|found| found.node).collect()
    }

    #[test]
    fn test_skips_unmarked_and_prunes_gates() {
        let mut document = Document::new();
        let root = document.build(
            El::new("div")
                .child(El::new("span").attr("data-prop-text-content", "title"))
                .child(
                    El::new("section")
                        .attr("data-when", "open")
                        .child(El::new("b").attr("data-prop-id", "inner")),
                )
                .child(El::new("ul").child(El::new("li").attr("data-on-click", "go()"))),
        );

        let found = scan(&document, root);
        let span = document.children(root)[0];
        let section = document.children(root)[1];
        let li = document.children(document.children(root)[2])[0];
        assert_eq!(nodes(&found), vec![span, section, li]);
        assert!(matches!(found[1].classification, Classification::Gate(_)));
        assert!(!found[1].ephemeral);
    }

    #[test]
    fn test_templates_are_ephemeral() {
        let mut document = Document::new();
        let root = document.build(
            El::new("ul").child(
                El::new("template")
                    .attr("data-each", "items")
                    .child(El::new("li").attr("data-prop-text-content", "item")),
            ),
        );

        let found = scan(&document, root);
        assert_eq!(found.len(), 1);
        assert!(found[0].ephemeral);
        assert!(matches!(found[0].classification, Classification::Repeat { .. }));
    }

    #[test]
    fn test_root_itself_is_a_candidate() {
        let mut document = Document::new();
        let root = document.build(El::new("p").attr("data-attr-title", "tip"));
        assert_eq!(nodes(&scan(&document, root)), vec![root]);
    }
}
