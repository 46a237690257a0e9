use super::Engine;
use super::gate::Gate;
use super::list::List;
use crate::context::Context;
use crate::watcher::{TemplateId, WatcherId};
use databind_scene::{Document, ListenerId, NodeId};

/// Per-kind runtime state of a watcher.
pub(crate) enum Render {
    /// `attr*` and `prop*`: the target is written from the result.
    Binding,
    Listener {
        event_type: String,
        listener: ListenerId,
    },
    Gate(Gate),
    List(List),
}

/// Where stamped content goes: inside `parent`, right after `anchor`,
/// or at the front when there is no anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub parent: NodeId,
    pub anchor: Option<NodeId>,
}

impl Region {
    pub fn first_after(&self, document: &Document, cursor: Option<NodeId>) -> Option<NodeId> {
        match cursor {
            None => document.children(self.parent).first().copied(),
            Some(cursor) => document.next_sibling(cursor),
        }
    }
}

/// Pristine nodes a gate or repeat clones from.
pub(crate) struct Content {
    pub region: Region,
    pub roots: Vec<NodeId>,
    /// Former children detached from a regular element; template content
    /// stays owned by its template.
    pub owned: bool,
}

impl Content {
    pub fn release(self, document: &mut Document) {
        if self.owned {
            for root in self.roots {
                document.remove(root);
            }
        }
    }
}

/// Nodes and top-level watchers stamped from one copy of a [`Content`].
#[derive(Debug, Default)]
pub(crate) struct Materialized {
    pub nodes: Vec<NodeId>,
    pub watchers: Vec<WatcherId>,
}

impl Engine {
    /// Clones `roots` into `region` after `cursor`, then binds the copies
    /// against `context`.
    pub(super) fn materialize(
        &mut self,
        document: &mut Document,
        template: TemplateId,
        region: Region,
        cursor: Option<NodeId>,
        roots: &[NodeId],
        context: &Context,
    ) -> Materialized {
        let mut nodes = Vec::with_capacity(roots.len());
        let mut cursor = cursor;
        for root in roots {
            let Some(copy) = document.clone_subtree(*root) else {
                continue;
            };
            document.insert_after(region.parent, cursor, copy);
            cursor = Some(copy);
            nodes.push(copy);
        }
        let watchers = self.mount(document, template, &nodes, context);
        Materialized { nodes, watchers }
    }

    /// Disposes the watchers first so listeners come off live nodes,
    /// then frees the nodes.
    pub(super) fn unmount(&mut self, document: &mut Document, materialized: Materialized) {
        for watcher in materialized.watchers {
            self.dispose(document, watcher);
        }
        for node in materialized.nodes {
            document.remove(node);
        }
    }

    /// Top-level nodes in document order, including content stamped next to
    /// top-level templates.
    pub(super) fn extent(&self, materialized: &Materialized) -> Vec<NodeId> {
        let mut extent = Vec::with_capacity(materialized.nodes.len());
        for node in &materialized.nodes {
            extent.push(*node);
            for watcher in &materialized.watchers {
                let Some(watcher) = self.registry.get(*watcher) else {
                    continue;
                };
                match &watcher.render {
                    Render::Gate(gate) if gate.content.region.anchor == Some(*node) => {
                        if let Some(attached) = &gate.attached {
                            extent.extend(self.extent(attached));
                        }
                    }
                    Render::List(list) if list.content.region.anchor == Some(*node) => {
                        for instance in &list.instances {
                            extent.extend(self.extent(&instance.materialized));
                        }
                    }
                    _ => {}
                }
            }
        }
        extent
    }
}
