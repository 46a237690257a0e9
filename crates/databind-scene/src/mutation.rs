use crate::{ListenerId, NodeId, PropertyValue};
use serde::{Deserialize, Serialize};

/// One observable change to the document, recorded in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mutation {
    ChildInserted {
        parent: NodeId,
        child: NodeId,
    },
    ChildRemoved {
        parent: NodeId,
        child: NodeId,
    },
    ChildMoved {
        parent: NodeId,
        child: NodeId,
    },
    AttributeSet {
        node: NodeId,
        name: String,
        value: String,
    },
    AttributeRemoved {
        node: NodeId,
        name: String,
    },
    PropertySet {
        node: NodeId,
        name: String,
        value: PropertyValue,
    },
    ListenerAdded {
        node: NodeId,
        event_type: String,
        listener: ListenerId,
    },
    ListenerRemoved {
        node: NodeId,
        event_type: String,
        listener: ListenerId,
    },
}

impl Mutation {
    /// Node the mutation happened on (the parent for child list changes).
    pub fn target(&self) -> NodeId {
        match self {
            Self::ChildInserted { parent, .. }
            | Self::ChildRemoved { parent, .. }
            | Self::ChildMoved { parent, .. } => *parent,
            Self::AttributeSet { node, .. }
            | Self::AttributeRemoved { node, .. }
            | Self::PropertySet { node, .. }
            | Self::ListenerAdded { node, .. }
            | Self::ListenerRemoved { node, .. } => *node,
        }
    }

    /// Whether the mutation changed `node` itself or moved it in or out of
    /// its parent.
    pub fn touches(&self, node: NodeId) -> bool {
        match self {
            Self::ChildInserted { parent, child }
            | Self::ChildRemoved { parent, child }
            | Self::ChildMoved { parent, child } => *parent == node || *child == node,
            _ => self.target() == node,
        }
    }
}
