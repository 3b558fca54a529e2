//! The configuration tree: arena-allocated nodes with parent back-links.
//!
//! Nodes live in a [`Tree`] arena and are addressed by stable [`NodeId`]s;
//! each node stores its parent id and its key within the parent. The parent
//! edge is the single source of truth for path reporting and flag
//! inheritance.

mod scalar;
mod tree;

pub use scalar::{ScalarNode, ScalarValue, coerce};
pub use tree::Tree;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::base::{FlagSet, Key, KeyKind};
use crate::schema::{Schema, TypeHint};

/// Stable identifier of a node within its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A map container: ordered key → child mapping.
#[derive(Debug, Clone, Default)]
pub struct MapNode {
    pub entries: IndexMap<Key, NodeId>,
    /// Uniform key-kind constraint when bound by a schema hint.
    pub key_kind: Option<KeyKind>,
    /// Element-type hint applied to children.
    pub elem_hint: Option<TypeHint>,
    /// Backing schema when this container was built from a structured
    /// record; drives field validation on mutation and merge.
    pub schema: Option<Arc<Schema>>,
}

/// A list container: ordered child sequence.
#[derive(Debug, Clone, Default)]
pub struct ListNode {
    pub items: Vec<NodeId>,
    pub elem_hint: Option<TypeHint>,
}

/// Node payload: scalar or container.
#[derive(Debug, Clone)]
pub enum Payload {
    Scalar(ScalarNode),
    Map(MapNode),
    List(ListNode),
}

impl Payload {
    /// Object kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Map(_) => "map",
            Self::List(_) => "list",
        }
    }
}

/// One node of the configuration tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) key: Option<Key>,
    pub(crate) flags: FlagSet,
    pub(crate) payload: Payload,
}

impl Node {
    pub fn scalar(scalar: ScalarNode) -> Self {
        Self {
            parent: None,
            key: None,
            flags: FlagSet::new(),
            payload: Payload::Scalar(scalar),
        }
    }

    pub fn map(map: MapNode) -> Self {
        Self {
            parent: None,
            key: None,
            flags: FlagSet::new(),
            payload: Payload::Map(map),
        }
    }

    pub fn list(list: ListNode) -> Self {
        Self {
            parent: None,
            key: None,
            flags: FlagSet::new(),
            payload: Payload::List(list),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.payload, Payload::Scalar(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.payload, Payload::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.payload, Payload::List(_))
    }

    pub fn as_scalar(&self) -> Option<&ScalarNode> {
        match &self.payload {
            Payload::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar_mut(&mut self) -> Option<&mut ScalarNode> {
        match &mut self.payload {
            Payload::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match &self.payload {
            Payload::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut MapNode> {
        match &mut self.payload {
            Payload::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListNode> {
        match &self.payload {
            Payload::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut ListNode> {
        match &mut self.payload {
            Payload::List(l) => Some(l),
            _ => None,
        }
    }
}
