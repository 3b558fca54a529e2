//! Arena storage and structural operations for configuration trees.

use crate::base::{Flag, Key, PathPart, Value};

use super::{ListNode, MapNode, Node, NodeId, Payload, ScalarNode, ScalarValue};

/// A rooted configuration tree.
///
/// Nodes are owned by the arena; the parent → child edge is the strong one
/// (container entries hold child ids), and the child → parent edge is a
/// plain back-link updated atomically on insert, move, and remove. Removed
/// subtrees return their slots to a free list.
#[derive(Debug, Clone)]
pub struct Tree {
    slots: Vec<Option<Node>>,
    free: Vec<u32>,
    root: NodeId,
}

impl Tree {
    /// A tree whose root is an empty map container.
    pub fn new() -> Self {
        Self::with_root(Node::map(MapNode::default()))
    }

    /// A tree rooted at the given node.
    pub fn with_root(node: Node) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId::from_index(0),
        };
        tree.root = tree.alloc(node);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Re-root the tree at a detached node, freeing the previous root's
    /// subtree.
    pub fn replace_root(&mut self, new_root: NodeId) {
        debug_assert!(self.node(new_root).parent.is_none(), "root must be detached");
        if new_root != self.root {
            let old = self.root;
            self.root = new_root;
            self.free_subtree(old);
        }
    }

    /// Borrow a node. Ids are only ever produced by this tree, so a vacant
    /// slot here is a structural invariant violation.
    pub fn node(&self, id: NodeId) -> &Node {
        self.slots[id.index()].as_ref().expect("live node id")
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id.index()].as_mut().expect("live node id")
    }

    /// Allocate a detached node.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(node);
            NodeId::from_index(index as usize)
        } else {
            self.slots.push(Some(node));
            NodeId::from_index(self.slots.len() - 1)
        }
    }

    /// Release a subtree's slots. The node must already be detached.
    pub fn free_subtree(&mut self, id: NodeId) {
        let children: Vec<NodeId> = match &self.node(id).payload {
            Payload::Scalar(_) => Vec::new(),
            Payload::Map(map) => map.entries.values().copied().collect(),
            Payload::List(list) => list.items.clone(),
        };
        for child in children {
            self.free_subtree(child);
        }
        self.slots[id.index()] = None;
        self.free.push(id.index() as u32);
    }

    // ------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------

    /// Insert or replace a map entry. The child must be detached; any
    /// previous child under the key is detached and returned (not freed).
    pub fn attach_map_entry(&mut self, parent: NodeId, key: Key, child: NodeId) -> Option<NodeId> {
        debug_assert!(self.node(child).parent.is_none(), "attach requires a detached node");
        {
            let node = self.node_mut(child);
            node.parent = Some(parent);
            node.key = Some(key.clone());
        }
        let previous = self
            .node_mut(parent)
            .as_map_mut()
            .expect("map parent")
            .entries
            .insert(key, child);
        if let Some(old) = previous {
            let node = self.node_mut(old);
            node.parent = None;
            node.key = None;
        }
        previous
    }

    /// Remove and return a map entry, detached.
    pub fn remove_map_entry(&mut self, parent: NodeId, key: &Key) -> Option<NodeId> {
        let removed = self
            .node_mut(parent)
            .as_map_mut()
            .expect("map parent")
            .entries
            .shift_remove(key)?;
        let node = self.node_mut(removed);
        node.parent = None;
        node.key = None;
        Some(removed)
    }

    /// Append a detached node to a list container.
    pub fn push_list_item(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.node(child).parent.is_none(), "attach requires a detached node");
        let index = {
            let list = self.node_mut(parent).as_list_mut().expect("list parent");
            list.items.push(child);
            list.items.len() - 1
        };
        let node = self.node_mut(child);
        node.parent = Some(parent);
        node.key = Some(Key::Int(index as i64));
    }

    /// Replace the item at `index`, returning the old child detached.
    pub fn set_list_item(&mut self, parent: NodeId, index: usize, child: NodeId) -> NodeId {
        debug_assert!(self.node(child).parent.is_none(), "attach requires a detached node");
        let old = {
            let list = self.node_mut(parent).as_list_mut().expect("list parent");
            std::mem::replace(&mut list.items[index], child)
        };
        {
            let node = self.node_mut(old);
            node.parent = None;
            node.key = None;
        }
        let node = self.node_mut(child);
        node.parent = Some(parent);
        node.key = Some(Key::Int(index as i64));
        old
    }

    /// Remove and return the item at `index`, detached. Later items are
    /// re-keyed to their new positions.
    pub fn remove_list_item(&mut self, parent: NodeId, index: usize) -> NodeId {
        let removed = {
            let list = self.node_mut(parent).as_list_mut().expect("list parent");
            list.items.remove(index)
        };
        {
            let node = self.node_mut(removed);
            node.parent = None;
            node.key = None;
        }
        self.reindex_list(parent, index);
        removed
    }

    fn reindex_list(&mut self, parent: NodeId, from: usize) {
        let items: Vec<NodeId> = self.node(parent).as_list().expect("list parent").items[from..]
            .to_vec();
        for (offset, child) in items.into_iter().enumerate() {
            self.node_mut(child).key = Some(Key::Int((from + offset) as i64));
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Look up a direct child: map entry by key, or list item when the key
    /// is an in-range integer.
    pub fn child(&self, id: NodeId, key: &Key) -> Option<NodeId> {
        match &self.node(id).payload {
            Payload::Map(map) => map.entries.get(key).copied(),
            Payload::List(list) => {
                let index = key.as_int()?;
                self.list_index(list.items.len(), index)
                    .map(|i| list.items[i])
            }
            Payload::Scalar(_) => None,
        }
    }

    /// Resolve a possibly-negative list index.
    pub fn list_index(&self, len: usize, index: i64) -> Option<usize> {
        if index >= 0 {
            let i = index as usize;
            (i < len).then_some(i)
        } else {
            let back = index.unsigned_abs() as usize;
            (back <= len).then(|| len - back)
        }
    }

    /// Direct children in order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.node(id).payload {
            Payload::Scalar(_) => Vec::new(),
            Payload::Map(map) => map.entries.values().copied().collect(),
            Payload::List(list) => list.items.clone(),
        }
    }

    /// The full key path of a node from the root, e.g. `server.hosts[2]`.
    /// The root's path is the empty string.
    pub fn full_key(&self, id: NodeId) -> String {
        let mut parts: Vec<PathPart> = Vec::new();
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            let key = self.node(current).key.clone().expect("parented node has a key");
            let part = if self.node(parent).is_list() {
                PathPart::Index(key.as_int().expect("list keys are indices"))
            } else {
                PathPart::Key(key.to_string().into())
            };
            parts.push(part);
            current = parent;
        }
        parts.reverse();
        crate::base::format_path(&parts)
    }

    /// Resolve a flag with inherit-from-parent semantics; the root default
    /// is `false`.
    pub fn flag(&self, id: NodeId, flag: Flag) -> bool {
        let mut current = id;
        loop {
            if let Some(value) = self.node(current).flags.get(flag) {
                return value;
            }
            match self.node(current).parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    // ------------------------------------------------------------------
    // Copying and comparison
    // ------------------------------------------------------------------

    /// Deep-copy a subtree from another tree into this arena. The copy is
    /// returned detached.
    pub fn import_subtree(&mut self, src: &Tree, src_id: NodeId) -> NodeId {
        let src_node = src.node(src_id);
        match &src_node.payload {
            Payload::Scalar(scalar) => {
                let mut node = Node::scalar(scalar.clone());
                node.flags = src_node.flags;
                self.alloc(node)
            }
            Payload::Map(map) => {
                let shell = MapNode {
                    entries: Default::default(),
                    key_kind: map.key_kind,
                    elem_hint: map.elem_hint.clone(),
                    schema: map.schema.clone(),
                };
                let entries: Vec<(Key, NodeId)> =
                    map.entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let mut node = Node::map(shell);
                node.flags = src_node.flags;
                let new_id = self.alloc(node);
                for (key, child) in entries {
                    let copy = self.import_subtree(src, child);
                    self.attach_map_entry(new_id, key, copy);
                }
                new_id
            }
            Payload::List(list) => {
                let shell = ListNode {
                    items: Vec::new(),
                    elem_hint: list.elem_hint.clone(),
                };
                let items = list.items.clone();
                let mut node = Node::list(shell);
                node.flags = src_node.flags;
                let new_id = self.alloc(node);
                for child in items {
                    let copy = self.import_subtree(src, child);
                    self.push_list_item(new_id, copy);
                }
                new_id
            }
        }
    }

    /// Move the payload of a detached node onto another node, keeping the
    /// destination's identity, key, and flags. The destination's previous
    /// children are freed, adopted children are re-parented, and the donor
    /// shell is freed.
    pub fn adopt_payload(&mut self, dst: NodeId, donor: NodeId) {
        debug_assert!(self.node(donor).parent.is_none(), "donor must be detached");
        let placeholder = Payload::Scalar(ScalarNode::any(ScalarValue::Null));
        let payload = std::mem::replace(&mut self.node_mut(donor).payload, placeholder);
        let old_children = self.children(dst);
        self.node_mut(dst).payload = payload;
        for child in old_children {
            self.node_mut(child).parent = None;
            self.free_subtree(child);
        }
        for child in self.children(dst) {
            self.node_mut(child).parent = Some(dst);
        }
        self.free_subtree(donor);
    }

    /// Structural value equality of two subtrees (scalar values, container
    /// shapes, keys, and order; declared types and flags are not compared).
    pub fn subtree_eq(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        match (&self.node(a).payload, &other.node(b).payload) {
            (Payload::Scalar(x), Payload::Scalar(y)) => x.value == y.value,
            (Payload::Map(x), Payload::Map(y)) => {
                x.entries.len() == y.entries.len()
                    && x.entries.iter().zip(y.entries.iter()).all(
                        |((ka, va), (kb, vb))| ka == kb && self.subtree_eq(*va, other, *vb),
                    )
            }
            (Payload::List(x), Payload::List(y)) => {
                x.items.len() == y.items.len()
                    && x.items
                        .iter()
                        .zip(y.items.iter())
                        .all(|(va, vb)| self.subtree_eq(*va, other, *vb))
            }
            _ => false,
        }
    }

    /// Build a subtree from a plain value; scalars become untyped nodes and
    /// interpolation-bearing strings become expression nodes (syntax checked
    /// by the scalar layer at the caller). Returns the detached root.
    pub fn build_plain(&mut self, value: &Value) -> NodeId {
        match value {
            Value::Map(map) => {
                let new_id = self.alloc(Node::map(MapNode::default()));
                for (key, child_value) in map {
                    let child = self.build_plain(child_value);
                    self.attach_map_entry(new_id, key.clone(), child);
                }
                new_id
            }
            Value::List(items) => {
                let new_id = self.alloc(Node::list(ListNode::default()));
                for item in items {
                    let child = self.build_plain(item);
                    self.push_list_item(new_id, child);
                }
                new_id
            }
            Value::Str(s) if s == "???" => {
                self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Missing)))
            }
            Value::Str(s) if crate::grammar::contains_interp(s) => {
                self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Interp(s.clone()))))
            }
            Value::Str(s) => {
                self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Str(s.clone()))))
            }
            Value::Null => self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Null))),
            Value::Bool(b) => self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Bool(*b)))),
            Value::Int(i) => self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Int(*i)))),
            Value::Float(f) => self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Float(*f)))),
            Value::Bytes(b) => {
                self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Bytes(b.clone()))))
            }
            Value::Path(p) => {
                self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Path(p.clone()))))
            }
            Value::Enum(m) => {
                self.alloc(Node::scalar(ScalarNode::any(ScalarValue::Enum(m.clone()))))
            }
        }
    }

    /// Number of live nodes, counting the root.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
