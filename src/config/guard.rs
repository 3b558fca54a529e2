//! Scoped read-write access to read-only subtrees.

use std::ops::{Deref, DerefMut};

use crate::base::Flag;
use crate::errors::Result;
use crate::node::NodeId;

use super::Config;

/// Temporarily lifts the read-only flag on a node; the prior flag value is
/// restored when the guard drops, on every exit path including errors.
pub struct WritableGuard<'a> {
    cfg: &'a mut Config,
    node: NodeId,
    prior: Option<bool>,
}

impl Config {
    /// Make the whole tree writable for the guard's lifetime.
    pub fn writable(&mut self) -> WritableGuard<'_> {
        let root = self.tree.root();
        self.writable_node(root)
    }

    /// Make the subtree at `path` writable for the guard's lifetime.
    pub fn writable_at(&mut self, path: &str) -> Result<WritableGuard<'_>> {
        let node = self.locate_existing(path)?;
        Ok(self.writable_node(node))
    }

    fn writable_node(&mut self, node: NodeId) -> WritableGuard<'_> {
        let prior = self.tree.node(node).flags().get(Flag::Readonly);
        self.tree.node_mut(node).flags.set(Flag::Readonly, Some(false));
        WritableGuard {
            cfg: self,
            node,
            prior,
        }
    }
}

impl Deref for WritableGuard<'_> {
    type Target = Config;

    fn deref(&self) -> &Config {
        self.cfg
    }
}

impl DerefMut for WritableGuard<'_> {
    fn deref_mut(&mut self) -> &mut Config {
        self.cfg
    }
}

impl Drop for WritableGuard<'_> {
    fn drop(&mut self) {
        self.cfg
            .tree
            .node_mut(self.node)
            .flags
            .set(Flag::Readonly, self.prior);
    }
}
