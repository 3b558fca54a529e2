//! The public configuration handle: creation, path navigation, typed reads,
//! and validated mutation.
//!
//! Paths use the mixed notation `a.b[0].c`. Reads through [`Config::get`]
//! resolve interpolations; [`Config::select_raw`] returns the raw expression
//! text. All mutation funnels through one write path so flags, declared
//! types, and parent links stay consistent.

mod guard;

pub use guard::WritableGuard;

use std::sync::Arc;

use crate::base::{Flag, Key, PathPart, Value, parse_path};
use crate::errors::{ConfigError, Result};
use crate::eval::Evaluator;
use crate::grammar::{self, Element};
use crate::node::{ListNode, MapNode, Node, NodeId, Payload, ScalarNode, ScalarValue, Tree, coerce};
use crate::schema::{Schema, TypeHint};

/// Options for [`Config::update`].
#[derive(Debug, Clone, Copy)]
pub struct UpdateOpts {
    /// Merge container values into existing containers instead of replacing
    /// them.
    pub merge: bool,
    /// Create keys even under struct-mode containers; intermediate
    /// containers are created with inherit-from-parent flags.
    pub force_add: bool,
}

impl Default for UpdateOpts {
    fn default() -> Self {
        Self {
            merge: true,
            force_add: false,
        }
    }
}

/// A hierarchical configuration tree.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) tree: Tree,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.tree.subtree_eq(self.tree.root(), &other.tree, other.tree.root())
    }
}

impl Config {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// An empty map-rooted configuration.
    pub fn new() -> Self {
        Self { tree: Tree::new() }
    }

    pub(crate) fn from_tree(tree: Tree) -> Self {
        Self { tree }
    }

    /// Build a configuration from a plain value. The root must be a map or
    /// list; interpolation-bearing strings are syntax-checked.
    pub fn from_value(value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        if !value.is_container() {
            return Err(ConfigError::type_error("", "map or list", value.type_name()));
        }
        let mut tree = Tree::new();
        let root = tree.build_plain(&value);
        tree.replace_root(root);
        let cfg = Self { tree };
        cfg.validate_expressions(cfg.tree.root())?;
        Ok(cfg)
    }

    /// Build from a dot-list of `path=value` assignments. Right-hand sides
    /// go through the Element grammar; `key=` yields the empty string and a
    /// bare `key` yields null.
    pub fn from_dotlist<S: AsRef<str>>(items: &[S]) -> Result<Self> {
        let mut cfg = Self::new();
        cfg.merge_dotlist(items)?;
        Ok(cfg)
    }

    /// Apply a dot-list on top of this configuration.
    pub fn merge_dotlist<S: AsRef<str>>(&mut self, items: &[S]) -> Result<()> {
        for item in items {
            let item = item.as_ref();
            let (path, value) = match item.split_once('=') {
                Some((path, rhs)) => (path.trim(), dotlist_value(rhs.trim())?),
                None => (item.trim(), Value::Null),
            };
            self.update(
                path,
                value,
                &UpdateOpts {
                    merge: true,
                    force_add: true,
                },
            )?;
        }
        Ok(())
    }

    /// Instantiate a structured schema: a struct-locked map whose fields
    /// carry the declared kinds, defaults, and optionality.
    pub fn from_schema(schema: &Arc<Schema>) -> Result<Self> {
        let mut tree = Tree::new();
        let root = instantiate_schema(&mut tree, schema)?;
        tree.replace_root(root);
        Ok(Self { tree })
    }

    /// Instantiate a schema and apply field overrides.
    pub fn from_schema_with<S: AsRef<str>, V: Into<Value> + Clone>(
        schema: &Arc<Schema>,
        overrides: &[(S, V)],
    ) -> Result<Self> {
        let mut cfg = Self::from_schema(schema)?;
        for (path, value) in overrides {
            cfg.set(path.as_ref(), value.clone())?;
        }
        Ok(cfg)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read a value, resolving interpolations. Absent paths are a key
    /// error; a missing (`???`) scalar is a missing-mandatory error.
    pub fn get(&self, path: &str) -> Result<Value> {
        let id = self.locate_existing(path)?;
        let mut eval = Evaluator::new(&self.tree);
        if self.tree.node(id).is_scalar() {
            eval.scalar_value(id)
        } else {
            eval.node_value(id, false)
        }
    }

    /// Read with a default: structural absence yields the default;
    /// validation and interpolation failures still propagate.
    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Result<Value> {
        match self.select(path)? {
            Some(value) => Ok(value),
            None => Ok(default.into()),
        }
    }

    /// Resolve a path to its value, or `None` when the path does not exist
    /// or the target is missing.
    pub fn select(&self, path: &str) -> Result<Option<Value>> {
        let Some(id) = self.locate(&parse_path(path)?)? else {
            return Ok(None);
        };
        if let Some(scalar) = self.tree.node(id).as_scalar() {
            if scalar.value.is_missing() {
                return Ok(None);
            }
        }
        let mut eval = Evaluator::new(&self.tree);
        if self.tree.node(id).is_scalar() {
            eval.scalar_value(id).map(Some)
        } else {
            eval.node_value(id, false).map(Some)
        }
    }

    /// Like [`Config::select`] but without resolution: interpolation
    /// expressions come back verbatim and missing values as `???`.
    pub fn select_raw(&self, path: &str) -> Result<Option<Value>> {
        let Some(id) = self.locate(&parse_path(path)?)? else {
            return Ok(None);
        };
        Ok(Some(crate::convert::project_raw(&self.tree, id)))
    }

    pub fn get_bool(&self, path: &str) -> Result<bool> {
        match self.get(path)? {
            Value::Bool(b) => Ok(b),
            other => Err(ConfigError::type_error(path, "bool", other.type_name())),
        }
    }

    pub fn get_int(&self, path: &str) -> Result<i64> {
        match self.get(path)? {
            Value::Int(i) => Ok(i),
            other => Err(ConfigError::type_error(path, "int", other.type_name())),
        }
    }

    pub fn get_float(&self, path: &str) -> Result<f64> {
        match self.get(path)? {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(ConfigError::type_error(path, "float", other.type_name())),
        }
    }

    pub fn get_str(&self, path: &str) -> Result<String> {
        match self.get(path)? {
            Value::Str(s) => Ok(s),
            other => Err(ConfigError::type_error(path, "str", other.type_name())),
        }
    }

    pub fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        match self.get(path)? {
            Value::Bytes(b) => Ok(b),
            other => Err(ConfigError::type_error(path, "bytes", other.type_name())),
        }
    }

    pub fn get_enum(&self, path: &str) -> Result<crate::base::EnumMember> {
        match self.get(path)? {
            Value::Enum(m) => Ok(m),
            other => Err(ConfigError::type_error(path, "enum", other.type_name())),
        }
    }

    /// Whether the path exists structurally (missing values count as
    /// existing).
    pub fn exists(&self, path: &str) -> bool {
        parse_path(path)
            .ok()
            .and_then(|parts| self.locate(&parts).ok().flatten())
            .is_some()
    }

    /// Whether the path holds the `???` sentinel.
    pub fn is_missing(&self, path: &str) -> Result<bool> {
        let id = self.locate_existing(path)?;
        Ok(self
            .tree
            .node(id)
            .as_scalar()
            .is_some_and(|s| s.value.is_missing()))
    }

    /// Whether the path holds an unresolved interpolation expression.
    pub fn is_interpolation(&self, path: &str) -> Result<bool> {
        let id = self.locate_existing(path)?;
        Ok(self
            .tree
            .node(id)
            .as_scalar()
            .is_some_and(|s| s.value.is_interp()))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Assign a value, replacing any existing node at the path. The
    /// existing node's declared type anchors validation; struct-mode and
    /// read-only flags are enforced.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        self.write(path, value.into(), false, false)
    }

    /// Assign with options: merging container values (default) and
    /// struct-mode override via `force_add`.
    pub fn update(&mut self, path: &str, value: impl Into<Value>, opts: &UpdateOpts) -> Result<()> {
        self.write(path, value.into(), opts.merge, opts.force_add)
    }

    /// Remove a key, returning its resolved value. Struct-mode containers
    /// reject removal; absent keys are a key error.
    pub fn remove(&mut self, path: &str) -> Result<Value> {
        match self.take(path)? {
            Some(value) => Ok(value),
            None => Err(ConfigError::key(path, "key not found")),
        }
    }

    /// Remove a key, returning its resolved value or the default when the
    /// key is structurally absent.
    pub fn pop(&mut self, path: &str, default: impl Into<Value>) -> Result<Value> {
        match self.take(path)? {
            Some(value) => Ok(value),
            None => Ok(default.into()),
        }
    }

    fn take(&mut self, path: &str) -> Result<Option<Value>> {
        let parts = parse_path(path)?;
        let Some((last, init)) = parts.split_last() else {
            return Err(ConfigError::key(path, "cannot remove the root"));
        };
        let Some(parent) = self.locate(init)? else {
            return Ok(None);
        };
        let key = part_to_key(last);
        let Some(target) = self.tree.child(parent, &key) else {
            return Ok(None);
        };
        if self.tree.flag(target, Flag::Readonly) {
            return Err(ConfigError::readonly(
                self.tree.full_key(target),
                "cannot remove from a read-only subtree",
            ));
        }
        if self.tree.node(parent).is_map() && self.tree.flag(parent, Flag::Struct) {
            return Err(ConfigError::attribute(
                self.tree.full_key(target),
                format!("key '{key}' cannot be removed from a struct"),
            ));
        }
        let value = crate::convert::project_raw(&self.tree, target);
        let detached = if self.tree.node(parent).is_map() {
            self.tree.remove_map_entry(parent, &key).expect("present")
        } else {
            let len = self
                .tree
                .node(parent)
                .as_list()
                .expect("container parent")
                .items
                .len();
            let index = self
                .tree
                .list_index(len, key.as_int().expect("list key"))
                .expect("checked in child lookup");
            self.tree.remove_list_item(parent, index)
        };
        self.tree.free_subtree(detached);
        Ok(Some(value))
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    /// Set or clear (with `None`) the read-only flag at a path (empty path
    /// addresses the root).
    pub fn set_readonly(&mut self, path: &str, value: Option<bool>) -> Result<()> {
        let id = self.locate_existing(path)?;
        self.tree.node_mut(id).flags.set(Flag::Readonly, value);
        Ok(())
    }

    /// Set or clear (with `None`) the struct flag at a path.
    pub fn set_struct(&mut self, path: &str, value: Option<bool>) -> Result<()> {
        let id = self.locate_existing(path)?;
        self.tree.node_mut(id).flags.set(Flag::Struct, value);
        Ok(())
    }

    /// The effective read-only flag at a path (inherit-resolved).
    pub fn is_readonly(&self, path: &str) -> Result<bool> {
        let id = self.locate_existing(path)?;
        Ok(self.tree.flag(id, Flag::Readonly))
    }

    /// The effective struct flag at a path (inherit-resolved).
    pub fn is_struct(&self, path: &str) -> Result<bool> {
        let id = self.locate_existing(path)?;
        Ok(self.tree.flag(id, Flag::Struct))
    }

    // ------------------------------------------------------------------
    // Navigation internals
    // ------------------------------------------------------------------

    pub(crate) fn locate(&self, parts: &[PathPart]) -> Result<Option<NodeId>> {
        let mut current = self.tree.root();
        for part in parts {
            if self.tree.node(current).is_scalar() {
                return Ok(None);
            }
            let key = part_to_key(part);
            match self.tree.child(current, &key) {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub(crate) fn locate_existing(&self, path: &str) -> Result<NodeId> {
        self.locate(&parse_path(path)?)?
            .ok_or_else(|| ConfigError::key(path, "key not found"))
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    fn write(&mut self, path: &str, value: Value, merge: bool, force_add: bool) -> Result<()> {
        let parts = parse_path(path)?;
        let Some((last, init)) = parts.split_last() else {
            return Err(ConfigError::key(path, "cannot assign to the root"));
        };

        let mut current = self.tree.root();
        for part in init {
            let key = part_to_key(part);
            match self.tree.child(current, &key) {
                Some(child) if self.tree.node(child).is_scalar() => {
                    return Err(ConfigError::type_error(
                        self.tree.full_key(child),
                        "container",
                        "scalar",
                    ));
                }
                Some(child) => current = child,
                None => {
                    if !self.tree.node(current).is_map() {
                        return Err(ConfigError::key(
                            path,
                            format!("index '{key}' out of range"),
                        ));
                    }
                    self.check_can_add(current, &key, force_add)?;
                    let child = self.tree.alloc(Node::map(MapNode::default()));
                    self.tree.attach_map_entry(current, key, child);
                    current = child;
                }
            }
        }
        self.write_leaf(current, last, value, merge, force_add)
    }

    fn check_can_add(&self, parent: NodeId, key: &Key, force_add: bool) -> Result<()> {
        if self.tree.flag(parent, Flag::Readonly) {
            return Err(ConfigError::readonly(
                self.tree.full_key(parent),
                format!("cannot add key '{key}' to a read-only subtree"),
            ));
        }
        if !force_add && self.tree.flag(parent, Flag::Struct) {
            let mut full_key = self.tree.full_key(parent);
            crate::base::push_part(&mut full_key, &PathPart::Key(key.to_string().into()));
            return Err(ConfigError::attribute(
                full_key,
                format!("key '{key}' is not in struct"),
            ));
        }
        Ok(())
    }

    fn write_leaf(
        &mut self,
        parent: NodeId,
        part: &PathPart,
        value: Value,
        merge: bool,
        force_add: bool,
    ) -> Result<()> {
        let key = part_to_key(part);
        let existing = self.tree.child(parent, &key);

        if let Some(target) = existing {
            if self.tree.flag(target, Flag::Readonly) {
                return Err(ConfigError::readonly(
                    self.tree.full_key(target),
                    "cannot assign to a read-only subtree",
                ));
            }
            return self.overwrite(parent, target, key, value, merge);
        }

        // New key: only maps grow; list indices must already exist.
        if !self.tree.node(parent).is_map() {
            return Err(ConfigError::key(
                self.tree.full_key(parent),
                format!("index '{key}' out of range"),
            ));
        }
        self.check_can_add(parent, &key, force_add)?;
        let hint = self.hint_for_child(parent, &key, force_add);
        let mut err_key = self.tree.full_key(parent);
        crate::base::push_part(&mut err_key, &PathPart::Key(key.to_string().into()));
        let child = build_typed_subtree(&mut self.tree, &value, hint.as_ref(), &err_key)?;
        self.tree.attach_map_entry(parent, key, child);
        Ok(())
    }

    /// Replace or merge onto an existing node. The old node's declared type
    /// anchors validation; container rebuilds are staged in a scratch tree
    /// so a failure leaves the tree unchanged.
    fn overwrite(
        &mut self,
        parent: NodeId,
        target: NodeId,
        key: Key,
        value: Value,
        merge: bool,
    ) -> Result<()> {
        let full_key = self.tree.full_key(target);

        // Scalar target with a scalar value mutates in place after coercion.
        if let Some(scalar) = self.tree.node(target).as_scalar() {
            if !value.is_container() {
                let coerced = coerce(&value, &scalar.kind.clone(), scalar.optional, &full_key)?;
                self.tree
                    .node_mut(target)
                    .as_scalar_mut()
                    .expect("scalar target")
                    .value = coerced;
                return Ok(());
            }
        }

        if merge && self.tree.node(target).is_map() && matches!(value, Value::Map(_)) {
            validate_value_expressions(&value, &full_key)?;
            let mut scratch = Tree::new();
            let scratch_root = scratch.import_subtree(&self.tree, target);
            scratch.replace_root(scratch_root);
            let mut rhs = Tree::new();
            let rhs_root = rhs.build_plain(&value);
            rhs.replace_root(rhs_root);
            crate::merge::merge_node(
                &mut scratch,
                scratch_root,
                &rhs,
                rhs_root,
                &crate::merge::MergeOptions::default(),
            )?;
            let rebuilt = self.tree.import_subtree(&scratch, scratch_root);
            let old = self
                .tree
                .attach_map_entry(parent, key, rebuilt)
                .expect("was present");
            self.tree.free_subtree(old);
            return Ok(());
        }

        // Replacement: rebuild under the target's own type identity.
        let hint = match &self.tree.node(target).payload {
            Payload::Map(map) => map
                .schema
                .clone()
                .map(TypeHint::Nested)
                .or_else(|| self.hint_for_child(parent, &key, false)),
            _ => self.hint_for_child(parent, &key, false),
        };
        let rebuilt = build_typed_subtree(&mut self.tree, &value, hint.as_ref(), &full_key)?;
        if self.tree.node(parent).is_map() {
            let old = self
                .tree
                .attach_map_entry(parent, key, rebuilt)
                .expect("was present");
            self.tree.free_subtree(old);
        } else {
            let len = self
                .tree
                .node(parent)
                .as_list()
                .expect("container parent")
                .items
                .len();
            let index = self
                .tree
                .list_index(len, key.as_int().expect("list key"))
                .expect("existing child");
            let old = self.tree.set_list_item(parent, index, rebuilt);
            self.tree.free_subtree(old);
        }
        Ok(())
    }

    /// The declared element hint for a new child: the schema field's hint
    /// when the parent is schema-bound, else the container's element hint.
    fn hint_for_child(&self, parent: NodeId, key: &Key, force_add: bool) -> Option<TypeHint> {
        match &self.tree.node(parent).payload {
            Payload::Map(map) => {
                if let Some(schema) = &map.schema {
                    if let Some(field) = key.as_str().and_then(|name| schema.field(name)) {
                        return Some(field.hint().clone());
                    }
                    if !force_add {
                        return map.elem_hint.clone();
                    }
                    return None;
                }
                map.elem_hint.clone()
            }
            Payload::List(list) => list.elem_hint.clone(),
            Payload::Scalar(_) => None,
        }
    }

    /// Check every interpolation expression in a subtree for syntactic
    /// validity.
    fn validate_expressions(&self, id: NodeId) -> Result<()> {
        match &self.tree.node(id).payload {
            Payload::Scalar(scalar) => {
                if let ScalarValue::Interp(text) = &scalar.value {
                    grammar::parse_text(text)?;
                }
                Ok(())
            }
            _ => {
                for child in self.tree.children(id) {
                    self.validate_expressions(child)?;
                }
                Ok(())
            }
        }
    }
}

pub(crate) fn part_to_key(part: &PathPart) -> Key {
    match part {
        PathPart::Key(s) => Key::Str(s.clone()),
        PathPart::Index(i) => Key::Int(*i),
    }
}

/// Convert a dot-list right-hand side. Values containing interpolations are
/// stored as expression text after a syntax check.
fn dotlist_value(rhs: &str) -> Result<Value> {
    let element = grammar::parse_element(rhs)?;
    if grammar::contains_interp(rhs) {
        return Ok(Value::Str(rhs.to_string()));
    }
    element_to_value(&element, rhs)
}

fn element_to_value(element: &Element, raw: &str) -> Result<Value> {
    match element {
        Element::Null => Ok(Value::Null),
        Element::Bool(b) => Ok(Value::Bool(*b)),
        Element::Int(i) => Ok(Value::Int(*i)),
        Element::Float(f) => Ok(Value::Float(*f)),
        Element::Str(s) => Ok(Value::Str(s.clone())),
        Element::Quoted(ast) => {
            let mut out = String::new();
            for fragment in &ast.fragments {
                match fragment {
                    grammar::Fragment::Literal(text) => out.push_str(text),
                    grammar::Fragment::Interp(_) => {
                        return Err(ConfigError::validation(
                            "",
                            raw,
                            "literal value (interpolations are handled upstream)",
                        ));
                    }
                }
            }
            Ok(Value::Str(out))
        }
        Element::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(element_to_value(item, raw)?);
            }
            Ok(Value::List(out))
        }
        Element::Map(entries) => {
            let mut out = indexmap::IndexMap::with_capacity(entries.len());
            for (key_element, value_element) in entries {
                let key_value = element_to_value(key_element, raw)?;
                let key = key_value.to_key().ok_or_else(|| {
                    ConfigError::validation("", raw, "hashable map key")
                })?;
                out.insert(key, element_to_value(value_element, raw)?);
            }
            Ok(Value::Map(out))
        }
        Element::Interp(_) | Element::Concat(_) => Err(ConfigError::validation(
            "",
            raw,
            "literal value (interpolations are handled upstream)",
        )),
    }
}

// ----------------------------------------------------------------------
// Typed tree construction
// ----------------------------------------------------------------------

/// Build a detached subtree from a plain value under an optional type hint,
/// validating as it goes. The `???` string becomes MISSING; interpolation
/// strings are syntax-checked and stored raw.
pub(crate) fn build_typed_subtree(
    tree: &mut Tree,
    value: &Value,
    hint: Option<&TypeHint>,
    full_key: &str,
) -> Result<NodeId> {
    let Some(hint) = hint else {
        return build_untyped(tree, value, full_key);
    };

    // Optionality applies to the node; shape checks use the inner hint.
    let optional = hint.is_optional();
    let inner = hint.unwrap_optional();

    if let Some(kind) = inner.scalar_kind() {
        if value.is_container() {
            return Err(ConfigError::type_error(
                full_key,
                kind.to_string(),
                value.type_name(),
            ));
        }
        if matches!(value, Value::Str(s) if s == "???") {
            return Ok(tree.alloc(Node::scalar(ScalarNode::new(
                ScalarValue::Missing,
                kind,
                optional,
            ))));
        }
        let scalar = coerce(value, &kind, optional || kind.is_any(), full_key)?;
        return Ok(tree.alloc(Node::scalar(ScalarNode::new(scalar, kind, optional))));
    }

    match inner {
        TypeHint::List(elem) => {
            let items = match value {
                Value::List(items) => items,
                Value::Null if optional => {
                    return Ok(tree.alloc(Node::scalar(ScalarNode::new(
                        ScalarValue::Null,
                        crate::base::ValueKind::Any,
                        true,
                    ))));
                }
                Value::Str(s) if s == "???" => {
                    return Ok(tree.alloc(Node::scalar(ScalarNode::new(
                        ScalarValue::Missing,
                        crate::base::ValueKind::Any,
                        optional,
                    ))));
                }
                other => {
                    return Err(ConfigError::type_error(
                        full_key,
                        "list",
                        other.type_name(),
                    ));
                }
            };
            let node = tree.alloc(Node::list(ListNode {
                items: Vec::new(),
                elem_hint: Some((**elem).clone()),
            }));
            for (index, item) in items.iter().enumerate() {
                let child_key = format!("{full_key}[{index}]");
                let child = build_typed_subtree(tree, item, Some(elem.as_ref()), &child_key)?;
                tree.push_list_item(node, child);
            }
            Ok(node)
        }
        TypeHint::Map { key: key_kind, value: elem } => {
            let entries = match value {
                Value::Map(entries) => entries,
                Value::Null if optional => {
                    return Ok(tree.alloc(Node::scalar(ScalarNode::new(
                        ScalarValue::Null,
                        crate::base::ValueKind::Any,
                        true,
                    ))));
                }
                Value::Str(s) if s == "???" => {
                    return Ok(tree.alloc(Node::scalar(ScalarNode::new(
                        ScalarValue::Missing,
                        crate::base::ValueKind::Any,
                        optional,
                    ))));
                }
                other => {
                    return Err(ConfigError::type_error(full_key, "map", other.type_name()));
                }
            };
            let node = tree.alloc(Node::map(MapNode {
                entries: Default::default(),
                key_kind: Some(*key_kind),
                elem_hint: Some((**elem).clone()),
                schema: None,
            }));
            // Open containers under a schema are not struct-locked.
            tree.node_mut(node).flags.set(Flag::Struct, Some(false));
            for (key, child_value) in entries {
                let key = conform_key(key, *key_kind, full_key)?;
                let mut child_key = full_key.to_string();
                crate::base::push_part(
                    &mut child_key,
                    &PathPart::Key(key.to_string().into()),
                );
                let child = build_typed_subtree(tree, child_value, Some(elem.as_ref()), &child_key)?;
                tree.attach_map_entry(node, key, child);
            }
            Ok(node)
        }
        TypeHint::Nested(schema) => {
            let entries = match value {
                Value::Map(entries) => entries,
                Value::Null if optional => {
                    return Ok(tree.alloc(Node::scalar(ScalarNode::new(
                        ScalarValue::Null,
                        crate::base::ValueKind::Any,
                        true,
                    ))));
                }
                other => {
                    return Err(ConfigError::type_error(
                        full_key,
                        schema.name(),
                        other.type_name(),
                    ));
                }
            };
            let node = instantiate_schema(tree, schema)?;
            for (key, child_value) in entries {
                let name = key.to_string();
                let Some(field) = schema.field(&name) else {
                    let mut child_key = full_key.to_string();
                    crate::base::push_part(&mut child_key, &PathPart::Key(name.clone().into()));
                    return Err(ConfigError::attribute(
                        child_key,
                        format!("key '{name}' is not in struct {}", schema.name()),
                    ));
                };
                let mut child_key = full_key.to_string();
                crate::base::push_part(&mut child_key, &PathPart::Key(name.clone().into()));
                let child =
                    build_typed_subtree(tree, child_value, Some(field.hint()), &child_key)?;
                let old = tree.attach_map_entry(node, Key::Str(name.into()), child);
                if let Some(old) = old {
                    tree.free_subtree(old);
                }
            }
            Ok(node)
        }
        TypeHint::Any => build_untyped(tree, value, full_key),
        // Scalar-shaped hints were handled above.
        TypeHint::Kind(_) | TypeHint::Optional(_) | TypeHint::Union(_) => {
            unreachable!("scalar hints handled via scalar_kind")
        }
    }
}

fn build_untyped(tree: &mut Tree, value: &Value, full_key: &str) -> Result<NodeId> {
    // Syntax-check expressions before committing anything.
    validate_value_expressions(value, full_key)?;
    Ok(tree.build_plain(value))
}

fn validate_value_expressions(value: &Value, full_key: &str) -> Result<()> {
    match value {
        Value::Str(s) if grammar::contains_interp(s) => {
            grammar::parse_text(s)?;
            Ok(())
        }
        Value::List(items) => {
            for item in items {
                validate_value_expressions(item, full_key)?;
            }
            Ok(())
        }
        Value::Map(entries) => {
            for child in entries.values() {
                validate_value_expressions(child, full_key)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn conform_key(key: &Key, kind: crate::base::KeyKind, full_key: &str) -> Result<Key> {
    if key.kind() == kind {
        return Ok(key.clone());
    }
    // String keys conform to int/bool constraints when they parse.
    if let Key::Str(s) = key {
        match kind {
            crate::base::KeyKind::Int => {
                if let Some(i) = grammar::literals::parse_int_literal(s) {
                    return Ok(Key::Int(i));
                }
            }
            crate::base::KeyKind::Bool => {
                if let Some(b) = grammar::literals::parse_bool_literal(s) {
                    return Ok(Key::Bool(b));
                }
            }
            _ => {}
        }
    }
    Err(ConfigError::validation(
        full_key,
        key.to_string(),
        format!("{} key", kind.as_str()),
    ))
}

/// Instantiate a schema as a detached struct-locked map container.
pub(crate) fn instantiate_schema(tree: &mut Tree, schema: &Arc<Schema>) -> Result<NodeId> {
    let node = tree.alloc(Node::map(MapNode {
        entries: Default::default(),
        key_kind: Some(crate::base::KeyKind::Str),
        elem_hint: None,
        schema: Some(schema.clone()),
    }));
    tree.node_mut(node).flags.set(Flag::Struct, Some(true));

    for field in schema.fields() {
        let name = field.name().to_string();
        let child = match field.default().materialize() {
            Some(default) => {
                let child_key = name.clone();
                build_typed_subtree(tree, &default, Some(field.hint()), &child_key)?
            }
            None => match field.hint().unwrap_optional() {
                // Nested records without defaults instantiate recursively.
                TypeHint::Nested(nested) => instantiate_schema(tree, nested)?,
                hint => {
                    let kind = hint.scalar_kind().unwrap_or(crate::base::ValueKind::Any);
                    tree.alloc(Node::scalar(ScalarNode::new(
                        ScalarValue::Missing,
                        kind,
                        field.is_optional(),
                    )))
                }
            },
        };
        tree.attach_map_entry(node, Key::Str(name.into()), child);
    }
    Ok(node)
}

#[cfg(test)]
mod tests;
