//! The interpolation evaluator.
//!
//! Walks parsed expression trees fragment by fragment, resolves node
//! references relative to the anchor node, invokes resolvers from a registry
//! snapshot, and adapts results to the anchor's declared type. A per
//! evaluation set of in-flight node ids rejects reference cycles.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::base::{Value, ValueKind};
use crate::errors::{ConfigError, InterpolationError, Result};
use crate::grammar::{self, Element, Fragment, InterpAst, NamePart, Segment, TextAst};
use crate::node::{NodeId, Payload, ScalarValue, Tree, coerce};
use crate::resolver::{self, Registry, ResolverCtx, ResolverFn};

/// One evaluation session over a tree.
///
/// The registry snapshot is taken at construction, so resolver mutations
/// made mid-resolve are not observable within the session.
pub(crate) struct Evaluator<'t> {
    tree: &'t Tree,
    registry: Arc<Registry>,
    active: FxHashSet<NodeId>,
}

impl<'t> Evaluator<'t> {
    pub fn new(tree: &'t Tree) -> Self {
        Self {
            tree,
            registry: resolver::snapshot(),
            active: FxHashSet::default(),
        }
    }

    /// Resolve a scalar node to its plain value. Missing raises, expression
    /// nodes are evaluated and coerced to the declared kind.
    pub fn scalar_value(&mut self, id: NodeId) -> Result<Value> {
        let tree = self.tree;
        let scalar = tree.node(id).as_scalar().expect("scalar node");
        match &scalar.value {
            ScalarValue::Missing => Err(ConfigError::missing(tree.full_key(id))),
            ScalarValue::Interp(text) => {
                let text = text.clone();
                let kind = scalar.kind.clone();
                let optional = scalar.optional;
                let value = self.resolve_expression(id, &text)?;
                self.adapt(value, &kind, optional, id)
            }
            concrete => Ok(concrete.to_plain().expect("concrete scalar")),
        }
    }

    /// Fully-resolved plain projection of any node. With
    /// `missing_is_error = false`, missing scalars project as the `???`
    /// string instead of raising.
    pub fn node_value(&mut self, id: NodeId, missing_is_error: bool) -> Result<Value> {
        let tree = self.tree;
        match &tree.node(id).payload {
            Payload::Scalar(scalar) => match &scalar.value {
                ScalarValue::Missing if missing_is_error => {
                    Err(ConfigError::missing(tree.full_key(id)))
                }
                ScalarValue::Missing => Ok(Value::Str("???".into())),
                _ => self.scalar_value(id),
            },
            Payload::Map(map) => {
                let entries: Vec<_> = map.entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, child) in entries {
                    out.insert(key, self.node_value(child, missing_is_error)?);
                }
                Ok(Value::Map(out))
            }
            Payload::List(list) => {
                let items = list.items.clone();
                let mut out = Vec::with_capacity(items.len());
                for child in items {
                    out.push(self.node_value(child, missing_is_error)?);
                }
                Ok(Value::List(out))
            }
        }
    }

    /// Parse and evaluate an expression held by node `id`, guarding against
    /// cycles.
    fn resolve_expression(&mut self, id: NodeId, text: &str) -> Result<Value> {
        if !self.active.insert(id) {
            let full_key = self.tree.full_key(id);
            return Err(InterpolationError::Cycle {
                chain: format!("'{text}' revisits '{full_key}'"),
                full_key,
            }
            .into());
        }
        let result = grammar::parse_text(text)
            .map_err(ConfigError::from)
            .and_then(|ast| self.eval_text(&ast, id));
        self.active.remove(&id);
        result
    }

    /// Evaluate a Text: a single top-level interpolation passes its result
    /// through unchanged; composite text concatenates stringifications.
    fn eval_text(&mut self, ast: &TextAst, anchor: NodeId) -> Result<Value> {
        if let Some(interp) = ast.as_single_interp() {
            return self.eval_interp(interp, anchor);
        }
        let mut out = String::new();
        for fragment in &ast.fragments {
            match fragment {
                Fragment::Literal(text) => out.push_str(text),
                Fragment::Interp(interp) => {
                    let value = self.eval_interp(interp, anchor)?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(Value::Str(out))
    }

    fn eval_interp(&mut self, interp: &InterpAst, anchor: NodeId) -> Result<Value> {
        match interp {
            InterpAst::NodeRef {
                rel_depth,
                segments,
            } => {
                let target = self.locate_ref(*rel_depth, segments, anchor)?;
                self.referent_value(target, anchor)
            }
            InterpAst::ResolverCall { name, args } => self.eval_resolver_call(name, args, anchor),
        }
    }

    /// The value of a directly-referenced node. A missing target is an
    /// interpolation-to-missing error.
    fn referent_value(&mut self, target: NodeId, anchor: NodeId) -> Result<Value> {
        let tree = self.tree;
        match &tree.node(target).payload {
            Payload::Scalar(scalar) => match &scalar.value {
                ScalarValue::Missing => Err(InterpolationError::to_missing(
                    tree.full_key(anchor),
                    tree.full_key(target),
                )
                .into()),
                _ => self.scalar_value(target),
            },
            Payload::Map(_) | Payload::List(_) => self.node_value(target, true),
        }
    }

    // ------------------------------------------------------------------
    // Node references
    // ------------------------------------------------------------------

    /// Walk a reference to its target node. Relative references climb
    /// `rel_depth` parents from the anchor before descending.
    fn locate_ref(
        &mut self,
        rel_depth: usize,
        segments: &[Segment],
        anchor: NodeId,
    ) -> Result<NodeId> {
        let tree = self.tree;
        let mut current = if rel_depth == 0 {
            tree.root()
        } else {
            let mut node = anchor;
            for _ in 0..rel_depth {
                node = tree.node(node).parent().ok_or_else(|| {
                    ConfigError::from(InterpolationError::key(
                        tree.full_key(anchor),
                        "relative interpolation climbs past the root",
                    ))
                })?;
            }
            node
        };
        for segment in segments {
            current = self.follow_references(current, anchor)?;
            let key = match segment {
                Segment::Literal(text) => Value::Str(text.to_string()),
                Segment::Dynamic(ast) => self.eval_text(ast, anchor)?,
            };
            current = self.lookup_child(current, &key, anchor)?;
        }
        Ok(current)
    }

    /// Follow chains of pure node-reference expressions so lookups can
    /// continue through interpolated intermediates.
    fn follow_references(&mut self, mut id: NodeId, anchor: NodeId) -> Result<NodeId> {
        let tree = self.tree;
        let mut entered: Vec<NodeId> = Vec::new();
        let result = loop {
            let Some(scalar) = tree.node(id).as_scalar() else {
                break Ok(id);
            };
            let ScalarValue::Interp(text) = &scalar.value else {
                break Ok(id);
            };
            let ast = match grammar::parse_text(text) {
                Ok(ast) => ast,
                Err(err) => break Err(ConfigError::from(err)),
            };
            let Some(InterpAst::NodeRef {
                rel_depth,
                segments,
            }) = ast.as_single_interp()
            else {
                break Err(InterpolationError::validation(
                    tree.full_key(anchor),
                    "cannot select into a non-reference interpolation",
                )
                .into());
            };
            if !self.active.insert(id) {
                let full_key = tree.full_key(id);
                break Err(InterpolationError::Cycle {
                    chain: format!("'{text}' revisits '{full_key}'"),
                    full_key,
                }
                .into());
            }
            entered.push(id);
            match self.locate_ref(*rel_depth, &segments.clone(), id) {
                Ok(next) => id = next,
                Err(err) => break Err(err),
            }
        };
        for entered_id in entered {
            self.active.remove(&entered_id);
        }
        result
    }

    /// Look up one child by an evaluated key.
    fn lookup_child(&mut self, container: NodeId, key: &Value, anchor: NodeId) -> Result<NodeId> {
        let tree = self.tree;
        match &tree.node(container).payload {
            Payload::List(list) => {
                let index = match key {
                    Value::Int(i) => Some(*i),
                    Value::Str(s) => grammar::literals::parse_int_literal(s),
                    _ => None,
                }
                .ok_or_else(|| {
                    ConfigError::from(InterpolationError::key(
                        tree.full_key(anchor),
                        format!("list index '{key}' is not an integer"),
                    ))
                })?;
                tree.list_index(list.items.len(), index)
                    .map(|i| list.items[i])
                    .ok_or_else(|| {
                        ConfigError::from(InterpolationError::key(
                            tree.full_key(anchor),
                            format!(
                                "index {index} out of range for '{}'",
                                tree.full_key(container)
                            ),
                        ))
                    })
            }
            Payload::Map(map) => {
                if let Some(direct) = key.to_key() {
                    if let Some(child) = map.entries.get(&direct) {
                        return Ok(*child);
                    }
                }
                if let Value::Str(s) = key {
                    if let Some(i) = grammar::literals::parse_int_literal(s) {
                        if let Some(child) = map.entries.get(&crate::base::Key::Int(i)) {
                            return Ok(*child);
                        }
                    }
                    if let Some(b) = grammar::literals::parse_bool_literal(s) {
                        if let Some(child) = map.entries.get(&crate::base::Key::Bool(b)) {
                            return Ok(*child);
                        }
                    }
                }
                Err(InterpolationError::key(
                    tree.full_key(anchor),
                    format!("key '{key}' not found in '{}'", tree.full_key(container)),
                )
                .into())
            }
            Payload::Scalar(_) => Err(InterpolationError::validation(
                tree.full_key(anchor),
                format!("cannot select key '{key}' from a scalar"),
            )
            .into()),
        }
    }

    // ------------------------------------------------------------------
    // Resolver calls
    // ------------------------------------------------------------------

    fn eval_resolver_call(
        &mut self,
        name_parts: &[NamePart],
        args: &[grammar::Arg],
        anchor: NodeId,
    ) -> Result<Value> {
        let tree = self.tree;
        let mut name = String::new();
        for (i, part) in name_parts.iter().enumerate() {
            if i > 0 {
                name.push('.');
            }
            match part {
                NamePart::Literal(text) => name.push_str(text),
                NamePart::Interp(interp) => {
                    let value = self.eval_interp(interp, anchor)?;
                    name.push_str(&value.to_string());
                }
            }
        }

        let entry = self.registry.get(&name).cloned().ok_or_else(|| {
            ConfigError::from(InterpolationError::resolver(
                tree.full_key(anchor),
                &name,
                "no resolver registered under this name",
            ))
        })?;

        // Arguments evaluate strictly left to right.
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_element(&arg.element, anchor)?);
        }

        let cache_key: String = args
            .iter()
            .map(|arg| arg.raw.as_str())
            .collect::<Vec<_>>()
            .join(",");
        if entry.use_cache {
            if let Some(hit) = resolver::cache_lookup(&name, &cache_key) {
                tracing::trace!(resolver = %name, args = %cache_key, "resolver cache hit");
                return Ok(hit);
            }
        }

        let result = match &entry.func {
            ResolverFn::Plain(func) => func(&values),
            ResolverFn::WithContext(func) => {
                let mut ctx = CtxAdapter { eval: self, anchor };
                func(&mut ctx, &values)
            }
        };
        let value = result.map_err(|err| match err {
            wrapped @ (ConfigError::Interpolation(_) | ConfigError::Grammar(_)) => wrapped,
            other => InterpolationError::resolver(tree.full_key(anchor), &name, other.to_string())
                .into(),
        })?;
        if entry.use_cache {
            resolver::cache_store(&name, &cache_key, value.clone());
        }
        Ok(value)
    }

    /// Evaluate a resolver-argument element.
    fn eval_element(&mut self, element: &Element, anchor: NodeId) -> Result<Value> {
        match element {
            Element::Null => Ok(Value::Null),
            Element::Bool(b) => Ok(Value::Bool(*b)),
            Element::Int(i) => Ok(Value::Int(*i)),
            Element::Float(f) => Ok(Value::Float(*f)),
            Element::Str(s) => Ok(Value::Str(s.clone())),
            Element::Quoted(ast) => self.eval_text(ast, anchor),
            Element::Interp(interp) => self.eval_interp(interp, anchor),
            Element::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_element(item, anchor)?);
                }
                Ok(Value::List(out))
            }
            Element::Map(entries) => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (key_element, value_element) in entries {
                    let key_value = self.eval_element(key_element, anchor)?;
                    let key = key_value.to_key().ok_or_else(|| {
                        ConfigError::from(InterpolationError::validation(
                            self.tree.full_key(anchor),
                            format!("'{key_value}' cannot be used as a map key"),
                        ))
                    })?;
                    out.insert(key, self.eval_element(value_element, anchor)?);
                }
                Ok(Value::Map(out))
            }
            Element::Concat(fragments) => {
                let mut out = String::new();
                for fragment in fragments {
                    match fragment {
                        Fragment::Literal(text) => out.push_str(text),
                        Fragment::Interp(interp) => {
                            out.push_str(&self.eval_interp(interp, anchor)?.to_string());
                        }
                    }
                }
                Ok(Value::Str(out))
            }
        }
    }

    // ------------------------------------------------------------------
    // Type adaptation
    // ------------------------------------------------------------------

    /// Coerce a resolved value to the anchor scalar's declared kind.
    /// Container results pass through only for untyped nodes; resolved
    /// strings are never re-interpreted as expressions.
    fn adapt(
        &self,
        value: Value,
        kind: &ValueKind,
        optional: bool,
        id: NodeId,
    ) -> Result<Value> {
        if kind.is_any() {
            return Ok(value);
        }
        let full_key = self.tree.full_key(id);
        if value.is_container() {
            return Err(ConfigError::UnsupportedInterpolationType {
                full_key,
                message: format!("container result for a '{kind}' node"),
            });
        }
        if let Value::Str(s) = &value {
            if grammar::contains_interp(s) {
                return if matches!(kind, ValueKind::Str) {
                    Ok(value)
                } else {
                    Err(InterpolationError::validation(
                        full_key,
                        format!("resolved string '{s}' is not a valid {kind}"),
                    )
                    .into())
                };
            }
        }
        let scalar = coerce(&value, kind, optional, &full_key).map_err(|err| {
            ConfigError::from(InterpolationError::validation(full_key, err.to_string()))
        })?;
        Ok(scalar.to_plain().expect("coerced scalar is concrete"))
    }
}

/// Bridges the evaluator to the [`ResolverCtx`] trait for context-aware
/// resolvers.
struct CtxAdapter<'a, 't> {
    eval: &'a mut Evaluator<'t>,
    anchor: NodeId,
}

impl ResolverCtx for CtxAdapter<'_, '_> {
    fn select(&mut self, path: &str) -> Result<Option<Value>> {
        let tree = self.eval.tree;
        let parts = crate::base::parse_path(path)?;
        let mut current = tree.root();
        for part in &parts {
            current = self.eval.follow_references(current, self.anchor)?;
            let key = match part {
                crate::base::PathPart::Key(k) => Value::Str(k.to_string()),
                crate::base::PathPart::Index(i) => Value::Int(*i),
            };
            match self.eval.lookup_child(current, &key, self.anchor) {
                Ok(child) => current = child,
                Err(ConfigError::Interpolation(InterpolationError::Key { .. })) => {
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        }
        if let Some(scalar) = tree.node(current).as_scalar() {
            if scalar.value.is_missing() {
                return Ok(None);
            }
        }
        self.eval.node_value(current, false).map(Some)
    }

    fn parent(&mut self) -> Result<Option<Value>> {
        match self.eval.tree.node(self.anchor).parent() {
            Some(parent) => Ok(Some(crate::convert::project_raw(self.eval.tree, parent))),
            None => Ok(None),
        }
    }

    fn root(&mut self) -> Result<Value> {
        Ok(crate::convert::project_raw(
            self.eval.tree,
            self.eval.tree.root(),
        ))
    }

    fn decode(&mut self, text: &str) -> Result<Value> {
        let element = grammar::parse_element(text)?;
        self.eval.eval_element(&element, self.anchor)
    }

    fn anchor_key(&self) -> String {
        self.eval.tree.full_key(self.anchor)
    }
}
