//! Schema field definitions.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::base::Value;

use super::hint::TypeHint;

/// The default of a schema field.
#[derive(Clone)]
pub enum FieldDefault {
    /// No default; the field instantiates as MISSING (`???`).
    Missing,
    /// A plain default value, cloned into each instantiation.
    Value(Value),
    /// A factory invoked once per instantiation, for defaults that must not
    /// be shared between instances.
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl FieldDefault {
    /// Produce the default value for a fresh instantiation, if any.
    pub fn materialize(&self) -> Option<Value> {
        match self {
            Self::Missing => None,
            Self::Value(value) => Some(value.clone()),
            Self::Factory(factory) => Some(factory()),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "Missing"),
            Self::Value(value) => write!(f, "Value({value:?})"),
            Self::Factory(_) => write!(f, "Factory(..)"),
        }
    }
}

impl PartialEq for FieldDefault {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Missing, Self::Missing) => true,
            (Self::Value(a), Self::Value(b)) => a == b,
            // Factories compare by identity.
            (Self::Factory(a), Self::Factory(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A named field of a [`super::Schema`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    name: SmolStr,
    hint: TypeHint,
    default: FieldDefault,
}

impl FieldDef {
    pub fn new(name: impl Into<SmolStr>, hint: TypeHint) -> Self {
        Self {
            name: name.into(),
            hint,
            default: FieldDefault::Missing,
        }
    }

    /// Set a plain default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(default.into());
        self
    }

    /// Set a default factory for non-copyable defaults.
    pub fn with_default_factory(
        mut self,
        factory: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        self.default = FieldDefault::Factory(Arc::new(factory));
        self
    }

    /// Wrap the hint in `Optional`, permitting null.
    pub fn optional(mut self) -> Self {
        if !self.hint.is_optional() {
            self.hint = TypeHint::Optional(Box::new(self.hint));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hint(&self) -> &TypeHint {
        &self.hint
    }

    pub fn default(&self) -> &FieldDefault {
        &self.default
    }

    pub fn is_optional(&self) -> bool {
        self.hint.is_optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ValueKind;

    #[test]
    fn test_default_materialization() {
        let field = FieldDef::new("host", TypeHint::Kind(ValueKind::Str))
            .with_default(Value::from("localhost"));
        assert_eq!(field.default().materialize(), Some(Value::from("localhost")));

        let missing = FieldDef::new("port", TypeHint::Kind(ValueKind::Int));
        assert_eq!(missing.default().materialize(), None);
    }

    #[test]
    fn test_factory_runs_per_call() {
        let field = FieldDef::new("tags", TypeHint::List(Box::new(TypeHint::Kind(ValueKind::Str))))
            .with_default_factory(|| Value::List(vec![]));
        assert_eq!(field.default().materialize(), Some(Value::List(vec![])));
        assert_eq!(field.default().materialize(), Some(Value::List(vec![])));
    }

    #[test]
    fn test_optional_wraps_once() {
        let field = FieldDef::new("x", TypeHint::Kind(ValueKind::Int))
            .optional()
            .optional();
        assert!(field.is_optional());
        assert_eq!(field.hint().unwrap_optional(), &TypeHint::Kind(ValueKind::Int));
    }
}
