//! Structured schemas.
//!
//! A structured schema is a declared record type: an ordered list of named
//! fields, each with a type hint, optionality, and an optional default (or
//! default factory for values that must be built fresh per instantiation).
//!
//! Binding a schema to a map container (see `Config::from_schema`) produces
//! a struct-locked tree whose per-field nodes carry the declared kinds, and
//! whose schema reference drives validation on later mutation and merge.

mod field;
mod hint;

pub use field::{FieldDef, FieldDefault};
pub use hint::TypeHint;

use std::sync::Arc;

use smol_str::SmolStr;

/// A declared record type with ordered named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: SmolStr,
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Start building a schema with the given type name.
    pub fn builder(name: impl Into<SmolStr>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// Builder for [`Schema`].
pub struct SchemaBuilder {
    name: SmolStr,
    fields: Vec<FieldDef>,
}

impl SchemaBuilder {
    /// Add a field. Declaration order is the field order of the record.
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Arc<Schema> {
        Arc::new(Schema {
            name: self.name,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{Value, ValueKind};

    #[test]
    fn test_builder_preserves_field_order() {
        let schema = Schema::builder("ServerConf")
            .field(FieldDef::new("port", TypeHint::Kind(ValueKind::Int)))
            .field(
                FieldDef::new("host", TypeHint::Kind(ValueKind::Str))
                    .with_default(Value::from("localhost")),
            )
            .build();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["port", "host"]);
        assert!(schema.has_field("host"));
        assert!(!schema.has_field("hostname"));
    }
}
