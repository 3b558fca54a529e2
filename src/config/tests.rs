use std::sync::Arc;

use crate::base::{Value, ValueKind};
use crate::errors::ConfigError;
use crate::schema::{FieldDef, Schema, TypeHint};

use super::{Config, UpdateOpts};

fn server_schema() -> Arc<Schema> {
    Schema::builder("ServerConf")
        .field(FieldDef::new("port", TypeHint::Kind(ValueKind::Int)))
        .field(
            FieldDef::new("host", TypeHint::Kind(ValueKind::Str))
                .with_default(Value::from("localhost")),
        )
        .build()
}

#[test]
fn test_get_and_set_dotted_paths() {
    let mut cfg = Config::from_yaml("server:\n  port: 80\n").unwrap();
    assert_eq!(cfg.get("server.port").unwrap(), Value::Int(80));
    cfg.set("server.port", 8080i64).unwrap();
    assert_eq!(cfg.get_int("server.port").unwrap(), 8080);
}

#[test]
fn test_bracket_paths_on_lists() {
    let mut cfg = Config::from_yaml("xs: [a, b, c]\n").unwrap();
    assert_eq!(cfg.get("xs[1]").unwrap(), Value::Str("b".into()));
    assert_eq!(cfg.get("xs[-1]").unwrap(), Value::Str("c".into()));
    cfg.set("xs[1]", "B").unwrap();
    assert_eq!(cfg.get("xs[1]").unwrap(), Value::Str("B".into()));
    // Out-of-range indices are key errors, not silent growth.
    assert!(matches!(
        cfg.set("xs[9]", "x"),
        Err(ConfigError::Key { .. })
    ));
}

#[test]
fn test_get_missing_key_is_key_error() {
    let cfg = Config::from_yaml("a: 1\n").unwrap();
    assert!(matches!(cfg.get("nope"), Err(ConfigError::Key { .. })));
    assert_eq!(cfg.get_or("nope", 7i64).unwrap(), Value::Int(7));
    assert_eq!(cfg.select("nope").unwrap(), None);
}

#[test]
fn test_set_creates_intermediate_maps() {
    let mut cfg = Config::new();
    cfg.set("a.b.c", 1i64).unwrap();
    assert_eq!(cfg.get("a.b.c").unwrap(), Value::Int(1));
}

#[test]
fn test_struct_mode_denies_new_keys() {
    let mut cfg = Config::from_yaml("a: 1\n").unwrap();
    cfg.set_struct("", Some(true)).unwrap();
    let err = cfg.set("b", 2i64).unwrap_err();
    assert!(matches!(err, ConfigError::Attribute { .. }));
    // Existing keys remain assignable.
    cfg.set("a", 10i64).unwrap();
    // force_add defeats struct mode along the path.
    cfg.update(
        "b.c",
        1i64,
        &UpdateOpts {
            merge: true,
            force_add: true,
        },
    )
    .unwrap();
    assert_eq!(cfg.get("b.c").unwrap(), Value::Int(1));
}

#[test]
fn test_struct_mode_on_empty_container() {
    let mut cfg = Config::new();
    cfg.set_struct("", Some(true)).unwrap();
    assert!(cfg.set("anything", 1i64).is_err());
    cfg.update(
        "anything",
        1i64,
        &UpdateOpts {
            merge: true,
            force_add: true,
        },
    )
    .unwrap();
    assert_eq!(cfg.get("anything").unwrap(), Value::Int(1));
}

#[test]
fn test_readonly_rejects_mutation_recursively() {
    let mut cfg = Config::from_yaml("a:\n  b: 1\n").unwrap();
    cfg.set_readonly("", Some(true)).unwrap();
    assert!(matches!(
        cfg.set("a.b", 2i64),
        Err(ConfigError::Readonly { .. })
    ));
    assert!(cfg.remove("a").is_err());
    assert!(cfg.is_readonly("a.b").unwrap());
}

#[test]
fn test_update_merges_containers() {
    let mut cfg = Config::from_yaml("server:\n  port: 80\n  host: localhost\n").unwrap();
    let patch: Value = [("port", Value::Int(8080))].into_iter().collect();
    cfg.update("server", patch, &UpdateOpts::default()).unwrap();
    assert_eq!(cfg.get("server.port").unwrap(), Value::Int(8080));
    assert_eq!(cfg.get("server.host").unwrap(), Value::Str("localhost".into()));

    // Without merge the container is replaced wholesale.
    let patch: Value = [("port", Value::Int(9090))].into_iter().collect();
    cfg.update(
        "server",
        patch,
        &UpdateOpts {
            merge: false,
            force_add: false,
        },
    )
    .unwrap();
    assert_eq!(cfg.get("server.port").unwrap(), Value::Int(9090));
    assert!(cfg.select("server.host").unwrap().is_none());
}

#[test]
fn test_pop_and_remove() {
    let mut cfg = Config::from_yaml("a: 1\nxs: [x, y]\n").unwrap();
    assert_eq!(cfg.pop("a", 0i64).unwrap(), Value::Int(1));
    assert_eq!(cfg.pop("a", 0i64).unwrap(), Value::Int(0));
    assert!(cfg.remove("a").is_err());
    assert_eq!(cfg.remove("xs[0]").unwrap(), Value::Str("x".into()));
    assert_eq!(cfg.get("xs[0]").unwrap(), Value::Str("y".into()));
}

#[test]
fn test_pop_does_not_swallow_validation_errors() {
    let mut cfg = Config::from_yaml("a:\n  b: '???'\n").unwrap();
    cfg.set_struct("a", Some(true)).unwrap();
    // Structural absence converts to the default...
    assert_eq!(cfg.pop("zzz", 1i64).unwrap(), Value::Int(1));
    // ...but struct violations still propagate.
    assert!(matches!(
        cfg.pop("a.b", 1i64),
        Err(ConfigError::Attribute { .. })
    ));
}

#[test]
fn test_schema_binding_end_to_end() {
    let schema = server_schema();
    let mut cfg = Config::from_schema_with(&schema, &[("port", 443i64)]).unwrap();
    assert_eq!(cfg.get_int("port").unwrap(), 443);
    assert_eq!(cfg.get_str("host").unwrap(), "localhost");

    // Strings coerce into the declared int field.
    cfg.set("port", "1080").unwrap();
    assert_eq!(cfg.get_int("port").unwrap(), 1080);

    // Bad values fail validation with the field path.
    let err = cfg.set("port", "oops").unwrap_err();
    match err {
        ConfigError::Validation { full_key, .. } => assert_eq!(full_key, "port"),
        other => panic!("expected validation error, got {other:?}"),
    }

    // Unknown fields are struct violations.
    let err = cfg.set("extra", 1i64).unwrap_err();
    assert!(matches!(err, ConfigError::Attribute { .. }));
}

#[test]
fn test_schema_missing_field_detected() {
    let schema = server_schema();
    let cfg = Config::from_schema(&schema).unwrap();
    assert!(cfg.is_missing("port").unwrap());
    assert!(matches!(
        cfg.get("port"),
        Err(ConfigError::MissingMandatory { .. })
    ));
    assert!(cfg.missing_keys().contains("port"));
}

#[test]
fn test_schema_optional_field_accepts_null() {
    let schema = Schema::builder("Opt")
        .field(
            FieldDef::new("timeout", TypeHint::Kind(ValueKind::Int))
                .optional()
                .with_default(Value::Null),
        )
        .build();
    let mut cfg = Config::from_schema(&schema).unwrap();
    assert_eq!(cfg.get("timeout").unwrap(), Value::Null);
    cfg.set("timeout", 5i64).unwrap();
    cfg.set("timeout", Value::Null).unwrap();
    assert_eq!(cfg.get("timeout").unwrap(), Value::Null);
}

#[test]
fn test_schema_union_field() {
    let schema = Schema::builder("U")
        .field(
            FieldDef::new(
                "id",
                TypeHint::Union(vec![ValueKind::Int, ValueKind::Str]),
            )
            .with_default(Value::from(1i64)),
        )
        .build();
    let mut cfg = Config::from_schema(&schema).unwrap();
    cfg.set("id", "abc").unwrap();
    cfg.set("id", 42i64).unwrap();
    // No cross-arm coercion: a float does not sneak into the int arm.
    assert!(cfg.set("id", 1.5).is_err());
}

#[test]
fn test_schema_open_subcontainer_not_struct_locked() {
    let schema = Schema::builder("WithDict")
        .field(
            FieldDef::new(
                "labels",
                TypeHint::Map {
                    key: crate::base::KeyKind::Str,
                    value: Box::new(TypeHint::Kind(ValueKind::Int)),
                },
            )
            .with_default_factory(|| Value::Map(Default::default())),
        )
        .build();
    let mut cfg = Config::from_schema(&schema).unwrap();
    // The record itself is closed...
    assert!(cfg.set("extra", 1i64).is_err());
    // ...but the open dict accepts new keys, with element validation.
    cfg.set("labels.a", 1i64).unwrap();
    assert_eq!(cfg.get_int("labels.a").unwrap(), 1);
    assert!(cfg.set("labels.b", "oops").is_err());
}

#[test]
fn test_nested_schema_instantiation() {
    let inner = server_schema();
    let outer = Schema::builder("App")
        .field(FieldDef::new("server", TypeHint::Nested(inner)))
        .field(FieldDef::new("name", TypeHint::Kind(ValueKind::Str)).with_default("app"))
        .build();
    let mut cfg = Config::from_schema(&outer).unwrap();
    assert_eq!(cfg.get_str("server.host").unwrap(), "localhost");
    assert!(cfg.is_missing("server.port").unwrap());
    cfg.set("server.port", 80i64).unwrap();
    assert_eq!(cfg.get_int("server.port").unwrap(), 80);
    // Nested records are struct-locked too.
    assert!(cfg.set("server.extra", 1i64).is_err());
}

#[test]
fn test_from_dotlist() {
    let cfg = Config::from_dotlist(&[
        "server.port=80",
        "server.hosts=[a, b]",
        "debug=true",
        "empty=",
        "nothing",
    ])
    .unwrap();
    assert_eq!(cfg.get_int("server.port").unwrap(), 80);
    assert_eq!(cfg.get("server.hosts").unwrap(), Value::from(vec!["a", "b"]));
    assert_eq!(cfg.get_bool("debug").unwrap(), true);
    assert_eq!(cfg.get("empty").unwrap(), Value::Str(String::new()));
    assert_eq!(cfg.get("nothing").unwrap(), Value::Null);
}

#[test]
fn test_dotlist_interpolation_rhs() {
    let cfg = Config::from_dotlist(&["a=1", "b=${a}"]).unwrap();
    assert!(cfg.is_interpolation("b").unwrap());
    assert_eq!(cfg.get("b").unwrap(), Value::Int(1));
}

#[test]
fn test_from_value_rejects_scalars_and_bad_expressions() {
    assert!(Config::from_value(Value::Int(1)).is_err());
    let bad: Value = [("a", Value::from("${unclosed"))].into_iter().collect();
    assert!(Config::from_value(bad).is_err());
}

#[test]
fn test_exists_and_inspection() {
    let cfg = Config::from_yaml("a: '???'\nb: ${a}\nc: 1\n").unwrap();
    assert!(cfg.exists("a"));
    assert!(!cfg.exists("zzz"));
    assert!(cfg.is_missing("a").unwrap());
    assert!(cfg.is_interpolation("b").unwrap());
    assert!(!cfg.is_interpolation("c").unwrap());
}

#[test]
fn test_select_raw_returns_expression_text() {
    let cfg = Config::from_yaml("a: 1\nb: ${a}\n").unwrap();
    assert_eq!(
        cfg.select_raw("b").unwrap(),
        Some(Value::Str("${a}".into()))
    );
    assert_eq!(cfg.select("b").unwrap(), Some(Value::Int(1)));
}

#[test]
fn test_enum_field_lookup_forms() {
    use crate::base::EnumClass;

    let color = EnumClass::new("Color", ["RED", "GREEN", "BLUE"]);
    let schema = Schema::builder("Theme")
        .field(
            FieldDef::new("accent", TypeHint::Kind(ValueKind::Enum(color.clone())))
                .with_default("RED"),
        )
        .build();
    let mut cfg = Config::from_schema(&schema).unwrap();
    assert_eq!(cfg.get_enum("accent").unwrap().name(), "RED");

    cfg.set("accent", "Color.BLUE").unwrap();
    assert_eq!(cfg.get_enum("accent").unwrap().ordinal(), 2);
    cfg.set("accent", 1i64).unwrap();
    assert_eq!(cfg.get_enum("accent").unwrap().name(), "GREEN");
    assert!(cfg.set("accent", "PURPLE").is_err());
}

#[test]
fn test_typed_getter_mismatch() {
    let cfg = Config::from_yaml("a: hello\n").unwrap();
    assert!(matches!(cfg.get_int("a"), Err(ConfigError::Type { .. })));
    assert_eq!(cfg.get_str("a").unwrap(), "hello");
}
