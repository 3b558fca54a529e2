//! Projection and typed materialization.

use serde::Deserialize;
use strata::{Config, StructuredConfigMode, ToContainerOpts, Value};

#[derive(Debug, Deserialize, PartialEq)]
struct ServerConf {
    port: u16,
    host: String,
}

#[test]
fn test_to_typed_materializes_record() {
    let cfg = Config::from_yaml("port: 8080\nhost: ${oc.select:fallback,web}\n").unwrap();
    let server: ServerConf = cfg.to_typed().unwrap();
    assert_eq!(
        server,
        ServerConf {
            port: 8080,
            host: "web".into()
        }
    );
}

#[test]
fn test_to_typed_raises_on_missing() {
    let cfg = Config::from_yaml("port: '???'\nhost: web\n").unwrap();
    assert!(cfg.to_typed::<ServerConf>().is_err());
}

#[test]
fn test_instantiate_mode_forces_resolution_under_schema() {
    use std::sync::Arc;
    use strata::{FieldDef, Schema, TypeHint, ValueKind};

    let schema: Arc<Schema> = Schema::builder("Inner")
        .field(FieldDef::new("x", TypeHint::Kind(ValueKind::Int)).with_default("${.y}"))
        .field(FieldDef::new("y", TypeHint::Kind(ValueKind::Int)).with_default(3i64))
        .build();
    let mut cfg = Config::from_schema(&schema).unwrap();
    cfg.set("y", 4i64).unwrap();

    // Outer resolve=false, but Instantiate still resolves the schema
    // subtree.
    let opts = ToContainerOpts {
        resolve: false,
        throw_on_missing: false,
        sc_mode: StructuredConfigMode::Instantiate,
    };
    let plain = cfg.to_container(&opts).unwrap();
    assert_eq!(plain.as_map().unwrap()[&strata::Key::from("x")], Value::Int(4));

    // Plain mode leaves the expression verbatim.
    let plain = cfg.to_container(&ToContainerOpts::default()).unwrap();
    assert_eq!(
        plain.as_map().unwrap()[&strata::Key::from("x")],
        Value::Str("${.y}".into())
    );
}

#[test]
fn test_resolved_projection() {
    let cfg = Config::from_yaml("a: 2\nb: ${a}\nc: [${a}, ${b}]\n").unwrap();
    let opts = ToContainerOpts {
        resolve: true,
        ..Default::default()
    };
    let plain = cfg.to_container(&opts).unwrap();
    let map = plain.as_map().unwrap();
    assert_eq!(map[&strata::Key::from("b")], Value::Int(2));
    assert_eq!(
        map[&strata::Key::from("c")],
        Value::from(vec![2i64, 2])
    );
}

#[test]
fn test_create_round_trip_identity() {
    let yaml = "a: 1\nb:\n  c: ${a}\n  d: '???'\nxs: [1, two, 3.5]\n";
    let cfg = Config::from_yaml(yaml).unwrap();
    let plain = cfg.to_container(&ToContainerOpts::default()).unwrap();
    let again = Config::from_value(plain).unwrap();
    assert_eq!(cfg, again);
    // And through YAML text as well.
    let from_text = Config::from_yaml(&cfg.to_yaml().unwrap()).unwrap();
    assert_eq!(cfg, from_text);
}
