// Integration tests for hypod construction
//
// Exercises the public API end to end: registry, tag dispatch, unions,
// defaults, hooks, the CLI token parser and the layered launcher.

use std::io::Write;
use std::sync::Arc;

use hypod::schema::{Declaration, DECLARATIONS};
use hypod::{
    parse_tokens, DeclaredType, Draft, Error, Hypod, LaunchArgs, Launcher, RawValue, Record, SchemaRegistry,
    TypeDecl, Value,
};
use linkme::distributed_slice;

fn structured(name: &str) -> DeclaredType {
    DeclaredType::structured(name)
}

/// Declarations are listed out of dependency order on purpose.
fn registry() -> SchemaRegistry {
    SchemaRegistry::from_declarations(vec![
        TypeDecl::new("Config").field("model", structured("Model")),
        TypeDecl::new("Model")
            .field("data", structured("Data"))
            .field("net", structured("Network")),
        TypeDecl::new("Network")
            .field("n", DeclaredType::Int)
            .field("layer", structured("Layer")),
        TypeDecl::new("Layer")
            .field("in", DeclaredType::Int)
            .field("out", DeclaredType::Int)
            .field_default("scale", DeclaredType::Float, 0.9),
        TypeDecl::new("FFHQLarge")
            .extends("FFHQ")
            .tag("ffhq_lg")
            .field_default("batch", DeclaredType::Int, 16),
        TypeDecl::new("FFHQ").extends("Data").tag("ffhq"),
        TypeDecl::new("Data")
            .field_default("path", DeclaredType::Str, "/data")
            .field_default("batch", DeclaredType::Int, 4),
    ])
    .unwrap()
}

fn record(value: Value) -> Arc<Record> {
    match value {
        Value::Record(record) => record,
        other => panic!("expected a record, got {other}"),
    }
}

#[test]
fn test_nested_mapping_is_coerced_field_by_field() {
    let registry = registry();
    let raw = RawValue::map([
        ("n", RawValue::from("3")),
        (
            "layer",
            RawValue::map([("in", RawValue::from("64")), ("out", RawValue::from("32"))]),
        ),
    ]);
    let net = registry.construct_record(raw, "Network").unwrap();
    assert_eq!(net.to_string(), "Network(n=3, layer=Layer(in=64, out=32, scale=0.9))");
    assert_eq!(net.record("layer").unwrap().float("scale").unwrap(), 0.9);
}

#[test]
fn test_tag_string_selects_subtype_with_defaults() {
    let registry = registry();
    let data = registry.construct_record("ffhq", "Data").unwrap();
    assert_eq!(data.type_name(), "FFHQ");
    assert_eq!(data.int("batch").unwrap(), 4);

    let large = registry.construct_record("ffhq_lg", "Data").unwrap();
    assert_eq!(large.type_name(), "FFHQLarge");
    assert_eq!(large.int("batch").unwrap(), 16);
}

#[test]
fn test_tag_key_in_mapping_with_overrides() {
    let registry = registry();
    let raw = RawValue::map([("_tag", RawValue::from("ffhq")), ("batch", RawValue::from("8"))]);
    let data = registry.construct_record(raw, "Data").unwrap();
    assert_eq!(data.type_name(), "FFHQ");
    assert_eq!(data.int("batch").unwrap(), 8);
    assert!(data.get("_tag").is_none());
}

#[test]
fn test_tag_of_ancestor_is_not_assignable() {
    let registry = registry();
    let err = registry.construct_record("ffhq", "FFHQLarge").unwrap_err();
    assert!(matches!(err, Error::UnknownTag { .. }), "{err}");
}

#[test]
fn test_all_defaults_mapping_equals_declared_type() {
    let registry = registry();
    let from_map = registry.construct_record(RawValue::empty_map(), "Data").unwrap();
    let direct = registry.construct_record(RawValue::map([("path", RawValue::from("/data"))]), "Data").unwrap();
    assert_eq!(from_map, direct);

    let tagged_map = registry
        .construct_record(RawValue::map([("_tag", RawValue::from("ffhq"))]), "Data")
        .unwrap();
    let tag_string = registry.construct_record("ffhq", "Data").unwrap();
    assert_eq!(tagged_map, tag_string);
}

#[test]
fn test_cli_tokens_match_hand_built_mapping() {
    let registry = registry();
    let tokens = [
        "model.data=ffhq",
        "model.net.n=3",
        "model.net.layer.in=8",
        "model.net.layer.out=4",
    ];
    let from_tokens = registry.construct_record(parse_tokens(tokens).unwrap(), "Config").unwrap();

    let by_hand = RawValue::map([(
        "model",
        RawValue::map([
            ("data", RawValue::from("ffhq")),
            (
                "net",
                RawValue::map([
                    ("n", RawValue::Int(3)),
                    ("layer", RawValue::map([("in", RawValue::Int(8)), ("out", RawValue::Int(4))])),
                ]),
            ),
        ]),
    )]);
    let from_map = registry.construct_record(by_hand, "Config").unwrap();
    assert_eq!(from_tokens, from_map);
    assert_eq!(from_tokens.record("model").unwrap().record("data").unwrap().type_name(), "FFHQ");
}

#[test]
fn test_conflicting_cli_paths() {
    let err = parse_tokens(["a=1", "a.b=2"]).unwrap_err();
    assert!(matches!(err, Error::ConflictingPath { .. }));
}

#[test]
fn test_existing_instance_is_reused() {
    let registry = registry();
    let data = registry.construct_record("ffhq_lg", "Data").unwrap();
    let raw = RawValue::map([
        ("data", RawValue::Instance(data.clone())),
        (
            "net",
            RawValue::map([
                ("n", RawValue::Int(1)),
                ("layer", RawValue::map([("in", RawValue::Int(1)), ("out", RawValue::Int(1))])),
            ]),
        ),
    ]);
    let model = registry.construct_record(raw, "Model").unwrap();
    assert!(Arc::ptr_eq(model.record("data").unwrap(), &data));
}

#[test]
fn test_instance_of_wrong_family_is_a_shape_error() {
    let registry = registry();
    let layer = registry
        .construct_record(RawValue::map([("in", RawValue::Int(1)), ("out", RawValue::Int(2))]), "Layer")
        .unwrap();
    let err = registry.construct_record(RawValue::Instance(layer), "Data").unwrap_err();
    assert!(matches!(err, Error::Shape { .. }));
}

#[test]
fn test_unknown_field_rejected_with_suggestion() {
    let registry = registry();
    let err = registry
        .construct_record(RawValue::map([("bach", RawValue::Int(2))]), "Data")
        .unwrap_err();
    match err {
        Error::UnknownField {
            field,
            owner,
            suggestion,
            ..
        } => {
            assert_eq!(field, "bach");
            assert_eq!(owner, "Data");
            assert_eq!(suggestion.as_deref(), Some("batch"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_error_path_points_at_nested_field() {
    let registry = registry();
    let raw = parse_tokens(["net.n=2", "net.layer.in=4", "net.layer.out=lots", "data=ffhq"]).unwrap();
    let err = registry.construct_record(raw, "Model").unwrap_err();
    assert!(matches!(err, Error::Coercion { .. }), "{err}");
    assert_eq!(err.path().unwrap().to_string(), "net.layer.out");
}

#[test]
fn test_missing_required_field() {
    let registry = registry();
    let err = registry
        .construct_record(RawValue::map([("n", RawValue::Int(2))]), "Network")
        .unwrap_err();
    match err {
        Error::MissingField { field, owner, .. } => {
            assert_eq!(field, "layer");
            assert_eq!(owner, "Network");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_sequence_element_paths_use_indices() {
    let registry = SchemaRegistry::from_declarations(vec![
        TypeDecl::new("Stack").field("layers", DeclaredType::seq(structured("Layer"))),
        TypeDecl::new("Layer").field("in", DeclaredType::Int).field("out", DeclaredType::Int),
    ])
    .unwrap();
    let raw = RawValue::map([(
        "layers",
        RawValue::seq([
            RawValue::map([("in", RawValue::Int(1)), ("out", RawValue::Int(2))]),
            RawValue::map([("in", RawValue::Int(2))]),
        ]),
    )]);
    let err = registry.construct_record(raw, "Stack").unwrap_err();
    assert!(matches!(err, Error::MissingField { .. }));
    assert_eq!(err.path().unwrap().to_string(), "layers.1.out");
}

#[test]
fn test_self_reference_inside_collection_is_allowed() {
    let registry = SchemaRegistry::from_declarations(vec![TypeDecl::new("Node")
        .field("name", DeclaredType::Str)
        .field_default("children", DeclaredType::seq(structured("Node")), RawValue::seq([]))])
    .unwrap();
    let raw = RawValue::map([
        ("name", RawValue::from("root")),
        (
            "children",
            RawValue::seq([RawValue::map([("name", RawValue::from("leaf"))])]),
        ),
    ]);
    let tree = registry.construct_record(raw, "Node").unwrap();
    let children = tree.get("children").unwrap().as_seq().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].as_record().unwrap().str("name").unwrap(), "leaf");
}

#[test]
fn test_direct_self_reference_is_a_schema_error() {
    let err = SchemaRegistry::from_declarations(vec![TypeDecl::new("Loop").field("next", structured("Loop"))])
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn test_collection_fields_accept_flow_strings() {
    let registry = SchemaRegistry::from_declarations(vec![TypeDecl::new("Sched")
        .field("milestones", DeclaredType::seq(DeclaredType::Int))
        .field_default(
            "weights",
            DeclaredType::map(DeclaredType::Str, DeclaredType::Float),
            RawValue::empty_map(),
        )])
    .unwrap();
    let raw = parse_tokens(["milestones=[10, 20, 30]", "weights={a: 1, b: 0.5}"]).unwrap();
    let sched = registry.construct_record(raw, "Sched").unwrap();
    assert_eq!(
        sched.get("milestones").unwrap(),
        &Value::Seq(vec![Value::Int(10), Value::Int(20), Value::Int(30)])
    );
    assert_eq!(sched.to_string(), "Sched(milestones=[10, 20, 30], weights={\"a\": 1.0, \"b\": 0.5})");
}

#[test]
fn test_union_scalar_disambiguation() {
    let registry = registry();
    let int_or_float = DeclaredType::union([DeclaredType::Int, DeclaredType::Float]);
    assert_eq!(registry.construct(&RawValue::Int(3), &int_or_float).unwrap(), Value::Int(3));
    assert_eq!(registry.construct(&RawValue::Float(3.5), &int_or_float).unwrap(), Value::Float(3.5));

    // A string coerces to both members and matches neither natively
    let err = registry.construct(&RawValue::from("3"), &int_or_float).unwrap_err();
    assert!(matches!(err, Error::AmbiguousUnion { .. }), "{err}");

    let err = registry.construct(&RawValue::from("x"), &int_or_float).unwrap_err();
    assert!(matches!(err, Error::NoMatch { .. }), "{err}");
}

#[test]
fn test_union_of_struct_and_primitive() {
    let registry = registry();
    let data_or_int = DeclaredType::union([structured("Data"), DeclaredType::Int]);

    let by_tag = registry.construct(&RawValue::from("ffhq"), &data_or_int).unwrap();
    assert_eq!(record(by_tag).type_name(), "FFHQ");

    assert_eq!(registry.construct(&RawValue::from("7"), &data_or_int).unwrap(), Value::Int(7));

    let by_map = registry
        .construct(&RawValue::map([("batch", RawValue::Int(2))]), &data_or_int)
        .unwrap();
    assert_eq!(record(by_map).type_name(), "Data");
}

#[test]
fn test_union_with_overlapping_structs_is_ambiguous() {
    let registry = registry();
    // Data and FFHQ both accept a mapping without required fields
    let overlapping = DeclaredType::union([structured("Data"), structured("Layer"), structured("FFHQ")]);
    let err = registry
        .construct(&RawValue::map([("batch", RawValue::Int(2))]), &overlapping)
        .unwrap_err();
    match err {
        Error::AmbiguousUnion { candidates, .. } => {
            assert!(candidates.contains(&"Data".to_string()));
            assert!(candidates.contains(&"FFHQ".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The tag resolves to one concrete type even though two members own it
    let tagged = registry.construct(&RawValue::from("ffhq_lg"), &overlapping).unwrap();
    assert_eq!(record(tagged).type_name(), "FFHQLarge");
}

#[test]
fn test_optional_field_accepts_null() {
    let registry = SchemaRegistry::from_declarations(vec![TypeDecl::new("Opt").field_default(
        "seed",
        DeclaredType::optional(DeclaredType::Int),
        RawValue::Null,
    )])
    .unwrap();
    let empty = registry.construct_record(RawValue::empty_map(), "Opt").unwrap();
    assert!(empty.get("seed").unwrap().is_null());

    let seeded = registry.construct_record(parse_tokens(["seed=42"]).unwrap(), "Opt").unwrap();
    assert_eq!(seeded.opt_int("seed").unwrap(), Some(42));

    let cleared = registry.construct_record(parse_tokens(["seed=none"]).unwrap(), "Opt").unwrap();
    assert_eq!(cleared.opt_int("seed").unwrap(), None);
}

fn defaults_registry() -> SchemaRegistry {
    SchemaRegistry::from_declarations(vec![
        TypeDecl::new("Layer")
            .field_default("in", DeclaredType::optional(DeclaredType::Int), RawValue::Null)
            .field_default("out", DeclaredType::Int, 32)
            .field_default("scale", DeclaredType::Float, 0.9),
        TypeDecl::new("Network")
            .field_default("n", DeclaredType::Int, 2)
            .field_default("width", DeclaredType::Int, 64)
            .field_default("layer", structured("Layer"), RawValue::map([("out", RawValue::Int(16))]))
            .hook(fill_layer_input),
        TypeDecl::new("Data").field_default("batch", DeclaredType::Int, 4),
        TypeDecl::new("FFHQ").extends("Data").tag("ffhq").field_default("res", DeclaredType::Int, 256),
        TypeDecl::new("Model")
            .field_default("data", structured("Data"), "ffhq")
            .field_default("net", structured("Network"), RawValue::empty_map()),
    ])
    .unwrap()
}

fn fill_layer_input(draft: &mut Draft<'_>) -> Result<(), String> {
    let width = draft.int("width")?;
    if width <= 0 {
        return Err(format!("width must be positive, got {width}"));
    }
    if draft.record("layer")?.get("in").map_or(true, Value::is_null) {
        draft.replace_record("layer", [("in", RawValue::Int(width))])?;
    }
    Ok(())
}

#[test]
fn test_partial_override_merges_into_structured_default() {
    let registry = defaults_registry();
    let model = registry
        .construct_record(parse_tokens(["data.batch=8", "net.n=5"]).unwrap(), "Model")
        .unwrap();

    let data = model.record("data").unwrap();
    assert_eq!(data.type_name(), "FFHQ");
    assert_eq!(data.int("batch").unwrap(), 8);
    assert_eq!(data.int("res").unwrap(), 256);

    let net = model.record("net").unwrap();
    assert_eq!(net.int("n").unwrap(), 5);
    assert_eq!(net.int("width").unwrap(), 64);
    assert_eq!(net.record("layer").unwrap().int("out").unwrap(), 16);
}

#[test]
fn test_tag_override_replaces_default_type() {
    let registry = defaults_registry();
    let model = registry
        .construct_record(parse_tokens(["data._tag=ffhq", "data.res=512"]).unwrap(), "Model")
        .unwrap();
    let data = model.record("data").unwrap();
    assert_eq!(data.int("res").unwrap(), 512);
    assert_eq!(data.int("batch").unwrap(), 4);
}

#[test]
fn test_hook_interpolates_from_other_fields() {
    let registry = defaults_registry();
    let net = registry
        .construct_record(RawValue::map([("width", RawValue::Int(128))]), "Network")
        .unwrap();
    let layer = net.record("layer").unwrap();
    assert_eq!(layer.opt_int("in").unwrap(), Some(128));
    assert_eq!(layer.int("out").unwrap(), 16);

    // An explicit value is left alone
    let net = registry
        .construct_record(parse_tokens(["layer.in=3"]).unwrap(), "Network")
        .unwrap();
    assert_eq!(net.record("layer").unwrap().opt_int("in").unwrap(), Some(3));
}

#[test]
fn test_hook_failure_is_a_post_construction_error() {
    let registry = defaults_registry();
    let err = registry
        .construct_record(parse_tokens(["net.width=0"]).unwrap(), "Model")
        .unwrap_err();
    match &err {
        Error::PostConstruction { owner, message, .. } => {
            assert_eq!(owner, "Network");
            assert!(message.contains("width must be positive"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.path().unwrap().to_string(), "net");
}

#[test]
fn test_replace_reruns_validation_and_hook() {
    let registry = defaults_registry();
    let net = registry.construct_record(RawValue::empty_map(), "Network").unwrap();
    let widened = net
        .replace(&registry, [("layer", RawValue::map([("in", RawValue::Null)])), ("width", RawValue::Int(96))])
        .unwrap();
    assert_eq!(widened.type_name(), "Network");
    assert_eq!(widened.record("layer").unwrap().opt_int("in").unwrap(), Some(96));
    // The original is untouched
    assert_eq!(net.int("width").unwrap(), 64);

    let err = net.replace(&registry, [("width", RawValue::Int(-1))]).unwrap_err();
    assert!(matches!(err, Error::PostConstruction { .. }));

    let err = net.replace(&registry, [("depth", RawValue::Int(3))]).unwrap_err();
    assert!(matches!(err, Error::UnknownField { .. }));
}

struct DataConfig {
    batch: i64,
    kind: String,
}

impl Hypod for DataConfig {
    const TYPE_NAME: &'static str = "Data";

    fn from_record(record: &Record) -> hypod::Result<Self> {
        Ok(Self {
            batch: record.int("batch")?,
            kind: record.type_name().to_string(),
        })
    }
}

#[test]
fn test_typed_bridge() {
    let registry = defaults_registry();
    let data: DataConfig = registry.construct_as("ffhq").unwrap();
    assert_eq!(data.kind, "FFHQ");
    assert_eq!(data.batch, 4);
}

#[test]
fn test_launcher_layers_yaml_below_tokens() {
    let registry = defaults_registry();
    let mut pre = tempfile::NamedTempFile::new().unwrap();
    writeln!(pre, "net:\n  n: 7\n  width: 32\ndata:\n  batch: 2").unwrap();

    let args = LaunchArgs::try_from_args([
        "prog".to_string(),
        format!("--yaml_pre={}", pre.path().display()),
        "net.n=9".to_string(),
    ])
    .unwrap();
    let model = Launcher::new(&registry, "Model").launch(&args).unwrap();

    let net = model.record("net").unwrap();
    assert_eq!(net.int("n").unwrap(), 9);
    assert_eq!(net.int("width").unwrap(), 32);
    assert_eq!(model.record("data").unwrap().int("batch").unwrap(), 2);
}

#[test]
fn test_launcher_rejects_malformed_tokens() {
    let registry = defaults_registry();
    let err = Launcher::new(&registry, "Model")
        .launch_from(["prog", "net.n"])
        .unwrap_err();
    assert!(matches!(err, Error::MalformedToken(_)));
}

#[test]
fn test_registry_is_shareable_across_threads() {
    let registry = Arc::new(defaults_registry());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let raw = RawValue::map([("n", RawValue::Int(i))]);
                registry.construct_record(raw, "Network").unwrap().int("n").unwrap()
            })
        })
        .collect();
    let mut results: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort();
    assert_eq!(results, vec![0, 1, 2, 3]);
}

fn declare_sampler() -> TypeDecl {
    TypeDecl::new("Sampler").field_default("steps", DeclaredType::Int, 50)
}

fn declare_ddim() -> TypeDecl {
    TypeDecl::new("DDIM")
        .extends("Sampler")
        .tag("ddim")
        .field_default("eta", DeclaredType::Float, 0.0)
}

#[distributed_slice(DECLARATIONS)]
static DDIM: Declaration = Declaration {
    name: "DDIM",
    declare: declare_ddim,
};

#[distributed_slice(DECLARATIONS)]
static SAMPLER: Declaration = Declaration {
    name: "Sampler",
    declare: declare_sampler,
};

#[test]
fn test_global_registry_from_load_time_declarations() {
    let registry = hypod::global().unwrap();
    assert!(std::ptr::eq(registry, hypod::global().unwrap()));
    assert!(hypod::schema::find_declaration("DDIM").is_some());

    let sampler = registry.construct_record("ddim", "Sampler").unwrap();
    assert_eq!(sampler.type_name(), "DDIM");
    assert_eq!(sampler.int("steps").unwrap(), 50);
    assert_eq!(registry.tags_under("Sampler"), vec!["ddim".to_string()]);
}

#[test]
fn test_overriding_one_field_reinterpolates_the_default() {
    let registry = defaults_registry();
    let model = registry
        .construct_record(parse_tokens(["net.width=128"]).unwrap(), "Model")
        .unwrap();
    let net = model.record("net").unwrap();
    assert_eq!(net.int("width").unwrap(), 128);
    let layer = net.record("layer").unwrap();
    assert_eq!(layer.opt_int("in").unwrap(), Some(128));
    assert_eq!(layer.int("out").unwrap(), 16);
}

#[test]
fn test_union_of_structs_with_disjoint_required_fields() {
    let registry = SchemaRegistry::from_declarations(vec![
        TypeDecl::new("Adam").field("lr", DeclaredType::Float),
        TypeDecl::new("Sgd").field("momentum", DeclaredType::Float),
    ])
    .unwrap();
    let optim = DeclaredType::union([structured("Adam"), structured("Sgd")]);

    let adam = registry
        .construct(&RawValue::map([("lr", RawValue::from("0.1"))]), &optim)
        .unwrap();
    assert_eq!(record(adam).to_string(), "Adam(lr=0.1)");

    let sgd = registry
        .construct(&RawValue::map([("momentum", RawValue::Float(0.9))]), &optim)
        .unwrap();
    assert_eq!(record(sgd).type_name(), "Sgd");

    let err = registry
        .construct(
            &RawValue::map([("lr", RawValue::Float(0.1)), ("momentum", RawValue::Float(0.9))]),
            &optim,
        )
        .unwrap_err();
    match err {
        Error::AmbiguousUnion { candidates, .. } => assert_eq!(candidates, vec!["Adam", "Sgd"]),
        other => panic!("unexpected error: {other}"),
    }

    let err = registry
        .construct(&RawValue::map([("beta", RawValue::Float(0.5))]), &optim)
        .unwrap_err();
    assert!(matches!(err, Error::NoMatch { .. }), "{err}");
}
