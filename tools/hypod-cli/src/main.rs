// hypod-cli: build a hyperparameter record from YAML files and dotted tokens
//
//   hypod-cli data=ffhq_lg net.n=4 net.layer.scale=0.5
//   hypod-cli --root Network --yaml_pre=base.yaml width=128

use std::process::ExitCode;

use clap::Parser;
use hypod::schema::{Declaration, DECLARATIONS};
use hypod::{init_logging, DeclaredType, Draft, Hypod, LaunchArgs, Launcher, RawValue, Record, TypeDecl, Value};
use linkme::distributed_slice;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hypod-cli", version, about = "Construct a hyperparameter record from dotted assignments")]
struct Cli {
    /// Registered type to construct
    #[arg(long, default_value = "Model")]
    root: String,

    /// List the registered types and the tags below each, then exit
    #[arg(long)]
    list: bool,

    #[command(flatten)]
    launch: LaunchArgs,
}

#[distributed_slice(DECLARATIONS)]
static DATA: Declaration = Declaration {
    name: "Data",
    declare: declare_data,
};

#[distributed_slice(DECLARATIONS)]
static FFHQ: Declaration = Declaration {
    name: "FFHQ",
    declare: declare_ffhq,
};

#[distributed_slice(DECLARATIONS)]
static FFHQ_LARGE: Declaration = Declaration {
    name: "FFHQLarge",
    declare: declare_ffhq_large,
};

#[distributed_slice(DECLARATIONS)]
static LAYER: Declaration = Declaration {
    name: "Layer",
    declare: declare_layer,
};

#[distributed_slice(DECLARATIONS)]
static NETWORK: Declaration = Declaration {
    name: "Network",
    declare: declare_network,
};

#[distributed_slice(DECLARATIONS)]
static MODEL: Declaration = Declaration {
    name: "Model",
    declare: declare_model,
};

fn declare_data() -> TypeDecl {
    TypeDecl::new("Data")
        .field("path", DeclaredType::Str)
        .field_default("batch", DeclaredType::Int, 4)
}

fn declare_ffhq() -> TypeDecl {
    TypeDecl::new("FFHQ")
        .extends("Data")
        .tag("ffhq")
        .field_default("path", DeclaredType::Str, "/data/ffhq")
        .field_default("resolution", DeclaredType::Int, 256)
        .field_default(
            "meta",
            DeclaredType::map(DeclaredType::Str, DeclaredType::Str),
            RawValue::empty_map(),
        )
}

fn declare_ffhq_large() -> TypeDecl {
    TypeDecl::new("FFHQLarge")
        .extends("FFHQ")
        .tag("ffhq_lg")
        .field_default("batch", DeclaredType::Int, 16)
        .field_default("resolution", DeclaredType::Int, 1024)
}

fn declare_layer() -> TypeDecl {
    TypeDecl::new("Layer")
        .field_default("in", DeclaredType::optional(DeclaredType::Int), RawValue::Null)
        .field_default("out", DeclaredType::Int, 32)
        .field_default("scale", DeclaredType::Float, 0.9)
}

fn declare_network() -> TypeDecl {
    TypeDecl::new("Network")
        .field_default("n", DeclaredType::Int, 2)
        .field_default("width", DeclaredType::Int, 64)
        .field_default("layer", DeclaredType::structured("Layer"), RawValue::empty_map())
        .field_default(
            "dropout",
            DeclaredType::optional(DeclaredType::Float),
            RawValue::Null,
        )
        .hook(network_post_init)
}

fn declare_model() -> TypeDecl {
    TypeDecl::new("Model")
        .field_default("data", DeclaredType::structured("Data"), "ffhq")
        .field_default("net", DeclaredType::structured("Network"), RawValue::empty_map())
        .field_default("lr", DeclaredType::Float, 1e-3)
        .field_default(
            "milestones",
            DeclaredType::seq(DeclaredType::Int),
            RawValue::seq([RawValue::Int(30), RawValue::Int(60)]),
        )
}

/// Feeds the network width into a layer whose input size was left unset.
fn network_post_init(draft: &mut Draft<'_>) -> Result<(), String> {
    let width = draft.int("width")?;
    if width <= 0 {
        return Err(format!("width must be positive, got {}", width));
    }
    let unset = draft.record("layer")?.get("in").map_or(true, Value::is_null);
    if unset {
        draft.replace_record("layer", [("in", RawValue::Int(width))])?;
    }
    Ok(())
}

/// Plain view of the data section, read back through the typed bridge.
struct DataSummary {
    kind: String,
    path: String,
    batch: i64,
}

impl Hypod for DataSummary {
    const TYPE_NAME: &'static str = "Data";

    fn from_record(record: &Record) -> hypod::Result<Self> {
        Ok(Self {
            kind: record.type_name().to_string(),
            path: record.str("path")?.to_string(),
            batch: record.int("batch")?,
        })
    }
}

fn run(cli: &Cli) -> hypod::Result<()> {
    let registry = hypod::global()?;

    if cli.list {
        for name in registry.type_names() {
            let tags = registry.tags_under(&name);
            if tags.is_empty() {
                println!("{}", name);
            } else {
                println!("{} [{}]", name, tags.join(", "));
            }
        }
        return Ok(());
    }

    let record = Launcher::new(registry, cli.root.as_str()).launch(&cli.launch)?;
    if let Some(Value::Record(data)) = record.get("data") {
        let data = DataSummary::from_record(data)?;
        info!(kind = %data.kind, path = %data.path, batch = data.batch, "data section");
    }
    println!("{:#}", record);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.launch.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(1)
        }
    }
}
