// Layered launcher for hypod
//
// Combines every raw source for a root type and constructs it. Layers, from
// lowest to highest priority:
//
// 1. declared defaults (applied by the engine)
// 2. program-supplied `yaml_pre` file
// 3. `--yaml_pre=PATH`
// 4. dotted tokens (`a.b=c`)
// 5. program-supplied `yaml_post` file
// 6. `--yaml_post=PATH`

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};

use crate::cli::parser::parse_tokens;
use crate::internal::error::{Error, Result};
use crate::schema::registry::SchemaRegistry;
use crate::value::record::Record;
use crate::value::source;
use crate::value::types::RawValue;

/// Launcher options and tokens.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(about = "Construct a hyperparameter record from dotted assignments")]
pub struct LaunchArgs {
    /// YAML file merged below the command-line tokens
    #[arg(long = "yaml_pre", value_name = "PATH")]
    pub yaml_pre: Option<PathBuf>,

    /// YAML file merged above the command-line tokens
    #[arg(long = "yaml_post", value_name = "PATH")]
    pub yaml_post: Option<PathBuf>,

    /// Log dispatch decisions
    #[arg(short, long)]
    pub verbose: bool,

    /// Dotted assignments such as `model.net.n=3`
    #[arg(value_name = "KEY=VALUE")]
    pub tokens: Vec<String>,
}

impl LaunchArgs {
    /// Parses launcher arguments (the first item is the program name).
    pub fn try_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(|e| Error::Usage(e.to_string()))
    }
}

/// Builds the root record of a program from layered sources.
#[derive(Debug, Clone)]
pub struct Launcher<'r> {
    registry: &'r SchemaRegistry,
    root: String,
    yaml_pre: Option<PathBuf>,
    yaml_post: Option<PathBuf>,
}

impl<'r> Launcher<'r> {
    pub fn new(registry: &'r SchemaRegistry, root: impl Into<String>) -> Self {
        Self {
            registry,
            root: root.into(),
            yaml_pre: None,
            yaml_post: None,
        }
    }

    /// Program-supplied YAML merged below `--yaml_pre` and the tokens.
    pub fn yaml_pre(mut self, path: impl Into<PathBuf>) -> Self {
        self.yaml_pre = Some(path.into());
        self
    }

    /// Program-supplied YAML merged above the tokens and below `--yaml_post`.
    pub fn yaml_post(mut self, path: impl Into<PathBuf>) -> Self {
        self.yaml_post = Some(path.into());
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Merges all layers into the root raw value.
    pub fn layered_raw(&self, args: &LaunchArgs) -> Result<RawValue> {
        let mut raw = RawValue::empty_map();

        for path in [&self.yaml_pre, &args.yaml_pre].into_iter().flatten() {
            merge_file(&mut raw, path)?;
        }
        raw.deep_merge(parse_tokens(&args.tokens)?);
        for path in [&self.yaml_post, &args.yaml_post].into_iter().flatten() {
            merge_file(&mut raw, path)?;
        }

        Ok(raw)
    }

    /// Constructs the root record from parsed arguments.
    pub fn launch(&self, args: &LaunchArgs) -> Result<Arc<Record>> {
        let raw = self.layered_raw(args)?;
        let record = self.registry.construct_record(raw, &self.root)?;
        info!("{:#}", record);
        Ok(record)
    }

    /// Parses `argv` (program name first) and constructs the root record.
    pub fn launch_from<I, T>(&self, argv: I) -> Result<Arc<Record>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = LaunchArgs::try_from_args(argv)?;
        self.launch(&args)
    }

    /// Constructs the root record from the process arguments and hands it to `main`.
    pub fn run<F, R>(&self, main: F) -> Result<R>
    where
        F: FnOnce(Arc<Record>) -> R,
    {
        let record = self.launch_from(std::env::args_os())?;
        Ok(main(record))
    }
}

fn merge_file(raw: &mut RawValue, path: &Path) -> Result<()> {
    debug!(path = %path.display(), "merging yaml layer");
    let layer = source::load_yaml(path)?;
    if !matches!(layer, RawValue::Map(_)) {
        return Err(Error::Source {
            origin: path.display().to_string(),
            message: format!("top level must be a mapping, found {}", layer.kind_name()),
        });
    }
    raw.deep_merge(layer);
    Ok(())
}
