//! Tree Carver Binary
//!
//! Carves a translation unit exported by a front end as JSON:
//! - Loads the dump and an optional JSON configuration
//! - Carves from the given roots (or the configured preset)
//! - Prints the carve output as JSON, or writes the carved files
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: pretty)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin tree_carver --features cli -- unit.json -r main -o carved/
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tree_carver::{
    write_tree, CarveConfig, Carver, DefaultRoots, InMemoryTranslationUnit, RenderMode,
    UnresolvedRootPolicy,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Translation-unit dump (JSON)
    unit: PathBuf,

    /// Root function name (can specify multiple)
    #[arg(short, long = "root")]
    roots: Vec<String>,

    /// Configuration file (JSON); roots given with -r are added to it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Roots to use when none are named
    #[arg(long, value_enum)]
    default_roots: Option<DefaultRootsArg>,

    /// Skip roots that cannot be found instead of failing
    #[arg(long)]
    skip_unresolved: bool,

    /// Write carved files under this directory instead of printing JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory file names in the dump are relative to
    #[arg(long, default_value = ".")]
    source_root: PathBuf,

    /// Drop elided lines instead of commenting them out
    #[arg(long)]
    omit_lines: bool,

    /// Trace every traversal and marking step
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DefaultRootsArg {
    /// Every function named `main`
    Main,
    /// Every function defined in the main file
    MainFile,
}

impl From<DefaultRootsArg> for DefaultRoots {
    fn from(arg: DefaultRootsArg) -> Self {
        match arg {
            DefaultRootsArg::Main => DefaultRoots::MainOnly,
            DefaultRootsArg::MainFile => DefaultRoots::MainFileFunctions,
        }
    }
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing(debug: bool) {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let filter = if debug {
        EnvFilter::new("tree_carver=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "tree_carver=info".into())
    };

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr)
                    .flatten_event(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = match &cli.config {
        Some(path) => CarveConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => CarveConfig::default(),
    };
    config.roots.extend(cli.roots.iter().cloned());
    if let Some(preset) = cli.default_roots {
        config.default_roots = preset.into();
    }
    if cli.skip_unresolved {
        config.unresolved_root = UnresolvedRootPolicy::Skip;
    }

    info!(unit = %cli.unit.display(), "Loading translation unit");
    let unit = InMemoryTranslationUnit::from_path(&cli.unit)?;

    let output = Carver::new(Arc::new(unit), config).carve()?;

    match &cli.output {
        Some(out_root) => {
            let mode = if cli.omit_lines {
                RenderMode::Strip
            } else {
                RenderMode::CommentOut
            };
            let written = write_tree(&cli.source_root, out_root, &output.kept_lines, mode)?;
            info!(
                files = written.len(),
                fingerprint = %output.fingerprint,
                out = %out_root.display(),
                "Carved tree written"
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&output)?),
    }
    Ok(())
}
