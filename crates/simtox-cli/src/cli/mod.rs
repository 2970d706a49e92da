use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod global;

pub use global::{GlobalFlags, KindArg, OutputFormat};

/// Top-level CLI parser for the `simtox` binary.
#[derive(Debug, Parser)]
#[command(
    name = "simtox",
    version,
    about = "Adverse-event reports across structurally similar compounds"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra config file, layered above the user and project config
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            config: self.config.clone(),
        }
    }
}

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Aggregate adverse events over compounds similar to the given one.
    Report(ReportArgs),
    /// Show how an identifier would be interpreted.
    Resolve(ResolveArgs),
    /// Print the JSON schema of the report.
    Schema,
}

#[derive(Clone, Debug, Args)]
pub struct ReportArgs {
    /// Compound name, database id (CHEMBL25, DB00945), or SMILES
    pub identifier: String,

    /// Skip classification and treat the identifier as this kind
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,

    /// Similar compounds to aggregate over [default: from config]
    #[arg(short = 'n', long)]
    pub similarity_limit: Option<usize>,

    /// Adverse-event terms per compound [default: from config]
    #[arg(short, long)]
    pub events: Option<usize>,

    /// Serve both lookups from a local catalog file instead of ChEMBL and openFDA
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// On Ctrl-C, print what finished instead of failing
    #[arg(long)]
    pub partial: bool,
}

#[derive(Clone, Debug, Args)]
pub struct ResolveArgs {
    pub identifier: String,

    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,
}
