use std::path::PathBuf;

use clap::ValueEnum;
use simtox_core::IdentifierKind;

/// Shared output mode across all commands.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// Single-line JSON.
    Raw,
}

/// Identifier kind as accepted on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KindArg {
    Name,
    DatabaseId,
    Structure,
}

impl From<KindArg> for IdentifierKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Name => Self::Name,
            KindArg::DatabaseId => Self::DatabaseId,
            KindArg::Structure => Self::Structure,
        }
    }
}

/// Global flags available before or after subcommands.
#[derive(Clone, Debug)]
pub struct GlobalFlags {
    pub format: OutputFormat,
    pub config: Option<PathBuf>,
}
