use simtox_core::AggregationReport;

use crate::cli::GlobalFlags;
use crate::output::output;

/// Handle `simtox schema`.
pub fn handle(flags: &GlobalFlags) -> anyhow::Result<()> {
    let schema = schemars::schema_for!(AggregationReport);
    output(&schema, flags.format)
}
