use simtox_core::resolver::resolve;

use crate::cli::{GlobalFlags, ResolveArgs};
use crate::output::output;

/// Handle `simtox resolve`.
pub fn handle(args: &ResolveArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    let reference = resolve(&args.identifier, args.kind.map(Into::into))?;
    output(&reference, flags.format)
}
