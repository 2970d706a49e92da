use crate::cli::{Commands, GlobalFlags};

pub mod report;
pub mod resolve;
pub mod schema;

/// Route a parsed command to its handler.
pub async fn dispatch(command: Commands, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Report(args) => report::handle(&args, flags).await,
        Commands::Resolve(args) => resolve::handle(&args, flags),
        Commands::Schema => schema::handle(flags),
    }
}
