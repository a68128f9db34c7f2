//! LicenseGraph CLI: license supersedence analysis.
//!
//! Downloads Microsoft's product/service-plan catalog, works out which
//! products make others redundant, and answers questions about the result.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
