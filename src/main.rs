mod cli;
mod commands;
mod config;
mod detect;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, Overrides};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "recompile=debug",
        _ => "recompile=trace",
    };

    let filter = EnvFilter::try_from_env("RECOMPILE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        None => {
            let root = detect::find_project_root(cli.path).await?;
            commands::build(&root, false, &Overrides::default()).await?;
        }
        Some(Commands::Build { clean, overrides }) => {
            let root = detect::find_project_root(overrides.path.clone()).await?;
            commands::build(&root, clean, &overrides).await?;
        }
        Some(Commands::Status { json, overrides }) => {
            let root = detect::find_project_root(overrides.path.clone()).await?;
            commands::status(&root, json, &overrides).await?;
        }
        Some(Commands::Clean { overrides }) => {
            let root = detect::find_project_root(overrides.path.clone()).await?;
            commands::clean(&root, &overrides).await?;
        }
    }

    Ok(())
}
