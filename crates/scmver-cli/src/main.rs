//! scmver - print the version inferred from the current checkout

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use scmver_cli::cmd;
use scmver_cli::{Cli, Commands};
use scmver_core::EnvSnapshot;
use scmver_core::env::DEBUG;

fn main() -> Result<()> {
    let env = EnvSnapshot::capture();

    // Logs go to stderr; stdout carries only the version
    let default_level = if env.flag(DEBUG) { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => cmd::version::version(&cli.args, env),
        Some(Commands::Version(args)) => cmd::version::version(&args, env),
        Some(Commands::UpdateMetadata {
            post_rewrite,
            command,
        }) => {
            let code = cmd::update_metadata::update_metadata(post_rewrite, command, env)?;
            std::process::exit(code);
        }
    }
}
