//! Version command

use anyhow::{Context, Result};
use scmver_core::{Configuration, EnvSnapshot, get_version};

use crate::VersionArgs;

/// Print the inferred version on stdout
pub fn version(args: &VersionArgs, env: EnvSnapshot) -> Result<()> {
    let options = args.load_options()?;
    let config = Configuration::from_options(options, env).context("Invalid options")?;
    let version = get_version(&config)?;
    println!("{version}");
    Ok(())
}
