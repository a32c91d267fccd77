//! Update-metadata hook command

use anyhow::{Context, Result};
use scmver_core::{EnvSnapshot, HookSettings, MetadataHook};

/// Run the metadata hook in the current directory and return its exit code
pub fn update_metadata(post_rewrite: bool, command: Vec<String>, env: EnvSnapshot) -> Result<i32> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let hook = MetadataHook::new(cwd, HookSettings::default().with_command(command), env);
    let outcome = hook.update(post_rewrite)?;
    println!("{}", outcome.message);
    Ok(outcome.exit_code)
}
