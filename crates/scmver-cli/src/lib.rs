//! scmver - print the version inferred from the current checkout
//!
//! # Usage
//!
//! ```text
//! scmver                              # version of the checkout in .
//! scmver version --root ../lib        # another checkout
//! scmver update-metadata              # post-commit hook for editable installs
//! scmver update-metadata --post-rewrite
//! ```
//!
//! Options are read from `--config`, else `scmver.toml` or the
//! `[tool.scmver]` table of `pyproject.toml` in the root. Flags override
//! the file.
#![allow(clippy::missing_errors_doc)]

pub mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scmver_core::{Options, ShallowPolicy};

/// Option files looked up in the root when `--config` is not given.
pub const CONFIG_FILES: [&str; 2] = ["scmver.toml", "pyproject.toml"];

/// Command line.
#[derive(Debug, Parser)]
#[command(name = "scmver")]
#[command(author, version, about = "scmver - infer release versions from git and Mercurial checkouts")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Options for the default `version` command
    #[command(flatten)]
    pub args: VersionArgs,

    /// Subcommand; `version` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the inferred version
    Version(VersionArgs),
    /// Refresh installed package metadata after a commit
    #[command(name = "update-metadata")]
    UpdateMetadata {
        /// Run even if a rebase is in progress (for the post-rewrite hook)
        #[arg(long)]
        post_rewrite: bool,
        /// Build command (default: python setup.py egg_info)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

/// Flags of the `version` command.
#[derive(Debug, Clone, Default, Args)]
pub struct VersionArgs {
    /// Directory to infer the version from
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Options file (`scmver.toml`, or `pyproject.toml` with `[tool.scmver]`)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Version scheme (guess-next-dev, post-release, no-guess-dev, ...)
    #[arg(long)]
    pub version_scheme: Option<String>,

    /// Local scheme (node-and-date, node-and-timestamp, dirty-tag, no-local-version)
    #[arg(long)]
    pub local_scheme: Option<String>,

    /// Regex extracting the version from a tag
    #[arg(long)]
    pub tag_regex: Option<String>,

    /// Keep tags verbatim instead of normalizing them
    #[arg(long)]
    pub no_normalize: bool,

    /// Version to print when no checkout is found
    #[arg(long)]
    pub fallback_version: Option<String>,

    /// What to do with shallow clones: warn, fail or fetch
    #[arg(long)]
    pub shallow: Option<ShallowPolicy>,

    /// Also look for a checkout in parent directories
    #[arg(long)]
    pub search_parent_directories: bool,
}

impl VersionArgs {
    /// Options given as flags. Unset flags stay `None` so they don't mask
    /// the options file.
    pub fn flag_options(&self) -> Result<Options> {
        let root = self
            .root
            .as_deref()
            .map(std::path::absolute)
            .transpose()
            .context("Failed to resolve --root")?;
        Ok(Options {
            root,
            tag_regex: self.tag_regex.clone(),
            version_scheme: self.version_scheme.clone(),
            local_scheme: self.local_scheme.clone(),
            normalize: self.no_normalize.then_some(false),
            fallback_version: self.fallback_version.clone(),
            parse: self.shallow,
            search_parent_directories: self.search_parent_directories.then_some(true),
            ..Options::default()
        })
    }

    /// The options file in effect: `--config`, else the first of
    /// [`CONFIG_FILES`] present in the root.
    pub fn config_file(&self) -> Option<PathBuf> {
        if let Some(config) = &self.config {
            return Some(config.clone());
        }
        let root = self.root.as_deref().unwrap_or(Path::new("."));
        CONFIG_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }

    /// File options overlaid with flags. A relative `root` in the file is
    /// anchored at the file's directory.
    pub fn load_options(&self) -> Result<Options> {
        let file_options = match self.config_file() {
            Some(path) => {
                tracing::debug!("reading options from {}", path.display());
                let options = Options::from_toml_file(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?;
                Options {
                    relative_to: options.relative_to.or(Some(path)),
                    ..options
                }
            }
            None => Options::default(),
        };
        Ok(file_options.merge(self.flag_options()?))
    }
}
