//! Error taxonomy for version inference.
//!
//! Only environment problems (a missing VCS executable), an explicit
//! fail-on-shallow policy, configuration mistakes and unbumpable tags abort a
//! computation. Everything else that can be "absent" (no checkout, no tag, no
//! commits) is modelled with `Option` in the calling code.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::scheme::SchemeError;
use crate::version::VersionError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the inference engine and the metadata hook.
#[derive(Error, Debug)]
pub enum Error {
    /// The VCS executable could not be located on `PATH`.
    #[error("'{name}' was not found on PATH")]
    MissingCommand {
        /// Name of the executable that was looked up.
        name: String,
    },

    /// A command that must succeed (such as a corrective fetch) failed.
    #[error("command `{command}` failed with exit code {code}: {stderr}")]
    CommandFailed {
        /// The command line, joined with spaces.
        command: String,
        /// Exit code reported by the child (-1 when killed by a signal).
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The checkout has truncated history and the policy forbids continuing.
    #[error(
        "{} is shallow, please correct with \"git fetch --unshallow\"",
        path.display()
    )]
    Shallow {
        /// Root of the shallow checkout.
        path: PathBuf,
    },

    /// Invalid caller-supplied options.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A scheme could not derive a version from the facts.
    #[error("Scheme error: {0}")]
    Scheme(#[from] SchemeError),

    /// A tag could not be turned into a version value.
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Neither a checkout nor a fallback version was available.
    #[error(
        "unable to detect a version for {}: no git or Mercurial checkout found and no fallback version configured",
        root.display()
    )]
    NoVersion {
        /// Root that inference started from.
        root: PathBuf,
    },

    /// Filesystem access failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::CommandFailed`] from a finished child process.
    pub fn command_failed(command: &[&str], code: i32, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.join(" "),
            code,
            stderr: stderr.into(),
        }
    }
}
