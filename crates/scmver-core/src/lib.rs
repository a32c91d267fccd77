//! Infer release versions from git and Mercurial checkouts.
//!
//! ```no_run
//! use scmver_core::{Configuration, EnvSnapshot, get_version};
//!
//! let config = Configuration::new(".", EnvSnapshot::capture())?;
//! println!("{}", get_version(&config)?);
//! # Ok::<(), scmver_core::Error>(())
//! ```

pub mod archival;
pub mod config;
pub mod describe;
pub mod env;
pub mod error;
pub mod hook;
pub mod infer;
pub mod normalize;
pub mod process;
pub mod scheme;
pub mod scm_version;
pub mod version;
pub mod workdir;

pub use config::{Configuration, Options};
pub use env::EnvSnapshot;
pub use error::{Error, Result};
pub use hook::{HookOutcome, HookSettings, MetadataHook};
pub use infer::{get_version, infer_version};
pub use scheme::{LocalScheme, VersionScheme};
pub use scm_version::ScmVersion;
pub use workdir::{ShallowPolicy, Workdir};
