//! Inference entry points: from a configuration to a version string.

use std::path::Path;

use crate::archival::{archival_to_version, read_archival};
use crate::config::Configuration;
use crate::describe::parse_describe;
use crate::env::PRETEND_VERSION;
use crate::error::{Error, Result};
use crate::normalize::{RawFacts, exact_distance, normalize};
use crate::scheme;
use crate::scm_version::ScmVersion;
use crate::workdir::{self, Workdir};

fn with_prefix(workdir: &dyn Workdir, node: Option<String>) -> Option<String> {
    node.map(|n| format!("{}{n}", workdir.vcs().node_prefix()))
}

/// Gather facts from an open working copy and normalize them.
///
/// The shallow policy runs first, so a failing policy aborts before any
/// other query.
///
/// # Errors
///
/// Returns [`Error::Shallow`] under the fail policy, or any VCS or scheme
/// error.
pub fn parse_workdir(workdir: &dyn Workdir, config: &Configuration) -> Result<ScmVersion> {
    config.shallow_policy().apply(workdir)?;

    let branch = workdir.branch_name()?;
    let head_date = workdir.head_date()?;
    let worktree_dirty = workdir.is_dirty()?;

    let facts = match workdir.describe(config.describe_match())? {
        Some(raw) => {
            tracing::debug!("describe: {raw}");
            let described = parse_describe(&raw);
            let dirty = described.dirty || worktree_dirty;
            let node = if described.node.is_empty() {
                workdir.node()?
            } else {
                Some(described.node)
            };
            RawFacts {
                tag: Some(described.tag),
                distance: exact_distance(described.distance, dirty),
                node: with_prefix(workdir, node),
                dirty,
                branch,
                head_date,
            }
        }
        None => {
            let node = workdir.node()?;
            let distance = if node.is_some() {
                workdir.count_all_nodes()?
            } else {
                0
            };
            tracing::debug!("no tag found, {distance} commits in history");
            RawFacts {
                tag: None,
                distance: Some(distance),
                node: with_prefix(workdir, node),
                dirty: worktree_dirty,
                branch,
                head_date,
            }
        }
    };

    normalize(facts, Some(workdir), config)
}

/// Infer a version from `dir` alone: a working copy rooted there, then an
/// archival file. `None` when neither exists.
///
/// # Errors
///
/// Propagates backend and normalization errors.
pub fn version_from_dir(dir: &Path, config: &Configuration) -> Result<Option<ScmVersion>> {
    if let Some(workdir) = workdir::open(dir, config.env())? {
        return parse_workdir(workdir.as_ref(), config).map(Some);
    }
    if let Some(data) = read_archival(dir)? {
        tracing::debug!("found archival metadata in {}", dir.display());
        return archival_to_version(&data, config).map(Some);
    }
    Ok(None)
}

/// Infer a version from the configured root, honoring the pretend-version
/// override and, when enabled, every ancestor directory.
///
/// # Errors
///
/// Propagates backend and normalization errors.
pub fn infer_version(config: &Configuration) -> Result<Option<ScmVersion>> {
    let env = config.env();
    if let Some(pretend) = env.get(PRETEND_VERSION) {
        tracing::debug!("using {PRETEND_VERSION}={pretend:?}");
        return Ok(Some(ScmVersion::preformatted(pretend, env.build_time())));
    }

    for dir in config.root().ancestors() {
        if let Some(version) = version_from_dir(dir, config)? {
            return Ok(Some(version));
        }
        if !config.search_parent_directories() {
            break;
        }
    }
    Ok(None)
}

/// Render `version` with the configured schemes.
///
/// # Errors
///
/// Returns [`Error::Scheme`] when the version scheme cannot bump the tag.
pub fn format_version(version: &ScmVersion, config: &Configuration) -> Result<String> {
    Ok(scheme::format_version(
        version,
        config.version_scheme(),
        config.local_scheme(),
    )?)
}

/// Infer and render the version, falling back to the configured fallback
/// version when no working copy is found.
///
/// # Errors
///
/// Returns [`Error::NoVersion`] when nothing is found and no fallback is
/// configured, or any inference error.
pub fn get_version(config: &Configuration) -> Result<String> {
    let version = match infer_version(config)? {
        Some(version) => version,
        None => match config.fallback_version() {
            Some(fallback) => {
                tracing::debug!("no working copy found, using fallback {fallback:?}");
                ScmVersion::preformatted(fallback, config.env().build_time())
            }
            None => {
                return Err(Error::NoVersion {
                    root: config.root().to_path_buf(),
                });
            }
        },
    };
    format_version(&version, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::env::EnvSnapshot;
    use std::fs;

    #[test]
    fn test_pretend_version() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvSnapshot::default().with_var(PRETEND_VERSION, "3.1.4");
        let config = Configuration::new(dir.path(), env).unwrap();
        assert_eq!(get_version(&config).unwrap(), "3.1.4");
    }

    #[test]
    fn test_fallback_and_no_version() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::new(dir.path(), EnvSnapshot::capture()).unwrap();
        let err = get_version(&config).unwrap_err();
        assert!(matches!(err, Error::NoVersion { .. }));

        let options = Options {
            root: Some(dir.path().to_path_buf()),
            fallback_version: Some("0.0.1".to_string()),
            ..Options::default()
        };
        let config = Configuration::from_options(options, EnvSnapshot::capture()).unwrap();
        assert_eq!(get_version(&config).unwrap(), "0.0.1");
    }

    #[test]
    fn test_archival_in_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".hg_archival.txt"), "tag: 4.2\n").unwrap();
        let nested = dir.path().join("pkg").join("src");
        fs::create_dir_all(&nested).unwrap();

        let config = Configuration::new(&nested, EnvSnapshot::capture()).unwrap();
        assert!(infer_version(&config).unwrap().is_none());

        let options = Options {
            root: Some(nested),
            search_parent_directories: Some(true),
            ..Options::default()
        };
        let config = Configuration::from_options(options, EnvSnapshot::capture()).unwrap();
        assert_eq!(get_version(&config).unwrap(), "4.2");
    }
}
