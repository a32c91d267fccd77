//! Immutable environment snapshot handed to every child process.
//!
//! Git hooks export variables such as `GIT_DIR` and `GIT_INDEX_FILE` that
//! would redirect a nested `git` call to the wrong repository. Instead of
//! scrubbing the real process environment, a snapshot is captured once per
//! invocation and the sanitized child environment is derived from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Reproducible-build timestamp, seconds since the Unix epoch.
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// Opt-out switch for the metadata hook.
pub const SKIP_UPDATE_METADATA: &str = "SCMVER_SKIP_UPDATE_METADATA";

/// Debug verbosity flag, read by the command-line front end.
pub const DEBUG: &str = "SCMVER_DEBUG";

/// Overrides inference with a literal version string.
pub const PRETEND_VERSION: &str = "SCMVER_PRETEND_VERSION";

/// `GIT_*` variables that only influence transport, not repository discovery.
const KEPT_GIT_VARS: [&str; 3] = ["GIT_EXEC_PATH", "GIT_SSH", "GIT_SSH_COMMAND"];

/// A frozen copy of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    ///
    /// Variables that are not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Build a snapshot from explicit key/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Return a copy with `key` set to `value`.
    #[must_use]
    pub fn with_var(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut vars = self.vars.clone();
        vars.insert(key.into(), value.into());
        Self { vars }
    }

    /// Return a copy without `key`.
    #[must_use]
    pub fn without_var(&self, key: &str) -> Self {
        let mut vars = self.vars.clone();
        vars.remove(key);
        Self { vars }
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Whether a flag variable is set to anything other than `0` or empty.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty() && v != "0")
    }

    /// The reproducible-build timestamp, if `SOURCE_DATE_EPOCH` holds a valid
    /// integer.
    pub fn source_date_epoch(&self) -> Option<DateTime<Utc>> {
        let raw = self.get(SOURCE_DATE_EPOCH)?;
        match raw.trim().parse::<i64>() {
            Ok(secs) => DateTime::from_timestamp(secs, 0),
            Err(_) => {
                tracing::warn!("ignoring {SOURCE_DATE_EPOCH}={raw:?}: not an integer");
                None
            }
        }
    }

    /// "Now" for version metadata: `SOURCE_DATE_EPOCH` when present, the
    /// wall clock otherwise.
    pub fn build_time(&self) -> DateTime<Utc> {
        self.source_date_epoch().unwrap_or_else(Utc::now)
    }

    /// The environment a VCS child process runs with.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .vars
            .iter()
            .filter(|(k, _)| !k.starts_with("GIT_") || KEPT_GIT_VARS.contains(&k.as_str()))
            .filter(|(k, _)| !matches!(k.as_str(), "LC_ALL" | "LANGUAGE" | "HGPLAIN"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.push(("LC_ALL".to_string(), "C".to_string()));
        env.push(("LANGUAGE".to_string(), String::new()));
        env.push(("HGPLAIN".to_string(), "1".to_string()));
        env
    }
}
