//! Post-commit hook that refreshes installed package metadata.
//!
//! An editable install caches the version in its metadata directory; after
//! every commit the version changes and the metadata goes stale. The hook
//! re-runs the build command, but only when there is something to refresh
//! and no rebase is replaying commits. Skipping always exits 0.

use std::fs;
use std::path::{Path, PathBuf};

use crate::env::{EnvSnapshot, SKIP_UPDATE_METADATA};
use crate::error::{Error, Result};
use crate::process;
use crate::workdir;

const PREFIX: &str = "update-metadata:";

/// Where the hook looks and what it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSettings {
    /// Files marking a buildable project; any one is enough.
    pub build_scripts: Vec<String>,
    /// Suffix of the installed-metadata directory.
    pub metadata_suffix: String,
    /// Command that regenerates the metadata.
    pub command: Vec<String>,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            build_scripts: vec!["setup.py".to_string(), "setup.cfg".to_string()],
            metadata_suffix: ".egg-info".to_string(),
            command: ["python", "setup.py", "egg_info"]
                .map(str::to_string)
                .to_vec(),
        }
    }
}

impl HookSettings {
    /// Default settings with a different rebuild command. An empty command
    /// keeps the default.
    #[must_use]
    pub fn with_command(self, command: Vec<String>) -> Self {
        if command.is_empty() {
            return self;
        }
        Self { command, ..self }
    }
}

/// Where the hook ends up, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    /// No build script in the directory.
    NoBuildScript,
    /// Nothing installed from this directory yet.
    NoInstalledMetadata,
    /// Disabled through `SCMVER_SKIP_UPDATE_METADATA`.
    SkippedByEnv,
    /// A rebase is replaying commits; the post-rewrite event will follow.
    Rebasing,
    /// The build command should run.
    Ready,
}

/// What to do about a [`HookState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Do nothing and succeed.
    Skip(HookState),
    /// Run this command line.
    Run(Vec<String>),
    /// The hook cannot run.
    Error(String),
}

/// Text to print and the exit code to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    /// Human readable report.
    pub message: String,
    /// Process exit code: 0 unless the build command failed.
    pub exit_code: i32,
}

impl HookOutcome {
    fn ok(message: String) -> Self {
        Self {
            message,
            exit_code: 0,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            message,
            exit_code: 1,
        }
    }
}

/// The hook bound to one project directory.
#[derive(Debug, Clone)]
pub struct MetadataHook {
    dir: PathBuf,
    settings: HookSettings,
    env: EnvSnapshot,
}

impl MetadataHook {
    /// Create a hook for the project in `dir`.
    pub fn new(dir: impl Into<PathBuf>, settings: HookSettings, env: EnvSnapshot) -> Self {
        Self {
            dir: dir.into(),
            settings,
            env,
        }
    }

    /// The project directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Work out the state. With `post_rewrite` the rebase check is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be listed or the VCS of
    /// the working copy is not installed.
    pub fn state(&self, post_rewrite: bool) -> Result<HookState> {
        let entries: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
            .collect();

        if !entries
            .iter()
            .any(|name| self.settings.build_scripts.contains(name))
        {
            return Ok(HookState::NoBuildScript);
        }
        if !entries
            .iter()
            .any(|name| name.ends_with(&self.settings.metadata_suffix))
        {
            return Ok(HookState::NoInstalledMetadata);
        }
        if self.env.flag(SKIP_UPDATE_METADATA) {
            return Ok(HookState::SkippedByEnv);
        }
        if !post_rewrite && self.is_rebasing()? {
            return Ok(HookState::Rebasing);
        }
        Ok(HookState::Ready)
    }

    fn is_rebasing(&self) -> Result<bool> {
        match workdir::open(&self.dir, &self.env)? {
            Some(workdir) => workdir.is_rebasing(),
            None => Ok(false),
        }
    }

    /// Decide what to do.
    ///
    /// # Errors
    ///
    /// See [`MetadataHook::state`].
    pub fn decide(&self, post_rewrite: bool) -> Result<HookDecision> {
        let state = self.state(post_rewrite)?;
        tracing::debug!("hook state {state:?} in {}", self.dir.display());
        Ok(match state {
            HookState::Ready if self.settings.command.is_empty() => {
                HookDecision::Error("no build command configured".to_string())
            }
            HookState::Ready => HookDecision::Run(self.settings.command.clone()),
            skipped => HookDecision::Skip(skipped),
        })
    }

    fn skip_message(&self, state: HookState) -> String {
        match state {
            HookState::NoBuildScript => format!("{PREFIX} Skipping, no build script found."),
            HookState::NoInstalledMetadata => format!(
                "{PREFIX} Skipping, no {} directory found.",
                self.settings.metadata_suffix
            ),
            HookState::SkippedByEnv => {
                format!("{PREFIX} Skipping, \"{SKIP_UPDATE_METADATA}\" env var set.")
            }
            HookState::Rebasing => format!("{PREFIX} Skipping, rebase in progress."),
            HookState::Ready => format!("{PREFIX} Nothing to skip."),
        }
    }

    /// Run the hook to completion.
    ///
    /// # Errors
    ///
    /// See [`MetadataHook::state`]. Build command failures are reported in
    /// the outcome, not as errors.
    pub fn update(&self, post_rewrite: bool) -> Result<HookOutcome> {
        let command = match self.decide(post_rewrite)? {
            HookDecision::Skip(state) => return Ok(HookOutcome::ok(self.skip_message(state))),
            HookDecision::Error(reason) => {
                return Ok(HookOutcome::failed(format!("{PREFIX} {reason}")));
            }
            HookDecision::Run(command) => command,
        };

        let mut lines = vec![format!("{PREFIX} Running command: {}", command.join(" "))];
        let (program, args) = command
            .split_first()
            .map(|(program, args)| (program.as_str(), args))
            .unwrap_or_default();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        match process::run(program, &args, &self.dir, &self.env) {
            Ok(out) => {
                if !out.stdout.is_empty() {
                    lines.push(out.stdout.clone());
                }
                if out.success() {
                    return Ok(HookOutcome::ok(lines.join("\n")));
                }
                lines.push(format!("{PREFIX} Error running build command:"));
                lines.push(out.stderr);
                Ok(HookOutcome::failed(lines.join("\n")))
            }
            Err(e @ Error::MissingCommand { .. }) => {
                lines.push(format!("{PREFIX} Error running build command:"));
                lines.push(e.to_string());
                Ok(HookOutcome::failed(lines.join("\n")))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(files: &[&str], dirs: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            fs::write(dir.path().join(file), "").unwrap();
        }
        for sub in dirs {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        dir
    }

    fn hook(dir: &Path, env: EnvSnapshot) -> MetadataHook {
        let settings =
            HookSettings::default().with_command(vec!["sh".into(), "-c".into(), "echo built".into()]);
        MetadataHook::new(dir, settings, env)
    }

    #[test]
    fn test_no_build_script() {
        let dir = project(&["README.md"], &["demo.egg-info"]);
        let outcome = hook(dir.path(), EnvSnapshot::capture()).update(false).unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.message, "update-metadata: Skipping, no build script found.");
    }

    #[test]
    fn test_no_installed_metadata() {
        let dir = project(&["setup.py"], &[]);
        let hook = hook(dir.path(), EnvSnapshot::capture());
        assert_eq!(hook.state(false).unwrap(), HookState::NoInstalledMetadata);
        let outcome = hook.update(false).unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.message.contains("no .egg-info directory"));
    }

    #[test]
    fn test_env_opt_out() {
        let dir = project(&["setup.cfg"], &["demo.egg-info"]);
        let env = EnvSnapshot::capture().with_var(SKIP_UPDATE_METADATA, "1");
        let outcome = hook(dir.path(), env).update(false).unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.message.contains(SKIP_UPDATE_METADATA));

        let env = EnvSnapshot::capture().with_var(SKIP_UPDATE_METADATA, "0");
        assert_eq!(hook(dir.path(), env).state(false).unwrap(), HookState::Ready);
    }

    #[test]
    fn test_decisions() {
        let dir = project(&["setup.py"], &["demo.egg-info"]);
        let env = EnvSnapshot::capture();
        assert_eq!(
            hook(dir.path(), env.clone()).decide(false).unwrap(),
            HookDecision::Run(vec!["sh".into(), "-c".into(), "echo built".into()])
        );

        let empty = HookSettings {
            command: Vec::new(),
            ..HookSettings::default()
        };
        assert!(matches!(
            MetadataHook::new(dir.path(), empty, env).decide(false).unwrap(),
            HookDecision::Error(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_command() {
        let dir = project(&["setup.py"], &["demo.egg-info"]);
        let outcome = hook(dir.path(), EnvSnapshot::capture()).update(false).unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(
            outcome.message,
            "update-metadata: Running command: sh -c echo built\nbuilt"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command() {
        let dir = project(&["setup.py"], &["demo.egg-info"]);
        let settings = HookSettings::default().with_command(vec![
            "sh".into(),
            "-c".into(),
            "echo broken >&2; exit 4".into(),
        ]);
        let outcome = MetadataHook::new(dir.path(), settings, EnvSnapshot::capture())
            .update(false)
            .unwrap();
        assert_eq!(outcome.exit_code, 1);
        assert!(outcome.message.contains("Error running build command:\nbroken"));
    }

    #[test]
    fn test_missing_build_executable() {
        let dir = project(&["setup.py"], &["demo.egg-info"]);
        let settings =
            HookSettings::default().with_command(vec!["scmver-no-such-builder".into()]);
        let outcome = MetadataHook::new(dir.path(), settings, EnvSnapshot::capture())
            .update(false)
            .unwrap();
        assert_eq!(outcome.exit_code, 1);
        assert!(outcome.message.contains("'scmver-no-such-builder' was not found"));
    }

    #[test]
    fn test_default_settings() {
        let settings = HookSettings::default();
        assert_eq!(settings.command, ["python", "setup.py", "egg_info"]);
        assert_eq!(settings.clone().with_command(Vec::new()), settings);
    }
}
