//! Process runner for VCS queries.
//!
//! Every child starts from a blank environment (`env_clear`) and receives
//! exactly [`EnvSnapshot::child_env`], so a hook-exported `GIT_DIR` can never
//! point a query at another repository. Non-zero exit codes are data, not
//! errors: callers decide what a failed query means. The only hard failure is
//! an executable that cannot be found.

use std::path::Path;
use std::process::Command;

use crate::env::EnvSnapshot;
use crate::error::{Error, Result};

/// Captured result of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output with trailing whitespace removed.
    pub stdout: String,
    /// Standard error with trailing whitespace removed.
    pub stderr: String,
    /// Exit code, or -1 when the child was terminated by a signal.
    pub code: i32,
}

impl CommandOutput {
    /// Whether the child exited with code 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Standard output when the child succeeded.
    pub fn ok(self) -> Option<String> {
        self.success().then_some(self.stdout)
    }
}

/// Check whether `program` can be located on the snapshot's `PATH`.
pub fn has_command(program: &str, cwd: &Path, env: &EnvSnapshot) -> bool {
    which::which_in(program, env.get("PATH"), cwd).is_ok()
}

/// Run `program args...` in `cwd` with the sanitized environment.
///
/// # Errors
///
/// Returns [`Error::MissingCommand`] when `program` is not on `PATH`, or
/// [`Error::Io`] when the child cannot be spawned for another reason.
pub fn run(program: &str, args: &[&str], cwd: &Path, env: &EnvSnapshot) -> Result<CommandOutput> {
    let resolved =
        which::which_in(program, env.get("PATH"), cwd).map_err(|_| Error::MissingCommand {
            name: program.to_string(),
        })?;

    tracing::trace!("running {program} {} in {}", args.join(" "), cwd.display());

    let output = Command::new(resolved)
        .args(args)
        .current_dir(cwd)
        .env_clear()
        .envs(env.child_env())
        .output()?;

    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        code: output.status.code().unwrap_or(-1),
    };

    if !result.success() {
        tracing::debug!(
            "{program} {} exited with {}: {}",
            args.join(" "),
            result.code,
            result.stderr
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_command_names_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvSnapshot::from_vars([("PATH", dir.path().join("nowhere").to_string_lossy())]);

        let err = run("git", &["status"], dir.path(), &env).unwrap_err();
        assert!(matches!(err, Error::MissingCommand { ref name } if name == "git"));
        assert!(err.to_string().contains("'git' was not found"));
        assert!(!has_command("git", dir.path(), &env));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvSnapshot::capture();

        let out = run("sh", &["-c", "echo out; echo err >&2; exit 3"], dir.path(), &env).unwrap();
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout, "out");
        assert_eq!(out.stderr, "err");
        assert_eq!(out.ok(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_child_sees_sanitized_environment() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvSnapshot::capture().with_var("GIT_DIR", "/definitely/not/here");

        let out = run(
            "sh",
            &["-c", "echo \"${GIT_DIR:-unset}:$LC_ALL\""],
            dir.path(),
            &env,
        )
        .unwrap();
        assert_eq!(out.stdout, "unset:C");
    }
}
