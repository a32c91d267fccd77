//! git backend.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate};

use super::{TaggedCommit, Vcs, Workdir, lines, root_from_output};
use crate::env::EnvSnapshot;
use crate::error::{Error, Result};
use crate::process::{self, CommandOutput};

const NODE_LENGTH: usize = 7;

/// A git working copy.
#[derive(Debug, Clone)]
pub struct GitWorkdir {
    root: PathBuf,
    env: EnvSnapshot,
}

impl GitWorkdir {
    /// Open the working copy containing `path`. `None` when git does not
    /// recognize one there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCommand`] when git is not installed.
    pub fn open(path: &Path, env: &EnvSnapshot) -> Result<Option<Self>> {
        let out = process::run("git", &["rev-parse", "--show-toplevel"], path, env)?;
        Ok(out
            .ok()
            .and_then(|stdout| root_from_output(&stdout))
            .map(|root| Self {
                root,
                env: env.clone(),
            }))
    }

    fn git(&self, args: &[&str]) -> Result<CommandOutput> {
        process::run("git", args, &self.root, &self.env)
    }

    fn git_ok(&self, args: &[&str]) -> Result<Option<String>> {
        Ok(self.git(args)?.ok())
    }

    fn count(&self, args: &[&str]) -> Result<u32> {
        Ok(self
            .git_ok(args)?
            .and_then(|out| out.trim().parse().ok())
            .unwrap_or(0))
    }
}

impl Workdir for GitWorkdir {
    fn vcs(&self) -> Vcs {
        Vcs::Git
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn is_shallow(&self) -> Result<bool> {
        Ok(self
            .git_ok(&["rev-parse", "--is-shallow-repository"])?
            .is_some_and(|out| out.trim() == "true"))
    }

    fn fetch_full_history(&self) -> Result<()> {
        let args = ["fetch", "--unshallow"];
        let out = self.git(&args)?;
        if !out.success() {
            let mut command = vec!["git"];
            command.extend(args);
            return Err(Error::command_failed(&command, out.code, out.stderr));
        }
        Ok(())
    }

    fn describe(&self, pattern: &str) -> Result<Option<String>> {
        self.git_ok(&[
            "describe", "--dirty", "--tags", "--long", "--match", pattern,
        ])
    }

    fn head_date(&self) -> Result<Option<NaiveDate>> {
        let out = self.git_ok(&[
            "-c",
            "log.showSignature=false",
            "log",
            "-n",
            "1",
            "HEAD",
            "--format=%cI",
        ])?;
        Ok(out.and_then(|text| {
            let text = text.trim();
            match DateTime::parse_from_rfc3339(text) {
                Ok(date) => Some(date.date_naive()),
                Err(e) => {
                    tracing::warn!("git returned an unparsable commit date {text:?}: {e}");
                    None
                }
            }
        }))
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(self
            .git_ok(&["status", "--porcelain", "--untracked-files=no"])?
            .is_some_and(|out| !out.trim().is_empty()))
    }

    fn branch_name(&self) -> Result<Option<String>> {
        let branch = match self.git_ok(&["rev-parse", "--abbrev-ref", "HEAD"])? {
            Some(branch) => Some(branch),
            // before the first commit HEAD does not resolve
            None => self.git_ok(&["symbolic-ref", "--short", "HEAD"])?,
        };
        Ok(branch
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty() && b != "HEAD"))
    }

    fn node(&self) -> Result<Option<String>> {
        Ok(self
            .git_ok(&["rev-parse", "--verify", "--quiet", "HEAD"])?
            .map(|full| full.trim().chars().take(NODE_LENGTH).collect::<String>())
            .filter(|node| !node.is_empty()))
    }

    fn count_all_nodes(&self) -> Result<u32> {
        self.count(&["rev-list", "--count", "HEAD"])
    }

    fn distance_from(&self, tag: &str) -> Result<u32> {
        let range = format!("refs/tags/{tag}..HEAD");
        self.count(&["rev-list", "--count", &range])
    }

    fn tagged_ancestors(&self, skip: usize, limit: usize) -> Result<Vec<TaggedCommit>> {
        let skip = format!("--skip={skip}");
        let limit = format!("--max-count={limit}");
        let out = self.git_ok(&["log", &skip, &limit, "--format=%h%x09%D", "HEAD"])?;
        Ok(out.map_or_else(Vec::new, |text| {
            lines(&text).map(parse_log_decoration).collect()
        }))
    }

    fn is_rebasing(&self) -> Result<bool> {
        let Some(git_dir) = self.git_ok(&["rev-parse", "--absolute-git-dir"])? else {
            return Ok(false);
        };
        let git_dir = PathBuf::from(git_dir.trim());
        Ok(["rebase-merge", "rebase-apply"]
            .iter()
            .any(|state| git_dir.join(state).exists()))
    }
}

/// Parse one `%h%x09%D` line: `abc1234\tHEAD -> main, tag: v1.0, tag: v1.0.1`.
fn parse_log_decoration(line: &str) -> TaggedCommit {
    let (node, refs) = line.split_once('\t').unwrap_or((line, ""));
    TaggedCommit {
        node: node.trim().to_string(),
        tags: refs
            .split(", ")
            .filter_map(|r| r.trim().strip_prefix("tag: "))
            .map(str::to_string)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_decoration() {
        assert_eq!(
            parse_log_decoration("abc1234\tHEAD -> main, tag: v1.0, origin/main, tag: v1.0.1"),
            TaggedCommit {
                node: "abc1234".to_string(),
                tags: vec!["v1.0".to_string(), "v1.0.1".to_string()],
            }
        );
        assert_eq!(
            parse_log_decoration("def5678"),
            TaggedCommit {
                node: "def5678".to_string(),
                tags: Vec::new(),
            }
        );
    }
}
