//! Working-copy backends.
//!
//! A [`Workdir`] answers the handful of questions inference needs (describe,
//! dirty state, branch, node, history) by running the VCS executable through
//! [`crate::process`]. Git and Mercurial implement the same trait; callers
//! hold a `Box<dyn Workdir>` and never branch on the VCS.

pub mod git;
pub mod hg;

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::env::EnvSnapshot;
use crate::error::{Error, Result};

pub use git::GitWorkdir;
pub use hg::HgWorkdir;

/// Version control system behind a working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vcs {
    /// git.
    Git,
    /// Mercurial.
    Hg,
}

impl Vcs {
    /// Marker prepended to abbreviated node ids.
    pub fn node_prefix(self) -> char {
        match self {
            Self::Git => 'g',
            Self::Hg => 'h',
        }
    }

    /// Executable name.
    pub fn command(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Hg => "hg",
        }
    }

    /// Metadata directory marking a working copy root.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Git => ".git",
            Self::Hg => ".hg",
        }
    }
}

impl fmt::Display for Vcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// A commit reachable from the working copy that carries at least one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedCommit {
    /// Abbreviated node id.
    pub node: String,
    /// Tags on the commit, in the order the VCS reports them.
    pub tags: Vec<String>,
}

/// Queries against one working copy. All methods run VCS commands; a failed
/// query yields `None`/`false` rather than an error, except for a missing
/// executable.
pub trait Workdir: fmt::Debug {
    /// Which VCS this is.
    fn vcs(&self) -> Vcs;

    /// Top level directory of the working copy.
    fn root(&self) -> &Path;

    /// Whether history is truncated.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn is_shallow(&self) -> Result<bool>;

    /// Fetch the missing history of a shallow clone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] when the fetch fails.
    fn fetch_full_history(&self) -> Result<()>;

    /// `<tag>-<distance>-g<node>[-dirty]` for the nearest tag matching the
    /// glob `pattern`, or `None` when there is no such tag.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn describe(&self, pattern: &str) -> Result<Option<String>>;

    /// Commit date of the current revision.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn head_date(&self) -> Result<Option<NaiveDate>>;

    /// Whether tracked files (including staged new files) are modified.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn is_dirty(&self) -> Result<bool>;

    /// Current branch; `None` on a detached head.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn branch_name(&self) -> Result<Option<String>>;

    /// Abbreviated node of the current revision; `None` before the first
    /// commit.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn node(&self) -> Result<Option<String>>;

    /// Number of commits reachable from the current revision.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn count_all_nodes(&self) -> Result<u32>;

    /// Commits between `tag` and the current revision.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn distance_from(&self, tag: &str) -> Result<u32>;

    /// One page of ancestors, newest first, skipping `skip` entries. A page
    /// shorter than `limit` is the last one.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn tagged_ancestors(&self, skip: usize, limit: usize) -> Result<Vec<TaggedCommit>>;

    /// Whether a rebase is in progress.
    ///
    /// # Errors
    ///
    /// Fails only when the VCS executable is unavailable.
    fn is_rebasing(&self) -> Result<bool>;
}

/// Paginated walk over the tags of a working copy's ancestors, newest first.
///
/// Pages are fetched lazily; the walk stops at the first short page.
#[derive(Debug)]
pub struct AncestorTags<'a> {
    workdir: &'a dyn Workdir,
    page_size: usize,
    skip: usize,
    buffer: VecDeque<TaggedCommit>,
    exhausted: bool,
}

impl<'a> AncestorTags<'a> {
    /// Default number of commits fetched per page.
    pub const PAGE_SIZE: usize = 64;

    /// Start a walk from the current revision.
    pub fn new(workdir: &'a dyn Workdir) -> Self {
        Self::with_page_size(workdir, Self::PAGE_SIZE)
    }

    /// Start a walk fetching `page_size` commits per query.
    pub fn with_page_size(workdir: &'a dyn Workdir, page_size: usize) -> Self {
        Self {
            workdir,
            page_size: page_size.max(1),
            skip: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Rewind to the current revision.
    pub fn restart(&mut self) {
        self.skip = 0;
        self.buffer.clear();
        self.exhausted = false;
    }
}

impl Iterator for AncestorTags<'_> {
    type Item = Result<TaggedCommit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(commit) = self.buffer.pop_front() {
                if commit.tags.is_empty() {
                    continue;
                }
                return Some(Ok(commit));
            }
            if self.exhausted {
                return None;
            }
            let page = match self.workdir.tagged_ancestors(self.skip, self.page_size) {
                Ok(page) => page,
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            };
            tracing::trace!("fetched {} ancestors after {}", page.len(), self.skip);
            self.skip += page.len();
            self.exhausted = page.len() < self.page_size;
            self.buffer.extend(page);
        }
    }
}

/// What to do when a git checkout has truncated history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ShallowPolicy {
    /// Log a warning and continue.
    #[default]
    #[serde(rename = "warn_on_shallow", alias = "warn")]
    Warn,
    /// Abort with [`Error::Shallow`].
    #[serde(rename = "fail_on_shallow", alias = "fail")]
    Fail,
    /// Fetch the missing history, then continue.
    #[serde(rename = "fetch_on_shallow", alias = "fetch")]
    Fetch,
}

impl ShallowPolicy {
    /// Apply the policy to `workdir` before any other query runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shallow`] under [`ShallowPolicy::Fail`], or the fetch
    /// error under [`ShallowPolicy::Fetch`].
    pub fn apply(self, workdir: &dyn Workdir) -> Result<()> {
        if !workdir.is_shallow()? {
            return Ok(());
        }
        let path = workdir.root();
        match self {
            Self::Warn => {
                tracing::warn!("{} is shallow and may cause errors", path.display());
                Ok(())
            }
            Self::Fail => Err(Error::Shallow {
                path: path.to_path_buf(),
            }),
            Self::Fetch => {
                tracing::warn!(
                    "{} was shallow, git fetch was used to rectify",
                    path.display()
                );
                workdir.fetch_full_history()
            }
        }
    }
}

impl FromStr for ShallowPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "warn" | "warn_on_shallow" => Ok(Self::Warn),
            "fail" | "fail_on_shallow" => Ok(Self::Fail),
            "fetch" | "fetch_on_shallow" => Ok(Self::Fetch),
            other => Err(format!(
                "unknown shallow policy {other:?} (expected warn, fail or fetch)"
            )),
        }
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Open the working copy rooted exactly at `path`.
///
/// Returns `None` when `path` holds no `.git`/`.hg` marker, or when the VCS
/// reports a different top level (the directory is nested inside a larger
/// checkout). The executable is only required once a marker is found.
///
/// # Errors
///
/// Returns [`Error::MissingCommand`] when the marker's VCS is not installed.
pub fn open(path: &Path, env: &EnvSnapshot) -> Result<Option<Box<dyn Workdir>>> {
    let detected = [Vcs::Hg, Vcs::Git]
        .into_iter()
        .find(|vcs| path.join(vcs.marker()).exists());
    let Some(vcs) = detected else {
        return Ok(None);
    };

    let workdir: Option<Box<dyn Workdir>> = match vcs {
        Vcs::Git => GitWorkdir::open(path, env)?.map(|w| Box::new(w) as Box<dyn Workdir>),
        Vcs::Hg => HgWorkdir::open(path, env)?.map(|w| Box::new(w) as Box<dyn Workdir>),
    };

    match workdir {
        Some(w) if same_dir(w.root(), path) => {
            tracing::debug!("found {vcs} working copy at {}", path.display());
            Ok(Some(w))
        }
        Some(w) => {
            tracing::debug!(
                "{} is inside {vcs} working copy {}, ignoring",
                path.display(),
                w.root().display()
            );
            Ok(None)
        }
        None => Ok(None),
    }
}

pub(crate) fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

pub(crate) fn root_from_output(stdout: &str) -> Option<PathBuf> {
    lines(stdout).next().map(PathBuf::from)
}
