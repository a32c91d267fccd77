//! Mercurial backend.
//!
//! Mercurial has no `describe`; it is emulated from revsets so that the rest
//! of the pipeline sees the same `<tag>-<distance>-g<node>[-dirty]` shape as
//! git produces. The commit that only adds a tag to `.hgtags` does not count
//! as distance.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use glob::Pattern;

use super::{TaggedCommit, Vcs, Workdir, lines, root_from_output};
use crate::env::EnvSnapshot;
use crate::error::Result;
use crate::process::{self, CommandOutput};

const NODE_LENGTH: usize = 7;
const NULL_NODE: &str = "0000000000000000000000000000000000000000";
const TIP: &str = "tip";

/// A Mercurial working copy.
#[derive(Debug, Clone)]
pub struct HgWorkdir {
    root: PathBuf,
    env: EnvSnapshot,
}

fn quote(tag: &str) -> String {
    format!("'{}'", tag.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl HgWorkdir {
    /// Open the working copy containing `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MissingCommand`] when hg is not installed.
    pub fn open(path: &Path, env: &EnvSnapshot) -> Result<Option<Self>> {
        let out = process::run("hg", &["root"], path, env)?;
        Ok(out
            .ok()
            .and_then(|stdout| root_from_output(&stdout))
            .map(|root| Self {
                root,
                env: env.clone(),
            }))
    }

    fn hg(&self, args: &[&str]) -> Result<CommandOutput> {
        process::run("hg", args, &self.root, &self.env)
    }

    fn log(&self, revset: &str, template: &str) -> Result<Option<String>> {
        Ok(self.hg(&["log", "-r", revset, "-T", template])?.ok())
    }

    fn count_revs(&self, revset: &str) -> Result<u32> {
        let out = self.log(revset, ".")?.unwrap_or_default();
        Ok(u32::try_from(out.trim().len()).unwrap_or(u32::MAX))
    }

    fn tags_of(&self, revset: &str) -> Result<Vec<String>> {
        let out = self.log(revset, "{join(tags, '\\n')}\\n")?.unwrap_or_default();
        Ok(lines(&out)
            .filter(|t| *t != TIP)
            .map(str::to_string)
            .collect())
    }

    /// Tag distance, ignoring a revision whose only change is the tag commit.
    fn tag_distance(&self, tag: &str, dirty: bool) -> Result<u32> {
        let since = format!("only(., {})", quote(tag));
        let distance = self.count_revs(&since)?;
        if distance == 0 || dirty {
            return Ok(distance);
        }
        let content = format!("{since} and (merge() or file('re:^(?!\\.hgtags).*$'))");
        if self.count_revs(&content)? == 0 {
            return Ok(0);
        }
        Ok(distance)
    }
}

impl Workdir for HgWorkdir {
    fn vcs(&self) -> Vcs {
        Vcs::Hg
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn is_shallow(&self) -> Result<bool> {
        Ok(false)
    }

    fn fetch_full_history(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self, pattern: &str) -> Result<Option<String>> {
        let pattern = match Pattern::new(pattern) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                tracing::warn!("invalid describe pattern {pattern:?}: {e}, matching every tag");
                None
            }
        };
        let matches = |tag: &String| pattern.as_ref().is_none_or(|p| p.matches(tag));

        let Some(node) = self.node()? else {
            return Ok(None);
        };
        let dirty = self.is_dirty()?;

        let (tag, distance) = match self.tags_of(".")?.into_iter().find(matches) {
            Some(tag) => (tag, 0),
            None => {
                let Some(tag) = self
                    .tags_of("reverse(ancestors(.) and tag())")?
                    .into_iter()
                    .find(matches)
                else {
                    return Ok(None);
                };
                let distance = self.tag_distance(&tag, dirty)?;
                (tag, distance)
            }
        };

        let suffix = if dirty { "-dirty" } else { "" };
        Ok(Some(format!("{tag}-{distance}-g{node}{suffix}")))
    }

    fn head_date(&self) -> Result<Option<NaiveDate>> {
        if self.node()?.is_none() {
            return Ok(None);
        }
        Ok(self
            .log(".", "{date|shortdate}")?
            .and_then(|out| NaiveDate::parse_from_str(out.trim(), "%Y-%m-%d").ok()))
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(self
            .hg(&["id", "-T", "{if(dirty, 1, 0)}"])?
            .ok()
            .is_some_and(|out| out.trim() == "1"))
    }

    fn branch_name(&self) -> Result<Option<String>> {
        Ok(self
            .hg(&["id", "-T", "{branch}"])?
            .ok()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty()))
    }

    fn node(&self) -> Result<Option<String>> {
        Ok(self
            .log(".", "{node}")?
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && n != NULL_NODE)
            .map(|n| n.chars().take(NODE_LENGTH).collect()))
    }

    fn count_all_nodes(&self) -> Result<u32> {
        self.count_revs("ancestors(.)")
    }

    fn distance_from(&self, tag: &str) -> Result<u32> {
        self.tag_distance(tag, self.is_dirty()?)
    }

    fn tagged_ancestors(&self, skip: usize, limit: usize) -> Result<Vec<TaggedCommit>> {
        let revset = format!("limit(reverse(ancestors(.) and tag()), {limit}, {skip})");
        let out = self
            .log(&revset, "{node|short}\\t{join(tags, '\\t')}\\n")?
            .unwrap_or_default();
        Ok(lines(&out)
            .map(|line| {
                let mut fields = line.split('\t');
                TaggedCommit {
                    node: fields.next().unwrap_or_default().to_string(),
                    tags: fields
                        .filter(|t| !t.is_empty() && *t != TIP)
                        .map(str::to_string)
                        .collect(),
                }
            })
            .collect())
    }

    fn is_rebasing(&self) -> Result<bool> {
        Ok(self.root.join(".hg").join("rebasestate").exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revset_quoting() {
        assert_eq!(quote("1.0"), "'1.0'");
        assert_eq!(quote("it's"), "'it\\'s'");
    }
}
