//! Reconciles raw backend facts into a [`ScmVersion`].
//!
//! Applies the tag regex, drops tag suffixes with a warning, walks history
//! for a usable tag when the described one does not match, and computes the
//! node date.

use chrono::NaiveDate;

use crate::config::Configuration;
use crate::error::Result;
use crate::scm_version::ScmVersion;
use crate::version::Tag;
use crate::workdir::{AncestorTags, Workdir};

/// Tag assumed for a history without any usable tag.
pub const ROOT_TAG: &str = "0.0";

/// Facts as a backend reports them, before interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFacts {
    /// Tag text, `None` when no tag was found.
    pub tag: Option<String>,
    /// Commits since the tag; `None` for an exact clean checkout.
    pub distance: Option<u32>,
    /// Node id with its VCS marker.
    pub node: Option<String>,
    /// Whether tracked files are modified.
    pub dirty: bool,
    /// Current branch.
    pub branch: Option<String>,
    /// Commit date of the current revision.
    pub head_date: Option<NaiveDate>,
}

/// `distance` as stored in a [`ScmVersion`]: a clean checkout at distance 0
/// is the tag itself.
pub fn exact_distance(distance: u32, dirty: bool) -> Option<u32> {
    (distance != 0 || dirty).then_some(distance)
}

enum Resolved {
    Tag(Tag, Option<u32>),
    Root(Option<u32>),
}

/// Turn `facts` into a version.
///
/// `history` enables the ancestor walk for tags that do not match the tag
/// regex; without it such a tag is kept as raw text with a warning.
///
/// # Errors
///
/// Fails when a history query cannot run, or when the root tag cannot be
/// represented by the configured version type.
pub fn normalize(
    facts: RawFacts,
    history: Option<&dyn Workdir>,
    config: &Configuration,
) -> Result<ScmVersion> {
    let resolved = match facts.tag.as_deref() {
        None => Resolved::Root(facts.distance),
        Some(text) => match tag_from_text(text, config) {
            Some(tag) => Resolved::Tag(tag, facts.distance),
            None => match history {
                Some(workdir) => search_history(workdir, text, facts.dirty, config)?,
                None => {
                    tracing::warn!(
                        "tag {text:?} does not match {}, using it verbatim",
                        config.tag_regex().as_str()
                    );
                    Resolved::Tag(Tag::raw(text), facts.distance)
                }
            },
        },
    };

    let (tag, distance, untagged) = match resolved {
        Resolved::Tag(tag, distance) => (tag, distance, false),
        Resolved::Root(distance) => {
            let root = config.version_cls().construct(ROOT_TAG)?;
            (root, distance, true)
        }
    };

    let time = config.env().build_time();
    let node_date = if facts.dirty {
        time.date_naive()
    } else {
        facts.head_date.unwrap_or_else(|| time.date_naive())
    };

    let version = ScmVersion {
        tag,
        untagged,
        distance,
        node: facts.node,
        dirty: facts.dirty,
        branch: facts.branch,
        node_date,
        time,
        preformatted: None,
        tag_regex: config.tag_regex().clone(),
    };
    tracing::debug!("{version:?}");
    Ok(version)
}

/// Match `text` with the tag regex and construct the version value.
fn tag_from_text(text: &str, config: &Configuration) -> Option<Tag> {
    let matched = config.tag_regex().parse(text)?;
    if !matched.suffix.is_empty() {
        tracing::warn!(
            "tag {text:?} will be stripped of its suffix {:?}",
            matched.suffix
        );
    }
    match config.version_cls().construct(&matched.version) {
        Ok(tag) => Some(tag),
        Err(e) => {
            tracing::warn!("tag {text:?} is not a valid version: {e}");
            None
        }
    }
}

fn search_history(
    workdir: &dyn Workdir,
    rejected: &str,
    dirty: bool,
    config: &Configuration,
) -> Result<Resolved> {
    tracing::debug!("tag {rejected:?} is not a version, searching history");
    for commit in AncestorTags::new(workdir) {
        let commit = commit?;
        for text in &commit.tags {
            if let Some(tag) = tag_from_text(text, config) {
                let distance = workdir.distance_from(text)?;
                tracing::debug!("using tag {text:?} on {} at distance {distance}", commit.node);
                return Ok(Resolved::Tag(tag, exact_distance(distance, dirty)));
            }
        }
    }
    tracing::debug!("no usable tag in history");
    Ok(Resolved::Root(Some(workdir.count_all_nodes()?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{EnvSnapshot, SOURCE_DATE_EPOCH};

    fn config() -> Configuration {
        Configuration::new(".", EnvSnapshot::default()).unwrap()
    }

    fn facts(tag: &str, distance: Option<u32>, dirty: bool) -> RawFacts {
        RawFacts {
            tag: Some(tag.to_string()),
            distance,
            node: Some("gabc1234".to_string()),
            dirty,
            branch: Some("main".to_string()),
            head_date: NaiveDate::from_ymd_opt(2021, 5, 4),
        }
    }

    #[test]
    fn test_exact_distance() {
        assert_eq!(exact_distance(0, false), None);
        assert_eq!(exact_distance(0, true), Some(0));
        assert_eq!(exact_distance(3, false), Some(3));
    }

    #[test]
    fn test_matching_tag() {
        let v = normalize(facts("v1.2", Some(3), false), None, &config()).unwrap();
        assert_eq!(v.tag.to_string(), "1.2");
        assert_eq!(v.distance, Some(3));
        assert_eq!(v.node_date, NaiveDate::from_ymd_opt(2021, 5, 4).unwrap());
    }

    #[test]
    fn test_suffix_is_dropped() {
        let v = normalize(
            facts("version-0.2.post210+gbe48adfpost3+g0cc25f2", None, false),
            None,
            &config(),
        )
        .unwrap();
        assert_eq!(v.tag.to_string(), "0.2.post210");
    }

    #[test]
    fn test_unmatched_tag_without_history_is_kept_verbatim() {
        let v = normalize(facts("newstyle", None, false), None, &config()).unwrap();
        assert_eq!(v.tag, Tag::raw("newstyle"));
    }

    #[test]
    fn test_no_tag_uses_root() {
        let raw = RawFacts {
            distance: Some(0),
            ..RawFacts::default()
        };
        let v = normalize(raw, None, &config()).unwrap();
        assert_eq!(v.tag.to_string(), "0.0");
        assert_eq!(v.distance, Some(0));
        assert!(v.untagged);

        let tagged = normalize(facts("1.0", Some(0), true), None, &config()).unwrap();
        assert!(!tagged.untagged);
    }

    #[test]
    fn test_configured_tag_regex_is_carried() {
        let options = crate::config::Options {
            tag_regex: Some(r"^rel_(\d+\.\d+)$".to_string()),
            ..crate::config::Options::default()
        };
        let config = Configuration::from_options(options, EnvSnapshot::default()).unwrap();
        let v = normalize(facts("rel_1.2", Some(1), false), None, &config).unwrap();
        assert_eq!(v.tag.to_string(), "1.2");
        assert_eq!(v.tag_regex.as_str(), r"^rel_(\d+\.\d+)$");
    }

    #[test]
    fn test_dirty_tree_dates_from_build_clock() {
        let env = EnvSnapshot::from_vars([(SOURCE_DATE_EPOCH, "1234567890")]);
        let config = Configuration::new(".", env).unwrap();

        let dirty = normalize(facts("1.0", Some(1), true), None, &config).unwrap();
        assert_eq!(dirty.node_date, NaiveDate::from_ymd_opt(2009, 2, 13).unwrap());

        let mut clean = facts("1.0", Some(1), false);
        clean.head_date = None;
        let clean = normalize(clean, None, &config).unwrap();
        assert_eq!(clean.node_date, NaiveDate::from_ymd_opt(2009, 2, 13).unwrap());
    }
}
