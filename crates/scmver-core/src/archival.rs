//! `.hg_archival.txt` support for exported source trees.
//!
//! `hg archive` writes `key: value` lines describing the exported revision.
//! There is no history to walk, so an unmatched tag is kept verbatim.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::config::Configuration;
use crate::error::Result;
use crate::normalize::{RawFacts, exact_distance, normalize};
use crate::scm_version::ScmVersion;

/// Name of the metadata file `hg archive` writes.
pub const ARCHIVAL_FILE: &str = ".hg_archival.txt";

const NODE_LENGTH: usize = 12;

/// Parse `key: value` lines. Lines without a colon are ignored.
pub fn parse_archival(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Read the archival file in `dir`, if there is one.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] when the file exists but cannot be read.
pub fn read_archival(dir: &Path) -> Result<Option<BTreeMap<String, String>>> {
    match fs::read_to_string(dir.join(ARCHIVAL_FILE)) {
        Ok(text) => Ok(Some(parse_archival(&text))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Version of an archive: `tag` is exact, `latesttag` plus
/// `latesttagdistance` is a distance, and neither (or a `null` latest tag in
/// a repository without tags) means the root version.
///
/// # Errors
///
/// Propagates normalization errors.
pub fn archival_to_version(
    data: &BTreeMap<String, String>,
    config: &Configuration,
) -> Result<ScmVersion> {
    tracing::debug!("archival data {data:?}");
    let node = data
        .get("node")
        .filter(|n| !n.is_empty())
        .map(|n| format!("h{}", n.chars().take(NODE_LENGTH).collect::<String>()));

    let facts = if let Some(tag) = data.get("tag") {
        RawFacts {
            tag: Some(tag.clone()),
            ..RawFacts::default()
        }
    } else if let Some(tag) = data.get("latesttag").filter(|t| *t != "null") {
        let distance = data
            .get("latesttagdistance")
            .map_or(0, |d| match d.parse() {
                Ok(d) => d,
                Err(_) => {
                    tracing::warn!("ignoring invalid latesttagdistance {d:?}");
                    0
                }
            });
        RawFacts {
            tag: Some(tag.clone()),
            distance: exact_distance(distance, false),
            node,
            ..RawFacts::default()
        }
    } else {
        RawFacts {
            node,
            ..RawFacts::default()
        }
    };

    normalize(facts, None, config)
}
