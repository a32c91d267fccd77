//! The canonical inferred-version record.

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::TagRegex;
use crate::version::Tag;

/// Facts about a checkout, reconciled into one value that schemes format.
///
/// `distance` is `None` exactly when the checkout is the matched tag and is
/// clean. A checkout with no matching tag at all carries the root tag `0.0`
/// and `Some` distance, even when that distance is zero, and is marked
/// `untagged`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScmVersion {
    /// The matched tag, parsed with the configured version type.
    pub tag: Tag,
    /// No usable tag was found; `tag` is the root placeholder.
    pub untagged: bool,
    /// Commits since the tag; `None` for an exact, clean tag checkout.
    pub distance: Option<u32>,
    /// Abbreviated node id including its VCS marker (`g...` for git,
    /// `h...` for Mercurial).
    pub node: Option<String>,
    /// Tracked files have uncommitted modifications.
    pub dirty: bool,
    /// Current branch, when the backend knows it.
    pub branch: Option<String>,
    /// Calendar date used by date-carrying local schemes.
    pub node_date: NaiveDate,
    /// Build clock: `SOURCE_DATE_EPOCH` or the time of inference.
    pub time: DateTime<Utc>,
    /// A literal version that bypasses scheme computation.
    pub preformatted: Option<String>,
    /// The tag regex in effect, for schemes that read versions out of
    /// branch names.
    pub tag_regex: TagRegex,
}

impl ScmVersion {
    /// An exact, clean checkout of `tag`.
    pub fn new(tag: Tag, time: DateTime<Utc>) -> Self {
        Self {
            tag,
            untagged: false,
            distance: None,
            node: None,
            dirty: false,
            branch: None,
            node_date: time.date_naive(),
            time,
            preformatted: None,
            tag_regex: TagRegex::default(),
        }
    }

    /// A version that is already final, such as a fallback or pretend value.
    pub fn preformatted(text: impl Into<String>, time: DateTime<Utc>) -> Self {
        let text = text.into();
        Self {
            preformatted: Some(text.clone()),
            ..Self::new(Tag::raw(text), time)
        }
    }

    /// Whether the checkout is exactly the tag.
    pub fn exact(&self) -> bool {
        self.distance.is_none()
    }

    /// Pick `clean` or `dirty` depending on the working tree state.
    pub fn format_choice<'a>(&self, clean: &'a str, dirty: &'a str) -> &'a str {
        if self.dirty { dirty } else { clean }
    }
}
