//! Version types that tags are turned into.
//!
//! A version type needs exactly two capabilities: construction from the
//! version-bearing part of a tag, and rendering back to a display string.
//! [`Pep440Version`] normalizes (`v1.0` -> `1.0`, `17.33.0-rc` ->
//! `17.33.0rc0`), [`RawVersion`] keeps the text verbatim.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while turning tag text into a version value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The text is not a valid normalizable version.
    #[error("invalid version: {0:?}")]
    Invalid(String),
}

/// Minimal capability of a version type.
///
/// The set of version types is closed: [`VersionCls`] selects one of the
/// implementors below and [`Tag`] holds the result. A new version type needs
/// a `VersionCls` and a `Tag` variant; callers who only need different output
/// plug in a custom scheme instead
/// ([`crate::Configuration::with_version_scheme`]).
pub trait TagVersion: fmt::Display + Sized {
    /// Construct the version from the version-bearing part of a tag.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Invalid`] when the text cannot be represented.
    fn from_tag(tag: &str) -> Result<Self, VersionError>;
}

static PEP440: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*
        v?
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?P<pre>
            [-_.]?
            (?P<pre_l>alpha|beta|preview|pre|rc|a|b|c)
            [-_.]?
            (?P<pre_n>[0-9]+)?
        )?
        (?P<post>
            (?:-(?P<post_n1>[0-9]+))
            |
            (?:
                [-_.]?
                (?P<post_l>post|rev|r)
                [-_.]?
                (?P<post_n2>[0-9]+)?
            )
        )?
        (?P<dev>
            [-_.]?
            (?P<dev_l>dev)
            [-_.]?
            (?P<dev_n>[0-9]+)?
        )?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        \s*$",
    )
    .expect("PEP 440 pattern is valid")
});

/// Pre-release phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreRelease {
    /// Alpha (`a`, `alpha`).
    Alpha,
    /// Beta (`b`, `beta`).
    Beta,
    /// Release candidate (`rc`, `c`, `pre`, `preview`).
    Rc,
}

impl PreRelease {
    fn parse(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "a" | "alpha" => Self::Alpha,
            "b" | "beta" => Self::Beta,
            _ => Self::Rc,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Rc => "rc",
        }
    }
}

/// A normalized PEP 440 version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pep440Version {
    /// Epoch, omitted from the display when zero.
    pub epoch: u64,
    /// Release components (`1.2.3` -> `[1, 2, 3]`).
    pub release: Vec<u64>,
    /// Pre-release phase and number.
    pub pre: Option<(PreRelease, u64)>,
    /// Post-release number.
    pub post: Option<u64>,
    /// Development release number.
    pub dev: Option<u64>,
    /// Local segments, lowercased and dot-joined on display.
    pub local: Vec<String>,
}

fn number(m: Option<regex::Match<'_>>, text: &str) -> Result<u64, VersionError> {
    m.map_or(Ok(0), |m| {
        m.as_str()
            .parse()
            .map_err(|_| VersionError::Invalid(text.to_string()))
    })
}

impl TagVersion for Pep440Version {
    fn from_tag(tag: &str) -> Result<Self, VersionError> {
        let caps = PEP440
            .captures(tag)
            .ok_or_else(|| VersionError::Invalid(tag.to_string()))?;

        let release = caps["release"]
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::Invalid(tag.to_string()))?;

        let pre = match caps.name("pre_l") {
            Some(label) => Some((
                PreRelease::parse(label.as_str()),
                number(caps.name("pre_n"), tag)?,
            )),
            None => None,
        };

        let post = if caps.name("post").is_some() {
            Some(number(caps.name("post_n1").or(caps.name("post_n2")), tag)?)
        } else {
            None
        };

        let dev = if caps.name("dev").is_some() {
            Some(number(caps.name("dev_n"), tag)?)
        } else {
            None
        };

        let local = caps.name("local").map_or_else(Vec::new, |m| {
            m.as_str()
                .split(['-', '_', '.'])
                .map(|seg| match seg.parse::<u64>() {
                    Ok(n) => n.to_string(),
                    Err(_) => seg.to_ascii_lowercase(),
                })
                .collect()
        });

        Ok(Self {
            epoch: number(caps.name("epoch"), tag)?,
            release,
            pre,
            post,
            dev,
            local,
        })
    }
}

impl fmt::Display for Pep440Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        write!(f, "{}", release.join("."))?;
        if let Some((phase, n)) = self.pre {
            write!(f, "{}{n}", phase.as_str())?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{n}")?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{n}")?;
        }
        if !self.local.is_empty() {
            write!(f, "+{}", self.local.join("."))?;
        }
        Ok(())
    }
}

/// A version kept exactly as written in the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVersion(String);

impl TagVersion for RawVersion {
    fn from_tag(tag: &str) -> Result<Self, VersionError> {
        if tag.is_empty() {
            return Err(VersionError::Invalid(tag.to_string()));
        }
        Ok(Self(tag.to_string()))
    }
}

impl fmt::Display for RawVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which version type tags are parsed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionCls {
    /// [`Pep440Version`].
    #[default]
    Normalized,
    /// [`RawVersion`].
    NonNormalized,
}

impl VersionCls {
    /// Parse `text` with the selected version type.
    ///
    /// # Errors
    ///
    /// Propagates the version type's [`VersionError`].
    pub fn construct(self, text: &str) -> Result<Tag, VersionError> {
        match self {
            Self::Normalized => Pep440Version::from_tag(text).map(Tag::Normalized),
            Self::NonNormalized => RawVersion::from_tag(text).map(Tag::Raw),
        }
    }
}

/// The tag value stored in a [`crate::ScmVersion`]: a structured version or
/// raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// A normalized version.
    Normalized(Pep440Version),
    /// Verbatim text.
    Raw(RawVersion),
}

impl Tag {
    /// Wrap arbitrary text without validation.
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(RawVersion(text.into()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normalized(v) => v.fmt(f),
            Self::Raw(v) => v.fmt(f),
        }
    }
}
