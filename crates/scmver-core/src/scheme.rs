//! Version and local schemes.
//!
//! A version scheme guesses the next release from a [`ScmVersion`]; a local
//! scheme renders the `+...` suffix carrying node and date. Both are plain
//! function values, looked up by name once when the configuration is built.

use thiserror::Error;

use crate::scm_version::ScmVersion;

/// Errors raised while deriving the next version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemeError {
    /// No trailing number to increment.
    #[error(
        "{0} does not end with a number to bump, please correct or use a custom version scheme"
    )]
    NotBumpable(String),

    /// The tag already carries a non-zero `.devN` segment.
    #[error(
        "choosing custom numbers for the `.devX` distance is not supported; the {0} can't be bumped, please use a custom version scheme"
    )]
    CustomDevNumber(String),

    /// A dotted component is not an integer.
    #[error("{0} can't be parsed as numeric version")]
    NotNumeric(String),
}

/// Signature of a version scheme.
pub type VersionSchemeFn = fn(&ScmVersion) -> Result<String, SchemeError>;

/// Signature of a local scheme.
pub type LocalSchemeFn = fn(&ScmVersion) -> String;

/// Name of the local scheme that emits nothing, required by strict indexes.
pub const NO_LOCAL_VERSION: &str = "no-local-version";

const VERSION_SCHEMES: &[(&str, VersionSchemeFn)] = &[
    ("guess-next-dev", guess_next_dev_version),
    ("post-release", postrelease_version),
    ("no-guess-dev", no_guess_dev_version),
    ("python-simplified-semver", simplified_semver_version),
    ("release-branch-semver", release_branch_semver_version),
];

const LOCAL_SCHEMES: &[(&str, LocalSchemeFn)] = &[
    ("node-and-date", node_and_date),
    ("node-and-timestamp", node_and_timestamp),
    ("dirty-tag", dirty_tag),
    (NO_LOCAL_VERSION, no_local_version),
];

/// A named version scheme.
#[derive(Debug, Clone)]
pub struct VersionScheme {
    name: String,
    func: VersionSchemeFn,
}

impl VersionScheme {
    /// Look up a built-in scheme.
    pub fn by_name(name: &str) -> Option<Self> {
        VERSION_SCHEMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(n, func)| Self {
                name: (*n).to_string(),
                func: *func,
            })
    }

    /// Wrap a caller-supplied scheme.
    pub fn custom(name: impl Into<String>, func: VersionSchemeFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Names of the built-in schemes.
    pub fn names() -> impl Iterator<Item = &'static str> {
        VERSION_SCHEMES.iter().map(|(n, _)| *n)
    }

    /// The scheme's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the scheme.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemeError`] when the tag cannot be bumped.
    pub fn apply(&self, version: &ScmVersion) -> Result<String, SchemeError> {
        (self.func)(version)
    }
}

impl Default for VersionScheme {
    fn default() -> Self {
        Self::custom("guess-next-dev", guess_next_dev_version)
    }
}

/// A named local scheme.
#[derive(Debug, Clone)]
pub struct LocalScheme {
    name: String,
    func: LocalSchemeFn,
}

impl LocalScheme {
    /// Look up a built-in scheme.
    pub fn by_name(name: &str) -> Option<Self> {
        LOCAL_SCHEMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(n, func)| Self {
                name: (*n).to_string(),
                func: *func,
            })
    }

    /// Wrap a caller-supplied scheme.
    pub fn custom(name: impl Into<String>, func: LocalSchemeFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Names of the built-in schemes.
    pub fn names() -> impl Iterator<Item = &'static str> {
        LOCAL_SCHEMES.iter().map(|(n, _)| *n)
    }

    /// The scheme's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the scheme.
    pub fn apply(&self, version: &ScmVersion) -> String {
        (self.func)(version)
    }
}

impl Default for LocalScheme {
    fn default() -> Self {
        Self::custom("node-and-date", node_and_date)
    }
}

/// Render a version with the given schemes. Preformatted versions are
/// returned untouched.
///
/// # Errors
///
/// Propagates the version scheme's [`SchemeError`].
pub fn format_version(
    version: &ScmVersion,
    version_scheme: &VersionScheme,
    local_scheme: &LocalScheme,
) -> Result<String, SchemeError> {
    if let Some(text) = &version.preformatted {
        return Ok(text.clone());
    }
    let main = version_scheme.apply(version)?;
    let local = local_scheme.apply(version);
    tracing::debug!("version {main:?}, local {local:?}");
    Ok(main + &local)
}

fn strip_local(version: &str) -> &str {
    version.split_once('+').map_or(version, |(public, _)| public)
}

/// `.devN` counter: the distance, and at least 1 for a dirty tree on a
/// release tag so that uncommitted work never renders as the tag itself.
fn dev_number(version: &ScmVersion) -> u32 {
    match version.distance.unwrap_or(0) {
        0 if version.dirty && !version.untagged => 1,
        n => n,
    }
}

fn bump_dev(version: &str) -> Result<Option<String>, SchemeError> {
    let Some((prefix, tail)) = version.rsplit_once(".dev") else {
        return Ok(None);
    };
    if tail != "0" {
        return Err(SchemeError::CustomDevNumber(version.to_string()));
    }
    Ok(Some(prefix.to_string()))
}

fn bump_last_number(version: &str) -> Result<String, SchemeError> {
    let prefix = version.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &version[prefix.len()..];
    let n: u64 = digits
        .parse()
        .map_err(|_| SchemeError::NotBumpable(version.to_string()))?;
    let next = n
        .checked_add(1)
        .ok_or_else(|| SchemeError::NotBumpable(version.to_string()))?;
    Ok(format!("{prefix}{next}"))
}

/// Guess the release following `tag`: a pending `.dev0` release is finished,
/// otherwise the last number is incremented. A plain integer tag such as `1`
/// becomes `2`.
///
/// # Errors
///
/// Returns a [`SchemeError`] when nothing can be incremented.
pub fn guess_next_version(tag: &str) -> Result<String, SchemeError> {
    let public = strip_local(tag);
    match bump_dev(public)? {
        Some(finished) => Ok(finished),
        None => bump_last_number(public),
    }
}

fn simple_semver(tag: &str, retain: usize, increment: bool) -> Result<String, SchemeError> {
    let public = strip_local(tag);
    let mut parts = public
        .split('.')
        .take(retain)
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| SchemeError::NotNumeric(tag.to_string()))?;
    parts.resize(retain, 0);
    if increment {
        if let Some(last) = parts.last_mut() {
            *last = last
                .checked_add(1)
                .ok_or_else(|| SchemeError::NotBumpable(tag.to_string()))?;
        }
    }
    parts.resize(3, 0);
    Ok(semver::Version::new(parts[0], parts[1], parts[2]).to_string())
}

/// `guess-next-dev`: `1.0` three commits later is `1.1.dev3`.
///
/// # Errors
///
/// Returns a [`SchemeError`] when the tag cannot be bumped.
pub fn guess_next_dev_version(version: &ScmVersion) -> Result<String, SchemeError> {
    if version.exact() {
        return Ok(version.tag.to_string());
    }
    let guessed = guess_next_version(&version.tag.to_string())?;
    Ok(format!("{guessed}.dev{}", dev_number(version)))
}

/// `post-release`: `1.0` three commits later is `1.0.post3`.
///
/// # Errors
///
/// Never fails; the signature matches the other schemes.
pub fn postrelease_version(version: &ScmVersion) -> Result<String, SchemeError> {
    if version.exact() {
        return Ok(version.tag.to_string());
    }
    Ok(format!("{}.post{}", version.tag, dev_number(version)))
}

/// `no-guess-dev`: `1.0` three commits later is `1.0.post1.dev3`.
///
/// # Errors
///
/// Never fails; the signature matches the other schemes.
pub fn no_guess_dev_version(version: &ScmVersion) -> Result<String, SchemeError> {
    if version.exact() {
        return Ok(version.tag.to_string());
    }
    Ok(format!("{}.post1.dev{}", version.tag, dev_number(version)))
}

/// `python-simplified-semver`: bump the patch, or the minor on a branch whose
/// name contains `feature`.
///
/// # Errors
///
/// Returns [`SchemeError::NotNumeric`] for non-numeric components.
pub fn simplified_semver_version(version: &ScmVersion) -> Result<String, SchemeError> {
    if version.exact() {
        return Ok(version.tag.to_string());
    }
    let on_feature_branch = version
        .branch
        .as_deref()
        .is_some_and(|b| b.contains("feature"));
    let retain = if on_feature_branch { 2 } else { 3 };
    let guessed = simple_semver(&version.tag.to_string(), retain, true)?;
    Ok(format!("{guessed}.dev{}", dev_number(version)))
}

/// `release-branch-semver`: on a maintenance branch named after the tag's
/// `major.minor` (`release/1.2`), bump like `guess-next-dev`; anywhere else
/// bump the minor version.
///
/// # Errors
///
/// Returns a [`SchemeError`] when the tag cannot be bumped.
pub fn release_branch_semver_version(version: &ScmVersion) -> Result<String, SchemeError> {
    if version.exact() {
        return Ok(version.tag.to_string());
    }
    let tag = version.tag.to_string();
    let on_release_branch = version.branch.as_deref().is_some_and(|branch| {
        let leaf = branch.rsplit('/').next().unwrap_or(branch);
        version.tag_regex.parse(leaf).is_some_and(|m| {
            let branch_minor: Vec<&str> = m.version.split('.').take(2).collect();
            let tag_minor: Vec<&str> = tag.split('.').take(2).collect();
            branch_minor == tag_minor
        })
    });
    let guessed = if on_release_branch {
        guess_next_version(&tag)?
    } else {
        simple_semver(&tag, 2, true)?
    };
    Ok(format!("{guessed}.dev{}", dev_number(version)))
}

fn local_with_stamp(version: &ScmVersion, stamp: &str) -> String {
    match (&version.node, version.exact()) {
        (Some(node), false) if version.dirty => format!("+{node}.d{stamp}"),
        (Some(node), false) => format!("+{node}"),
        _ if version.dirty => format!("+d{stamp}"),
        _ => String::new(),
    }
}

/// `node-and-date`: `+g<node>` when clean, `+g<node>.d<YYYYMMDD>` when dirty,
/// `+d<YYYYMMDD>` when there is no node.
pub fn node_and_date(version: &ScmVersion) -> String {
    local_with_stamp(version, &version.node_date.format("%Y%m%d").to_string())
}

/// `node-and-timestamp`: like `node-and-date` with a full build timestamp.
pub fn node_and_timestamp(version: &ScmVersion) -> String {
    local_with_stamp(version, &version.time.format("%Y%m%d%H%M%S").to_string())
}

/// `dirty-tag`: `+dirty` for a dirty tree, nothing otherwise.
pub fn dirty_tag(version: &ScmVersion) -> String {
    version.format_choice("", "+dirty").to_string()
}

/// `no-local-version`: always empty.
pub fn no_local_version(_version: &ScmVersion) -> String {
    String::new()
}
