//! Caller options and the resolved, immutable configuration.
//!
//! [`Options`] is what a user writes (TOML file or command-line flags), every
//! field optional. [`Configuration::from_options`] validates it once: the tag
//! regex is compiled, scheme names are looked up and the root is made
//! absolute. Nothing changes after that.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::env::EnvSnapshot;
use crate::scheme::{LocalScheme, VersionScheme};
use crate::version::VersionCls;
use crate::workdir::ShallowPolicy;

/// Default tag pattern: an optional `name-` prefix, an optional `v`, one to
/// three dotted numbers with any non-`+` tail, and an optional `+local` part
/// that is dropped.
pub const DEFAULT_TAG_REGEX: &str =
    r"^(?:[\w-]+-)?(?P<version>[vV]?\d+(?:\.\d+){0,2}[^\+]*)(?:\+.*)?$";

/// Glob handed to `describe --match` by default: any tag containing a digit.
pub const DEFAULT_DESCRIBE_MATCH: &str = "*[0-9]*";

/// Errors in caller-supplied options.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The tag regex failed to compile or has no usable group.
    #[error("invalid tag regex {pattern:?}: {reason}")]
    TagRegex {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A scheme name is not in the registry.
    #[error("unknown {kind} scheme {name:?} (available: {available})")]
    UnknownScheme {
        /// `version` or `local`.
        kind: &'static str,
        /// The name that was asked for.
        name: String,
        /// Comma separated list of registered names.
        available: String,
    },

    /// `normalize = false` together with an explicit `version_cls`.
    #[error("`normalize = false` and `version_cls` can't be used together")]
    NormalizeConflict,

    /// The root could not be made absolute.
    #[error("cannot resolve root {}: {source}", path.display())]
    Root {
        /// The root as given.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The options file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The options file is not valid TOML or has wrongly typed values.
    #[error("failed to parse options: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A compiled tag regex and the group that carries the version.
#[derive(Debug, Clone)]
pub struct TagRegex {
    regex: Regex,
    group: usize,
}

/// Result of matching a tag against a [`TagRegex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    /// The version-bearing part.
    pub version: String,
    /// Text before the version group.
    pub prefix: String,
    /// Text after the version group, dropped with a warning.
    pub suffix: String,
}

impl TagRegex {
    /// Compile `pattern`. It must contain a `version` named group or exactly
    /// one capture group.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TagRegex`] for invalid patterns.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::TagRegex {
            pattern: pattern.to_string(),
            reason,
        };
        let regex = Regex::new(pattern).map_err(|e| invalid(e.to_string()))?;
        let named = regex
            .capture_names()
            .position(|name| name == Some("version"));
        let group = match (named, regex.captures_len()) {
            (Some(index), _) => index,
            (None, 2) => 1,
            (None, _) => {
                return Err(invalid(
                    "expected a group named 'version' or exactly one capture group".to_string(),
                ));
            }
        };
        Ok(Self { regex, group })
    }

    /// The pattern source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Match `tag` from its first character. Returns `None` when the pattern
    /// does not match there or the version group is empty.
    pub fn parse(&self, tag: &str) -> Option<TagMatch> {
        let caps = self.regex.captures(tag)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 {
            return None;
        }
        let version = caps.get(self.group).filter(|m| !m.is_empty())?;
        Some(TagMatch {
            version: version.as_str().to_string(),
            prefix: tag[..version.start()].to_string(),
            suffix: tag[version.end()..whole.end()].to_string(),
        })
    }
}

static DEFAULT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_TAG_REGEX).expect("default tag regex is valid"));

impl PartialEq for TagRegex {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str() && self.group == other.group
    }
}

impl Eq for TagRegex {}

impl Default for TagRegex {
    fn default() -> Self {
        Self {
            regex: DEFAULT_REGEX.clone(),
            group: 1,
        }
    }
}

/// Caller-facing options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Directory to infer from (default `.`).
    pub root: Option<PathBuf>,
    /// File whose directory anchors a relative `root`.
    #[serde(alias = "relative-to")]
    pub relative_to: Option<PathBuf>,
    /// Pattern extracting the version from a tag.
    #[serde(alias = "tag-regex")]
    pub tag_regex: Option<String>,
    /// Version scheme name.
    #[serde(alias = "version-scheme")]
    pub version_scheme: Option<String>,
    /// Local scheme name.
    #[serde(alias = "local-scheme")]
    pub local_scheme: Option<String>,
    /// `false` selects the non-normalizing version type.
    pub normalize: Option<bool>,
    /// Explicit version type.
    #[serde(alias = "version-cls")]
    pub version_cls: Option<VersionCls>,
    /// Version used when no checkout is found.
    #[serde(alias = "fallback-version")]
    pub fallback_version: Option<String>,
    /// Shallow-clone policy.
    pub parse: Option<ShallowPolicy>,
    /// Also try every ancestor of the root.
    #[serde(alias = "search-parent-directories")]
    pub search_parent_directories: Option<bool>,
    /// Glob restricting which tags describe considers.
    #[serde(alias = "describe-match")]
    pub describe_match: Option<String>,
}

impl Options {
    /// Read options from a TOML file: the `[tool.scmver]` table when present,
    /// the top level otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse options from TOML text. See [`Options::from_toml_file`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or mistyped values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        let section = table
            .get("tool")
            .and_then(|tool| tool.get("scmver"))
            .cloned();
        match section {
            Some(section) => Ok(section.try_into()?),
            None if table.contains_key("tool") => Ok(Self::default()),
            None => Ok(toml::Value::Table(table).try_into()?),
        }
    }

    /// Overlay `other` on top of `self`: fields set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            root: other.root.or(self.root),
            relative_to: other.relative_to.or(self.relative_to),
            tag_regex: other.tag_regex.or(self.tag_regex),
            version_scheme: other.version_scheme.or(self.version_scheme),
            local_scheme: other.local_scheme.or(self.local_scheme),
            normalize: other.normalize.or(self.normalize),
            version_cls: other.version_cls.or(self.version_cls),
            fallback_version: other.fallback_version.or(self.fallback_version),
            parse: other.parse.or(self.parse),
            search_parent_directories: other
                .search_parent_directories
                .or(self.search_parent_directories),
            describe_match: other.describe_match.or(self.describe_match),
        }
    }
}

/// Fully resolved inference settings.
#[derive(Debug, Clone)]
pub struct Configuration {
    root: PathBuf,
    tag_regex: TagRegex,
    version_cls: VersionCls,
    version_scheme: VersionScheme,
    local_scheme: LocalScheme,
    fallback_version: Option<String>,
    shallow_policy: ShallowPolicy,
    search_parent_directories: bool,
    describe_match: String,
    env: EnvSnapshot,
}

fn unknown_scheme(kind: &'static str, name: &str, names: impl Iterator<Item = &'static str>) -> ConfigError {
    ConfigError::UnknownScheme {
        kind,
        name: name.to_string(),
        available: names.collect::<Vec<_>>().join(", "),
    }
}

impl Configuration {
    /// Defaults for `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Root`] when `root` is relative and the current
    /// directory is unavailable.
    pub fn new(root: impl Into<PathBuf>, env: EnvSnapshot) -> Result<Self, ConfigError> {
        Self::from_options(
            Options {
                root: Some(root.into()),
                ..Options::default()
            },
            env,
        )
    }

    /// Validate and resolve `options`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a bad tag regex, an unknown scheme name,
    /// conflicting normalization options or an unresolvable root.
    pub fn from_options(options: Options, env: EnvSnapshot) -> Result<Self, ConfigError> {
        let tag_regex = match options.tag_regex.as_deref() {
            Some(pattern) => TagRegex::new(pattern)?,
            None => TagRegex::default(),
        };

        let version_scheme = match options.version_scheme.as_deref() {
            Some(name) => VersionScheme::by_name(name)
                .ok_or_else(|| unknown_scheme("version", name, VersionScheme::names()))?,
            None => VersionScheme::default(),
        };
        let local_scheme = match options.local_scheme.as_deref() {
            Some(name) => LocalScheme::by_name(name)
                .ok_or_else(|| unknown_scheme("local", name, LocalScheme::names()))?,
            None => LocalScheme::default(),
        };

        let version_cls = match (options.normalize, options.version_cls) {
            (Some(false), Some(_)) => return Err(ConfigError::NormalizeConflict),
            (Some(false), None) => VersionCls::NonNormalized,
            (_, cls) => cls.unwrap_or_default(),
        };

        let root = resolve_root(
            options.root.as_deref().unwrap_or(Path::new(".")),
            options.relative_to.as_deref(),
        )?;

        Ok(Self {
            root,
            tag_regex,
            version_cls,
            version_scheme,
            local_scheme,
            fallback_version: options.fallback_version,
            shallow_policy: options.parse.unwrap_or_default(),
            search_parent_directories: options.search_parent_directories.unwrap_or(false),
            describe_match: options
                .describe_match
                .unwrap_or_else(|| DEFAULT_DESCRIBE_MATCH.to_string()),
            env,
        })
    }

    /// Replace the version scheme, typically with [`VersionScheme::custom`].
    #[must_use]
    pub fn with_version_scheme(self, version_scheme: VersionScheme) -> Self {
        Self {
            version_scheme,
            ..self
        }
    }

    /// Replace the local scheme, typically with [`LocalScheme::custom`].
    #[must_use]
    pub fn with_local_scheme(self, local_scheme: LocalScheme) -> Self {
        Self {
            local_scheme,
            ..self
        }
    }

    /// Absolute directory inference starts from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compiled tag regex.
    pub fn tag_regex(&self) -> &TagRegex {
        &self.tag_regex
    }

    /// Version type tags are parsed with.
    pub fn version_cls(&self) -> VersionCls {
        self.version_cls
    }

    /// Selected version scheme.
    pub fn version_scheme(&self) -> &VersionScheme {
        &self.version_scheme
    }

    /// Selected local scheme.
    pub fn local_scheme(&self) -> &LocalScheme {
        &self.local_scheme
    }

    /// Version used when nothing is found.
    pub fn fallback_version(&self) -> Option<&str> {
        self.fallback_version.as_deref()
    }

    /// What to do with shallow clones.
    pub fn shallow_policy(&self) -> ShallowPolicy {
        self.shallow_policy
    }

    /// Whether ancestors of the root are tried too.
    pub fn search_parent_directories(&self) -> bool {
        self.search_parent_directories
    }

    /// Glob handed to describe.
    pub fn describe_match(&self) -> &str {
        &self.describe_match
    }

    /// Environment snapshot used for child processes and the build clock.
    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }
}

fn resolve_root(root: &Path, relative_to: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let joined = match relative_to {
        Some(anchor) if root.is_relative() => {
            let base = if anchor.is_dir() {
                anchor
            } else {
                anchor.parent().unwrap_or(Path::new("."))
            };
            base.join(root)
        }
        _ => root.to_path_buf(),
    };
    std::path::absolute(&joined).map_err(|source| ConfigError::Root {
        path: joined.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tag_regex() {
        let regex = TagRegex::default();
        let version = |tag: &str| regex.parse(tag).map(|m| m.version);

        assert_eq!(version("v1.0").as_deref(), Some("v1.0"));
        assert_eq!(version("1.0").as_deref(), Some("1.0"));
        assert_eq!(version("release-1.2.2").as_deref(), Some("1.2.2"));
        assert_eq!(version("apache-arrow-0.11.1").as_deref(), Some("0.11.1"));
        assert_eq!(version("17.33.0-rc").as_deref(), Some("17.33.0-rc"));
        assert_eq!(version("apache-arrow-1").as_deref(), Some("1"));
        assert_eq!(version("newstyle-development-started"), None);
    }

    #[test]
    fn test_suffix_after_plus_is_reported() {
        let m = TagRegex::default()
            .parse("version-0.2.post210+gbe48adfpost3+g0cc25f2")
            .unwrap();
        assert_eq!(m.version, "0.2.post210");
        assert_eq!(m.prefix, "version-");
        assert_eq!(m.suffix, "+gbe48adfpost3+g0cc25f2");
    }

    #[test]
    fn test_custom_tag_regex_groups() {
        let single = TagRegex::new(r"^rel_(\d+\.\d+)$").unwrap();
        assert_eq!(single.parse("rel_2.5").unwrap().version, "2.5");
        assert!(single.parse("xrel_2.5").is_none());

        let named = TagRegex::new(r"^(?P<name>\w+)@(?P<version>[\d.]+)$").unwrap();
        assert_eq!(named.parse("pkg@3.1").unwrap().version, "3.1");

        assert!(matches!(
            TagRegex::new(r"^(\w+)-(\d+)$"),
            Err(ConfigError::TagRegex { .. })
        ));
        assert!(matches!(
            TagRegex::new(r"^([$"),
            Err(ConfigError::TagRegex { .. })
        ));
    }

    #[test]
    fn test_unknown_scheme_is_a_config_error() {
        let options = Options {
            version_scheme: Some("guess-next-whatever".to_string()),
            ..Options::default()
        };
        let err = Configuration::from_options(options, EnvSnapshot::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScheme { kind: "version", .. }));
        assert!(err.to_string().contains("guess-next-dev"));

        let options = Options {
            local_scheme: Some("nope".to_string()),
            ..Options::default()
        };
        assert!(Configuration::from_options(options, EnvSnapshot::default()).is_err());
    }

    #[test]
    fn test_normalize_conflict() {
        let options = Options {
            normalize: Some(false),
            version_cls: Some(VersionCls::Normalized),
            ..Options::default()
        };
        assert!(matches!(
            Configuration::from_options(options, EnvSnapshot::default()),
            Err(ConfigError::NormalizeConflict)
        ));

        let options = Options {
            normalize: Some(false),
            ..Options::default()
        };
        let config = Configuration::from_options(options, EnvSnapshot::default()).unwrap();
        assert_eq!(config.version_cls(), VersionCls::NonNormalized);
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::new(dir.path(), EnvSnapshot::default()).unwrap();
        assert_eq!(config.root(), dir.path());
        assert_eq!(config.version_scheme().name(), "guess-next-dev");
        assert_eq!(config.local_scheme().name(), "node-and-date");
        assert_eq!(config.shallow_policy(), ShallowPolicy::Warn);
        assert_eq!(config.describe_match(), DEFAULT_DESCRIBE_MATCH);
        assert!(!config.search_parent_directories());
        assert!(config.fallback_version().is_none());
    }

    #[test]
    fn test_root_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let anchor = dir.path().join("pyproject.toml");
        fs::write(&anchor, "").unwrap();

        let options = Options {
            root: Some(PathBuf::from("sub")),
            relative_to: Some(anchor),
            ..Options::default()
        };
        let config = Configuration::from_options(options, EnvSnapshot::default()).unwrap();
        assert_eq!(config.root(), dir.path().join("sub"));
    }

    #[test]
    fn test_options_from_pyproject_table() {
        let options = Options::from_toml_str(
            r#"
            [project]
            name = "demo"

            [tool.scmver]
            version_scheme = "post-release"
            local-scheme = "no-local-version"
            parse = "fail_on_shallow"
            version_cls = "non-normalized"
            "#,
        )
        .unwrap();
        assert_eq!(options.version_scheme.as_deref(), Some("post-release"));
        assert_eq!(options.local_scheme.as_deref(), Some("no-local-version"));
        assert_eq!(options.parse, Some(ShallowPolicy::Fail));
        assert_eq!(options.version_cls, Some(VersionCls::NonNormalized));
    }

    #[test]
    fn test_options_from_dedicated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scmver.toml");
        fs::write(&path, "fallback_version = \"0.0.1\"\nsearch_parent_directories = true\n").unwrap();

        let options = Options::from_toml_file(&path).unwrap();
        assert_eq!(options.fallback_version.as_deref(), Some("0.0.1"));
        assert_eq!(options.search_parent_directories, Some(true));

        let other_tool = Options::from_toml_str("[tool.black]\nline-length = 88\n").unwrap();
        assert_eq!(other_tool, Options::default());

        assert!(matches!(
            Options::from_toml_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
        assert!(matches!(
            Options::from_toml_str("normalize = \"maybe\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_merge_prefers_overlay() {
        let base = Options {
            version_scheme: Some("post-release".to_string()),
            fallback_version: Some("1.0".to_string()),
            ..Options::default()
        };
        let overlay = Options {
            version_scheme: Some("no-guess-dev".to_string()),
            ..Options::default()
        };
        let merged = base.merge(overlay);
        assert_eq!(merged.version_scheme.as_deref(), Some("no-guess-dev"));
        assert_eq!(merged.fallback_version.as_deref(), Some("1.0"));
    }
}
