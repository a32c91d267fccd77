//! Parser for `describe`-style output.
//!
//! Input looks like `<tag>-<distance>-g<node>[-dirty]`. Tags are free-form and
//! may contain dashes themselves (`17.33.0-rc`, `apache-arrow-0.11.1`), so the
//! string is split from the right.

/// Structural decomposition of a describe string. No validation beyond syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeResult {
    /// Tag text, possibly containing dashes.
    pub tag: String,
    /// Commits between the tag and the described revision.
    pub distance: u32,
    /// Abbreviated node id without the `g` marker; empty when absent.
    pub node: String,
    /// Whether the `-dirty` sentinel was present.
    pub dirty: bool,
}

const DIRTY_SUFFIX: &str = "-dirty";

/// Split a raw describe string into tag, distance, node and dirty flag.
///
/// When the `<distance>-g<node>` tail is missing (an exact tag described
/// without `--long`), the whole remainder is the tag with distance 0 and an
/// empty node.
///
/// ```
/// use scmver_core::describe::parse_describe;
///
/// let parsed = parse_describe("17.33.0-rc-17-g38c3047c0-dirty");
/// assert_eq!(parsed.tag, "17.33.0-rc");
/// assert_eq!(parsed.distance, 17);
/// assert_eq!(parsed.node, "38c3047c0");
/// assert!(parsed.dirty);
/// ```
pub fn parse_describe(raw: &str) -> DescribeResult {
    let raw = raw.trim();
    let (rest, dirty) = match raw.strip_suffix(DIRTY_SUFFIX) {
        Some(rest) => (rest, true),
        None => (raw, false),
    };

    let mut parts = rest.rsplitn(3, '-');
    let node_part = parts.next();
    let count_part = parts.next();
    let tag_part = parts.next();

    if let (Some(node_part), Some(count_part), Some(tag_part)) = (node_part, count_part, tag_part) {
        if let (Some(node), Ok(distance)) = (
            node_part.strip_prefix('g').filter(|n| is_hex(n)),
            count_part.parse::<u32>(),
        ) {
            return DescribeResult {
                tag: tag_part.to_string(),
                distance,
                node: node.to_string(),
                dirty,
            };
        }
    }

    DescribeResult {
        tag: rest.to_string(),
        distance: 0,
        node: String::new(),
        dirty,
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(tag: &str, distance: u32, node: &str, dirty: bool) -> DescribeResult {
        DescribeResult {
            tag: tag.to_string(),
            distance,
            node: node.to_string(),
            dirty,
        }
    }

    #[test]
    fn test_tags_with_dashes_split_from_the_right() {
        assert_eq!(
            parse_describe("3.3.1-rc26-0-g9df187b"),
            parsed("3.3.1-rc26", 0, "9df187b", false)
        );
        assert_eq!(
            parse_describe("17.33.0-rc-17-g38c3047c0"),
            parsed("17.33.0-rc", 17, "38c3047c0", false)
        );
        assert_eq!(
            parse_describe("apache-arrow-0.11.1-2-gdeadbee"),
            parsed("apache-arrow-0.11.1", 2, "deadbee", false)
        );
    }

    #[test]
    fn test_dirty_suffix() {
        assert_eq!(
            parse_describe("v1.0-3-gabc1234-dirty"),
            parsed("v1.0", 3, "abc1234", true)
        );
        assert_eq!(parse_describe("v1.0-dirty"), parsed("v1.0", 0, "", true));
    }

    #[test]
    fn test_exact_tag_without_long_form() {
        assert_eq!(parse_describe("1.0"), parsed("1.0", 0, "", false));
        assert_eq!(parse_describe("1.0-rc1"), parsed("1.0-rc1", 0, "", false));
        // a numeric-looking tail without the g marker is still part of the tag
        assert_eq!(parse_describe("release-2-10"), parsed("release-2-10", 0, "", false));
    }

    #[test]
    fn test_non_hex_marker_is_part_of_the_tag() {
        assert_eq!(
            parse_describe("foo-1-gamma"),
            parsed("foo-1-gamma", 0, "", false)
        );
    }

    #[test]
    fn test_trailing_newline_ignored() {
        assert_eq!(
            parse_describe("0.1-0-g1234567\n"),
            parsed("0.1", 0, "1234567", false)
        );
    }
}
