//! Version ordering strategies used to pick a default version.

use std::cmp::Ordering;

/// Total order over version identifiers; the greatest is the newest.
pub trait VersionOrdering: Send + Sync {
    /// Compare two version identifiers.
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Plain byte-wise string ordering.
#[derive(Clone, Copy, Debug, Default)]
pub struct LexicographicOrdering;

impl VersionOrdering for LexicographicOrdering {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

/// Semantic-version-like ordering.
///
/// Accepts an optional `v`/`V` prefix followed by dot-separated numeric
/// components (`v2`, `1.10`, `2.0.1`) and an optional `-suffix` pre-release
/// tag. Components compare numerically, missing components count as zero,
/// and a pre-release ranks below the matching release. Identifiers that do
/// not parse rank below all parsable ones and compare lexicographically
/// among themselves.
#[derive(Clone, Copy, Debug, Default)]
pub struct SemverOrdering;

#[derive(Debug, PartialEq, Eq)]
struct ParsedVersion<'a> {
    components: Vec<u64>,
    pre: Option<&'a str>,
}

fn parse(id: &str) -> Option<ParsedVersion<'_>> {
    let rest = id
        .strip_prefix('v')
        .or_else(|| id.strip_prefix('V'))
        .unwrap_or(id);
    let (numbers, pre) = match rest.split_once('-') {
        Some((numbers, pre)) if !pre.is_empty() => (numbers, Some(pre)),
        Some(_) => return None,
        None => (rest, None),
    };

    let components = numbers
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse::<u64>().ok()
            }
        })
        .collect::<Option<Vec<_>>>()?;

    Some(ParsedVersion { components, pre })
}

fn compare_components(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl VersionOrdering for SemverOrdering {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        match (parse(a), parse(b)) {
            (Some(pa), Some(pb)) => compare_components(&pa.components, &pb.components)
                .then_with(|| match (pa.pre, pb.pre) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Greater,
                    (Some(_), None) => Ordering::Less,
                    (Some(x), Some(y)) => x.cmp(y),
                })
                .then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => a.cmp(b),
        }
    }
}
