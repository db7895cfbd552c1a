//! Canonical references
//!
//! Format:
//! - Unversioned: `http://example.org/StructureDefinition/patient`
//! - Versioned: `http://example.org/StructureDefinition/patient|1.2.0`
//!
//! The `|` separator is the FHIR convention for pinning a canonical to a
//! business version. An absent version means "current", resolved at lookup time.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A canonical URL plus an optional version
///
/// Ordering is lexical on `url`, then `version` (unversioned first).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CanonicalKey {
    pub url: String,
    pub version: Option<String>,
}

impl CanonicalKey {
    /// Creates a key from its parts
    pub fn new(url: impl Into<String>, version: Option<String>) -> Self {
        Self {
            url: url.into(),
            version: version.filter(|v| !v.is_empty()),
        }
    }

    /// Parses a raw reference, splitting an optional `|version` suffix
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.split_once('|') {
            Some((url, version)) => Self::new(url, Some(version.to_string())),
            None => Self::new(raw, None),
        }
    }

    /// Returns true if an artifact declaring `url`/`version` satisfies this key
    ///
    /// An unversioned key matches any version; a versioned key requires an
    /// exact version match.
    pub fn matches(&self, url: &str, version: Option<&str>) -> bool {
        if self.url != url {
            return false;
        }
        match &self.version {
            None => true,
            Some(wanted) => version == Some(wanted.as_str()),
        }
    }

    /// Returns true if a version was pinned
    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}|{}", self.url, version),
            None => write!(f, "{}", self.url),
        }
    }
}

impl FromStr for CanonicalKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for CanonicalKey {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.to_string()
    }
}

/// Strips a `|version` suffix from a raw reference
pub fn strip_version(raw: &str) -> &str {
    match raw.split_once('|') {
        Some((url, _)) => url,
        None => raw,
    }
}

/// Compares two version strings segment by segment
///
/// Segments split on `.` and `-`; two numeric segments compare numerically,
/// anything else lexically. A version that is a prefix of the other sorts first.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '-']);
    let mut right = b.split(['.', '-']);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
