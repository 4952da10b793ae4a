//! Version arithmetic for units and descriptor references.
//!
//! Descriptor versions are four-segment: `major.minor.micro.qualifier`,
//! where the qualifier is an arbitrary build-generated string. The literal
//! qualifier token `qualifier` is a placeholder meaning "any generated
//! qualifier of this base version" and is resolved by [`VersionQuery`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Qualifier placeholder token recognized in descriptor version strings.
pub const QUALIFIER_TOKEN: &str = "qualifier";

/// Errors raised while parsing a version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// A numeric segment could not be parsed
    #[error("Invalid version segment '{segment}' in '{input}'")]
    InvalidSegment { input: String, segment: String },

    /// A range string is not bracketed or has no separator
    #[error("Invalid version range '{0}'")]
    InvalidRange(String),

    /// The string was empty or had no numeric segments
    #[error("Empty version string")]
    Empty,
}

/// A four-segment version: `major.minor.micro[.qualifier]`.
///
/// Ordering compares the numeric segments first, then the qualifier as a
/// plain string. An absent qualifier sorts below any present qualifier,
/// matching the convention that `1.0.0` precedes every `1.0.0.*` build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub qualifier: Option<String>,
}

impl Version {
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: None,
        }
    }

    pub fn with_qualifier(major: u32, minor: u32, micro: u32, qualifier: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: Some(qualifier.into()),
        }
    }

    /// The all-zero version, which version specs treat as "unconstrained".
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.major == 0 && self.minor == 0 && self.micro == 0 && self.qualifier.is_none()
    }

    /// True when the qualifier segment is the literal placeholder token.
    pub fn has_qualifier_token(&self) -> bool {
        self.qualifier.as_deref() == Some(QUALIFIER_TOKEN)
    }

    /// Copy of this version without its qualifier segment.
    pub fn strip_qualifier(&self) -> Version {
        Version::new(self.major, self.minor, self.micro)
    }

    /// Smallest version strictly above every qualifier of this base
    /// version: the micro segment bumped by one, qualifier cleared.
    pub fn increment_micro(&self) -> Version {
        Version::new(self.major, self.minor, self.micro + 1)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| {
                let a = self.qualifier.as_deref().unwrap_or("");
                let b = other.qualifier.as_deref().unwrap_or("");
                a.cmp(b)
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if let Some(q) = &self.qualifier {
            write!(f, ".{}", q)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut numeric = [0u32; 3];
        let mut rest = trimmed;
        for (i, slot) in numeric.iter_mut().enumerate() {
            let (segment, tail) = match rest.split_once('.') {
                Some((seg, tail)) => (seg, tail),
                None => (rest, ""),
            };
            *slot = segment
                .parse()
                .map_err(|_| VersionError::InvalidSegment {
                    input: trimmed.to_string(),
                    segment: segment.to_string(),
                })?;
            rest = tail;
            if rest.is_empty() && i < 2 {
                // Short forms like "1" or "1.2" are legal; missing
                // segments default to zero.
                break;
            }
        }

        let qualifier = if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        };

        Ok(Version {
            major: numeric[0],
            minor: numeric[1],
            micro: numeric[2],
            qualifier,
        })
    }
}

/// A version range with inclusive or exclusive bounds. An absent upper
/// bound means the range is open above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: Version,
    pub include_min: bool,
    pub max: Option<Version>,
    pub include_max: bool,
}

impl VersionRange {
    pub fn new(min: Version, include_min: bool, max: Option<Version>, include_max: bool) -> Self {
        Self {
            min,
            include_min,
            max,
            include_max,
        }
    }

    /// The degenerate range `[v, v]` matching exactly one version.
    pub fn exact(version: Version) -> Self {
        Self {
            min: version.clone(),
            include_min: true,
            max: Some(version),
            include_max: true,
        }
    }

    /// `[0.0.0, ∞)`: matches every version.
    pub fn any() -> Self {
        Self {
            min: Version::zero(),
            include_min: true,
            max: None,
            include_max: false,
        }
    }

    pub fn includes(&self, version: &Version) -> bool {
        match version.cmp(&self.min) {
            Ordering::Less => return false,
            Ordering::Equal if !self.include_min => return false,
            _ => {}
        }
        if let Some(max) = &self.max {
            match version.cmp(max) {
                Ordering::Greater => return false,
                Ordering::Equal if !self.include_max => return false,
                _ => {}
            }
        }
        true
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || VersionError::InvalidRange(trimmed.to_string());
        let mut chars = trimmed.chars();
        let include_min = match chars.next() {
            Some('[') => true,
            Some('(') => false,
            _ => return Err(invalid()),
        };
        let include_max = match chars.next_back() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(invalid()),
        };
        let inner = chars.as_str();
        let (low, high) = inner.split_once(',').ok_or_else(invalid)?;
        let min: Version = low.trim().parse()?;
        let high = high.trim();
        let max = if high.is_empty() {
            None
        } else {
            Some(high.parse()?)
        };
        Ok(VersionRange {
            min,
            include_min,
            max,
            include_max,
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.include_min { '[' } else { '(' };
        match &self.max {
            Some(max) => {
                let close = if self.include_max { ']' } else { ')' };
                write!(f, "{}{},{}{}", open, self.min, max, close)
            }
            None => write!(f, "{}{},)", open, self.min),
        }
    }
}

/// How a descriptor version spec selects among available unit versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionQuery {
    /// Empty spec or the zero version: any version of the id matches.
    Any,
    /// Spec with the `qualifier` placeholder: any build qualifier of the
    /// same `major.minor.micro`.
    Range(VersionRange),
    /// A concrete version: exact single match.
    Exact(Version),
}

impl VersionQuery {
    /// Parse a descriptor version spec.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for specs that are present but not parseable as
    /// a version.
    pub fn parse(spec: &str) -> Result<Self, VersionError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Ok(VersionQuery::Any);
        }
        if trimmed.starts_with('[') || trimmed.starts_with('(') {
            return Ok(VersionQuery::Range(trimmed.parse()?));
        }
        let version: Version = trimmed.parse()?;
        if version.is_zero() {
            return Ok(VersionQuery::Any);
        }
        if version.has_qualifier_token() {
            let base = version.strip_qualifier();
            let upper = base.increment_micro();
            return Ok(VersionQuery::Range(VersionRange::new(
                base,
                true,
                Some(upper),
                false,
            )));
        }
        Ok(VersionQuery::Exact(version))
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionQuery::Any => true,
            VersionQuery::Range(range) => range.includes(version),
            VersionQuery::Exact(exact) => version == exact,
        }
    }
}
