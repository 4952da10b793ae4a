use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::version::{Version, VersionQuery, VersionRange};

/// Capability namespace carrying unit identities.
pub const UNIT_IDENTITY_NAMESPACE: &str = "unit.id";

/// Capability namespace advertising available translations.
pub const UNIT_LOCALIZATION_NAMESPACE: &str = "unit.localization";

/// Property key for a unit's display name.
pub const PROP_NAME: &str = "name";

/// Property key for a unit's description text.
pub const PROP_DESCRIPTION: &str = "description";

/// A `(namespace, name, version)` fact a unit provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidedCapability {
    pub namespace: String,
    pub name: String,
    pub version: Version,
}

impl ProvidedCapability {
    pub fn new(namespace: &str, name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.into(),
            version,
        }
    }
}

/// A capability a unit needs, matched against provided capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub namespace: String,
    pub name: String,
    pub range: VersionRange,
    /// Environment filter restricting where the requirement applies.
    pub filter: Option<String>,
    pub min: u32,
    pub max: u32,
    pub greedy: bool,
}

impl Requirement {
    /// Optional, non-greedy requirement pinning `name` to exactly `version`.
    pub fn exact_pin(
        namespace: &str,
        name: impl Into<String>,
        version: Version,
        filter: Option<String>,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.into(),
            range: VersionRange::exact(version),
            filter,
            min: 0,
            max: 1,
            greedy: false,
        }
    }
}

/// Key of an artifact attached to a unit. Category units carry none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub classifier: String,
    pub id: String,
    pub version: Version,
}

/// A versioned, identified piece of installable metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub version: Version,
    pub singleton: bool,
    /// Environment filter of the unit itself.
    pub filter: Option<String>,
    pub properties: HashMap<String, String>,
    pub provided: Vec<ProvidedCapability>,
    pub requirements: Vec<Requirement>,
    pub artifacts: Vec<ArtifactKey>,
}

impl Unit {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            singleton: false,
            filter: None,
            properties: HashMap::new(),
            provided: Vec::new(),
            requirements: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }
}

/// Ordered, id-indexed collection of units.
///
/// Queries return matches sorted by descending version, so the first entry
/// is a deterministic pick for unconstrained lookups.
#[derive(Debug, Clone, Default)]
pub struct UnitPool {
    units: Vec<Unit>,
    by_id: HashMap<String, Vec<usize>>,
}

impl UnitPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, unit: Unit) {
        let index = self.units.len();
        self.by_id.entry(unit.id.clone()).or_default().push(index);
        self.units.push(unit);
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn query(&self, id: &str, query: &VersionQuery) -> Vec<&Unit> {
        let mut matches: Vec<&Unit> = match self.by_id.get(id) {
            Some(indices) => indices
                .iter()
                .map(|&i| &self.units[i])
                .filter(|u| query.matches(&u.version))
                .collect(),
            None => Vec::new(),
        };
        matches.sort_by(|a, b| b.version.cmp(&a.version));
        matches
    }
}

impl FromIterator<Unit> for UnitPool {
    fn from_iter<I: IntoIterator<Item = Unit>>(iter: I) -> Self {
        let mut pool = UnitPool::new();
        for unit in iter {
            pool.add(unit);
        }
        pool
    }
}

/// Units accumulated during one publishing run, split into root entries
/// (directly requested) and non-root entries (generated, e.g. categories).
#[derive(Debug, Clone, Default)]
pub struct PublisherResults {
    roots: UnitPool,
    non_roots: UnitPool,
}

impl PublisherResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, unit: Unit) {
        self.roots.add(unit);
    }

    pub fn add_non_root(&mut self, unit: Unit) {
        self.non_roots.add(unit);
    }

    pub fn roots(&self) -> &UnitPool {
        &self.roots
    }

    pub fn non_roots(&self) -> &UnitPool {
        &self.non_roots
    }

    /// Query across both pools, roots first.
    pub fn query(&self, id: &str, query: &VersionQuery) -> Vec<&Unit> {
        let mut matches = self.roots.query(id, query);
        matches.extend(self.non_roots.query(id, query));
        matches
    }
}
