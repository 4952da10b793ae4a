//! Unit lookup consumed by the resolution engine.

use tracing::warn;

use crate::model::{PublisherResults, Unit, UnitPool};
use crate::version::VersionQuery;

/// Resolves `(id, version_spec)` to concrete units.
///
/// The version spec follows descriptor semantics: empty or the zero
/// version matches any version of the id, a spec whose qualifier segment
/// is literally `qualifier` matches any build qualifier of the same base
/// version, anything else matches exactly one version. Matches come back
/// ordered by descending version so the first entry is a deterministic
/// pick.
pub trait UnitLookup {
    fn lookup(&self, id: &str, version_spec: &str) -> Vec<Unit>;

    /// Resolves a predicate-addressed unit reference. Predicate languages
    /// belong to the dependency resolver; implementations without one
    /// return no matches and the caller reports the reference unresolved.
    fn lookup_by_expression(
        &self,
        _query_type: &str,
        _expression: &str,
        _params: &[String],
    ) -> Vec<Unit> {
        Vec::new()
    }
}

/// Lookup over the layered sources of one publishing run, queried in
/// strict priority order, stopping at the first non-empty result:
/// 1. units already produced earlier in this run,
/// 2. the target metadata pool being populated,
/// 3. an optional external context pool.
pub struct LayeredLookup<'a> {
    results: &'a PublisherResults,
    target: Option<&'a UnitPool>,
    context: Option<&'a UnitPool>,
}

impl<'a> LayeredLookup<'a> {
    pub fn new(
        results: &'a PublisherResults,
        target: Option<&'a UnitPool>,
        context: Option<&'a UnitPool>,
    ) -> Self {
        Self {
            results,
            target,
            context,
        }
    }
}

impl UnitLookup for LayeredLookup<'_> {
    fn lookup(&self, id: &str, version_spec: &str) -> Vec<Unit> {
        let query = match VersionQuery::parse(version_spec) {
            Ok(query) => query,
            Err(err) => {
                warn!(id, version_spec, error = %err, "Unparseable version spec");
                return Vec::new();
            }
        };

        let produced = self.results.query(id, &query);
        if !produced.is_empty() {
            return produced.into_iter().cloned().collect();
        }
        if let Some(target) = self.target {
            let matches = target.query(id, &query);
            if !matches.is_empty() {
                return matches.into_iter().cloned().collect();
            }
        }
        if let Some(context) = self.context {
            let matches = context.query(id, &query);
            if !matches.is_empty() {
                return matches.into_iter().cloned().collect();
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn unit(id: &str, version: &str) -> Unit {
        Unit::new(id, version.parse().unwrap())
    }

    #[test]
    fn test_layer_priority() {
        let mut results = PublisherResults::new();
        results.add_root(unit("f", "1.0.0"));
        let target: UnitPool = vec![unit("f", "2.0.0"), unit("g", "1.0.0")]
            .into_iter()
            .collect();
        let context: UnitPool = vec![unit("g", "3.0.0"), unit("h", "1.0.0")]
            .into_iter()
            .collect();
        let lookup = LayeredLookup::new(&results, Some(&target), Some(&context));

        // The run's own results shadow the target pool.
        let f = lookup.lookup("f", "");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].version, Version::new(1, 0, 0));

        // Falls through to the target, then to the context.
        assert_eq!(lookup.lookup("g", "")[0].version, Version::new(1, 0, 0));
        assert_eq!(lookup.lookup("h", "")[0].version, Version::new(1, 0, 0));
        assert!(lookup.lookup("missing", "").is_empty());
    }

    #[test]
    fn test_exact_spec() {
        let results = PublisherResults::new();
        let target: UnitPool = vec![unit("f", "1.0.0"), unit("f", "1.0.1")]
            .into_iter()
            .collect();
        let lookup = LayeredLookup::new(&results, Some(&target), None);

        let matches = lookup.lookup("f", "1.0.1");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].version, Version::new(1, 0, 1));
        assert!(lookup.lookup("f", "9.9.9").is_empty());
    }

    #[test]
    fn test_qualifier_spec_matches_generated_builds() {
        let results = PublisherResults::new();
        let target: UnitPool = vec![unit("f", "1.0.0.v20240301"), unit("f", "1.0.1")]
            .into_iter()
            .collect();
        let lookup = LayeredLookup::new(&results, Some(&target), None);

        let matches = lookup.lookup("f", "1.0.0.qualifier");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].version.qualifier.as_deref(), Some("v20240301"));
    }

    #[test]
    fn test_unconstrained_pick_is_highest() {
        let results = PublisherResults::new();
        let target: UnitPool = vec![unit("f", "1.0.0"), unit("f", "1.2.0"), unit("f", "1.1.0")]
            .into_iter()
            .collect();
        let lookup = LayeredLookup::new(&results, Some(&target), None);

        let matches = lookup.lookup("f", "0.0.0");
        assert_eq!(matches[0].version, Version::new(1, 2, 0));
    }

    #[test]
    fn test_unparseable_spec_is_empty() {
        let results = PublisherResults::new();
        let lookup = LayeredLookup::new(&results, None, None);
        assert!(lookup.lookup("f", "not-a-version").is_empty());
    }
}
