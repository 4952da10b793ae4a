//! Publishing action for category units.
//!
//! [`CategoriesAction`] runs the resolution engine against a run's
//! accumulated results, registers the generated category units as non-root
//! output and performs the stats-marking side pass. Recoverable findings
//! end up in the outcome's multi-status; the action itself fails only on
//! fatal conditions (a category nesting cycle).

use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use crate::diag::MultiStatus;
use crate::model::{PublisherResults, Unit, UnitPool};
use crate::publish::categories::{CategoryResolver, CategorySettings, ResolveError};
use crate::publish::lookup::{LayeredLookup, UnitLookup};
use crate::site::model::Site;

/// Errors from an artifact annotation attempt.
#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Annotation failed for '{unit_id}': {message}")]
    Failed { unit_id: String, message: String },
}

/// Mutable artifact-descriptor store consumed by the stats side pass.
/// Absence of an implementation is tolerated.
pub trait ArtifactAnnotator {
    /// Attaches a download-tracking marker to the unit's artifact
    /// descriptors.
    fn mark(&mut self, unit_id: &str, tag: &str) -> Result<(), AnnotateError>;
}

/// Errors that abort the publishing action.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Category resolution failed: {0}")]
    Resolve(#[from] ResolveError),
}

/// Timing and count figures for one action run.
#[derive(Debug, Default, Clone)]
pub struct ActionStats {
    pub resolution_duration_ms: u64,
    pub stats_pass_duration_ms: u64,
    pub units_published: usize,
}

/// Result of one publishing action run.
#[derive(Debug)]
pub struct ActionOutcome {
    /// Category units in resolution order, also registered as non-root
    /// entries of the run's results.
    pub units: Vec<Unit>,
    pub status: MultiStatus,
    pub stats: ActionStats,
}

impl ActionOutcome {
    /// Renders the outcome as one machine-readable JSON line.
    pub fn report_json(&self) -> String {
        serde_json::json!({
            "units_published": self.stats.units_published,
            "resolution_duration_ms": self.stats.resolution_duration_ms,
            "stats_pass_duration_ms": self.stats.stats_pass_duration_ms,
            "diagnostics": &self.status,
        })
        .to_string()
    }
}

/// Publishes the category units of one descriptor.
pub struct CategoriesAction {
    settings: CategorySettings,
}

impl CategoriesAction {
    pub fn new(settings: CategorySettings) -> Self {
        Self { settings }
    }

    /// Runs resolution and the stats side pass.
    ///
    /// `results` is the run's accumulated unit pool; generated category
    /// units are appended to it as non-root entries. `target` and
    /// `context` are the optional further lookup layers.
    ///
    /// # Errors
    ///
    /// Fails only on a category nesting cycle; every other finding is
    /// accumulated in the outcome's status.
    pub fn perform(
        &self,
        site: &Site,
        results: &mut PublisherResults,
        target: Option<&UnitPool>,
        context: Option<&UnitPool>,
        mut annotator: Option<&mut dyn ArtifactAnnotator>,
    ) -> Result<ActionOutcome, PublishError> {
        let mut status = MultiStatus::new();

        let resolution_start = Instant::now();
        let resolved = {
            let lookup = LayeredLookup::new(results, target, context);
            CategoryResolver::new(site, self.settings.clone()).resolve(&lookup)?
        };
        status.merge(resolved.status);

        for unit in &resolved.units {
            results.add_non_root(unit.clone());
        }
        let resolution_duration_ms = resolution_start.elapsed().as_millis() as u64;
        info!(
            units = resolved.units.len(),
            duration_ms = resolution_duration_ms,
            "Category resolution completed"
        );

        let stats_start = Instant::now();
        self.mark_tracked_refs(site, results, target, context, &mut annotator, &mut status);
        let stats_pass_duration_ms = stats_start.elapsed().as_millis() as u64;

        let stats = ActionStats {
            resolution_duration_ms,
            stats_pass_duration_ms,
            units_published: resolved.units.len(),
        };

        Ok(ActionOutcome {
            units: resolved.units,
            status,
            stats,
        })
    }

    /// Side pass: annotate every stats-tracked feature/bundle's units with
    /// a tracking marker. Soft failures only.
    fn mark_tracked_refs(
        &self,
        site: &Site,
        results: &PublisherResults,
        target: Option<&UnitPool>,
        context: Option<&UnitPool>,
        annotator: &mut Option<&mut dyn ArtifactAnnotator>,
        status: &mut MultiStatus,
    ) {
        let tracked: Vec<_> = site
            .stats_features
            .iter()
            .chain(&site.stats_bundles)
            .collect();
        if tracked.is_empty() {
            return;
        }

        let Some(annotator) = annotator.as_mut() else {
            status.warning(
                "missing-artifact-repository",
                "Download tracking requested but no artifact repository is available",
            );
            return;
        };

        let lookup = LayeredLookup::new(results, target, context);
        for site_ref in tracked {
            let Some(id) = &site_ref.id else {
                status.warning(
                    "unresolved-reference",
                    "Tracked reference without an id was skipped",
                );
                continue;
            };
            let units = lookup.lookup(id, &site_ref.version);
            if units.is_empty() {
                status.warning(
                    "unresolved-reference",
                    format!("Tracked reference '{}' matched no unit", id),
                );
                continue;
            }
            for unit in units {
                if let Err(err) = annotator.mark(&unit.id, id) {
                    warn!(unit = unit.id.as_str(), error = %err, "Tracking annotation failed");
                    status.warning("annotation-failed", err.to_string());
                }
            }
        }
    }
}
