//! Category resolution engine.
//!
//! Maps the features, bundles and unit references of a parsed [`Site`] to
//! their categories, orders categories so nested ones resolve before their
//! parents, assigns each generated category unit a deterministic
//! content-derived version and emits the units.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

use crate::diag::MultiStatus;
use crate::model::{
    ProvidedCapability, Requirement, Unit, PROP_DESCRIPTION, PROP_NAME,
    UNIT_IDENTITY_NAMESPACE, UNIT_LOCALIZATION_NAMESPACE,
};
use crate::publish::lookup::UnitLookup;
use crate::site::model::{translation_key, Category, Site};
use crate::version::Version;

/// Name of the synthetic category collecting refs without any category.
pub const DEFAULT_CATEGORY_NAME: &str = "Default";

/// Display label of the synthetic default category.
pub const DEFAULT_CATEGORY_LABEL: &str = "Uncategorized";

/// Fatal resolution failures.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Categories nest inside each other, directly or transitively
    #[error("Category nesting cycle involving '{0}'")]
    NestingCycle(String),
}

/// Configuration of one resolution run.
#[derive(Debug, Clone, Default)]
pub struct CategorySettings {
    /// Version used verbatim for every produced category unit; when its
    /// qualifier segment is the literal `qualifier` token, the generated
    /// suffix is substituted in its place.
    pub version_override: Option<Version>,

    /// Identifier prefix. `None` falls back to the descriptor location so
    /// unqualified sites do not collide in a shared repository; the empty
    /// string yields bare category names.
    pub id_qualifier: Option<String>,

    /// Location string of the descriptor, used as the identifier fallback.
    pub site_location: String,
}

/// Result of one resolution run.
#[derive(Debug)]
pub struct ResolvedCategories {
    /// Generated category units in resolution order.
    pub units: Vec<Unit>,
    /// Warnings gathered on the way (unresolved refs, unknown categories).
    pub status: MultiStatus,
}

/// Member key: sorted map keyed by `(id, version)` so every derived value
/// (suffix, requirement order) is deterministic.
type MemberSet = BTreeMap<(String, Version), Option<String>>;

/// Resolves the categories of one site against a unit lookup.
pub struct CategoryResolver<'a> {
    site: &'a Site,
    settings: CategorySettings,
    status: MultiStatus,
}

impl<'a> CategoryResolver<'a> {
    pub fn new(site: &'a Site, settings: CategorySettings) -> Self {
        Self {
            site,
            settings,
            status: MultiStatus::new(),
        }
    }

    /// Runs the full resolution.
    ///
    /// # Errors
    ///
    /// Fails only on a category nesting cycle. Everything else degrades to
    /// warnings in the returned status.
    pub fn resolve(mut self, lookup: &dyn UnitLookup) -> Result<ResolvedCategories, ResolveError> {
        // Declared categories in declaration order, then the synthetic
        // default so it participates in the ordering.
        let mut categories: Vec<Category> = self.site.categories().to_vec();
        let mut default_category = Category::new(DEFAULT_CATEGORY_NAME);
        default_category.label = Some(DEFAULT_CATEGORY_LABEL.to_string());
        categories.push(default_category);

        let mut memberships = self.collect_memberships(lookup);
        let children_of = self.nesting_children(&categories);
        let order = self.topological_order(&categories, &children_of)?;

        let mut produced: HashMap<String, Unit> = HashMap::new();
        let mut units = Vec::new();

        for index in order {
            let category = &categories[index];
            let key = normalize(&category.name);
            let mut members = memberships.remove(&key).unwrap_or_default();

            // Inject the generated unit of every already-resolved nested
            // child as an ordinary member.
            if let Some(children) = children_of.get(&key) {
                for child in children {
                    if let Some(child_unit) = produced.get(child) {
                        members.insert(
                            (child_unit.id.clone(), child_unit.version.clone()),
                            child_unit.filter.clone(),
                        );
                    }
                }
            }

            if members.is_empty() {
                debug!(category = category.name.as_str(), "Empty category skipped");
                continue;
            }

            let unit = self.build_category_unit(category, &members);
            produced.insert(key, unit.clone());
            units.push(unit);
        }

        Ok(ResolvedCategories {
            units,
            status: self.status,
        })
    }

    /// Step 1: category name -> member units, accumulated additively over
    /// every feature, bundle and unit reference.
    fn collect_memberships(&mut self, lookup: &dyn UnitLookup) -> HashMap<String, MemberSet> {
        let mut memberships: HashMap<String, MemberSet> = HashMap::new();
        let site = self.site;

        for site_ref in site.features.iter().chain(&site.bundles) {
            let units = match &site_ref.id {
                Some(id) => lookup.lookup(id, &site_ref.version),
                None => Vec::new(),
            };
            let label = site_ref
                .id
                .clone()
                .or_else(|| site_ref.url.clone())
                .unwrap_or_default();
            self.assign(&mut memberships, &label, &site_ref.category_names, units);
        }

        for unit_ref in &site.units {
            let units = if let Some(id) = &unit_ref.id {
                lookup.lookup(id, &unit_ref.range)
            } else if let Some(expression) = &unit_ref.query_expression {
                lookup.lookup_by_expression(
                    unit_ref.query_type.as_deref().unwrap_or_default(),
                    expression,
                    &unit_ref.query_params,
                )
            } else {
                Vec::new()
            };
            let label = unit_ref
                .id
                .clone()
                .or_else(|| unit_ref.query_expression.clone())
                .unwrap_or_default();
            self.assign(&mut memberships, &label, &unit_ref.category_names, units);
        }

        memberships
    }

    fn assign(
        &mut self,
        memberships: &mut HashMap<String, MemberSet>,
        ref_label: &str,
        category_names: &[String],
        units: Vec<Unit>,
    ) {
        if units.is_empty() {
            self.status.warning(
                "unresolved-reference",
                format!("Reference '{}' matched no unit and was dropped", ref_label),
            );
            return;
        }

        let mut targets: Vec<String> = Vec::new();
        if category_names.is_empty() {
            targets.push(normalize(DEFAULT_CATEGORY_NAME));
        } else {
            for name in category_names {
                if self.site.category(name).is_none() {
                    self.status.warning(
                        "unknown-category",
                        format!(
                            "Reference '{}' names undeclared category '{}'",
                            ref_label, name
                        ),
                    );
                    continue;
                }
                targets.push(normalize(name));
            }
        }

        for target in targets {
            let members = memberships.entry(target).or_default();
            for unit in &units {
                members.insert((unit.id.clone(), unit.version.clone()), unit.filter.clone());
            }
        }
    }

    /// Step 2: parent -> nested children map from each category's
    /// "nested inside" declarations.
    fn nesting_children(&mut self, categories: &[Category]) -> HashMap<String, Vec<String>> {
        let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
        for category in categories {
            for parent in &category.nested_in {
                if self.site.category(parent).is_none() {
                    self.status.warning(
                        "unknown-category",
                        format!(
                            "Category '{}' nests inside undeclared category '{}'",
                            category.name, parent
                        ),
                    );
                    continue;
                }
                children_of
                    .entry(normalize(parent))
                    .or_default()
                    .push(normalize(&category.name));
            }
        }
        children_of
    }

    /// Step 3: total order with children strictly before parents.
    /// Declaration order is the tiebreak for unrelated categories.
    fn topological_order(
        &self,
        categories: &[Category],
        children_of: &HashMap<String, Vec<String>>,
    ) -> Result<Vec<usize>, ResolveError> {
        let index_of: HashMap<String, usize> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (normalize(&c.name), i))
            .collect();

        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for index in 0..categories.len() {
            graph.add_node(index);
        }
        for (parent, children) in children_of {
            let Some(&parent_index) = index_of.get(parent) else {
                continue;
            };
            for child in children {
                if let Some(&child_index) = index_of.get(child) {
                    graph.add_edge(child_index, parent_index, ());
                }
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            ResolveError::NestingCycle(categories[cycle.node_id()].name.clone())
        })
    }

    /// Step 4: one synthetic unit for a non-empty category.
    fn build_category_unit(&self, category: &Category, members: &MemberSet) -> Unit {
        let version = self.category_version(members);
        let id = self.category_id(&category.name);

        let mut unit = Unit::new(id.clone(), version.clone());
        unit.singleton = true;
        unit.provided.push(ProvidedCapability::new(
            UNIT_IDENTITY_NAMESPACE,
            id,
            version,
        ));

        let label = category.label_or_name();
        unit.set_property(PROP_NAME, self.default_text(label));
        if let Some(description) = &category.description {
            if let Some(annotation) = &description.annotation {
                unit.set_property(PROP_DESCRIPTION, self.default_text(annotation));
            }
        }

        // Localized property variants plus one translation capability per
        // locale, in deterministic locale order.
        let mut locales: Vec<&String> = self.site.translations.keys().collect();
        locales.sort();
        for locale in locales {
            if locale.is_empty() {
                continue;
            }
            let mut translated = false;
            if let Some(key) = translation_key(label) {
                if let Some(text) = self.site.translate(locale, key) {
                    unit.set_property(format!("{}.{}", locale, PROP_NAME), text);
                    translated = true;
                }
            }
            if let Some(annotation) = category
                .description
                .as_ref()
                .and_then(|d| d.annotation.as_deref())
            {
                if let Some(key) = translation_key(annotation) {
                    if let Some(text) = self.site.translate(locale, key) {
                        unit.set_property(format!("{}.{}", locale, PROP_DESCRIPTION), text);
                        translated = true;
                    }
                }
            }
            if translated {
                unit.provided.push(ProvidedCapability::new(
                    UNIT_LOCALIZATION_NAMESPACE,
                    locale.clone(),
                    Version::new(1, 0, 0),
                ));
            }
        }

        for ((member_id, member_version), filter) in members {
            unit.requirements.push(Requirement::exact_pin(
                UNIT_IDENTITY_NAMESPACE,
                member_id.clone(),
                member_version.clone(),
                filter.clone(),
            ));
        }

        unit
    }

    /// Resolves a possibly-`%key` label against the default messages.
    fn default_text(&self, raw: &str) -> String {
        match translation_key(raw) {
            Some(key) => self
                .site
                .translate("", key)
                .unwrap_or(key)
                .to_string(),
            None => raw.to_string(),
        }
    }

    fn category_version(&self, members: &MemberSet) -> Version {
        match &self.settings.version_override {
            None => Version::with_qualifier(1, 0, 0, version_suffix(members)),
            Some(version) if version.has_qualifier_token() => Version {
                major: version.major,
                minor: version.minor,
                micro: version.micro,
                qualifier: Some(version_suffix(members)),
            },
            Some(version) => version.clone(),
        }
    }

    fn category_id(&self, name: &str) -> String {
        match &self.settings.id_qualifier {
            Some(qualifier) if qualifier.is_empty() => name.to_string(),
            Some(qualifier) => format!("{}.{}", qualifier, name),
            None => format!("{}.{}", self.settings.site_location, name),
        }
    }
}

/// Deterministic version suffix over the sorted member `(id, version)`
/// pairs: identical membership always yields the same suffix.
fn version_suffix(members: &MemberSet) -> String {
    let mut hasher = Sha256::new();
    for (id, version) in members.keys() {
        hasher.update(id.as_bytes());
        hasher.update(b"/");
        hasher.update(version.to_string().as_bytes());
        hasher.update(b"\n");
    }
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}
