//! Descriptor model produced by parsing `site.xml` / `category.xml`.
//!
//! Plain data entities without behavior beyond accessors and equality. The
//! model is owned by the [`Site`] that parsing produced; the resolution
//! engine borrows it read-only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A URL plus optional annotation text, used for descriptions and
/// associate-site entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntry {
    pub url: Option<String>,
    pub annotation: Option<String>,
}

impl UrlEntry {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.annotation.is_none()
    }
}

/// Whether a site reference names a feature or a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    Feature,
    Bundle,
}

/// A feature or bundle reference declared by the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRef {
    pub kind: RefKind,
    pub id: Option<String>,
    /// Version string; empty means unconstrained.
    pub version: String,
    pub url: Option<String>,
    pub os: Option<String>,
    pub ws: Option<String>,
    pub arch: Option<String>,
    pub nl: Option<String>,
    /// Names of the categories this ref belongs to.
    pub category_names: Vec<String>,
}

impl SiteRef {
    pub fn new(kind: RefKind) -> Self {
        Self {
            kind,
            id: None,
            version: String::new(),
            url: None,
            os: None,
            ws: None,
            arch: None,
            nl: None,
            category_names: Vec::new(),
        }
    }

    /// A ref with neither URL nor id+version cannot be resolved.
    pub fn is_valid(&self) -> bool {
        self.url.is_some() || (self.id.is_some() && !self.version.is_empty())
    }

    /// Explicit URL, or the update-site layout default derived from
    /// id and version.
    pub fn effective_url(&self) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        let id = self.id.as_ref()?;
        if self.version.is_empty() {
            return None;
        }
        let dir = match self.kind {
            RefKind::Feature => "features",
            RefKind::Bundle => "plugins",
        };
        Some(format!("{}/{}_{}.jar", dir, id, self.version))
    }

    /// LDAP-style environment filter built from the os/ws/arch/nl parts,
    /// or `None` when no part is set.
    pub fn environment_filter(&self) -> Option<String> {
        let mut clauses = Vec::new();
        for (key, value) in [
            ("os", &self.os),
            ("ws", &self.ws),
            ("arch", &self.arch),
            ("nl", &self.nl),
        ] {
            if let Some(value) = value {
                clauses.push(format!("({}={})", key, value));
            }
        }
        match clauses.len() {
            0 => None,
            1 => Some(clauses.remove(0)),
            _ => Some(format!("(&{})", clauses.concat())),
        }
    }
}

/// A unit reference, addressed either by exact id+range or by predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRef {
    pub id: Option<String>,
    /// Version range string; empty means unconstrained.
    pub range: String,
    pub query_type: Option<String>,
    pub query_expression: Option<String>,
    pub query_params: Vec<String>,
    pub category_names: Vec<String>,
}

impl UnitRef {
    pub fn has_identity(&self) -> bool {
        self.id.is_some()
    }

    pub fn has_query(&self) -> bool {
        self.query_expression.is_some()
    }

    /// Exactly one addressing mode must be populated.
    pub fn is_valid(&self) -> bool {
        self.has_identity() != self.has_query()
    }
}

/// Presentation/grouping construct. Identity is the case-insensitive name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Display label, optionally a `%key` translation reference.
    pub label: Option<String>,
    pub description: Option<UrlEntry>,
    /// Names of the categories this one is nested inside.
    pub nested_in: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            description: None,
            nested_in: Vec::new(),
        }
    }

    pub fn label_or_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for Category {}

/// Kind of a repository reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepositoryKind {
    Metadata,
    Artifact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub location: String,
    pub nickname: Option<String>,
    pub enabled: bool,
    pub kind: RepositoryKind,
}

/// Archive entry mapping a site-relative path to a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRef {
    pub path: String,
    pub url: String,
}

/// Root of a parsed descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    pub description: Option<UrlEntry>,
    /// Location-override URL from the root element.
    pub location_url: Option<String>,
    pub mirrors_url: Option<String>,
    pub digest_url: Option<String>,
    pub associate_sites_url: Option<String>,
    pub stats_url: Option<String>,

    pub features: Vec<SiteRef>,
    pub bundles: Vec<SiteRef>,
    pub units: Vec<UnitRef>,
    categories: Vec<Category>,

    pub associate_sites: Vec<UrlEntry>,
    pub repository_references: Vec<RepositoryReference>,
    pub archives: Vec<ArchiveRef>,

    /// Features and bundles flagged for download tracking.
    pub stats_features: Vec<SiteRef>,
    pub stats_bundles: Vec<SiteRef>,

    /// Per-locale translations: locale -> message key -> text.
    pub translations: HashMap<String, HashMap<String, String>>,
    /// Translatable `%key` message keys encountered while parsing.
    pub message_keys: Vec<String>,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category unless one with the same (case-insensitive) name
    /// already exists. Returns whether the category was added.
    pub fn add_category(&mut self, category: Category) -> bool {
        if self.category(&category.name).is_some() {
            return false;
        }
        self.categories.push(category);
        true
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Declared categories in declaration order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Adds the metadata/artifact reference pair for one descriptor entry.
    pub fn add_repository_reference(
        &mut self,
        location: String,
        nickname: Option<String>,
        enabled: bool,
    ) {
        for kind in [RepositoryKind::Metadata, RepositoryKind::Artifact] {
            self.repository_references.push(RepositoryReference {
                location: location.clone(),
                nickname: nickname.clone(),
                enabled,
                kind,
            });
        }
    }

    pub fn add_associate_site(&mut self, entry: UrlEntry) {
        self.associate_sites.push(entry);
    }

    pub fn add_translation(
        &mut self,
        locale: impl Into<String>,
        key: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.translations
            .entry(locale.into())
            .or_default()
            .insert(key.into(), text.into());
    }

    /// Records a `%key` message key if not seen before.
    pub fn record_message_key(&mut self, key: &str) {
        if !self.message_keys.iter().any(|k| k == key) {
            self.message_keys.push(key.to_string());
        }
    }

    /// Looks up the translation of `key` for `locale`. The empty locale
    /// holds the default messages.
    pub fn translate(&self, locale: &str, key: &str) -> Option<&str> {
        self.translations
            .get(locale)
            .and_then(|messages| messages.get(key))
            .map(String::as_str)
    }
}

/// Strips the `%` marker from a translatable label, if present.
pub fn translation_key(label: &str) -> Option<&str> {
    label.strip_prefix('%')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_validity() {
        let mut r = SiteRef::new(RefKind::Feature);
        assert!(!r.is_valid());
        r.url = Some("features/f.jar".to_string());
        assert!(r.is_valid());

        let mut r = SiteRef::new(RefKind::Bundle);
        r.id = Some("b".to_string());
        assert!(!r.is_valid());
        r.version = "1.0.0".to_string();
        assert!(r.is_valid());
    }

    #[test]
    fn test_default_url_layout() {
        let mut r = SiteRef::new(RefKind::Feature);
        r.id = Some("org.example.feature".to_string());
        r.version = "1.2.0".to_string();
        assert_eq!(
            r.effective_url().as_deref(),
            Some("features/org.example.feature_1.2.0.jar")
        );

        r.kind = RefKind::Bundle;
        assert_eq!(
            r.effective_url().as_deref(),
            Some("plugins/org.example.feature_1.2.0.jar")
        );

        r.url = Some("elsewhere/f.jar".to_string());
        assert_eq!(r.effective_url().as_deref(), Some("elsewhere/f.jar"));
    }

    #[test]
    fn test_environment_filter() {
        let mut r = SiteRef::new(RefKind::Feature);
        assert_eq!(r.environment_filter(), None);

        r.os = Some("linux".to_string());
        assert_eq!(r.environment_filter().as_deref(), Some("(os=linux)"));

        r.arch = Some("x86_64".to_string());
        assert_eq!(
            r.environment_filter().as_deref(),
            Some("(&(os=linux)(arch=x86_64))")
        );
    }

    #[test]
    fn test_unit_ref_addressing_modes() {
        let mut u = UnitRef::default();
        assert!(!u.is_valid());

        u.id = Some("a.unit".to_string());
        assert!(u.is_valid());

        u.query_expression = Some("properties[id] == $0".to_string());
        assert!(!u.is_valid());

        u.id = None;
        assert!(u.is_valid());
    }

    #[test]
    fn test_category_identity_case_insensitive() {
        let mut site = Site::new();
        assert!(site.add_category(Category::new("Tools")));
        assert!(!site.add_category(Category::new("tools")));
        assert_eq!(site.categories().len(), 1);
        assert!(site.category("TOOLS").is_some());
    }

    #[test]
    fn test_repository_reference_pair() {
        let mut site = Site::new();
        site.add_repository_reference("https://example.org/repo".to_string(), None, true);
        assert_eq!(site.repository_references.len(), 2);
        assert_eq!(site.repository_references[0].kind, RepositoryKind::Metadata);
        assert_eq!(site.repository_references[1].kind, RepositoryKind::Artifact);
    }

    #[test]
    fn test_message_keys_dedup() {
        let mut site = Site::new();
        site.record_message_key("category.label");
        site.record_message_key("category.label");
        assert_eq!(site.message_keys.len(), 1);
    }

    #[test]
    fn test_translation_key() {
        assert_eq!(translation_key("%key.name"), Some("key.name"));
        assert_eq!(translation_key("Plain label"), None);
    }
}
