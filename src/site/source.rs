//! Descriptor loading and caching.
//!
//! [`SiteDescriptorSource`] loads a [`Site`] from a location through a
//! [`DescriptorTransport`] (the out-of-scope network collaborator), caching
//! by location identity and recording a content checksum for downstream
//! change detection. Concurrent loads of one location collapse into a
//! single fetch; different locations proceed independently.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::diag::MultiStatus;
use crate::site::dialects::DialectGrammar;
use crate::site::model::Site;
use crate::site::parser::{parse_site, ParseError};

/// Errors from the descriptor transport collaborator.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The resource does not exist at the location
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Any other retrieval failure
    #[error("Transport failed for '{location}': {message}")]
    Failed { location: String, message: String },

    /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Retrieves raw descriptor bytes for a location.
///
/// Implementations must distinguish a missing resource
/// ([`TransportError::NotFound`]) from other failures; callers rely on the
/// difference.
#[async_trait]
pub trait DescriptorTransport: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, TransportError>;
}

/// Errors raised while loading a descriptor.
#[derive(Error, Debug)]
pub enum SourceError {
    /// No descriptor exists at the location
    #[error("Descriptor not found at '{0}'")]
    NotFound(String),

    /// The transport failed for a reason other than absence
    #[error("Transport failure: {0}")]
    Transport(TransportError),

    /// The resource exists but is not a parseable descriptor
    #[error("Malformed descriptor at '{location}': {source}")]
    Malformed {
        location: String,
        #[source]
        source: ParseError,
    },
}

/// A cached, parsed descriptor.
#[derive(Debug)]
pub struct LoadedSite {
    pub location: String,
    pub site: Site,
    /// SHA-256 over the raw descriptor bytes, hex encoded.
    pub checksum: String,
    /// Recoverable findings gathered while parsing.
    pub status: MultiStatus,
}

/// One feature known to the site, as enumerated via the digest fast path
/// or by reading each feature descriptor's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureEntry {
    pub id: String,
    pub version: String,
    pub label: Option<String>,
}

/// Loader/cache for descriptors, keyed by location identity.
pub struct SiteDescriptorSource<T> {
    transport: T,
    grammar: &'static dyn DialectGrammar,
    cache: Mutex<HashMap<String, Arc<OnceCell<Arc<LoadedSite>>>>>,
}

impl<T: DescriptorTransport> SiteDescriptorSource<T> {
    pub fn new(transport: T, grammar: &'static dyn DialectGrammar) -> Self {
        Self {
            transport,
            grammar,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Loads the descriptor at `location`, returning the cached value on
    /// repeat calls. Concurrent calls for one location share one fetch.
    ///
    /// # Errors
    ///
    /// [`SourceError::NotFound`] when the resource is absent,
    /// [`SourceError::Malformed`] when it exists but does not parse,
    /// [`SourceError::Transport`] for other retrieval failures.
    pub async fn load(&self, location: &str) -> Result<Arc<LoadedSite>, SourceError> {
        let cell = {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache
                .entry(location.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        let loaded = cell
            .get_or_try_init(|| self.fetch_and_parse(location))
            .await?;
        Ok(loaded.clone())
    }

    async fn fetch_and_parse(&self, location: &str) -> Result<Arc<LoadedSite>, SourceError> {
        let bytes = self.transport.fetch(location).await.map_err(|err| match err {
            TransportError::NotFound(loc) => SourceError::NotFound(loc),
            other => SourceError::Transport(other),
        })?;

        let checksum = hex::encode(Sha256::digest(&bytes));
        let parsed =
            parse_site(&bytes, self.grammar).map_err(|source| SourceError::Malformed {
                location: location.to_string(),
                source,
            })?;

        info!(
            location,
            checksum = checksum.as_str(),
            features = parsed.site.features.len(),
            categories = parsed.site.categories().len(),
            "Descriptor loaded"
        );

        Ok(Arc::new(LoadedSite {
            location: location.to_string(),
            site: parsed.site,
            checksum,
            status: parsed.status,
        }))
    }

    /// Enumerates the site's features, consulting the compact digest
    /// summary first and falling back to per-feature retrieval.
    ///
    /// A missing digest is an expected, common case and is swallowed; any
    /// other digest failure is logged as a warning before falling back.
    pub async fn enumerate_features(&self, loaded: &LoadedSite) -> Vec<FeatureEntry> {
        if let Some(digest_url) = &loaded.site.digest_url {
            match self.transport.fetch(digest_url).await {
                Ok(bytes) => match parse_digest(&bytes) {
                    Ok(entries) => {
                        debug!(digest_url, entries = entries.len(), "Digest hit");
                        return entries;
                    }
                    Err(err) => {
                        warn!(digest_url, error = %err, "Unparseable digest, falling back");
                    }
                },
                Err(TransportError::NotFound(_)) => {
                    debug!(digest_url, "No digest available");
                }
                Err(err) => {
                    warn!(digest_url, error = %err, "Digest retrieval failed, falling back");
                }
            }
        }
        self.enumerate_features_individually(loaded).await
    }

    async fn enumerate_features_individually(&self, loaded: &LoadedSite) -> Vec<FeatureEntry> {
        let mut entries = Vec::new();
        for feature in &loaded.site.features {
            let fallback = feature.id.as_ref().map(|id| FeatureEntry {
                id: id.clone(),
                version: feature.version.clone(),
                label: None,
            });
            let Some(url) = feature.effective_url() else {
                if let Some(entry) = fallback {
                    entries.push(entry);
                }
                continue;
            };
            match self.transport.fetch(&url).await {
                Ok(bytes) => match parse_feature_header(&bytes) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => {
                        warn!(url, error = %err, "Unreadable feature descriptor");
                        if let Some(entry) = fallback {
                            entries.push(entry);
                        }
                    }
                },
                Err(err) => {
                    warn!(url, error = %err, "Feature retrieval failed");
                    if let Some(entry) = fallback {
                        entries.push(entry);
                    }
                }
            }
        }
        entries
    }
}

/// Parses the compact digest document: `<digest><feature id=".." version=".."/>…</digest>`.
fn parse_digest(bytes: &[u8]) -> Result<Vec<FeatureEntry>, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut root_seen = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if !root_seen {
                    if name != "digest" {
                        return Err(ParseError::UnexpectedRoot {
                            expected: "digest".to_string(),
                            found: name,
                        });
                    }
                    root_seen = true;
                } else if name == "feature" {
                    let id = element_attr(e, "id");
                    let version = element_attr(e, "version");
                    if let (Some(id), Some(version)) = (id, version) {
                        entries.push(FeatureEntry {
                            id,
                            version,
                            label: element_attr(e, "label"),
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(ParseError::Syntax {
                    position: reader.buffer_position(),
                    message: err.to_string(),
                })
            }
        }
        buf.clear();
    }

    if root_seen {
        Ok(entries)
    } else {
        Err(ParseError::MissingRoot)
    }
}

/// Reads only the root element attributes of a feature descriptor.
fn parse_feature_header(bytes: &[u8]) -> Result<FeatureEntry, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name != "feature" {
                    return Err(ParseError::UnexpectedRoot {
                        expected: "feature".to_string(),
                        found: name,
                    });
                }
                let id = element_attr(e, "id");
                let version = element_attr(e, "version");
                return match (id, version) {
                    (Some(id), Some(version)) => Ok(FeatureEntry {
                        id,
                        version,
                        label: element_attr(e, "label"),
                    }),
                    _ => Err(ParseError::MissingRoot),
                };
            }
            Ok(Event::Eof) => return Err(ParseError::MissingRoot),
            Ok(_) => {}
            Err(err) => {
                return Err(ParseError::Syntax {
                    position: reader.buffer_position(),
                    message: err.to_string(),
                })
            }
        }
    }
}

fn element_attr(element: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    for attribute in element.attributes() {
        let Ok(attribute) = attribute else {
            continue;
        };
        if attribute.key.local_name().as_ref() == name.as_bytes() {
            let value = attribute.unescape_value().ok()?;
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::dialects::UpdateSiteDialect;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockTransport {
        resources: HashMap<String, Vec<u8>>,
        fetches: AtomicUsize,
    }

    impl MockTransport {
        fn new(resources: Vec<(&str, &str)>) -> Self {
            Self {
                resources: resources
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DescriptorTransport for MockTransport {
        async fn fetch(&self, location: &str) -> Result<Vec<u8>, TransportError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.resources
                .get(location)
                .cloned()
                .ok_or_else(|| TransportError::NotFound(location.to_string()))
        }
    }

    const SIMPLE_SITE: &str =
        r#"<site><feature id="f" version="1.0.0"><category name="C"/></feature></site>"#;

    fn source_with(resources: Vec<(&str, &str)>) -> SiteDescriptorSource<MockTransport> {
        SiteDescriptorSource::new(MockTransport::new(resources), &UpdateSiteDialect)
    }

    #[tokio::test]
    async fn test_load_parses_and_checksums() {
        let source = source_with(vec![("https://a/site.xml", SIMPLE_SITE)]);
        let loaded = source.load("https://a/site.xml").await.unwrap();
        assert_eq!(loaded.site.features.len(), 1);
        assert_eq!(loaded.checksum.len(), 64);
    }

    #[tokio::test]
    async fn test_repeat_load_hits_cache() {
        let source = source_with(vec![("https://a/site.xml", SIMPLE_SITE)]);
        let first = source.load("https://a/site.xml").await.unwrap();
        let second = source.load("https://a/site.xml").await.unwrap();
        assert_eq!(first.checksum, second.checksum);
        assert_eq!(source.transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_loads_coalesce() {
        let source = source_with(vec![("https://a/site.xml", SIMPLE_SITE)]);
        let (a, b) = tokio::join!(
            source.load("https://a/site.xml"),
            source.load("https://a/site.xml")
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(source.transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_locations_load_separately() {
        let source = source_with(vec![
            ("https://a/site.xml", SIMPLE_SITE),
            ("https://b/site.xml", SIMPLE_SITE),
        ]);
        source.load("https://a/site.xml").await.unwrap();
        source.load("https://b/site.xml").await.unwrap();
        assert_eq!(source.transport.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_distinct_from_malformed() {
        let source = source_with(vec![("https://a/bad.xml", "<site><feature></site>")]);

        let missing = source.load("https://a/absent.xml").await.unwrap_err();
        assert!(matches!(missing, SourceError::NotFound(_)));

        let malformed = source.load("https://a/bad.xml").await.unwrap_err();
        assert!(matches!(malformed, SourceError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_checksum_changes_with_content() {
        let source_a = source_with(vec![("l", SIMPLE_SITE)]);
        let source_b = source_with(vec![("l", r#"<site></site>"#)]);
        let a = source_a.load("l").await.unwrap();
        let b = source_b.load("l").await.unwrap();
        assert_ne!(a.checksum, b.checksum);
    }

    const DIGEST_SITE: &str = r#"<site digestURL="https://a/digest.xml">
        <feature id="f" version="1.0.0"/>
        <feature id="g" version="2.0.0"/>
    </site>"#;

    #[tokio::test]
    async fn test_digest_fast_path_skips_feature_fetches() {
        let source = source_with(vec![
            ("https://a/site.xml", DIGEST_SITE),
            (
                "https://a/digest.xml",
                r#"<digest><feature id="f" version="1.0.0" label="F"/><feature id="g" version="2.0.0"/></digest>"#,
            ),
        ]);
        let loaded = source.load("https://a/site.xml").await.unwrap();
        let entries = source.enumerate_features(&loaded).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label.as_deref(), Some("F"));
        // One fetch for the site, one for the digest, none per feature.
        assert_eq!(source.transport.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_digest_falls_back_to_feature_headers() {
        let source = source_with(vec![
            ("https://a/site.xml", DIGEST_SITE),
            (
                "features/f_1.0.0.jar",
                r#"<feature id="f" version="1.0.0" label="Feature F"/>"#,
            ),
            (
                "features/g_2.0.0.jar",
                r#"<feature id="g" version="2.0.0"/>"#,
            ),
        ]);
        let loaded = source.load("https://a/site.xml").await.unwrap();
        let entries = source.enumerate_features(&loaded).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label.as_deref(), Some("Feature F"));
        // Site + digest miss + two feature headers.
        assert_eq!(source.transport.fetch_count(), 4);
    }

    #[tokio::test]
    async fn test_unparseable_digest_falls_back() {
        let source = source_with(vec![
            ("https://a/site.xml", DIGEST_SITE),
            ("https://a/digest.xml", "not xml at all <"),
            (
                "features/f_1.0.0.jar",
                r#"<feature id="f" version="1.0.0"/>"#,
            ),
        ]);
        let loaded = source.load("https://a/site.xml").await.unwrap();
        let entries = source.enumerate_features(&loaded).await;
        // Feature g's descriptor is absent, so its site entry stands in.
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id, "g");
    }

    #[test]
    fn test_parse_digest_rejects_wrong_root() {
        assert!(parse_digest(b"<site/>").is_err());
        assert!(parse_digest(b"").is_err());
    }
}
