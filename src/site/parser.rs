//! Streaming descriptor parser.
//!
//! A stack-driven state machine consuming XML events: a stack of symbolic
//! [`ParserState`] values and an object stack of partially-built model
//! values walked in lock-step. Element dispatch is a pure function of
//! `(state, element)` supplied by the dialect grammar; unexpected elements
//! are ignored recoverably, while malformed XML and a wrong root element
//! abort parsing.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

use crate::diag::MultiStatus;
use crate::site::dialects::DialectGrammar;
use crate::site::model::{
    translation_key, ArchiveRef, Category, RefKind, Site, SiteRef, UnitRef, UrlEntry,
};

/// Symbolic parser states. One entry is pushed per open element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Initial,
    Site,
    Feature,
    Bundle,
    Unit,
    Query,
    Expression,
    Param,
    Archive,
    Category,
    CategoryDef,
    DescriptionOfSite,
    DescriptionOfCategoryDef,
    RepositoryRef,
    Stats,
    Ignored,
}

/// Fatal parse failures. Everything else is accumulated in the
/// [`MultiStatus`] and parsing continues.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The input is not well-formed XML
    #[error("Malformed XML at byte {position}: {message}")]
    Syntax { position: usize, message: String },

    /// The first element is not the dialect's root element
    #[error("Unexpected root element '{found}', expected '{expected}'")]
    UnexpectedRoot { expected: String, found: String },

    /// The input ended without any root element
    #[error("No root element found")]
    MissingRoot,
}

/// A parsed descriptor plus the recoverable findings gathered on the way.
#[derive(Debug)]
pub struct ParsedSite {
    pub site: Site,
    pub status: MultiStatus,
}

/// Parse a descriptor byte stream under the given dialect grammar.
pub fn parse_site(bytes: &[u8], grammar: &dyn DialectGrammar) -> Result<ParsedSite, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut machine = Machine::new(grammar);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => machine.on_start(e)?,
            Ok(Event::Empty(ref e)) => {
                machine.on_start(e)?;
                machine.on_end();
            }
            Ok(Event::Text(ref e)) => {
                let raw = e.unescape().map_err(|err| ParseError::Syntax {
                    position: reader.buffer_position(),
                    message: err.to_string(),
                })?;
                machine.on_text(&raw);
            }
            Ok(Event::CData(e)) => {
                let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                machine.on_text(&raw);
            }
            Ok(Event::End(_)) => machine.on_end(),
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

    machine.finish()
}

/// Accumulates description text with whitespace normalization: fragments
/// are trimmed and separated by at most one space where the raw fragments
/// carried boundary whitespace.
#[derive(Debug, Default)]
struct DescriptionBuilder {
    url: Option<String>,
    text: String,
    pending_space: bool,
}

impl DescriptionBuilder {
    fn add_fragment(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let leading = raw.chars().next().is_some_and(char::is_whitespace);
        let trailing = raw.chars().last().is_some_and(char::is_whitespace);
        let mut words = raw.split_whitespace();
        let Some(first) = words.next() else {
            // Whitespace-only fragment: remember it as a separator.
            self.pending_space = true;
            return;
        };
        if !self.text.is_empty() && (self.pending_space || leading) {
            self.text.push(' ');
        }
        self.text.push_str(first);
        for word in words {
            self.text.push(' ');
            self.text.push_str(word);
        }
        self.pending_space = trailing;
    }

    fn finish(self) -> UrlEntry {
        UrlEntry {
            url: self.url,
            annotation: if self.text.is_empty() {
                None
            } else {
                Some(self.text)
            },
        }
    }
}

/// In-progress model values living on the object stack.
#[derive(Debug)]
enum ParsedFrame {
    Site(Site),
    Ref(SiteRef),
    Unit(UnitRef),
    Category(Category),
    Description(DescriptionBuilder),
    /// Trimmed-concatenated character data for expression/param elements.
    Text(String),
}

struct Machine<'g> {
    grammar: &'g dyn DialectGrammar,
    states: Vec<ParserState>,
    frames: Vec<ParsedFrame>,
    status: MultiStatus,
    finished: Option<Site>,
}

impl<'g> Machine<'g> {
    fn new(grammar: &'g dyn DialectGrammar) -> Self {
        Self {
            grammar,
            states: Vec::new(),
            frames: Vec::new(),
            status: MultiStatus::new(),
            finished: None,
        }
    }

    fn current_state(&self) -> ParserState {
        self.states.last().copied().unwrap_or(ParserState::Initial)
    }

    fn site_mut(&mut self) -> &mut Site {
        match self.frames.first_mut() {
            Some(ParsedFrame::Site(site)) => site,
            _ => unreachable!("site frame is pushed before any other frame"),
        }
    }

    fn on_start(&mut self, element: &BytesStart<'_>) -> Result<(), ParseError> {
        let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
        let state = self.current_state();

        if state == ParserState::Initial {
            if self.finished.is_some() {
                // Content after the root element closed.
                self.status
                    .warning("unexpected-element", format!("Element '{}' after document root", name));
                self.states.push(ParserState::Ignored);
                return Ok(());
            }
            if name != self.grammar.root_element() {
                return Err(ParseError::UnexpectedRoot {
                    expected: self.grammar.root_element().to_string(),
                    found: name,
                });
            }
            let site = self.enter_site(element);
            self.states.push(ParserState::Site);
            self.frames.push(ParsedFrame::Site(site));
            return Ok(());
        }

        if state == ParserState::Ignored {
            self.states.push(ParserState::Ignored);
            return Ok(());
        }

        match self.grammar.transition(state, &name) {
            Some(next) => {
                self.states.push(next);
                self.enter(next, &name, element);
            }
            None => {
                self.status.warning(
                    "unexpected-element",
                    format!(
                        "Unexpected element '{}' in {:?} ({} dialect)",
                        name,
                        state,
                        self.grammar.name()
                    ),
                );
                self.states.push(ParserState::Ignored);
            }
        }
        Ok(())
    }

    fn enter_site(&mut self, element: &BytesStart<'_>) -> Site {
        let mut site = Site::new();
        site.location_url = attr(element, "url");
        site.mirrors_url = attr(element, "mirrorsURL");
        site.digest_url = attr(element, "digestURL");
        site.associate_sites_url = attr(element, "associateSitesURL");
        site
    }

    fn enter(&mut self, next: ParserState, name: &str, element: &BytesStart<'_>) {
        match next {
            ParserState::Feature | ParserState::Bundle => {
                let kind = if name == "feature" {
                    RefKind::Feature
                } else {
                    RefKind::Bundle
                };
                let mut site_ref = SiteRef::new(kind);
                site_ref.id = attr(element, "id");
                site_ref.version = attr(element, "version").unwrap_or_default();
                site_ref.url = attr(element, "url");
                site_ref.os = attr(element, "os");
                site_ref.ws = attr(element, "ws");
                site_ref.arch = attr(element, "arch");
                site_ref.nl = attr(element, "nl");
                self.frames.push(ParsedFrame::Ref(site_ref));
            }
            ParserState::Unit => {
                let mut unit_ref = UnitRef::default();
                unit_ref.id = attr(element, "id");
                unit_ref.range = attr(element, "range").unwrap_or_default();
                self.frames.push(ParsedFrame::Unit(unit_ref));
            }
            ParserState::Query => {}
            ParserState::Expression => {
                let query_type = attr(element, "type");
                if let Some(ParsedFrame::Unit(unit_ref)) = self.frames.last_mut() {
                    unit_ref.query_type = query_type;
                }
                self.frames.push(ParsedFrame::Text(String::new()));
            }
            ParserState::Param => {
                self.frames.push(ParsedFrame::Text(String::new()));
            }
            ParserState::Archive => {
                match (attr(element, "path"), attr(element, "url")) {
                    (Some(path), Some(url)) => {
                        self.site_mut().archives.push(ArchiveRef { path, url });
                    }
                    _ => self.status.error(
                        "missing-attribute",
                        "Element 'archive' requires both 'path' and 'url'",
                    ),
                }
            }
            ParserState::Category => {
                // Membership annotation: mutate the enclosing frame, no
                // subtree of its own.
                match attr(element, "name") {
                    Some(category_name) => match self.frames.last_mut() {
                        Some(ParsedFrame::Ref(site_ref)) => {
                            site_ref.category_names.push(category_name)
                        }
                        Some(ParsedFrame::Unit(unit_ref)) => {
                            unit_ref.category_names.push(category_name)
                        }
                        Some(ParsedFrame::Category(category)) => {
                            category.nested_in.push(category_name)
                        }
                        _ => {}
                    },
                    None => self.status.error(
                        "missing-attribute",
                        "Element 'category' requires a 'name' attribute",
                    ),
                }
            }
            ParserState::CategoryDef => {
                let name_attr = attr(element, "name");
                if name_attr.is_none() {
                    self.status.error(
                        "missing-attribute",
                        "Element 'category-def' requires a 'name' attribute",
                    );
                }
                let mut category = Category::new(name_attr.unwrap_or_default());
                category.label = attr(element, "label");
                self.frames.push(ParsedFrame::Category(category));
            }
            ParserState::DescriptionOfSite | ParserState::DescriptionOfCategoryDef => {
                let builder = DescriptionBuilder {
                    url: attr(element, "url"),
                    ..Default::default()
                };
                self.frames.push(ParsedFrame::Description(builder));
            }
            ParserState::RepositoryRef => match attr(element, "location") {
                Some(location) => {
                    let nickname = attr(element, "nickname");
                    let enabled = attr(element, "enabled")
                        .map(|v| !v.eq_ignore_ascii_case("false"))
                        .unwrap_or(true);
                    self.site_mut()
                        .add_repository_reference(location, nickname, enabled);
                }
                None => self.status.error(
                    "missing-attribute",
                    "Element 'repository-reference' requires a 'location' attribute",
                ),
            },
            ParserState::Stats => {
                let location = attr(element, "location");
                self.site_mut().stats_url = location;
            }
            ParserState::Initial | ParserState::Site | ParserState::Ignored => {}
        }
    }

    fn on_text(&mut self, raw: &str) {
        match self.current_state() {
            ParserState::DescriptionOfSite | ParserState::DescriptionOfCategoryDef => {
                if let Some(ParsedFrame::Description(builder)) = self.frames.last_mut() {
                    builder.add_fragment(raw);
                }
            }
            ParserState::Expression | ParserState::Param => {
                if let Some(ParsedFrame::Text(text)) = self.frames.last_mut() {
                    text.push_str(raw.trim());
                }
            }
            _ => {}
        }
    }

    fn on_end(&mut self) {
        let Some(state) = self.states.pop() else {
            return;
        };

        match state {
            ParserState::Site => {
                if let Some(ParsedFrame::Site(site)) = self.frames.pop() {
                    debug!(
                        features = site.features.len(),
                        bundles = site.bundles.len(),
                        units = site.units.len(),
                        categories = site.categories().len(),
                        "Descriptor root closed"
                    );
                    self.finished = Some(site);
                }
            }
            ParserState::Feature | ParserState::Bundle => {
                if let Some(ParsedFrame::Ref(site_ref)) = self.frames.pop() {
                    self.attach_ref(site_ref);
                }
            }
            ParserState::Unit => {
                if let Some(ParsedFrame::Unit(unit_ref)) = self.frames.pop() {
                    if unit_ref.is_valid() {
                        self.site_mut().units.push(unit_ref);
                    } else {
                        self.status.error(
                            "invalid-unit-reference",
                            "Element 'iu' needs either an id or a query, and not both",
                        );
                    }
                }
            }
            ParserState::CategoryDef => {
                if let Some(ParsedFrame::Category(category)) = self.frames.pop() {
                    self.attach_category(category);
                }
            }
            ParserState::DescriptionOfSite => {
                if let Some(ParsedFrame::Description(builder)) = self.frames.pop() {
                    self.site_mut().description = Some(builder.finish());
                }
            }
            ParserState::DescriptionOfCategoryDef => {
                if let Some(ParsedFrame::Description(builder)) = self.frames.pop() {
                    if let Some(ParsedFrame::Category(category)) = self.frames.last_mut() {
                        category.description = Some(builder.finish());
                    }
                }
            }
            ParserState::Expression => {
                if let Some(ParsedFrame::Text(text)) = self.frames.pop() {
                    if let Some(ParsedFrame::Unit(unit_ref)) = self.frames.last_mut() {
                        if !text.is_empty() {
                            unit_ref.query_expression = Some(text);
                        }
                    }
                }
            }
            ParserState::Param => {
                if let Some(ParsedFrame::Text(text)) = self.frames.pop() {
                    if let Some(ParsedFrame::Unit(unit_ref)) = self.frames.last_mut() {
                        unit_ref.query_params.push(text);
                    }
                }
            }
            ParserState::Query
            | ParserState::Archive
            | ParserState::Category
            | ParserState::RepositoryRef
            | ParserState::Stats
            | ParserState::Ignored
            | ParserState::Initial => {}
        }
    }

    fn attach_ref(&mut self, site_ref: SiteRef) {
        if !site_ref.is_valid() {
            self.status.error(
                "invalid-reference",
                format!(
                    "{:?} reference without url or id+version",
                    site_ref.kind
                ),
            );
            return;
        }
        let under_stats = self.current_state() == ParserState::Stats;
        let kind = site_ref.kind;
        let site = self.site_mut();
        match (kind, under_stats) {
            (RefKind::Feature, false) => site.features.push(site_ref),
            (RefKind::Bundle, false) => site.bundles.push(site_ref),
            (RefKind::Feature, true) => site.stats_features.push(site_ref),
            (RefKind::Bundle, true) => site.stats_bundles.push(site_ref),
        }
    }

    fn attach_category(&mut self, category: Category) {
        if category.name.is_empty() {
            // Already diagnosed when the name attribute was missing.
            return;
        }
        if let Some(key) = category.label.as_deref().and_then(translation_key) {
            let key = key.to_string();
            self.site_mut().record_message_key(&key);
        }
        let name = category.name.clone();
        if !self.site_mut().add_category(category) {
            self.status.warning(
                "duplicate-category",
                format!("Category '{}' defined more than once; keeping the first", name),
            );
        }
    }

    fn finish(self) -> Result<ParsedSite, ParseError> {
        match self.finished {
            Some(site) => Ok(ParsedSite {
                site,
                status: self.status,
            }),
            None => Err(ParseError::MissingRoot),
        }
    }
}

fn attr(element: &BytesStart<'_>, name: &str) -> Option<String> {
    for attribute in element.attributes() {
        let Ok(attribute) = attribute else {
            continue;
        };
        if attribute.key.local_name().as_ref() == name.as_bytes() {
            let value = attribute.unescape_value().ok()?;
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(trimmed.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::dialects::{CategoryDialect, UpdateSiteDialect};
    use crate::site::model::RepositoryKind;

    const SITE_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <site url="https://example.org/updates" mirrorsURL="https://example.org/mirrors.xml" digestURL="https://example.org/digest.zip">
            <description url="https://example.org/info">An update   site for
                examples</description>
            <feature id="org.example.core" version="1.0.0" os="linux" arch="x86_64">
                <category name="Tools"/>
            </feature>
            <feature url="features/org.example.extra_2.0.0.jar" id="org.example.extra" version="2.0.0"/>
            <bundle id="org.example.lib" version="1.1.0">
                <category name="Tools"/>
                <category name="Libraries"/>
            </bundle>
            <archive path="plugins/legacy.jar" url="https://example.org/legacy.jar"/>
            <category-def name="Tools" label="%tools.label">
                <description>Useful tools</description>
            </category-def>
            <category-def name="Libraries" label="Libraries"/>
        </site>"#;

    const CATEGORY_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <site>
            <feature id="org.example.core" version="1.0.0">
                <category name="Main"/>
            </feature>
            <iu id="org.example.unit" range="[1.0.0,2.0.0)">
                <category name="Main"/>
            </iu>
            <iu>
                <category name="Main"/>
                <query>
                    <expression type="match">properties[$0] == $1</expression>
                    <param>org.example.kind</param>
                    <param>tool</param>
                </query>
            </iu>
            <repository-reference location="https://example.org/other" nickname="Other" enabled="false"/>
            <stats location="https://stats.example.org">
                <feature id="org.example.core" version="1.0.0"/>
                <bundle id="org.example.lib" version="1.1.0"/>
            </stats>
            <category-def name="Main" label="Main Things">
                <category name="Parent"/>
            </category-def>
            <category-def name="Parent" label="All Things"/>
        </site>"#;

    fn parse_site_dialect(xml: &str) -> ParsedSite {
        parse_site(xml.as_bytes(), &UpdateSiteDialect).expect("parse")
    }

    fn parse_category_dialect(xml: &str) -> ParsedSite {
        parse_site(xml.as_bytes(), &CategoryDialect).expect("parse")
    }

    #[test]
    fn test_site_dialect_fixture() {
        let parsed = parse_site_dialect(SITE_FIXTURE);
        let site = &parsed.site;

        assert_eq!(site.location_url.as_deref(), Some("https://example.org/updates"));
        assert_eq!(site.mirrors_url.as_deref(), Some("https://example.org/mirrors.xml"));
        assert_eq!(site.digest_url.as_deref(), Some("https://example.org/digest.zip"));

        assert_eq!(site.features.len(), 2);
        assert_eq!(site.features[0].id.as_deref(), Some("org.example.core"));
        assert_eq!(site.features[0].category_names, vec!["Tools"]);
        assert_eq!(
            site.features[0].environment_filter().as_deref(),
            Some("(&(os=linux)(arch=x86_64))")
        );

        assert_eq!(site.bundles.len(), 1);
        assert_eq!(site.bundles[0].category_names, vec!["Tools", "Libraries"]);

        assert_eq!(site.archives.len(), 1);
        assert_eq!(site.archives[0].path, "plugins/legacy.jar");

        assert_eq!(site.categories().len(), 2);
        let tools = site.category("Tools").unwrap();
        assert_eq!(tools.label.as_deref(), Some("%tools.label"));
        assert_eq!(
            tools.description.as_ref().unwrap().annotation.as_deref(),
            Some("Useful tools")
        );
        assert_eq!(site.message_keys, vec!["tools.label"]);

        // Multi-line description text is normalized to single spaces.
        let description = site.description.as_ref().unwrap();
        assert_eq!(description.url.as_deref(), Some("https://example.org/info"));
        assert_eq!(
            description.annotation.as_deref(),
            Some("An update site for examples")
        );

        assert!(parsed.status.is_empty(), "{:?}", parsed.status);
    }

    #[test]
    fn test_category_dialect_fixture() {
        let parsed = parse_category_dialect(CATEGORY_FIXTURE);
        let site = &parsed.site;

        assert_eq!(site.units.len(), 2);
        assert_eq!(site.units[0].id.as_deref(), Some("org.example.unit"));
        assert_eq!(site.units[0].range, "[1.0.0,2.0.0)");
        assert_eq!(site.units[0].category_names, vec!["Main"]);

        let query_unit = &site.units[1];
        assert!(query_unit.has_query());
        assert_eq!(query_unit.query_type.as_deref(), Some("match"));
        assert_eq!(
            query_unit.query_expression.as_deref(),
            Some("properties[$0] == $1")
        );
        assert_eq!(query_unit.query_params, vec!["org.example.kind", "tool"]);

        // One element, two repository reference kinds.
        assert_eq!(site.repository_references.len(), 2);
        assert_eq!(site.repository_references[0].kind, RepositoryKind::Metadata);
        assert!(!site.repository_references[0].enabled);

        assert_eq!(site.stats_url.as_deref(), Some("https://stats.example.org"));
        assert_eq!(site.stats_features.len(), 1);
        assert_eq!(site.stats_bundles.len(), 1);
        // Stats children do not join the regular ref lists.
        assert_eq!(site.features.len(), 1);
        assert_eq!(site.bundles.len(), 0);

        let main = site.category("Main").unwrap();
        assert_eq!(main.nested_in, vec!["Parent"]);

        assert!(parsed.status.is_empty(), "{:?}", parsed.status);
    }

    #[test]
    fn test_description_fragment_normalization() {
        let xml = r#"<site><description>Foo <unknown/> Bar</description></site>"#;
        let parsed = parse_site_dialect(xml);
        assert_eq!(
            parsed.site.description.as_ref().unwrap().annotation.as_deref(),
            Some("Foo Bar")
        );
        // The unknown nested element was ignored recoverably.
        assert!(parsed.status.has_warnings());
    }

    #[test]
    fn test_description_without_boundary_whitespace_joins_directly() {
        let xml = r#"<site><description>Foo<unknown/>Bar</description></site>"#;
        let parsed = parse_site_dialect(xml);
        assert_eq!(
            parsed.site.description.as_ref().unwrap().annotation.as_deref(),
            Some("FooBar")
        );
    }

    #[test]
    fn test_unexpected_element_is_recoverable() {
        let xml = r#"<site><iu id="x"/><feature id="f" version="1.0.0"/></site>"#;
        let parsed = parse_site_dialect(xml);
        // 'iu' is not part of the site dialect, but parsing continued.
        assert!(parsed.status.has_warnings());
        assert_eq!(parsed.site.features.len(), 1);
        assert!(parsed.site.units.is_empty());
    }

    #[test]
    fn test_wrong_root_is_fatal() {
        let err = parse_site(b"<feature id=\"f\"/>", &UpdateSiteDialect).unwrap_err();
        match err {
            ParseError::UnexpectedRoot { expected, found } => {
                assert_eq!(expected, "site");
                assert_eq!(found, "feature");
            }
            other => panic!("expected UnexpectedRoot, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_xml_is_fatal() {
        let err = parse_site(b"<site><feature></site>", &UpdateSiteDialect).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn test_empty_input_is_missing_root() {
        let err = parse_site(b"", &UpdateSiteDialect).unwrap_err();
        assert!(matches!(err, ParseError::MissingRoot));
    }

    #[test]
    fn test_invalid_reference_dropped_with_error() {
        let xml = r#"<site><feature os="linux"/></site>"#;
        let parsed = parse_site_dialect(xml);
        assert!(parsed.site.features.is_empty());
        assert!(parsed.status.has_errors());
    }

    #[test]
    fn test_invalid_unit_reference_dropped() {
        let xml = r#"<site><iu><category name="C"/></iu></site>"#;
        let parsed = parse_category_dialect(xml);
        assert!(parsed.site.units.is_empty());
        assert!(parsed.status.has_errors());
    }

    #[test]
    fn test_duplicate_category_keeps_first() {
        let xml = r#"<site>
            <category-def name="Tools" label="First"/>
            <category-def name="tools" label="Second"/>
        </site>"#;
        let parsed = parse_site_dialect(xml);
        assert_eq!(parsed.site.categories().len(), 1);
        assert_eq!(
            parsed.site.category("Tools").unwrap().label.as_deref(),
            Some("First")
        );
        assert!(parsed.status.has_warnings());
    }

    #[test]
    fn test_category_without_name_is_error() {
        let xml = r#"<site><feature id="f" version="1.0.0"><category/></feature></site>"#;
        let parsed = parse_site_dialect(xml);
        assert!(parsed.status.has_errors());
        assert!(parsed.site.features[0].category_names.is_empty());
    }

    #[test]
    fn test_expression_fragments_concatenated_without_separator() {
        // The comment splits the character data into two fragments; each is
        // trimmed and joined with no separator.
        let xml =
            r#"<site><iu><query><expression type="match">a == $0 <!-- x --> &amp;&amp; b == $1</expression></query></iu></site>"#;
        let parsed = parse_category_dialect(xml);
        assert_eq!(
            parsed.site.units[0].query_expression.as_deref(),
            Some("a == $0&& b == $1")
        );
    }
}
