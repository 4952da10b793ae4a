//! Descriptor subsystem: model, dialect grammars, streaming parser and
//! the caching loader.

pub mod dialects;
pub mod model;
pub mod parser;
pub mod source;

// Re-export commonly used types
pub use dialects::{CategoryDialect, DialectGrammar, UpdateSiteDialect};
pub use model::{
    ArchiveRef, Category, RefKind, RepositoryKind, RepositoryReference, Site, SiteRef, UnitRef,
    UrlEntry,
};
pub use parser::{parse_site, ParseError, ParsedSite, ParserState};
pub use source::{
    DescriptorTransport, FeatureEntry, LoadedSite, SiteDescriptorSource, SourceError,
    TransportError,
};
