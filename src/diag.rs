//! Multi-status diagnostics accumulated across a parse or publishing run.
//!
//! Recoverable conditions (unknown elements, unresolved references, soft
//! side-pass failures) are collected here and surfaced together at the end
//! of a run instead of aborting it. Fatal conditions use the error types of
//! the module that raises them.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Severity of a single diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One accumulated parse or resolution finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,

    /// Stable machine-readable code, e.g. `unexpected-element`.
    pub code: String,

    /// Human-readable description of the finding.
    pub message: String,
}

/// Ordered collection of diagnostics for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiStatus {
    entries: Vec<Diagnostic>,
}

impl MultiStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, code: &str, message: impl Into<String>) {
        self.push(Severity::Info, code, message.into());
    }

    /// Records a warning and mirrors it to the log.
    pub fn warning(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(code, "{}", message);
        self.push(Severity::Warning, code, message);
    }

    /// Records a non-fatal error and mirrors it to the log.
    pub fn error(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        error!(code, "{}", message);
        self.push(Severity::Error, code, message);
    }

    fn push(&mut self, severity: Severity, code: &str, message: String) {
        self.entries.push(Diagnostic {
            severity,
            code: code.to_string(),
            message,
        });
    }

    /// Appends all entries of `other` to this status.
    pub fn merge(&mut self, other: MultiStatus) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.severity == Severity::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulation_and_flags() {
        let mut status = MultiStatus::new();
        assert!(status.is_empty());
        assert!(!status.has_errors());

        status.info("note", "just a note");
        status.warning("unresolved-reference", "feature x.y not found");
        assert!(status.has_warnings());
        assert!(!status.has_errors());

        status.error("missing-attribute", "category without name");
        assert!(status.has_errors());
        assert_eq!(status.entries().len(), 3);
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut first = MultiStatus::new();
        first.warning("a", "one");
        let mut second = MultiStatus::new();
        second.warning("b", "two");
        first.merge(second);

        let codes: Vec<_> = first.entries().iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["a", "b"]);
    }

    #[test]
    fn test_serializes_to_json() {
        let mut status = MultiStatus::new();
        status.warning("unresolved-reference", "bundle b not found");
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("unresolved-reference"));
        assert!(json.contains("Warning"));
    }
}
