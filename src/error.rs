//! Error taxonomy for the analysis pipeline.
//!
//! Per-file failures are carried as values (and turned into diagnostics by
//! the session) so that one broken file never aborts a build session.
use crate::types::{Diagnostic, DiagnosticKind, Severity};

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("{file}:{line}:{column}: syntax error: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("alternate class name cycle: {}", chain.join(" -> "))]
    AliasCycle { chain: Vec<String> },

    #[error("{count} class reference(s) point at unmapped namespaces")]
    UnmappedNamespaces { count: usize },

    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to serialise class map: {0}")]
    Serialize(String),
}

impl AnalysisError {
    pub(crate) fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Convert a file-scoped error into a diagnostic for the host.
    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        match self {
            Self::Parse {
                file,
                line,
                column,
                message,
            } => Diagnostic::new(
                DiagnosticKind::ParseError,
                Severity::Error,
                file.clone(),
                message.clone(),
            )
            .at(*line, *column),
            Self::AliasCycle { .. } => Diagnostic::new(
                DiagnosticKind::AliasCycle,
                Severity::Error,
                file,
                self.to_string(),
            ),
            Self::UnmappedNamespaces { .. } => Diagnostic::new(
                DiagnosticKind::UnmappedNamespace,
                Severity::Error,
                file,
                self.to_string(),
            ),
            Self::Io { .. } | Self::Config(_) | Self::Serialize(_) => Diagnostic::new(
                DiagnosticKind::ReadError,
                Severity::Error,
                file,
                self.to_string(),
            ),
        }
    }
}
