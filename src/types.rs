//! Data types used throughout the resolver.
//!
//! This module contains the "model" structs and enums that represent
//! extracted class information (descriptors), per-file analysis records,
//! diagnostics, and the payloads returned to the host pipeline.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structured record extracted from one `Ext.define(name, config)` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDescriptor {
    /// Fully-qualified dotted class name (e.g. "Some.other.BaseModule").
    pub name: String,
    /// The `alias` config value (e.g. "widget.module").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Additional lookup keys from `alternateClassName`, in source order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternate_names: Vec<String>,
    /// The class named by `extend`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// The class named by `override`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_target: Option<String>,
    pub requires: Vec<String>,
    pub uses: Vec<String>,
    pub mixins: Vec<String>,
    /// Resolved import paths (root-relative, no script extension).
    pub imports: Vec<String>,
    /// Root-relative path of the file defining this class, without extension.
    pub source_file: String,
}

impl ClassDescriptor {
    /// Every referenced class name in import emission order:
    /// parent, override target, requires, uses, mixins.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.parent
            .iter()
            .chain(self.override_target.iter())
            .chain(self.requires.iter())
            .chain(self.uses.iter())
            .chain(self.mixins.iter())
            .map(String::as_str)
    }
}

/// Push `value` unless it is already present, keeping first-seen order.
pub(crate) fn push_unique(list: &mut Vec<String>, value: impl Into<String>) {
    let value = value.into();
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Per-file analysis state.
///
/// `Unseen → Parsed → ClassesExtracted → ImportsResolved → Rewritten → Cached`,
/// with `Failed` as the terminal state for sources that do not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileState {
    Unseen,
    Parsed,
    ClassesExtracted,
    ImportsResolved,
    Rewritten,
    Cached,
    Failed,
}

/// How resolved paths are deduplicated across the import graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DedupPolicy {
    /// A path is emitted by the first file that needs it, once per session.
    #[default]
    Global,
    /// A path is emitted at most once per file.
    #[serde(alias = "perFile")]
    File,
}

/// What happens when a referenced namespace has no mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnmappedPolicy {
    #[default]
    Warn,
    /// Unresolved references fail discovery and transforms.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Error,
    Warning,
    Lint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    ParseError,
    UnmappedNamespace,
    AliasCycle,
    UnsupportedMixin,
    PossibleCallParentMisuse,
    CallParentWithoutParent,
    ReadError,
}

/// A non-fatal finding attached to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub file: String,
    /// 1-based line, when the finding has a source location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        severity: Severity,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            file: file.into(),
            line: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

/// The result of transforming one file for the host pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    /// Transformed source: injected import block followed by the rewritten body.
    pub code: String,
    /// Import specifiers in emission order (with extensions).
    pub imports: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Whether `code` differs from the input.
    pub changed: bool,
}

/// Cached per-file analysis state.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Normalised root-relative path without extension.
    pub path: String,
    pub fingerprint: String,
    /// Names of the classes this file defines (owned by the registry).
    pub defined_classes: Vec<String>,
    /// Paths the source already imports statically.
    pub existing_imports: Vec<String>,
    pub output: Option<TransformOutput>,
    pub state: FileState,
    /// Diagnostics produced while analysing the file.
    pub diagnostics: Vec<Diagnostic>,
    /// Set when `state` is [`FileState::Failed`].
    pub error: Option<crate::error::AnalysisError>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
            defined_classes: Vec::new(),
            existing_imports: Vec::new(),
            output: None,
            state: FileState::Unseen,
            diagnostics: Vec::new(),
            error: None,
        }
    }

    /// Whether the record has been extracted and can take part in import resolution.
    pub fn is_analysed(&self) -> bool {
        self.state >= FileState::ClassesExtracted && self.state != FileState::Failed
    }
}

/// Requiring class → referenced class names that could not be resolved.
pub type MissingImports = BTreeMap<String, Vec<String>>;

/// Summary of a bulk discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub generation: u64,
    pub files: usize,
    pub classes: usize,
    pub skipped: usize,
    pub failed: Vec<Diagnostic>,
    pub missing_imports: MissingImports,
}

/// Serialisable view of the class registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMapSnapshot {
    pub generation: u64,
    pub classes: BTreeMap<String, ClassDescriptor>,
    pub missing_imports: MissingImports,
}

/// Kind of file-system change reported by the host's watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileChange {
    Created,
    Changed,
    Deleted,
}
