//! Session configuration.
//!
//! The host sends the configuration as the `initializationOptions` of the
//! `initialize` request (camelCase JSON); the CLI reads the same shape from
//! a TOML file.
//!
//! ```toml
//! dedup = "global"
//! unmapped = "warn"
//! exclude = ["**/*.test.js"]
//!
//! [mappings]
//! Some = "/test/lib/Some/src"
//! Ext = false
//! ```
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AnalysisError, Result};
use crate::types::{DedupPolicy, UnmappedPolicy};

/// Where a namespace prefix points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceTarget {
    /// Root-relative base directory, optionally containing one `*`.
    Path(String),
    /// Explicitly excluded (`false` in configuration).
    Disabled,
}

impl<'de> Deserialize<'de> for NamespaceTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Path(String),
            Flag(bool),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Path(path) => Ok(NamespaceTarget::Path(normalise_base_path(&path))),
            Raw::Flag(false) => Ok(NamespaceTarget::Disabled),
            Raw::Flag(true) => Err(serde::de::Error::custom(
                "a namespace mapping must be a base path or `false`",
            )),
        }
    }
}

impl Serialize for NamespaceTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            NamespaceTarget::Path(path) => serializer.serialize_str(path),
            NamespaceTarget::Disabled => serializer.serialize_bool(false),
        }
    }
}

/// Normalise a mapped base path: forward slashes, leading `/`, no trailing `/`.
pub fn normalise_base_path(path: &str) -> String {
    let p = path.replace('\\', "/");
    let trimmed = p.trim_start_matches("./").trim_matches('/');
    format!("/{}", trimmed)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Namespace prefix → base path (or `false`).
    pub mappings: BTreeMap<String, NamespaceTarget>,
    /// Globs (root-relative) that are always analysed, even outside mappings
    /// or when they also match `exclude`.
    pub include: Vec<String>,
    /// Globs (root-relative) that are never analysed.
    pub exclude: Vec<String>,
    pub dedup: DedupPolicy,
    pub unmapped: UnmappedPolicy,
    pub replace_call_parent: bool,
    /// Import a same-named stylesheet next to each resolved class file.
    pub auto_import_assets: bool,
    /// Script file extensions, without the dot.
    pub scripts: Vec<String>,
    /// Asset file extensions considered by `auto_import_assets`.
    pub assets: Vec<String>,
    /// Globals whose `.define(...)` calls declare classes.
    pub class_systems: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mappings: BTreeMap::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            dedup: DedupPolicy::Global,
            unmapped: UnmappedPolicy::Warn,
            replace_call_parent: true,
            auto_import_assets: false,
            scripts: vec!["js".to_string()],
            assets: vec!["scss".to_string()],
            class_systems: vec!["Ext".to_string()],
        }
    }
}

impl Config {
    /// Build a configuration from the `initializationOptions` JSON value.
    /// `null` yields the defaults.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| AnalysisError::Config(e.to_string()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AnalysisError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::io(path.display().to_string(), &e))?;
        Self::from_toml_str(&content)
    }

    /// Convenience for tests and embedders: add one mapping.
    pub fn with_mapping(mut self, namespace: &str, target: NamespaceTarget) -> Self {
        let target = match target {
            NamespaceTarget::Path(p) => NamespaceTarget::Path(normalise_base_path(&p)),
            disabled => disabled,
        };
        self.mappings.insert(namespace.to_string(), target);
        self
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
