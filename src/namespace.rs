/// Namespace → file-path resolution.
///
/// Given a mapping like `Some => "/lib/Some/src"`, a class name like
/// `Some.other.BaseModule` is resolved by:
///   1. Following alternate class names to the canonical name
///   2. Finding the longest mapped prefix (`Some`)
///   3. Joining the mapped base path and the remaining segments with `/`
///   4. Expanding a `*` wildcard through the [`FileScanner`]
///
/// Result: `/lib/Some/src/other/BaseModule`
use std::collections::{BTreeMap, HashMap};

use crate::config::NamespaceTarget;
use crate::error::{AnalysisError, Result};
use crate::scanner::FileScanner;
use crate::util::strip_script_extension;

/// Longest alternate-name chain followed before giving up.
pub const MAX_ALIAS_DEPTH: usize = 16;

/// A single namespace-prefix-to-directory mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceMapping {
    /// The dotted namespace prefix (e.g. `"Some"` or `"Ext.ux"`).
    pub prefix: String,
    pub target: NamespaceTarget,
}

/// Outcome of resolving one class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// One path in the common case, the sorted expansion for wildcards.
    Paths(Vec<String>),
    /// The namespace is mapped to `false`.
    Disabled,
    /// No mapping covers the namespace.
    Unmapped { namespace: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// The class name after alternate-name redirection.
    pub canonical: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceResolver {
    /// Sorted longest-prefix-first.
    mappings: Vec<NamespaceMapping>,
    scripts: Vec<String>,
}

impl NamespaceResolver {
    pub fn new(mappings: &BTreeMap<String, NamespaceTarget>, scripts: &[String]) -> Self {
        let mut mappings: Vec<NamespaceMapping> = mappings
            .iter()
            .map(|(prefix, target)| NamespaceMapping {
                prefix: prefix.clone(),
                target: target.clone(),
            })
            .collect();
        // Longest prefix first so `Ext.ux` wins over `Ext`.
        mappings.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self {
            mappings,
            scripts: scripts.to_vec(),
        }
    }

    /// The mapping covering `class_name` and the dotted remainder after its prefix.
    pub fn mapping_for<'a>(&self, class_name: &'a str) -> Option<(&NamespaceMapping, &'a str)> {
        self.mappings.iter().find_map(|mapping| {
            if class_name == mapping.prefix {
                return Some((mapping, ""));
            }
            class_name
                .strip_prefix(mapping.prefix.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|rest| (mapping, rest))
        })
    }

    /// Base directories of every enabled mapping, with the wildcard part cut off.
    pub fn enabled_base_dirs(&self) -> Vec<(&str, &str)> {
        self.mappings
            .iter()
            .filter_map(|mapping| match &mapping.target {
                NamespaceTarget::Path(path) => {
                    let dir = match path.find('*') {
                        Some(star) => path[..star].trim_end_matches('/'),
                        None => path.as_str(),
                    };
                    Some((mapping.prefix.as_str(), dir))
                }
                NamespaceTarget::Disabled => None,
            })
            .collect()
    }

    /// Follow alternate class names until a name that is not an alternate.
    ///
    /// A chain longer than [`MAX_ALIAS_DEPTH`] or one that revisits a name is
    /// an [`AnalysisError::AliasCycle`].
    pub fn canonical_name(
        &self,
        class_name: &str,
        alternate_names: &HashMap<String, String>,
    ) -> Result<String> {
        let mut chain = vec![class_name.to_string()];
        let mut current = class_name;
        while let Some(target) = alternate_names.get(current) {
            if chain.iter().any(|seen| seen == target) || chain.len() > MAX_ALIAS_DEPTH {
                chain.push(target.clone());
                return Err(AnalysisError::AliasCycle { chain });
            }
            chain.push(target.clone());
            current = target;
        }
        Ok(current.to_string())
    }

    /// Resolve a class name to candidate paths.
    ///
    /// `required_by` only names the requiring class in the log line emitted
    /// for unmapped namespaces.
    pub fn resolve(
        &self,
        class_name: &str,
        required_by: &str,
        alternate_names: &HashMap<String, String>,
        scanner: &dyn FileScanner,
    ) -> Result<ResolvedName> {
        let canonical = self.canonical_name(class_name, alternate_names)?;

        let Some((mapping, rest)) = self.mapping_for(&canonical) else {
            let namespace = canonical.split('.').next().unwrap_or(&canonical).to_string();
            tracing::warn!(
                "'{}' namespace is not mapped. [{} requires {}]",
                namespace,
                required_by,
                class_name
            );
            return Ok(ResolvedName {
                canonical,
                resolution: Resolution::Unmapped { namespace },
            });
        };

        let base = match &mapping.target {
            NamespaceTarget::Disabled => {
                return Ok(ResolvedName {
                    canonical,
                    resolution: Resolution::Disabled,
                });
            }
            NamespaceTarget::Path(base) => base,
        };

        let path = std::iter::once(base.as_str())
            .chain(rest.split('.').filter(|s| !s.is_empty()))
            .collect::<Vec<_>>()
            .join("/");

        let paths = if path.contains('*') {
            self.expand_wildcard(&path, scanner)
        } else {
            vec![path]
        };

        Ok(ResolvedName {
            canonical,
            resolution: Resolution::Paths(paths),
        })
    }

    /// Expand the first `*` into `**/*.<ext>` for every script extension.
    fn expand_wildcard(&self, path: &str, scanner: &dyn FileScanner) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for ext in &self.scripts {
            let pattern = path.replacen('*', &format!("**/*.{}", ext), 1);
            for found in scanner.expand(&pattern) {
                paths.push(strip_script_extension(&found, &self.scripts).to_string());
            }
        }
        paths.sort();
        paths.dedup();
        paths
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
