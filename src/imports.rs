/// Import graph construction.
///
/// Turns the class references of a file (`extend`, `override`, `requires`,
/// `uses`, `mixins`) into the ordered list of module paths the file has to
/// import. Paths are emitted dependency-first: before a path is emitted, the
/// references of every class defined in that path are emitted, so a module
/// always follows the modules it builds on.
///
/// Deduplication happens at two levels:
///   - within one file a path is emitted at most once;
///   - with [`DedupPolicy::Global`] a path is *claimed* by the first file
///     that emits it and skipped by every other file until that file is
///     re-analysed and releases its claims.
use std::collections::{HashMap, HashSet};

use crate::config::{Config, NamespaceTarget};
use crate::error::AnalysisError;
use crate::namespace::{NamespaceResolver, Resolution};
use crate::registry::ClassRegistry;
use crate::scanner::FileScanner;
use crate::types::{
    ClassDescriptor, DedupPolicy, Diagnostic, DiagnosticKind, MissingImports, Severity,
    push_unique,
};

/// Claims on emitted paths, shared by every file of a session.
#[derive(Debug, Clone, Default)]
pub struct DedupSet {
    policy: DedupPolicy,
    /// Path → file that emitted it.
    claims: HashMap<String, String>,
}

impl DedupSet {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            claims: HashMap::new(),
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Whether `file` may emit `path`. Under the global policy the first
    /// file to ask becomes the owner.
    pub fn claim(&mut self, path: &str, file: &str) -> bool {
        match self.policy {
            DedupPolicy::File => true,
            DedupPolicy::Global => match self.claims.get(path) {
                Some(owner) => owner == file,
                None => {
                    self.claims.insert(path.to_string(), file.to_string());
                    true
                }
            },
        }
    }

    pub fn owner(&self, path: &str) -> Option<&str> {
        self.claims.get(path).map(String::as_str)
    }

    /// Forget every claim held by `file`.
    pub fn release_file(&mut self, file: &str) {
        self.claims.retain(|_, owner| owner != file);
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn clear(&mut self) {
        self.claims.clear();
    }
}

/// One line of the injected import block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEntry {
    /// A script module, path without extension.
    Script(String),
    /// A co-located asset, path with extension.
    Asset(String),
}

impl ImportEntry {
    pub fn path(&self) -> &str {
        match self {
            ImportEntry::Script(path) | ImportEntry::Asset(path) => path,
        }
    }

    /// The import specifier: scripts get `script_ext` appended.
    pub fn specifier(&self, script_ext: &str) -> String {
        match self {
            ImportEntry::Script(path) => format!("{}.{}", path, script_ext),
            ImportEntry::Asset(path) => path.clone(),
        }
    }
}

/// Imports resolved for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedImports {
    pub entries: Vec<ImportEntry>,
    /// Script paths emitted while visiting each class of the file.
    pub by_class: Vec<(String, Vec<String>)>,
    /// Requiring class → references that resolved to nothing.
    pub missing: MissingImports,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedImports {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.values().map(Vec::len).sum()
    }
}

/// What a single class reference resolves to.
enum Target {
    Paths(Vec<String>),
    Disabled,
    Missing { namespace: String },
}

/// Traversal state for one file.
struct Walk<'w> {
    owner: &'w str,
    /// Paths already emitted (or already imported by the source).
    emitted: HashSet<String>,
    /// Classes whose references have been visited.
    visited: HashSet<String>,
    /// Index into `out.by_class` of the top-level class being visited.
    current: Option<usize>,
    out: ResolvedImports,
}

pub struct ImportGraphBuilder<'a> {
    registry: &'a ClassRegistry,
    resolver: &'a NamespaceResolver,
    scanner: &'a dyn FileScanner,
    config: &'a Config,
}

impl<'a> ImportGraphBuilder<'a> {
    pub fn new(
        registry: &'a ClassRegistry,
        resolver: &'a NamespaceResolver,
        scanner: &'a dyn FileScanner,
        config: &'a Config,
    ) -> Self {
        Self {
            registry,
            resolver,
            scanner,
            config,
        }
    }

    /// Resolve the imports of `file`, which defines `classes`.
    ///
    /// `existing_imports` are paths the source already imports; they count
    /// as emitted and are neither repeated nor claimed.
    pub fn resolve_file(
        &self,
        file: &str,
        classes: &[ClassDescriptor],
        existing_imports: &[String],
        dedup: &mut DedupSet,
    ) -> ResolvedImports {
        let mut walk = Walk {
            owner: file,
            emitted: existing_imports.iter().cloned().collect(),
            visited: classes.iter().map(|c| c.name.clone()).collect(),
            current: None,
            out: ResolvedImports::default(),
        };

        for class in classes {
            walk.out.by_class.push((class.name.clone(), Vec::new()));
            walk.current = Some(walk.out.by_class.len() - 1);
            self.visit_class(class, true, &mut walk, Some(&mut *dedup));
        }
        walk.out
    }

    /// Resolve the imports of a single class, as if its file defined nothing else.
    pub fn resolve_imports(
        &self,
        descriptor: &ClassDescriptor,
        dedup: &mut DedupSet,
    ) -> ResolvedImports {
        self.resolve_file(
            &descriptor.source_file,
            std::slice::from_ref(descriptor),
            &[],
            dedup,
        )
    }

    /// The dependency-first closure of script paths a class needs, without
    /// touching any dedup claims.
    pub fn transitive_paths(&self, descriptor: &ClassDescriptor) -> Vec<String> {
        let mut walk = Walk {
            owner: &descriptor.source_file,
            emitted: HashSet::new(),
            visited: HashSet::from([descriptor.name.clone()]),
            current: None,
            out: ResolvedImports::default(),
        };
        self.visit_class(descriptor, true, &mut walk, None);
        walk.out
            .entries
            .into_iter()
            .filter_map(|entry| match entry {
                ImportEntry::Script(path) => Some(path),
                ImportEntry::Asset(_) => None,
            })
            .collect()
    }

    fn visit_class(
        &self,
        class: &ClassDescriptor,
        direct: bool,
        walk: &mut Walk<'_>,
        mut dedup: Option<&mut DedupSet>,
    ) {
        for reference in class.references() {
            match self.resolve_reference(reference, &class.name) {
                Ok(Target::Paths(paths)) => {
                    for path in paths {
                        self.emit_path(&path, walk, dedup.as_deref_mut());
                    }
                }
                Ok(Target::Disabled) => {}
                Ok(Target::Missing { namespace }) => {
                    if direct {
                        let list = walk.out.missing.entry(class.name.clone()).or_default();
                        push_unique(list, reference);
                        walk.out.diagnostics.push(Diagnostic::new(
                            DiagnosticKind::UnmappedNamespace,
                            Severity::Warning,
                            walk.owner,
                            format!(
                                "'{}' namespace is not mapped. [{} requires {}]",
                                namespace, class.name, reference
                            ),
                        ));
                    }
                }
                Err(err @ AnalysisError::AliasCycle { .. }) => {
                    tracing::warn!(class = %class.name, reference, "{}", err);
                    let diagnostic = err.to_diagnostic(walk.owner);
                    if !walk.out.diagnostics.contains(&diagnostic) {
                        walk.out.diagnostics.push(diagnostic);
                    }
                }
                Err(err) => {
                    tracing::warn!(class = %class.name, reference, "{}", err);
                }
            }
        }
    }

    fn resolve_reference(
        &self,
        reference: &str,
        required_by: &str,
    ) -> crate::error::Result<Target> {
        let alternates = self.registry.alternate_names();
        let canonical = self.resolver.canonical_name(reference, alternates)?;

        if let Some((mapping, _)) = self.resolver.mapping_for(&canonical)
            && mapping.target == NamespaceTarget::Disabled
        {
            return Ok(Target::Disabled);
        }
        // A registered class lives where it was found, whatever its name says.
        if let Some(known) = self.registry.get(&canonical) {
            return Ok(Target::Paths(vec![known.source_file.clone()]));
        }

        let resolved = self
            .resolver
            .resolve(reference, required_by, alternates, self.scanner)?;
        Ok(match resolved.resolution {
            Resolution::Paths(paths) => Target::Paths(paths),
            Resolution::Disabled => Target::Disabled,
            Resolution::Unmapped { namespace } => Target::Missing { namespace },
        })
    }

    fn emit_path(&self, path: &str, walk: &mut Walk<'_>, mut dedup: Option<&mut DedupSet>) {
        if path == walk.owner || !walk.emitted.insert(path.to_string()) {
            return;
        }

        // Dependencies of the classes in `path` go first.
        for class in self.registry.classes_in_file(path) {
            if walk.visited.insert(class.name.clone()) {
                self.visit_class(class, false, walk, dedup.as_deref_mut());
            }
        }

        let claimed = match dedup {
            Some(dedup) => dedup.claim(path, walk.owner),
            None => true,
        };
        if !claimed {
            return;
        }

        walk.out.entries.push(ImportEntry::Script(path.to_string()));
        if let Some(current) = walk.current {
            walk.out.by_class[current].1.push(path.to_string());
        }
        if self.config.auto_import_assets {
            for ext in &self.config.assets {
                let asset = format!("{}.{}", path, ext);
                if self.scanner.exists(&asset) {
                    walk.out.entries.push(ImportEntry::Asset(asset));
                }
            }
        }
    }
}

/// Render the injected import block, or an empty string when there is nothing to import.
pub fn render_import_block(entries: &[ImportEntry], script_ext: &str) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut block = String::from("/*** <extjs-import> ***/\n");
    for entry in entries {
        block.push_str(&format!("import '{}';\n", entry.specifier(script_ext)));
    }
    block.push_str("/*** </extjs-import> ***/\n\n");
    block
}

// ─── Tests ──────────────────────────────────────────────────────────────────
