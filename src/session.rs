/// Build-session orchestration.
///
/// A [`Session`] owns everything one build needs: the configuration, the
/// namespace resolver, the class registry, the analysis cache and the
/// global dedup claims. The host drives it through four hooks:
///
///   - [`Session::discover`]: bulk discovery over every mapped namespace
///     followed by full import resolution,
///   - [`Session::transform`]: cache lookup, import resolution and
///     `callParent` rewriting for one file,
///   - [`Session::file_changed`]: invalidation and incremental discovery,
///   - [`Session::snapshot`] / [`Session::virtual_module`]: the class map.
///
/// A full rebuild replaces the registry, cache, claims and report and bumps
/// the generation counter, so nothing from a previous pass survives it.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::cache::{AnalysisCache, CacheLookup, fingerprint};
use crate::call_parent::rewrite_call_parent;
use crate::config::Config;
use crate::error::{AnalysisError, Result};
use crate::imports::{DedupSet, ImportGraphBuilder, ResolvedImports, render_import_block};
use crate::namespace::NamespaceResolver;
use crate::parser::definitions::{ExtractedClass, extract_class};
use crate::parser::{ParsedSource, parse_source};
use crate::registry::ClassRegistry;
use crate::scanner::{FileScanner, FsScanner};
use crate::types::{
    ClassDescriptor, ClassMapSnapshot, Diagnostic, DiscoveryReport, FileChange, FileRecord,
    FileState, MissingImports, TransformOutput, UnmappedPolicy,
};
use crate::util::{
    is_always_skipped, normalise_file_id, normalise_web_path, resolve_specifier,
    strip_script_extension,
};

pub struct Session {
    root: PathBuf,
    config: Config,
    scanner: Box<dyn FileScanner>,
    resolver: NamespaceResolver,
    include: GlobSet,
    exclude: GlobSet,
    registry: ClassRegistry,
    cache: AnalysisCache,
    dedup: DedupSet,
    missing: MissingImports,
    generation: u64,
}

/// Compile root-relative glob patterns.
fn build_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern.trim_start_matches('/'))
            .literal_separator(true)
            .build()
            .map_err(|e| AnalysisError::Config(format!("pattern `{}`: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| AnalysisError::Config(e.to_string()))
}

fn extract_classes<'t>(
    parsed: &'t ParsedSource<'_>,
    path: &str,
    class_systems: &[String],
) -> Vec<ExtractedClass<'t>> {
    parsed
        .define_calls(class_systems)
        .iter()
        .filter_map(|call| extract_class(call, parsed.source(), path))
        .collect()
}

impl Session {
    /// A session over the local file system rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let root = root.into();
        Self::with_scanner(Box::new(FsScanner::new(root)), config)
    }

    /// A session reading files through `scanner`.
    pub fn with_scanner(scanner: Box<dyn FileScanner>, config: Config) -> Result<Self> {
        let resolver = NamespaceResolver::new(&config.mappings, &config.scripts);
        Ok(Self {
            root: scanner.root().to_path_buf(),
            include: build_globs(&config.include)?,
            exclude: build_globs(&config.exclude)?,
            dedup: DedupSet::new(config.dedup),
            resolver,
            scanner,
            config,
            registry: ClassRegistry::new(),
            cache: AnalysisCache::new(),
            missing: MissingImports::new(),
            generation: 0,
        })
    }

    /// Create a session and run bulk discovery.
    ///
    /// Under the fatal unmapped policy a discovery that leaves unresolved
    /// references is an error; the session is dropped with it.
    pub fn start(root: impl Into<PathBuf>, config: Config) -> Result<(Self, DiscoveryReport)> {
        let mut session = Self::new(root, config)?;
        let report = session.discover()?;
        Ok((session, report))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub fn missing_imports(&self) -> &MissingImports {
        &self.missing
    }

    fn script_extension(&self) -> &str {
        self.config.scripts.first().map(String::as_str).unwrap_or("js")
    }

    /// Whether a web path lies under an enabled namespace mapping.
    fn in_mapped_namespace(&self, path: &str) -> bool {
        self.resolver.enabled_base_dirs().iter().any(|(_, dir)| {
            *dir == "/"
                || path == *dir
                || path
                    .strip_prefix(*dir)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn is_included(&self, path_with_ext: &str) -> bool {
        self.include.is_match(path_with_ext.trim_start_matches('/'))
    }

    fn is_excluded(&self, path_with_ext: &str) -> bool {
        self.exclude.is_match(path_with_ext.trim_start_matches('/'))
            && !self.is_included(path_with_ext)
    }

    fn has_script_extension(&self, path_with_ext: &str) -> bool {
        strip_script_extension(path_with_ext, &self.config.scripts) != path_with_ext
    }

    // ─── Discovery ──────────────────────────────────────────────────────────

    /// Full discovery: scan every enabled mapping and the include patterns,
    /// register every class, then resolve the import graph of every file.
    ///
    /// Files are processed in sorted path order so that global dedup claims
    /// are deterministic.
    pub fn discover(&mut self) -> Result<DiscoveryReport> {
        self.registry.clear();
        self.cache.clear();
        self.dedup = DedupSet::new(self.config.dedup);
        self.missing.clear();
        self.generation += 1;

        let mut candidates: BTreeSet<String> = BTreeSet::new();
        for (namespace, dir) in self.resolver.enabled_base_dirs() {
            let files = self.scanner.list(dir, &self.config.scripts);
            tracing::debug!(namespace, dir, files = files.len(), "scanned namespace");
            candidates.extend(files);
        }
        for pattern in &self.config.include {
            candidates.extend(self.scanner.expand(pattern));
        }

        let mut report = DiscoveryReport {
            generation: self.generation,
            ..DiscoveryReport::default()
        };

        let mut discovered = Vec::new();
        for file in candidates {
            if self.is_excluded(&file) {
                tracing::debug!(file = %file, "excluded from discovery");
                report.skipped += 1;
                continue;
            }
            let path = normalise_web_path(&file, &self.config.scripts);
            let source = match self.scanner.read(&file) {
                Ok(source) => source,
                Err(err) => {
                    let err = AnalysisError::io(file.as_str(), &err);
                    tracing::warn!("{}", err);
                    report.failed.push(err.to_diagnostic(&path));
                    continue;
                }
            };
            report.files += 1;
            match self.discover_file(&path, &source) {
                Ok(()) => discovered.push(path),
                Err(err) => {
                    tracing::warn!("{}", err);
                    report.failed.push(err.to_diagnostic(&path));
                }
            }
        }

        for path in &discovered {
            let resolved = self.resolve_file_imports(path);
            if let Some(record) = self.cache.get_mut(path) {
                record.diagnostics.extend(resolved.diagnostics);
                record.state = FileState::ImportsResolved;
            }
        }

        report.classes = self.registry.len();
        report.missing_imports = self.missing.clone();
        tracing::info!(
            generation = self.generation,
            files = report.files,
            classes = report.classes,
            failed = report.failed.len(),
            "discovery finished"
        );

        self.enforce_unmapped_policy(missing_count(&self.missing))?;
        Ok(report)
    }

    /// Alias for [`Session::discover`], used when the host asks for a rebuild.
    pub fn rebuild(&mut self) -> Result<DiscoveryReport> {
        self.discover()
    }

    /// Parse `source` and register the classes it defines.
    fn discover_file(&mut self, path: &str, source: &str) -> Result<()> {
        let mut record = FileRecord::new(path, fingerprint(source));
        let parsed = match parse_source(path, source) {
            Ok(parsed) => parsed,
            Err(err) => {
                record.state = FileState::Failed;
                record.diagnostics.push(err.to_diagnostic(path));
                record.error = Some(err.clone());
                self.cache.put(record);
                return Err(err);
            }
        };
        record.state = FileState::Parsed;

        let extracted = extract_classes(&parsed, path, &self.config.class_systems);
        record.existing_imports = self.existing_imports(&parsed, path);
        record.diagnostics = extracted
            .iter()
            .flat_map(|class| class.diagnostics.iter().cloned())
            .collect();
        let descriptors = extracted.into_iter().map(|class| class.descriptor).collect();
        record.defined_classes = self.replace_definitions(path, descriptors);
        record.state = FileState::ClassesExtracted;
        self.cache.put(record);
        Ok(())
    }

    /// Swap the classes registered for `path` for `descriptors`.
    fn replace_definitions(&mut self, path: &str, descriptors: Vec<ClassDescriptor>) -> Vec<String> {
        for removed in self.registry.remove_file(path) {
            self.missing.remove(&removed.name);
        }
        let mut names = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            names.push(descriptor.name.clone());
            self.registry.register(descriptor);
        }
        names
    }

    fn existing_imports(&self, parsed: &ParsedSource<'_>, path: &str) -> Vec<String> {
        parsed
            .static_imports()
            .iter()
            .filter_map(|specifier| resolve_specifier(path, specifier, &self.config.scripts))
            .collect()
    }

    /// Re-resolve the imports of one registered file, replacing its dedup
    /// claims and its entries in the missing-imports report.
    fn resolve_file_imports(&mut self, path: &str) -> ResolvedImports {
        let classes: Vec<ClassDescriptor> = self
            .registry
            .classes_in_file(path)
            .into_iter()
            .cloned()
            .collect();
        let existing = self
            .cache
            .get(path)
            .map(|record| record.existing_imports.clone())
            .unwrap_or_default();

        self.dedup.release_file(path);
        let builder = ImportGraphBuilder::new(
            &self.registry,
            &self.resolver,
            self.scanner.as_ref(),
            &self.config,
        );
        let resolved = builder.resolve_file(path, &classes, &existing, &mut self.dedup);

        for (name, imports) in &resolved.by_class {
            self.registry.set_imports(name, imports.clone());
        }
        for class in &classes {
            self.missing.remove(&class.name);
        }
        for (requiring, references) in &resolved.missing {
            self.missing.insert(requiring.clone(), references.clone());
        }
        resolved
    }

    fn enforce_unmapped_policy(&self, count: usize) -> Result<()> {
        if self.config.unmapped == UnmappedPolicy::Fatal && count > 0 {
            return Err(AnalysisError::UnmappedNamespaces { count });
        }
        Ok(())
    }

    // ─── Transform ──────────────────────────────────────────────────────────

    /// Transform one file for the host pipeline.
    ///
    /// Returns `Ok(None)` for ids that are never transformed: stylesheets,
    /// html, raw requests, the host's own dependencies, non-script files,
    /// excluded files, and files outside every mapped namespace that no
    /// include pattern names.
    pub fn transform(&mut self, file_id: &str, source: &str) -> Result<Option<TransformOutput>> {
        if is_always_skipped(file_id) {
            return Ok(None);
        }
        let with_ext = normalise_file_id(&self.root, file_id, &[]);
        let path = normalise_web_path(&with_ext, &self.config.scripts);
        let included = self.is_included(&with_ext);
        if !self.has_script_extension(&with_ext)
            || self.is_excluded(&with_ext)
            || (!included && !self.in_mapped_namespace(&path))
        {
            tracing::debug!(file = %path, "not transformed");
            return Ok(None);
        }

        let fp = fingerprint(source);
        match self.cache.lookup(&path, &fp) {
            CacheLookup::Hit(output) => {
                tracing::debug!(file = %path, "cache hit");
                return Ok(Some(output.clone()));
            }
            CacheLookup::Failed(err) => return Err(err.clone()),
            CacheLookup::Miss => {}
        }

        let mut record = FileRecord::new(path.as_str(), fp);
        let parsed = match parse_source(&path, source) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("{}", err);
                record.state = FileState::Failed;
                record.diagnostics.push(err.to_diagnostic(&path));
                record.error = Some(err.clone());
                if let Some(previous) = self.cache.get(&path) {
                    record.defined_classes = previous.defined_classes.clone();
                }
                self.cache.put(record);
                return Err(err);
            }
        };
        record.state = FileState::Parsed;

        let extracted = extract_classes(&parsed, &path, &self.config.class_systems);
        let mut diagnostics: Vec<Diagnostic> = extracted
            .iter()
            .flat_map(|class| class.diagnostics.iter().cloned())
            .collect();
        record.existing_imports = self.existing_imports(&parsed, &path);
        record.defined_classes = self.replace_definitions(
            &path,
            extracted.iter().map(|class| class.descriptor.clone()).collect(),
        );
        record.state = FileState::ClassesExtracted;
        self.cache.put(record);

        let resolved = self.resolve_file_imports(&path);
        diagnostics.extend(resolved.diagnostics.iter().cloned());
        if let Some(record) = self.cache.get_mut(&path) {
            record.state = FileState::ImportsResolved;
        }
        self.enforce_unmapped_policy(resolved.missing_count())?;

        let body = if self.config.replace_call_parent {
            let rewrite = rewrite_call_parent(source, &extracted, &path);
            diagnostics.extend(rewrite.diagnostics);
            rewrite.code
        } else {
            source.to_string()
        };
        if let Some(record) = self.cache.get_mut(&path) {
            record.state = FileState::Rewritten;
        }

        let script_ext = self.script_extension();
        let code = format!(
            "{}{}",
            render_import_block(&resolved.entries, script_ext),
            body
        );
        let output = TransformOutput {
            changed: code != source,
            imports: resolved
                .entries
                .iter()
                .map(|entry| entry.specifier(script_ext))
                .collect(),
            code,
            diagnostics,
        };

        if let Some(record) = self.cache.get_mut(&path) {
            record.diagnostics = output.diagnostics.clone();
            record.output = Some(output.clone());
            record.state = FileState::Cached;
        }
        Ok(Some(output))
    }

    // ─── File watching ──────────────────────────────────────────────────────

    /// React to a file-system change reported by the host.
    ///
    /// Returns the discovery report when the change triggered a full rebuild.
    pub fn file_changed(&mut self, file_id: &str, change: FileChange) -> Result<Option<DiscoveryReport>> {
        let with_ext = normalise_file_id(&self.root, file_id, &[]);
        let path = normalise_web_path(&with_ext, &self.config.scripts);
        let in_scope = self.has_script_extension(&with_ext)
            && !self.is_excluded(&with_ext)
            && (self.in_mapped_namespace(&path) || self.is_included(&with_ext));

        match change {
            FileChange::Created if in_scope => {
                tracing::info!(file = %path, "new file under a mapped namespace; rebuilding");
                self.discover().map(Some)
            }
            FileChange::Created => Ok(None),
            FileChange::Deleted => {
                self.cache.remove(&path);
                self.dedup.release_file(&path);
                for removed in self.registry.remove_file(&path) {
                    self.missing.remove(&removed.name);
                }
                self.cache.invalidate_all();
                Ok(None)
            }
            FileChange::Changed => {
                self.cache.invalidate(&path);
                if !in_scope {
                    return Ok(None);
                }
                let source = self
                    .scanner
                    .read(&with_ext)
                    .map_err(|e| AnalysisError::io(with_ext.as_str(), &e))?;
                self.discover_file(&path, &source)?;
                self.resolve_file_imports(&path);
                if let Some(record) = self.cache.get_mut(&path) {
                    record.state = FileState::ImportsResolved;
                }
                // Import lists of other files may point at classes that moved.
                self.cache.invalidate_all();
                Ok(None)
            }
        }
    }

    // ─── Class map ──────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> ClassMapSnapshot {
        self.registry.snapshot(self.generation, &self.missing)
    }

    /// The class map as an ES module for the host's virtual-module hook.
    pub fn virtual_module(&self) -> Result<String> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string(&snapshot.classes)
            .map_err(|e| AnalysisError::Serialize(e.to_string()))?;
        Ok(format!("export const classMap = {};\n", json))
    }

    /// Dependency-first closure of the paths `class_name` needs.
    pub fn import_closure(&self, class_name: &str) -> Option<Vec<String>> {
        let descriptor = self.registry.lookup(class_name)?;
        let builder = ImportGraphBuilder::new(
            &self.registry,
            &self.resolver,
            self.scanner.as_ref(),
            &self.config,
        );
        Some(builder.transitive_paths(descriptor))
    }
}

fn missing_count(missing: &MissingImports) -> usize {
    missing.values().map(Vec::len).sum()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
