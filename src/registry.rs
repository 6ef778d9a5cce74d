/// Session-wide class registry.
///
/// Maps class names to their descriptors and keeps the secondary indexes
/// the import graph needs: alternate class names, aliases and the set of
/// classes each file defines. One registry exists per session; a full
/// rebuild starts from an empty one.
use std::collections::{BTreeMap, HashMap};

use crate::types::{ClassDescriptor, ClassMapSnapshot, MissingImports};

#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassDescriptor>,
    /// Alternate class name → canonical class name.
    alternate_names: HashMap<String, String>,
    /// `alias` value → class name.
    aliases: HashMap<String, String>,
    /// Source file → names of the classes it defines, in source order.
    by_file: HashMap<String, Vec<String>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Insert or replace a descriptor. Returns the descriptor previously
    /// registered under the same name.
    ///
    /// When a class moves between files the old file loses ownership of it.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> Option<ClassDescriptor> {
        let previous = self.unregister(&descriptor.name);
        if let Some(old) = &previous
            && old.source_file != descriptor.source_file
        {
            tracing::debug!(
                class = %descriptor.name,
                from = %old.source_file,
                to = %descriptor.source_file,
                "class redefined in another file"
            );
        }

        for alternate in &descriptor.alternate_names {
            self.alternate_names
                .insert(alternate.clone(), descriptor.name.clone());
        }
        if let Some(alias) = &descriptor.alias {
            self.aliases.insert(alias.clone(), descriptor.name.clone());
        }
        let owned = self
            .by_file
            .entry(descriptor.source_file.clone())
            .or_default();
        if !owned.contains(&descriptor.name) {
            owned.push(descriptor.name.clone());
        }
        self.classes.insert(descriptor.name.clone(), descriptor);
        previous
    }

    /// Remove one class and every index entry pointing at it.
    fn unregister(&mut self, name: &str) -> Option<ClassDescriptor> {
        let removed = self.classes.remove(name)?;
        self.alternate_names.retain(|_, target| target != name);
        self.aliases.retain(|_, target| target != name);
        if let Some(owned) = self.by_file.get_mut(&removed.source_file) {
            owned.retain(|owned_name| owned_name != name);
            if owned.is_empty() {
                self.by_file.remove(&removed.source_file);
            }
        }
        Some(removed)
    }

    /// Drop every class defined by `file`. Returns the removed descriptors.
    pub fn remove_file(&mut self, file: &str) -> Vec<ClassDescriptor> {
        let names = self.by_file.remove(file).unwrap_or_default();
        names
            .iter()
            .filter_map(|name| self.unregister(name))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    /// Look a class up by name, alternate class name, or alias.
    ///
    /// Alternate names are followed one hop only; [`NamespaceResolver`]
    /// handles chains.
    ///
    /// [`NamespaceResolver`]: crate::namespace::NamespaceResolver
    pub fn lookup(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes
            .get(name)
            .or_else(|| {
                self.alternate_names
                    .get(name)
                    .and_then(|canonical| self.classes.get(canonical))
            })
            .or_else(|| {
                self.aliases
                    .get(name)
                    .and_then(|canonical| self.classes.get(canonical))
            })
    }

    /// Classes defined in `file`, in source order.
    pub fn classes_in_file(&self, file: &str) -> Vec<&ClassDescriptor> {
        self.by_file
            .get(file)
            .map(|names| names.iter().filter_map(|n| self.classes.get(n)).collect())
            .unwrap_or_default()
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.by_file.keys().map(String::as_str)
    }

    pub fn alternate_names(&self) -> &HashMap<String, String> {
        &self.alternate_names
    }

    /// Record the resolved import paths of a class.
    pub fn set_imports(&mut self, name: &str, imports: Vec<String>) {
        if let Some(descriptor) = self.classes.get_mut(name) {
            descriptor.imports = imports;
        }
    }

    pub fn clear(&mut self) {
        self.classes.clear();
        self.alternate_names.clear();
        self.aliases.clear();
        self.by_file.clear();
    }

    /// Serialisable copy of the registry, keyed and ordered by class name.
    pub fn snapshot(&self, generation: u64, missing_imports: &MissingImports) -> ClassMapSnapshot {
        let classes: BTreeMap<String, ClassDescriptor> = self
            .classes
            .iter()
            .map(|(name, descriptor)| (name.clone(), descriptor.clone()))
            .collect();
        ClassMapSnapshot {
            generation,
            classes,
            missing_imports: missing_imports.clone(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
