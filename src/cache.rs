/// Per-file analysis cache.
///
/// Records are keyed by the normalised web path of a file and carry the
/// SHA-256 fingerprint of the content they were computed from. A lookup with
/// a different fingerprint is a miss, so a stale record is never served.
use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::AnalysisError;
use crate::types::{FileRecord, FileState, TransformOutput};

/// Hex-encoded SHA-256 of a source text.
pub fn fingerprint(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<'a> {
    /// Transformed output for exactly this content.
    Hit(&'a TransformOutput),
    /// This content failed to parse before.
    Failed(&'a AnalysisError),
    Miss,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    records: HashMap<String, FileRecord>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record for `path`, whatever its fingerprint.
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.records.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut FileRecord> {
        self.records.get_mut(path)
    }

    /// Look up the result for `path` at content `fingerprint`.
    pub fn lookup(&self, path: &str, fingerprint: &str) -> CacheLookup<'_> {
        let Some(record) = self.records.get(path) else {
            return CacheLookup::Miss;
        };
        if record.fingerprint != fingerprint {
            return CacheLookup::Miss;
        }
        match (record.state, &record.output, &record.error) {
            (FileState::Cached, Some(output), _) => CacheLookup::Hit(output),
            (FileState::Failed, _, Some(error)) => CacheLookup::Failed(error),
            _ => CacheLookup::Miss,
        }
    }

    pub fn put(&mut self, record: FileRecord) {
        self.records.insert(record.path.clone(), record);
    }

    /// Forget the transform result of `path`. The record stays, back in
    /// [`FileState::Unseen`], so the file is re-analysed on its next transform.
    pub fn invalidate(&mut self, path: &str) -> bool {
        match self.records.get_mut(path) {
            Some(record) => {
                record.state = FileState::Unseen;
                record.output = None;
                record.error = None;
                true
            }
            None => false,
        }
    }

    /// Forget the output of every record, keeping the extracted classes.
    pub fn invalidate_all(&mut self) {
        for record in self.records.values_mut() {
            if record.state == FileState::Cached {
                record.state = FileState::ImportsResolved;
                record.output = None;
            }
        }
    }

    pub fn remove(&mut self, path: &str) -> Option<FileRecord> {
        self.records.remove(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
