/// File-system access used by discovery and namespace resolution.
///
/// Directory scanning and glob matching belong to the host environment, so
/// the rest of the crate only sees the [`FileScanner`] trait. [`FsScanner`]
/// is the default implementation: it walks the project root with the
/// `ignore` crate and matches patterns with `globset`.
///
/// All paths crossing this boundary are web paths (root-relative, leading
/// `/`) and keep their file extension.
use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use ignore::WalkBuilder;

pub trait FileScanner: Send + Sync {
    /// Project root every web path is relative to.
    fn root(&self) -> &Path;

    /// Expand a root-relative glob into the matching files, sorted.
    fn expand(&self, pattern: &str) -> Vec<String>;

    /// Every file below `base` whose extension is in `extensions`, sorted.
    fn list(&self, base: &str, extensions: &[String]) -> Vec<String>;

    fn exists(&self, path: &str) -> bool;

    fn read(&self, path: &str) -> std::io::Result<String>;
}

/// [`FileScanner`] backed by the local file system.
#[derive(Debug, Clone)]
pub struct FsScanner {
    root: PathBuf,
}

impl FsScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn absolute(&self, web_path: &str) -> PathBuf {
        self.root.join(web_path.trim_start_matches('/'))
    }

    /// Walk `dir` (absolute) and return the web path of every regular file.
    fn walk(&self, dir: &Path) -> Vec<String> {
        if !dir.is_dir() {
            return Vec::new();
        }
        let mut files = Vec::new();
        // Library sources are often git-ignored vendor copies, so no
        // ignore-file filtering here.
        for entry in WalkBuilder::new(dir).standard_filters(false).build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                files.push(format!("/{}", relative.to_string_lossy().replace('\\', "/")));
            }
        }
        files.sort();
        files
    }
}

/// The directory part of a glob before its first wildcard segment.
fn literal_prefix(pattern: &str) -> &str {
    let wildcard = pattern
        .find(['*', '?', '[', '{'])
        .unwrap_or(pattern.len());
    match pattern[..wildcard].rfind('/') {
        Some(slash) => &pattern[..slash],
        None => "",
    }
}

impl FileScanner for FsScanner {
    fn root(&self) -> &Path {
        &self.root
    }

    fn expand(&self, pattern: &str) -> Vec<String> {
        let pattern = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("/{}", pattern)
        };
        let matcher = match GlobBuilder::new(&pattern).literal_separator(true).build() {
            Ok(glob) => glob.compile_matcher(),
            Err(err) => {
                tracing::warn!(pattern = %pattern, error = %err, "invalid wildcard pattern");
                return Vec::new();
            }
        };
        self.walk(&self.absolute(literal_prefix(&pattern)))
            .into_iter()
            .filter(|path| matcher.is_match(path))
            .collect()
    }

    fn list(&self, base: &str, extensions: &[String]) -> Vec<String> {
        self.walk(&self.absolute(base))
            .into_iter()
            .filter(|path| {
                extensions
                    .iter()
                    .any(|ext| path.strip_suffix(ext.as_str()).is_some_and(|s| s.ends_with('.')))
            })
            .collect()
    }

    fn exists(&self, path: &str) -> bool {
        self.absolute(path).is_file()
    }

    fn read(&self, path: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.absolute(path))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        for rel in files {
            let full = dir.path().join(rel);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, "").unwrap();
        }
        dir
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("/src/view/**/*.js"), "/src/view");
        assert_eq!(literal_prefix("/src/*.js"), "/src");
        assert_eq!(literal_prefix("*.js"), "");
    }

    #[test]
    fn test_expand_is_sorted_and_recursive() {
        let dir = workspace(&["src/view/b.js", "src/view/a.js", "src/view/sub/c.js", "src/x.js"]);
        let scanner = FsScanner::new(dir.path());

        assert_eq!(
            scanner.expand("/src/view/**/*.js"),
            vec!["/src/view/a.js", "/src/view/b.js", "/src/view/sub/c.js"]
        );
    }

    #[test]
    fn test_list_filters_extensions() {
        let dir = workspace(&["lib/A.js", "lib/A.scss", "lib/readme.md"]);
        let scanner = FsScanner::new(dir.path());

        assert_eq!(scanner.list("/lib", &["js".to_string()]), vec!["/lib/A.js"]);
        assert!(scanner.exists("/lib/A.scss"));
        assert!(!scanner.exists("/lib/B.scss"));
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let dir = workspace(&[]);
        let scanner = FsScanner::new(dir.path());
        assert!(scanner.list("/nope", &["js".to_string()]).is_empty());
    }
}
