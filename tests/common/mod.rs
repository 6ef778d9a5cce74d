#![allow(dead_code)]

use std::fs;
use std::path::Path;

use extjs_import::config::NamespaceTarget;
use extjs_import::{Backend, Config, Session};

pub fn create_test_backend() -> Backend {
    Backend::new_test()
}

/// A temporary project directory holding JavaScript sources.
pub struct TestWorkspace {
    dir: tempfile::TempDir,
}

impl TestWorkspace {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let ws = TestWorkspace { dir };
        for (rel_path, content) in files {
            ws.write(rel_path, content);
        }
        ws
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel_path: &str, content: &str) {
        let full = self.dir.path().join(rel_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("failed to create dirs");
        }
        fs::write(&full, content).expect("failed to write source file");
    }

    pub fn remove(&self, rel_path: &str) {
        fs::remove_file(self.dir.path().join(rel_path)).expect("failed to remove file");
    }

    pub fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel_path)).expect("failed to read file")
    }

    /// The module id a build host would use for `rel_path`.
    pub fn id(&self, rel_path: &str) -> String {
        self.dir.path().join(rel_path).to_string_lossy().to_string()
    }

    /// A session over this workspace, with discovery already run.
    pub fn session(&self, config: Config) -> Session {
        let mut session = Session::new(self.root(), config).expect("invalid config");
        session.discover().expect("discovery failed");
        session
    }

    /// Transform `rel_path` with its on-disk content.
    pub fn transform(&self, session: &mut Session, rel_path: &str) -> String {
        session
            .transform(&self.id(rel_path), &self.read(rel_path))
            .expect("transform failed")
            .expect("file was not transformed")
            .code
    }

    pub fn backend(&self, config: Config) -> Backend {
        Backend::new_test_with_workspace(self.root().to_path_buf(), config)
    }
}

/// Configuration mapping each `(namespace, base path)`; a `None` path disables the namespace.
pub fn mapped(entries: &[(&str, Option<&str>)]) -> Config {
    entries
        .iter()
        .fold(Config::default(), |config, (namespace, path)| {
            let target = match path {
                Some(path) => NamespaceTarget::Path(path.to_string()),
                None => NamespaceTarget::Disabled,
            };
            config.with_mapping(namespace, target)
        })
}

/// The import lines of an injected block, in order.
pub fn import_lines(code: &str) -> Vec<&str> {
    code.lines()
        .filter(|line| line.starts_with("import '"))
        .collect()
}
