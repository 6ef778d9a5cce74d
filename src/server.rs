/// JSON-RPC server implementation.
///
/// The build host talks to the resolver over the LSP base protocol. The
/// standard lifecycle messages map onto the session hooks:
///
///   - `initialize`: workspace root and configuration
///     (`initializationOptions`),
///   - `initialized`: session start and bulk discovery,
///   - `workspace/didChangeWatchedFiles`: invalidation and rebuilds,
///   - `shutdown`: session end.
///
/// Transforms and class-map queries are custom requests registered in
/// `main.rs` (`extjs/transform`, `extjs/classMap`, ...).
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_lsp::LanguageServer;
use tower_lsp::jsonrpc::{Error, ErrorCode, Result};
use tower_lsp::lsp_types::*;

use crate::Backend;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::session::Session;
use crate::types::{ClassMapSnapshot, DiscoveryReport, FileChange, MissingImports, TransformOutput};

/// Parameters of `extjs/transform`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformParams {
    /// Host module id: absolute path, possibly with a `?query`.
    pub id: String,
    pub code: String,
}

/// Parameters of `extjs/importClosure`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureParams {
    pub class_name: String,
}

/// Analysis failures are reported as server errors carrying the diagnostic.
fn rpc_error(err: AnalysisError, file: &str) -> Error {
    let code = match err {
        AnalysisError::Parse { .. } => -32001,
        AnalysisError::UnmappedNamespaces { .. } => -32002,
        AnalysisError::AliasCycle { .. } => -32003,
        _ => -32000,
    };
    Error {
        code: ErrorCode::ServerError(code),
        message: err.to_string().into(),
        data: serde_json::to_value(err.to_diagnostic(file)).ok(),
    }
}

fn not_started() -> Error {
    Error {
        code: ErrorCode::ServerError(-32004),
        message: "session has not been started".into(),
        data: None,
    }
}

fn file_change(typ: FileChangeType) -> Option<FileChange> {
    match typ {
        FileChangeType::CREATED => Some(FileChange::Created),
        FileChangeType::CHANGED => Some(FileChange::Changed),
        FileChangeType::DELETED => Some(FileChange::Deleted),
        _ => None,
    }
}

fn summary(report: &DiscoveryReport) -> String {
    let missing: usize = report.missing_imports.values().map(Vec::len).sum();
    format!(
        "{} class(es) in {} file(s), {} failed, {} missing import(s)",
        report.classes,
        report.files,
        report.failed.len(),
        missing
    )
}

impl Backend {
    /// Run `f` against the live session.
    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut Session) -> std::result::Result<T, (AnalysisError, String)>,
    ) -> Result<T> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or_else(not_started)?;
        f(session).map_err(|(err, file)| rpc_error(err, &file))
    }

    /// `extjs/transform`
    pub async fn transform(&self, params: TransformParams) -> Result<Option<TransformOutput>> {
        let id = params.id;
        let result = self.with_session(|session| {
            session
                .transform(&id, &params.code)
                .map_err(|err| (err, id.clone()))
        });
        if let Ok(Some(output)) = &result
            && !output.diagnostics.is_empty()
        {
            self.log(
                MessageType::WARNING,
                format!("{}: {} diagnostic(s)", id, output.diagnostics.len()),
            )
            .await;
        }
        result
    }

    /// `extjs/classMap`
    pub async fn class_map(&self) -> Result<ClassMapSnapshot> {
        self.with_session(|session| Ok(session.snapshot()))
    }

    /// `extjs/virtualModule`
    pub async fn virtual_module(&self) -> Result<String> {
        self.with_session(|session| {
            session
                .virtual_module()
                .map_err(|err| (err, String::new()))
        })
    }

    /// `extjs/missingImports`
    pub async fn missing_imports(&self) -> Result<MissingImports> {
        self.with_session(|session| Ok(session.missing_imports().clone()))
    }

    /// `extjs/importClosure`
    pub async fn import_closure(&self, params: ClosureParams) -> Result<Option<Vec<String>>> {
        self.with_session(|session| Ok(session.import_closure(&params.class_name)))
    }

    /// `extjs/rebuild`
    pub async fn rebuild(&self) -> Result<DiscoveryReport> {
        let report = self.with_session(|session| {
            session.rebuild().map_err(|err| (err, String::new()))
        })?;
        self.log(MessageType::INFO, format!("Rebuilt: {}", summary(&report)))
            .await;
        Ok(report)
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .root_uri
            .as_ref()
            .or_else(|| {
                params
                    .workspace_folders
                    .as_ref()
                    .and_then(|folders| folders.first())
                    .map(|folder| &folder.uri)
            })
            .and_then(|uri| uri.to_file_path().ok());
        *self.workspace_root.lock() = workspace_root;

        let options = params.initialization_options.unwrap_or(serde_json::Value::Null);
        let config = Config::from_json(options).map_err(|err| Error {
            code: ErrorCode::InvalidParams,
            message: err.to_string().into(),
            data: None,
        })?;
        *self.config.lock() = config;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                experimental: Some(json!({
                    "extjsImport": {
                        "transform": true,
                        "classMap": true,
                        "virtualModule": true,
                    }
                })),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: self.name.clone(),
                version: Some(self.version.clone()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let workspace_root = self.workspace_root.lock().clone();
        let Some(root) = workspace_root else {
            self.log(
                MessageType::WARNING,
                "extjs-import: no workspace root, nothing to discover".to_string(),
            )
            .await;
            return;
        };

        let config = self.config.lock().clone();
        let mut session = match Session::new(root, config) {
            Ok(session) => session,
            Err(err) => {
                self.log(MessageType::ERROR, err.to_string()).await;
                return;
            }
        };
        let outcome = session.discover();
        let missing = session.missing_imports().clone();
        *self.session.lock() = Some(session);

        match outcome {
            Ok(report) => {
                self.log(
                    MessageType::INFO,
                    format!("extjs-import initialized! {}", summary(&report)),
                )
                .await;
            }
            Err(err) => {
                self.log(MessageType::ERROR, err.to_string()).await;
                for (class, references) in &missing {
                    self.log(
                        MessageType::ERROR,
                        format!("{} requires {}", class, references.join(", ")),
                    )
                    .await;
                }
            }
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let mut messages = Vec::new();
        {
            let mut guard = self.session.lock();
            let Some(session) = guard.as_mut() else {
                return;
            };
            for event in params.changes {
                let Some(change) = file_change(event.typ) else {
                    continue;
                };
                let Ok(path) = event.uri.to_file_path() else {
                    continue;
                };
                let id = path.to_string_lossy().to_string();
                match session.file_changed(&id, change) {
                    Ok(Some(report)) => {
                        messages.push((MessageType::INFO, format!("Rebuilt: {}", summary(&report))));
                    }
                    Ok(None) => {}
                    Err(err) => messages.push((MessageType::WARNING, err.to_string())),
                }
            }
        }
        for (typ, message) in messages {
            self.log(typ, message).await;
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.session.lock().take();
        Ok(())
    }
}
