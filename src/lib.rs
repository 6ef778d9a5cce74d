//! Static dependency resolver for Ext JS classes.
//!
//! Reads `Ext.define(name, config)` statements, resolves the classes they
//! reference (`extend`, `override`, `requires`, `uses`, `mixins`) to files
//! through configured namespace mappings, and rewrites each file so that it
//! carries explicit ES imports and explicit parent-method calls instead of
//! relying on the Ext loader and `callParent`.
//!
//! The library is driven through a [`session::Session`]; the binary serves
//! the same hooks to a build host as JSON-RPC over stdio via [`Backend`].
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tower_lsp::Client;

pub mod cache;
pub mod call_parent;
pub mod config;
pub mod error;
pub mod imports;
pub mod namespace;
pub mod parser;
pub mod registry;
pub mod scanner;
mod server;
pub mod session;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::AnalysisError;
pub use server::{ClosureParams, TransformParams};
pub use session::Session;

pub struct Backend {
    name: String,
    version: String,
    workspace_root: Arc<Mutex<Option<PathBuf>>>,
    config: Arc<Mutex<Config>>,
    /// `None` until `initialized` and after `shutdown`.
    session: Arc<Mutex<Option<Session>>>,
    client: Option<Client>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client: Some(client),
            ..Self::new_test()
        }
    }

    pub fn new_test() -> Self {
        Self {
            name: "extjs-import".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            workspace_root: Arc::new(Mutex::new(None)),
            config: Arc::new(Mutex::new(Config::default())),
            session: Arc::new(Mutex::new(None)),
            client: None,
        }
    }

    /// A client-less backend with a discovered session over `root`.
    pub fn new_test_with_workspace(root: PathBuf, config: Config) -> Self {
        let backend = Self::new_test();
        *backend.workspace_root.lock() = Some(root.clone());
        *backend.config.lock() = config.clone();
        match Session::new(root, config) {
            Ok(mut session) => {
                if let Err(err) = session.discover() {
                    tracing::warn!("{}", err);
                }
                *backend.session.lock() = Some(session);
            }
            Err(err) => tracing::warn!("{}", err),
        }
        backend
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_version(&self) -> &str {
        &self.version
    }
}
