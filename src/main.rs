use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use extjs_import::types::UnmappedPolicy;
use extjs_import::{Backend, Config, Session};

/// Configuration file looked up in the project root when `--config` is absent.
const DEFAULT_CONFIG: &str = "extjs-import.toml";

#[derive(Parser)]
#[command(
    name = "extjs-import",
    version,
    about = "Resolve Ext JS class dependencies into ES imports"
)]
struct Cli {
    /// Project root. Defaults to the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the resolver to a build host as JSON-RPC over stdio (default).
    Serve,
    /// Run discovery and print the report with the missing imports.
    Check,
    /// Print one file as the build host would receive it.
    Transform {
        /// File to transform.
        file: PathBuf,
    },
}

fn load_config(root: &Path, explicit: Option<&Path>) -> Result<Config, extjs_import::AnalysisError> {
    match explicit {
        Some(path) => Config::from_toml_file(path),
        None => {
            let default = root.join(DEFAULT_CONFIG);
            if default.is_file() {
                Config::from_toml_file(&default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

async fn serve() -> ExitCode {
    let (service, socket) = LspService::build(Backend::new)
        .custom_method("extjs/transform", Backend::transform)
        .custom_method("extjs/classMap", Backend::class_map)
        .custom_method("extjs/virtualModule", Backend::virtual_module)
        .custom_method("extjs/missingImports", Backend::missing_imports)
        .custom_method("extjs/importClosure", Backend::import_closure)
        .custom_method("extjs/rebuild", Backend::rebuild)
        .finish();
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;
    ExitCode::SUCCESS
}

fn check(root: PathBuf, config: Config) -> ExitCode {
    let fatal = config.unmapped == UnmappedPolicy::Fatal;
    let mut session = match Session::new(root, config) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    match session.discover() {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(err) => tracing::error!("{}", err),
            }
            if fatal && !report.failed.is_empty() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{}", err);
            for (class, references) in session.missing_imports() {
                println!("{} requires {}", class, references.join(", "));
            }
            ExitCode::FAILURE
        }
    }
}

fn transform(root: PathBuf, config: Config, file: &Path) -> ExitCode {
    let mut session = match Session::new(root, config) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = session.discover() {
        tracing::warn!("{}", err);
    }

    let file = if file.is_absolute() {
        file.to_path_buf()
    } else {
        session.root().join(file)
    };
    let source = match std::fs::read_to_string(&file) {
        Ok(source) => source,
        Err(err) => {
            tracing::error!("failed to read {}: {}", file.display(), err);
            return ExitCode::FAILURE;
        }
    };

    match session.transform(&file.to_string_lossy(), &source) {
        Ok(Some(output)) => {
            for diagnostic in &output.diagnostics {
                tracing::warn!("{}: {}", diagnostic.file, diagnostic.message);
            }
            print!("{}", output.code);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            tracing::info!("{} is not transformed", file.display());
            print!("{}", source);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries JSON-RPC in server mode, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let command = cli.command.unwrap_or(Command::Serve);
    if let Command::Serve = command {
        return serve().await;
    }

    let root = match cli.root {
        Some(root) => root.canonicalize().unwrap_or(root),
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(err) => {
                tracing::error!("failed to get current directory: {}", err);
                return ExitCode::FAILURE;
            }
        },
    };
    let config = match load_config(&root, cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Check => check(root, config),
        Command::Transform { file } => transform(root, config, &file),
        Command::Serve => ExitCode::SUCCESS,
    }
}
