/// Path and identifier helpers.
///
/// Internally every file is identified by a *web path*: root-relative, with
/// forward slashes, a leading `/`, and no script extension (for example
/// `/test/lib/Some/src/other/BaseModule`). This is the form the host pipeline
/// uses for import specifiers, so resolved paths can be emitted verbatim.
use std::path::Path;

use tower_lsp::lsp_types::MessageType;

use crate::Backend;

impl Backend {
    pub(crate) async fn log(&self, typ: MessageType, message: String) {
        if let Some(client) = &self.client {
            client.log_message(typ, message).await;
        }
    }
}

/// Strip a `?query` suffix from a host file id.
pub fn strip_query(id: &str) -> &str {
    id.split_once('?').map(|(path, _)| path).unwrap_or(id)
}

/// Ids the transform hook never touches: stylesheets, html entry points,
/// raw (`?direct`) requests and the host's own pre-bundled dependencies.
pub fn is_always_skipped(id: &str) -> bool {
    let path = strip_query(id);
    [
        path.ends_with(".css"),
        path.ends_with(".scss"),
        path.ends_with(".html"),
        id.ends_with("?direct"),
        id.contains("node_modules/.vite"),
        id.contains("vite@"),
    ]
    .into_iter()
    .any(|skip| skip)
}

/// Normalise a root-relative path: forward slashes, `.`/`..` folded, leading
/// `/`, and a trailing script extension (one of `scripts`) removed.
pub fn normalise_web_path(path: &str, scripts: &[String]) -> String {
    let path = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let joined = format!("/{}", segments.join("/"));
    strip_script_extension(&joined, scripts).to_string()
}

/// Remove a trailing `.<ext>` when `ext` is one of `scripts`.
pub fn strip_script_extension<'a>(path: &'a str, scripts: &[String]) -> &'a str {
    for ext in scripts {
        if let Some(stem) = path.strip_suffix(ext.as_str())
            && let Some(stem) = stem.strip_suffix('.')
        {
            return stem;
        }
    }
    path
}

/// Turn a host file id (absolute path, possibly with a query) into a web path.
///
/// Ids under `root` lose the root prefix; ids that are already root-relative
/// are kept as they are.
pub fn normalise_file_id(root: &Path, id: &str, scripts: &[String]) -> String {
    let id = strip_query(id).replace('\\', "/");
    let root = root.to_string_lossy().replace('\\', "/");
    let root = root.trim_end_matches('/');
    let relative = if !root.is_empty() && root != "/" {
        id.strip_prefix(root)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(&id)
    } else {
        &id
    };
    normalise_web_path(relative, scripts)
}

/// Resolve an import specifier found in `importer` to a web path.
///
/// Relative (`./`, `../`) and root-relative (`/`) specifiers are resolved;
/// bare package specifiers return `None`.
pub fn resolve_specifier(importer: &str, specifier: &str, scripts: &[String]) -> Option<String> {
    if specifier.starts_with('/') {
        return Some(normalise_web_path(specifier, scripts));
    }
    if specifier.starts_with("./") || specifier.starts_with("../") {
        let dir = importer.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        return Some(normalise_web_path(&format!("{}/{}", dir, specifier), scripts));
    }
    None
}

// ─── Tests ──────────────────────────────────────────────────────────────────
