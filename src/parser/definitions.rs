/// Class descriptor extraction.
///
/// Walks the configuration object of an `Ext.define(name, config)` call and
/// collects the keys that describe class relationships. Everything else in
/// the config (methods, `controller`, `viewModel`, ...) is ignored here; the
/// call-parent rewriter looks at the methods separately.
use tree_sitter::Node;

use super::{DefineCall, named_children, node_position, node_text, property_key, string_value};
use crate::types::{ClassDescriptor, Diagnostic, DiagnosticKind, Severity, push_unique};

/// A class descriptor together with the syntax it came from.
#[derive(Debug, Clone)]
pub struct ExtractedClass<'t> {
    pub descriptor: ClassDescriptor,
    /// The configuration object literal.
    pub config: Node<'t>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Build a [`ClassDescriptor`] from a define call.
///
/// Returns `None` when the call does not have a string class name followed
/// by an object literal; such calls are skipped without a diagnostic.
pub fn extract_class<'t>(
    call: &DefineCall<'t>,
    source: &str,
    source_file: &str,
) -> Option<ExtractedClass<'t>> {
    let (Some(name_node), Some(config)) = (call.arguments.first(), call.arguments.get(1)) else {
        tracing::debug!(file = source_file, "define call without name and config; skipping");
        return None;
    };
    let Some(name) = string_value(*name_node, source).filter(|n| !n.is_empty()) else {
        tracing::debug!(file = source_file, "define call with a non-literal class name; skipping");
        return None;
    };
    if config.kind() != "object" {
        tracing::debug!(
            file = source_file,
            class = %name,
            "define call whose config is not an object literal; skipping"
        );
        return None;
    }

    let mut descriptor = ClassDescriptor {
        name,
        source_file: source_file.to_string(),
        ..ClassDescriptor::default()
    };
    let mut diagnostics = Vec::new();

    for property in named_children(*config) {
        if property.kind() != "pair" {
            continue;
        }
        let (Some(key), Some(value)) = (
            property.child_by_field_name("key"),
            property.child_by_field_name("value"),
        ) else {
            continue;
        };
        let Some(key) = property_key(key, source) else {
            continue;
        };

        match key.as_str() {
            "alias" => descriptor.alias = string_list(value, source).into_iter().next(),
            "alternateClassName" => {
                for alternate in string_list(value, source) {
                    push_unique(&mut descriptor.alternate_names, alternate);
                }
            }
            "extend" => descriptor.parent = string_value(value, source),
            "override" => descriptor.override_target = string_value(value, source),
            "requires" => extend_unique(&mut descriptor.requires, string_list(value, source)),
            "uses" => extend_unique(&mut descriptor.uses, string_list(value, source)),
            "mixins" if value.kind() == "object" => {
                let names = named_mixins(value, source, &descriptor, &mut diagnostics);
                extend_unique(&mut descriptor.mixins, names);
            }
            "mixins" => extend_unique(&mut descriptor.mixins, string_list(value, source)),
            _ => {}
        }
    }

    Some(ExtractedClass {
        descriptor,
        config: *config,
        diagnostics,
    })
}

fn extend_unique(list: &mut Vec<String>, values: Vec<String>) {
    for value in values {
        push_unique(list, value);
    }
}

/// A string, or the string elements of an array literal.
fn string_list(value: Node<'_>, source: &str) -> Vec<String> {
    match value.kind() {
        "array" => named_children(value)
            .into_iter()
            .filter_map(|element| string_value(element, source))
            .collect(),
        _ => string_value(value, source).into_iter().collect(),
    }
}

/// Class names from the object form `mixins: { observable: 'Ext.util.Observable' }`.
///
/// Entries whose value is not a string literal cannot be resolved statically
/// and are reported instead of guessed.
fn named_mixins(
    value: Node<'_>,
    source: &str,
    class: &ClassDescriptor,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<String> {
    let mut names = Vec::new();
    for entry in named_children(value) {
        let resolved = match entry.kind() {
            "pair" => entry
                .child_by_field_name("value")
                .and_then(|v| string_value(v, source)),
            _ => None,
        };
        match resolved {
            Some(name) => names.push(name),
            None => {
                let (line, column) = node_position(entry);
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::UnsupportedMixin,
                        Severity::Warning,
                        class.source_file.as_str(),
                        format!(
                            "{}: mixin `{}` is not a class name string and was not imported",
                            class.name,
                            node_text(entry, source)
                        ),
                    )
                    .at(line, column),
                );
            }
        }
    }
    names
}

// ─── Tests ──────────────────────────────────────────────────────────────────
