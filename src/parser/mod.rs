/// JavaScript parsing and class-definition discovery.
///
/// This module parses source text with tree-sitter-javascript and locates
/// the statements the rest of the pipeline cares about: top-level
/// `Ext.define(name, config)` calls and static `import` declarations.
///
/// Sub-modules:
/// - [`definitions`]: turning a define call into a [`ClassDescriptor`]
///
/// [`ClassDescriptor`]: crate::types::ClassDescriptor
pub mod definitions;

use tree_sitter::{Node, Parser, Tree};

use crate::error::{AnalysisError, Result};

/// A parsed source file. Borrows the text it was parsed from.
pub struct ParsedSource<'s> {
    source: &'s str,
    tree: Tree,
}

/// A top-level `<ClassSystem>.define(...)` call.
#[derive(Debug, Clone)]
pub struct DefineCall<'t> {
    pub call: Node<'t>,
    /// Positional arguments, comments excluded.
    pub arguments: Vec<Node<'t>>,
}

/// Parse `source` as JavaScript.
///
/// tree-sitter recovers from syntax errors, but a tree with recovery nodes
/// would lead to partial rewrites, so any `ERROR` or `MISSING` node fails the
/// whole file with the location of the first one.
pub fn parse_source<'s>(file: &str, source: &'s str) -> Result<ParsedSource<'s>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .map_err(|e| AnalysisError::Config(format!("javascript grammar: {}", e)))?;

    let tree = parser.parse(source, None).ok_or_else(|| AnalysisError::Parse {
        file: file.to_string(),
        line: 1,
        column: 1,
        message: "parser produced no tree".to_string(),
    })?;

    if let Some(bad) = first_error(tree.root_node()) {
        let position = bad.start_position();
        let message = if bad.is_missing() {
            format!("missing `{}`", bad.kind())
        } else {
            let text = node_text(bad, source);
            let snippet: String = text.chars().take(24).collect();
            format!("unexpected `{}`", snippet.trim())
        };
        return Err(AnalysisError::Parse {
            file: file.to_string(),
            line: position.row + 1,
            column: position.column + 1,
            message,
        });
    }

    Ok(ParsedSource {
        source,
        tree,
    })
}

/// First `ERROR`/`MISSING` node in document order.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    Some(node)
}

impl<'s> ParsedSource<'s> {
    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Top-level expression statements calling `<system>.define(...)` where
    /// `<system>` is one of `class_systems` (normally just `Ext`).
    pub fn define_calls(&self, class_systems: &[String]) -> Vec<DefineCall<'_>> {
        let mut calls = Vec::new();
        for statement in named_children(self.root()) {
            if statement.kind() != "expression_statement" {
                continue;
            }
            let Some(call) = statement.named_child(0) else {
                continue;
            };
            if call.kind() != "call_expression" {
                continue;
            }
            let Some(callee) = call.child_by_field_name("function") else {
                continue;
            };
            if callee.kind() != "member_expression" {
                continue;
            }
            let object = callee.child_by_field_name("object");
            let property = callee.child_by_field_name("property");
            let is_define = matches!(
                (object, property),
                (Some(object), Some(property))
                    if object.kind() == "identifier"
                        && class_systems.iter().any(|s| s == node_text(object, self.source))
                        && node_text(property, self.source) == "define"
            );
            if !is_define {
                continue;
            }
            let arguments = call
                .child_by_field_name("arguments")
                .map(named_children)
                .unwrap_or_default();
            calls.push(DefineCall { call, arguments });
        }
        calls
    }

    /// Specifiers of the file's own `import ... from '<specifier>'` and
    /// `import '<specifier>'` declarations, in source order.
    pub fn static_imports(&self) -> Vec<String> {
        named_children(self.root())
            .into_iter()
            .filter(|node| node.kind() == "import_statement")
            .filter_map(|node| node.child_by_field_name("source"))
            .filter_map(|source| string_value(source, self.source))
            .collect()
    }
}

/// Named children of `node`, comments excluded.
pub(crate) fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

pub(crate) fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// 1-based (line, column) of a node's start.
pub(crate) fn node_position(node: Node<'_>) -> (usize, usize) {
    let position = node.start_position();
    (position.row + 1, position.column + 1)
}

/// Value of a string literal, or of a template literal without substitutions.
pub(crate) fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => {
            let text = node_text(node, source);
            Some(text.get(1..text.len().saturating_sub(1))?.to_string())
        }
        "template_string" => {
            if named_children(node)
                .iter()
                .any(|child| child.kind() == "template_substitution")
            {
                return None;
            }
            let text = node_text(node, source);
            Some(text.get(1..text.len().saturating_sub(1))?.to_string())
        }
        _ => None,
    }
}

/// Key of an object property (`name`, `'name'`, `1`); `None` when computed.
pub(crate) fn property_key(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "property_identifier" | "identifier" | "private_property_identifier" | "number" => {
            Some(node_text(node, source).to_string())
        }
        "string" => string_value(node, source),
        _ => None,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ext() -> Vec<String> {
        vec!["Ext".to_string()]
    }

    #[test]
    fn test_finds_top_level_define_calls() {
        let src = "Ext.define('A.B', { extend: 'A.C' });\nfoo();\nExt.define('A.D', {});\n";
        let parsed = parse_source("/a.js", src).unwrap();
        let calls = parsed.define_calls(&ext());
        assert_eq!(calls.len(), 2);
        assert_eq!(node_text(calls[0].arguments[0], src), "'A.B'");
        assert_eq!(calls[1].arguments.len(), 2);
    }

    #[test]
    fn test_ignores_other_class_systems_and_methods() {
        let src = "Foo.define('A.B', {});\nExt.create('A.B');\n";
        let parsed = parse_source("/a.js", src).unwrap();
        assert!(parsed.define_calls(&ext()).is_empty());

        let custom = vec!["Foo".to_string()];
        assert_eq!(parsed.define_calls(&custom).len(), 1);
    }

    #[test]
    fn test_syntax_error_reports_location() {
        let src = "Ext.define('A.B', {\n  foo: function( {\n});\n";
        let err = parse_source("/broken.js", src).err().unwrap();
        match err {
            AnalysisError::Parse { file, line, column, .. } => {
                assert_eq!(file, "/broken.js");
                assert!(line >= 1 && column >= 1);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_static_imports() {
        let src = "import './a.js';\nimport { b } from \"/lib/b.js\";\nExt.define('X', {});\n";
        let parsed = parse_source("/x.js", src).unwrap();
        assert_eq!(parsed.static_imports(), vec!["./a.js", "/lib/b.js"]);
    }

    #[test]
    fn test_string_values() {
        let src = "x = ['a.b', `c.d`, `e${f}`];";
        let parsed = parse_source("/x.js", src).unwrap();
        let mut found = Vec::new();
        let mut stack = vec![parsed.root()];
        while let Some(node) = stack.pop() {
            if let Some(value) = string_value(node, src) {
                found.push(value);
            }
            stack.extend(named_children(node));
        }
        found.sort();
        assert_eq!(found, vec!["a.b", "c.d"]);
    }
}
