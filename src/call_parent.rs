/// `callParent` rewriting.
///
/// Inside the methods of a class config, `<scope>.callParent(<args>)` is
/// replaced by an explicit call of the same-named method on the parent
/// prototype:
///
/// ```text
/// extend:   (P.prototype || P)['m'].apply(<scope>[, <args>])
/// override: (L['$previous'] || L).apply(<scope>[, <args>])
///           where L = (O.prototype || O)['m']
/// ```
///
/// Methods declared under `statics` or `inheritableStatics` live on the
/// constructor, so their lookup skips the prototype: `P['m']`.
///
/// The receiver is copied verbatim, so `me.callParent()` keeps `me`.
/// All edits are computed against the original text and applied in reverse
/// source order.
use tree_sitter::Node;

use crate::parser::definitions::ExtractedClass;
use crate::parser::{named_children, node_position, node_text, property_key};
use crate::types::{Diagnostic, DiagnosticKind, Severity};

const CALL_PARENT: &str = "callParent";

/// Result of rewriting one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallParentRewrite {
    pub code: String,
    /// Number of call sites replaced (nested ones included).
    pub replaced: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl CallParentRewrite {
    pub fn changed(&self) -> bool {
        self.replaced > 0
    }
}

/// Where the parent implementation of a method is found.
#[derive(Debug, Clone, Copy)]
enum ParentRef<'c> {
    Extend(&'c str),
    Override(&'c str),
}

impl ParentRef<'_> {
    fn method_lookup(&self, method: &str, kind: MethodKind) -> String {
        let owner = |class: &str| match kind {
            MethodKind::Instance => format!("({0}.prototype || {0})", class),
            MethodKind::Static => class.to_string(),
        };
        match self {
            ParentRef::Extend(parent) => format!("{}['{}']", owner(*parent), method),
            ParentRef::Override(target) => {
                let lookup = format!("{}['{}']", owner(*target), method);
                format!("({0}['$previous'] || {0})", lookup)
            }
        }
    }
}

/// Whether a method sits on the prototype or on the constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MethodKind {
    Instance,
    Static,
}

/// Config blocks whose methods become constructor properties.
const STATIC_BLOCKS: [&str; 2] = ["statics", "inheritableStatics"];

/// How the original arguments are carried over.
#[derive(Debug, Clone)]
enum CallArgs<'t> {
    None,
    /// `arguments`, an array literal's elements, or a spread: passed on as a list.
    List(Vec<Node<'t>>),
    /// Anything else, copied as written.
    Verbatim(Vec<Node<'t>>),
}

#[derive(Debug, Clone)]
struct CallSite<'t> {
    node: Node<'t>,
    receiver: Node<'t>,
    args: CallArgs<'t>,
    method: String,
    kind: MethodKind,
}

impl CallSite<'_> {
    fn start(&self) -> usize {
        self.node.start_byte()
    }

    fn end(&self) -> usize {
        self.node.end_byte()
    }
}

/// Rewrite every `callParent` call in the methods of `classes`.
pub fn rewrite_call_parent(
    source: &str,
    classes: &[ExtractedClass<'_>],
    file: &str,
) -> CallParentRewrite {
    let mut diagnostics = Vec::new();
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    let mut replaced = 0;

    for class in classes {
        let descriptor = &class.descriptor;
        let parent = match (&descriptor.parent, &descriptor.override_target) {
            (Some(parent), _) => Some(ParentRef::Extend(parent)),
            (None, Some(target)) => Some(ParentRef::Override(target)),
            (None, None) => None,
        };

        let mut sites = Vec::new();
        for (method, function, kind) in class_methods(class.config, source, MethodKind::Instance) {
            collect_call_sites(function, &method, kind, source, &mut sites);
        }
        if sites.is_empty() {
            continue;
        }

        let Some(parent) = parent else {
            for site in &sites {
                let (line, column) = node_position(site.node);
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::CallParentWithoutParent,
                        Severity::Warning,
                        file,
                        format!(
                            "{}.{} calls callParent but the class has neither extend nor override",
                            descriptor.name, site.method
                        ),
                    )
                    .at(line, column),
                );
            }
            continue;
        };

        sites.sort_by(|a, b| a.start().cmp(&b.start()).then(b.end().cmp(&a.end())));
        sites.dedup_by(|a, b| a.node.id() == b.node.id());

        for site in &sites {
            if let CallArgs::Verbatim(_) = site.args {
                let (line, column) = node_position(site.node);
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::PossibleCallParentMisuse,
                        Severity::Lint,
                        file,
                        format!(
                            "{}.{}: callParent expects an array or `arguments`; `{}` passed through unchanged",
                            descriptor.name,
                            site.method,
                            node_text(site.node, source)
                        ),
                    )
                    .at(line, column),
                );
            }
        }

        let renderer = Renderer {
            source,
            sites: &sites,
            parent,
        };
        let mut cursor = 0;
        for site in &sites {
            // Sites inside another site are rendered as part of it.
            if site.start() < cursor {
                continue;
            }
            edits.push((site.start(), site.end(), renderer.render(site)));
            cursor = site.end();
        }
        replaced += sites.len();
    }

    let mut code = source.to_string();
    edits.sort_by_key(|(start, _, _)| *start);
    for (start, end, replacement) in edits.into_iter().rev() {
        code.replace_range(start..end, &replacement);
    }

    CallParentRewrite {
        code,
        replaced,
        diagnostics,
    }
}

struct Renderer<'r, 't> {
    source: &'r str,
    /// Sorted by start, outermost first.
    sites: &'r [CallSite<'t>],
    parent: ParentRef<'r>,
}

impl Renderer<'_, '_> {
    fn render(&self, site: &CallSite<'_>) -> String {
        let scope = self.span(site.receiver.start_byte(), site.receiver.end_byte());
        let args: Vec<String> = match &site.args {
            CallArgs::None => Vec::new(),
            CallArgs::List(nodes) | CallArgs::Verbatim(nodes) => nodes
                .iter()
                .map(|node| self.span(node.start_byte(), node.end_byte()))
                .collect(),
        };
        let lookup = self.parent.method_lookup(&site.method, site.kind);
        if args.is_empty() {
            format!("{}.apply({})", lookup, scope)
        } else {
            format!("{}.apply({}, {})", lookup, scope, args.join(", "))
        }
    }

    /// Source text of `start..end` with the call sites inside it rendered.
    fn span(&self, start: usize, end: usize) -> String {
        let mut out = String::new();
        let mut cursor = start;
        for site in self.sites {
            if site.start() >= cursor && site.end() <= end {
                out.push_str(&self.source[cursor..site.start()]);
                out.push_str(&self.render(site));
                cursor = site.end();
            }
        }
        out.push_str(&self.source[cursor..end]);
        out
    }
}

/// `(method name, function node, kind)` for every method of a config object,
/// including the methods of nested `privates` and static blocks.
fn class_methods<'t>(
    config: Node<'t>,
    source: &str,
    kind: MethodKind,
) -> Vec<(String, Node<'t>, MethodKind)> {
    let mut methods = Vec::new();
    for member in named_children(config) {
        match member.kind() {
            "pair" => {
                let (Some(key), Some(value)) = (
                    member.child_by_field_name("key"),
                    member.child_by_field_name("value"),
                ) else {
                    continue;
                };
                let Some(name) = property_key(key, source) else {
                    continue;
                };
                if is_function(value) {
                    methods.push((name, value, kind));
                } else if value.kind() == "object" && kind == MethodKind::Instance {
                    if name == "privates" {
                        methods.extend(class_methods(value, source, kind));
                    } else if STATIC_BLOCKS.contains(&name.as_str()) {
                        methods.extend(class_methods(value, source, MethodKind::Static));
                    }
                }
            }
            "method_definition" => {
                if let Some(name) = member
                    .child_by_field_name("name")
                    .and_then(|n| property_key(n, source))
                {
                    methods.push((name, member, kind));
                }
            }
            _ => {}
        }
    }
    methods
}

fn is_function(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_expression" | "function" | "arrow_function" | "generator_function"
    )
}

/// Every `<receiver>.callParent(...)` call below `node`.
fn collect_call_sites<'t>(
    node: Node<'t>,
    method: &str,
    kind: MethodKind,
    source: &str,
    sites: &mut Vec<CallSite<'t>>,
) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "call_expression"
            && let Some(site) = call_site(current, method, kind, source)
        {
            sites.push(site);
        }
        stack.extend(named_children(current));
    }
}

fn call_site<'t>(
    call: Node<'t>,
    method: &str,
    kind: MethodKind,
    source: &str,
) -> Option<CallSite<'t>> {
    let callee = call.child_by_field_name("function")?;
    if callee.kind() != "member_expression" {
        return None;
    }
    let property = callee.child_by_field_name("property")?;
    if node_text(property, source) != CALL_PARENT {
        return None;
    }
    let receiver = callee.child_by_field_name("object")?;
    let arguments = call
        .child_by_field_name("arguments")
        .map(named_children)
        .unwrap_or_default();

    let args = match arguments.as_slice() {
        [] => CallArgs::None,
        [only] if only.kind() == "identifier" && node_text(*only, source) == "arguments" => {
            CallArgs::List(vec![*only])
        }
        [only] if only.kind() == "spread_element" => CallArgs::List(vec![*only]),
        [only] if only.kind() == "array" => CallArgs::List(named_children(*only)),
        _ => CallArgs::Verbatim(arguments),
    };

    Some(CallSite {
        node: call,
        receiver,
        args,
        method: method.to_string(),
        kind,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────
