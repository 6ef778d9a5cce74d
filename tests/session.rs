mod common;

use common::{TestWorkspace, import_lines, mapped};
use extjs_import::{AnalysisError, Session};
use extjs_import::types::{DedupPolicy, DiagnosticKind, FileChange, FileState, UnmappedPolicy};
use pretty_assertions::assert_eq;

const APP: &str = "Ext.define('NS.App', {\n    extend: 'NS.Base',\n    requires: ['NS.Dep']\n});\n";
const BASE: &str = "Ext.define('NS.Base', {\n    extend: 'NS.Dep'\n});\n";
const DEP: &str = "Ext.define('NS.Dep', {});\n";

fn ns() -> extjs_import::Config {
    mapped(&[("NS", Some("/src")), ("Ext", None)])
}

// ─── Import graph ───────────────────────────────────────────────────────────

#[test]
fn test_transitive_dependencies_come_first() {
    let ws = TestWorkspace::new(&[("src/App.js", APP), ("src/Base.js", BASE), ("src/Dep.js", DEP)]);
    let mut session = ws.session(ns());

    let code = ws.transform(&mut session, "src/App.js");
    assert_eq!(
        code,
        format!(
            "/*** <extjs-import> ***/\nimport '/src/Dep.js';\nimport '/src/Base.js';\n/*** </extjs-import> ***/\n\n{}",
            APP
        )
    );
}

#[test]
fn test_late_discovery_completes_the_graph() {
    let ws = TestWorkspace::new(&[("src/App.js", APP)]);
    let mut session = ws.session(ns());

    // Before Base is known only the naming convention is available.
    let early = ws.transform(&mut session, "src/App.js");
    assert_eq!(import_lines(&early), vec!["import '/src/Base.js';", "import '/src/Dep.js';"]);

    ws.write("src/Base.js", BASE);
    ws.write("src/Dep.js", DEP);
    let report = session
        .file_changed(&ws.id("src/Base.js"), FileChange::Created)
        .unwrap()
        .expect("a new mapped file triggers a rebuild");
    assert_eq!(report.generation, 2);
    assert_eq!(report.classes, 3);

    let late = ws.transform(&mut session, "src/App.js");
    assert_eq!(import_lines(&late), vec!["import '/src/Dep.js';", "import '/src/Base.js';"]);
}

#[test]
fn test_global_dedup_emits_shared_path_once() {
    let ws = TestWorkspace::new(&[
        ("src/A.js", "Ext.define('NS.A', { requires: ['NS.Q'] });\n"),
        ("src/B.js", "Ext.define('NS.B', { requires: ['NS.Q'] });\n"),
        ("src/Q.js", "Ext.define('NS.Q', {});\n"),
    ]);
    let mut session = ws.session(ns());

    let a = ws.transform(&mut session, "src/A.js");
    let b = ws.transform(&mut session, "src/B.js");
    let total = import_lines(&a)
        .into_iter()
        .chain(import_lines(&b))
        .filter(|line| *line == "import '/src/Q.js';")
        .count();
    assert_eq!(total, 1);
    assert_eq!(import_lines(&a), vec!["import '/src/Q.js';"]);
    assert!(!b.contains("<extjs-import>"));
}

#[test]
fn test_per_file_dedup_repeats_shared_path() {
    let ws = TestWorkspace::new(&[
        ("src/A.js", "Ext.define('NS.A', { requires: ['NS.Q', 'NS.Q'] });\n"),
        ("src/B.js", "Ext.define('NS.B', { uses: ['NS.Q'] });\n"),
        ("src/Q.js", "Ext.define('NS.Q', {});\n"),
    ]);
    let mut config = ns();
    config.dedup = DedupPolicy::File;
    let mut session = ws.session(config);

    assert_eq!(import_lines(&ws.transform(&mut session, "src/A.js")), vec!["import '/src/Q.js';"]);
    assert_eq!(import_lines(&ws.transform(&mut session, "src/B.js")), vec!["import '/src/Q.js';"]);
}

#[test]
fn test_disabled_namespace_is_silent() {
    let ws = TestWorkspace::new(&[(
        "src/Grid.js",
        "Ext.define('NS.Grid', {\n    extend: 'Ext.grid.Panel',\n    requires: ['Ext.data.Store'],\n    mixins: ['Ext.mixin.Observable']\n});\n",
    )]);
    let mut session = ws.session(ns());

    let output = session
        .transform(&ws.id("src/Grid.js"), &ws.read("src/Grid.js"))
        .unwrap()
        .unwrap();
    assert!(output.imports.is_empty());
    assert!(output.diagnostics.is_empty());
    assert!(session.missing_imports().is_empty());
}

#[test]
fn test_alternate_class_name_resolves_to_defining_file() {
    let ws = TestWorkspace::new(&[
        ("src/App.js", "Ext.define('NS.App', { extend: 'NS.LegacyBase' });\n"),
        ("src/core/Base.js", "Ext.define('NS.core.Base', { alternateClassName: 'NS.LegacyBase' });\n"),
    ]);
    let mut session = ws.session(ns());
    assert_eq!(
        import_lines(&ws.transform(&mut session, "src/App.js")),
        vec!["import '/src/core/Base.js';"]
    );
}

#[test]
fn test_wildcard_requires_are_sorted() {
    let ws = TestWorkspace::new(&[
        ("src/App.js", "Ext.define('NS.App', { requires: ['NS.view.*'] });\n"),
        ("src/view/Main.js", "Ext.define('NS.view.Main', {});\n"),
        ("src/view/About.js", "Ext.define('NS.view.About', {});\n"),
    ]);
    let mut session = ws.session(ns());
    assert_eq!(
        import_lines(&ws.transform(&mut session, "src/App.js")),
        vec!["import '/src/view/About.js';", "import '/src/view/Main.js';"]
    );
}

#[test]
fn test_co_located_stylesheets() {
    let ws = TestWorkspace::new(&[
        ("src/App.js", "Ext.define('NS.App', { extend: 'NS.Base' });\n"),
        ("src/Base.js", "Ext.define('NS.Base', {});\n"),
        ("src/Base.scss", ".base { color: red; }\n"),
    ]);
    let mut config = ns();
    config.auto_import_assets = true;
    let mut session = ws.session(config);

    assert_eq!(
        import_lines(&ws.transform(&mut session, "src/App.js")),
        vec!["import '/src/Base.js';", "import '/src/Base.scss';"]
    );
}

#[test]
fn test_multiple_classes_in_one_file() {
    let ws = TestWorkspace::new(&[
        (
            "src/Application.js",
            concat!(
                "Ext.define('NS.multiple.Module', {\n",
                "    extend: 'NS.other.Required',\n",
                "    multipleFn() {\n",
                "        this.callParent();\n",
                "    }\n",
                "});\n",
                "Ext.define('NS.Application', {\n",
                "    extend: 'NS.other.BaseModule',\n",
                "    requires: ['NS.multiple.Module'],\n",
                "    test01: function () {\n",
                "        this.callParent();\n",
                "    }\n",
                "});\n",
            ),
        ),
        ("src/other/Required.js", "Ext.define('NS.other.Required', {});\n"),
        ("src/other/BaseModule.js", "Ext.define('NS.other.BaseModule', {});\n"),
    ]);
    let mut session = ws.session(ns());
    let code = ws.transform(&mut session, "src/Application.js");

    // The file's own classes never import the file itself.
    assert_eq!(
        import_lines(&code),
        vec!["import '/src/other/Required.js';", "import '/src/other/BaseModule.js';"]
    );
    assert!(code.contains("(NS.other.Required.prototype || NS.other.Required)['multipleFn'].apply(this);"));
    assert!(code.contains("(NS.other.BaseModule.prototype || NS.other.BaseModule)['test01'].apply(this);"));
    assert_eq!(
        session.registry().get("NS.Application").unwrap().imports,
        vec!["/src/other/BaseModule"]
    );
}

#[test]
fn test_existing_imports_are_respected() {
    let ws = TestWorkspace::new(&[
        (
            "src/App.js",
            "import './Base.js';\nExt.define('NS.App', { extend: 'NS.Base', uses: ['NS.Util'] });\n",
        ),
        ("src/Base.js", "Ext.define('NS.Base', {});\n"),
        ("src/Util.js", "Ext.define('NS.Util', {});\n"),
    ]);
    let mut session = ws.session(ns());
    assert_eq!(
        import_lines(&ws.transform(&mut session, "src/App.js")),
        vec!["import '/src/Util.js';", "import './Base.js';"]
    );
}

#[test]
fn test_import_closure() {
    let ws = TestWorkspace::new(&[("src/App.js", APP), ("src/Base.js", BASE), ("src/Dep.js", DEP)]);
    let session = ws.session(ns());
    assert_eq!(
        session.import_closure("NS.App"),
        Some(vec!["/src/Dep".to_string(), "/src/Base".to_string()])
    );
    assert_eq!(session.import_closure("NS.Nope"), None);
}

// ─── Caching ────────────────────────────────────────────────────────────────

#[test]
fn test_transform_is_idempotent() {
    let ws = TestWorkspace::new(&[("src/App.js", APP), ("src/Base.js", BASE), ("src/Dep.js", DEP)]);
    let mut session = ws.session(ns());
    let id = ws.id("src/App.js");

    let first = session.transform(&id, APP).unwrap().unwrap();
    let second = session.transform(&id, APP).unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(session.cache().get("/src/App").unwrap().state, FileState::Cached);

    // Feeding the output back in does not inject the block twice.
    let again = session.transform(&id, &first.code).unwrap().unwrap();
    assert_eq!(again.code, first.code);
    assert!(!again.changed);
}

#[test]
fn test_query_string_is_not_part_of_the_key() {
    let ws = TestWorkspace::new(&[("src/App.js", APP), ("src/Base.js", BASE), ("src/Dep.js", DEP)]);
    let mut session = ws.session(ns());

    let plain = session.transform(&ws.id("src/App.js"), APP).unwrap().unwrap();
    let queried = session
        .transform(&format!("{}?t=123", ws.id("src/App.js")), APP)
        .unwrap()
        .unwrap();
    assert_eq!(plain, queried);
    assert_eq!(session.cache().len(), 3);
}

#[test]
fn test_parse_error_is_sticky_until_content_changes() {
    let ws = TestWorkspace::new(&[("src/App.js", APP)]);
    let mut session = ws.session(ns());
    let id = ws.id("src/App.js");
    let broken = "Ext.define('NS.App', {\n    extend: 'NS.Base',\n";

    let err = session.transform(&id, broken).unwrap_err();
    assert!(matches!(err, AnalysisError::Parse { .. }));
    assert_eq!(session.transform(&id, broken).unwrap_err(), err);
    assert_eq!(session.cache().get("/src/App").unwrap().state, FileState::Failed);

    assert!(session.transform(&id, APP).unwrap().is_some());
}

// ─── Gating ─────────────────────────────────────────────────────────────────

#[test]
fn test_skipped_ids() {
    let ws = TestWorkspace::new(&[("src/App.js", APP), ("other/Main.js", APP)]);
    let mut session = ws.session(ns());

    assert_eq!(session.transform(&ws.id("src/theme.scss"), "").unwrap(), None);
    assert_eq!(session.transform(&ws.id("index.html"), "").unwrap(), None);
    assert_eq!(session.transform(&format!("{}?direct", ws.id("src/App.js")), APP).unwrap(), None);
    assert_eq!(session.transform(&ws.id("src/data.json"), "{}").unwrap(), None);
    // Outside every mapping.
    assert_eq!(session.transform(&ws.id("other/Main.js"), APP).unwrap(), None);
}

#[test]
fn test_include_and_exclude_patterns() {
    let ws = TestWorkspace::new(&[
        ("app.js", "Ext.define('Root.App', { extend: 'NS.Base' });\n"),
        ("src/Base.js", "Ext.define('NS.Base', {});\n"),
        ("src/legacy/Old.js", "Ext.define('NS.legacy.Old', {});\n"),
        ("src/legacy/Keep.js", "Ext.define('NS.legacy.Keep', {});\n"),
    ]);
    let mut config = ns();
    config.include = vec!["app.js".to_string(), "src/legacy/Keep.js".to_string()];
    config.exclude = vec!["src/legacy/**".to_string()];
    let mut session = Session::new(ws.root(), config).unwrap();
    let report = session.discover().unwrap();

    assert_eq!(report.skipped, 1);
    assert!(session.registry().get("Root.App").is_some());
    assert!(session.registry().get("NS.legacy.Keep").is_some());
    assert!(session.registry().get("NS.legacy.Old").is_none());

    assert_eq!(
        import_lines(&ws.transform(&mut session, "app.js")),
        vec!["import '/src/Base.js';"]
    );
    assert_eq!(
        session
            .transform(&ws.id("src/legacy/Old.js"), &ws.read("src/legacy/Old.js"))
            .unwrap(),
        None
    );
}

// ─── Policies ───────────────────────────────────────────────────────────────

#[test]
fn test_unmapped_namespaces_are_reported() {
    let ws = TestWorkspace::new(&[(
        "src/App.js",
        "Ext.define('NS.App', { requires: ['Vendor.Grid', 'NS.Util'] });\n",
    )]);
    let mut session = ws.session(ns());

    let snapshot = session.snapshot();
    assert_eq!(
        snapshot.missing_imports.get("NS.App"),
        Some(&vec!["Vendor.Grid".to_string()])
    );

    let output = session
        .transform(&ws.id("src/App.js"), &ws.read("src/App.js"))
        .unwrap()
        .unwrap();
    assert_eq!(output.imports, vec!["/src/Util.js"]);
    assert_eq!(output.diagnostics[0].kind, DiagnosticKind::UnmappedNamespace);
}

#[test]
fn test_fatal_unmapped_policy() {
    let ws = TestWorkspace::new(&[(
        "src/App.js",
        "Ext.define('NS.App', { requires: ['Vendor.Grid'] });\n",
    )]);
    let mut config = ns();
    config.unmapped = UnmappedPolicy::Fatal;
    let mut session = Session::new(ws.root(), config).unwrap();

    assert_eq!(
        session.discover().unwrap_err(),
        AnalysisError::UnmappedNamespaces { count: 1 }
    );
    assert_eq!(session.missing_imports().len(), 1);
    assert!(matches!(
        session.transform(&ws.id("src/App.js"), &ws.read("src/App.js")),
        Err(AnalysisError::UnmappedNamespaces { count: 1 })
    ));
}

#[test]
fn test_call_parent_rewrite_can_be_disabled() {
    let source = "Ext.define('NS.App', {\n    extend: 'NS.Base',\n    init: function () {\n        this.callParent(arguments);\n    }\n});\n";
    let ws = TestWorkspace::new(&[("src/App.js", source), ("src/Base.js", "Ext.define('NS.Base', {});\n")]);

    let mut config = ns();
    config.replace_call_parent = false;
    let mut session = ws.session(config);
    let code = ws.transform(&mut session, "src/App.js");
    assert!(code.ends_with(source));

    let mut session = ws.session(ns());
    let code = ws.transform(&mut session, "src/App.js");
    assert!(code.contains("(NS.Base.prototype || NS.Base)['init'].apply(this, arguments);"));
}

// ─── File watching ──────────────────────────────────────────────────────────

#[test]
fn test_changed_file_is_rediscovered() {
    let ws = TestWorkspace::new(&[("src/App.js", APP), ("src/Base.js", BASE), ("src/Dep.js", DEP)]);
    let mut config = ns();
    config.dedup = DedupPolicy::File;
    let mut session = ws.session(config);
    ws.transform(&mut session, "src/App.js");

    ws.write("src/Base.js", "Ext.define('NS.Base', { requires: ['NS.Extra'] });\n");
    let outcome = session
        .file_changed(&ws.id("src/Base.js"), FileChange::Changed)
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(session.registry().get("NS.Base").unwrap().requires, vec!["NS.Extra"]);
    assert_eq!(session.generation(), 1);

    let code = ws.transform(&mut session, "src/App.js");
    assert_eq!(
        import_lines(&code),
        vec!["import '/src/Extra.js';", "import '/src/Base.js';", "import '/src/Dep.js';"]
    );
}

#[test]
fn test_deleted_file_drops_its_classes() {
    let ws = TestWorkspace::new(&[("src/App.js", APP), ("src/Base.js", BASE), ("src/Dep.js", DEP)]);
    let mut session = ws.session(ns());

    ws.remove("src/Base.js");
    session
        .file_changed(&ws.id("src/Base.js"), FileChange::Deleted)
        .unwrap();
    assert!(session.registry().get("NS.Base").is_none());
    assert!(session.cache().get("/src/Base").is_none());
    assert_eq!(session.registry().len(), 2);
}

#[test]
fn test_created_file_outside_mappings_does_not_rebuild() {
    let ws = TestWorkspace::new(&[("src/App.js", APP)]);
    let mut session = ws.session(ns());
    ws.write("notes/todo.js", "var x = 1;\n");

    let outcome = session
        .file_changed(&ws.id("notes/todo.js"), FileChange::Created)
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(session.generation(), 1);
}

// ─── Class map ──────────────────────────────────────────────────────────────

#[test]
fn test_snapshot_and_virtual_module() {
    let ws = TestWorkspace::new(&[("src/App.js", APP), ("src/Base.js", BASE), ("src/Dep.js", DEP)]);
    let session = ws.session(ns());

    let snapshot = session.snapshot();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(
        snapshot.classes.keys().cloned().collect::<Vec<_>>(),
        vec!["NS.App", "NS.Base", "NS.Dep"]
    );
    assert_eq!(snapshot.classes["NS.App"].source_file, "/src/App");

    let module = session.virtual_module().unwrap();
    assert!(module.starts_with("export const classMap = {"));
    assert!(module.contains("\"sourceFile\":\"/src/Base\""));
}
