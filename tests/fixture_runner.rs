//! Golden-file tests for `callParent` rewriting.
//!
//! Each `tests/fixtures/call_parent/<name>.input.js` is rewritten and compared
//! with `<name>.expected.js` next to it.
use datatest_stable::Utf8Path;
use extjs_import::call_parent::rewrite_call_parent;
use extjs_import::parser::definitions::extract_class;
use extjs_import::parser::parse_source;

fn run_fixture(path: &Utf8Path, input: String) -> datatest_stable::Result<()> {
    let expected_path = path.as_str().replace(".input.js", ".expected.js");
    let expected = std::fs::read_to_string(&expected_path)?;

    let file = path.file_stem().unwrap_or("fixture");
    let parsed = parse_source(file, &input)?;
    let calls = parsed.define_calls(&["Ext".to_string()]);
    let classes: Vec<_> = calls
        .iter()
        .filter_map(|call| extract_class(call, &input, file))
        .collect();
    let rewrite = rewrite_call_parent(&input, &classes, file);

    if rewrite.code != expected {
        return Err(format!(
            "{} does not match {}\n--- expected\n{}\n--- actual\n{}",
            path, expected_path, expected, rewrite.code
        )
        .into());
    }
    Ok(())
}

datatest_stable::harness! {
    { test = run_fixture, root = "tests/fixtures/call_parent", pattern = r"\.input\.js$" },
}
