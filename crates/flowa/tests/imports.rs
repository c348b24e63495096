//! Module import machinery: caching, from-imports, star imports, nesting.

use std::fs;

use pretty_assertions::assert_eq;

use flowa::Runner;

fn write(dir: &std::path::Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn run_in(dir: &std::path::Path, source: &str) -> String {
    Runner::from_source(source, dir)
        .unwrap_or_else(|e| panic!("compile failed: {e}"))
        .run_capture()
        .unwrap_or_else(|e| panic!("run failed: {e}"))
}

#[test]
fn test_import_binds_file_stem() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "mathx.flowa", "func double(n) { return n * 2 }\n");
    let output = run_in(dir.path(), "import \"mathx.flowa\"\nprint(mathx.double(21))");
    assert_eq!(output, "42\n");
}

#[test]
fn test_import_is_cached_per_path() {
    // The module's top-level print runs once no matter how many OpImports
    // execute for the same path.
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "noisy.flowa", "print(\"loaded\")\nfunc a() { return 1 }\nfunc b() { return 2 }\n");
    let output = run_in(
        dir.path(),
        "from \"noisy.flowa\" import a, b\nimport \"noisy.flowa\"\nprint(a() + b())",
    );
    assert_eq!(output, "loaded\n3\n");
}

#[test]
fn test_from_import_selected_names() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lib.flowa", "func inc(n) { return n + 1 }\nfunc dec(n) { return n - 1 }\n");
    let output = run_in(dir.path(), "from \"lib.flowa\" import inc, dec\nprint(inc(1))\nprint(dec(1))");
    assert_eq!(output, "2\n0\n");
}

#[test]
fn test_star_import() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lib.flowa", "func inc(n) { return n + 1 }\nfunc dec(n) { return n - 1 }\n");
    let output = run_in(dir.path(), "from \"lib.flowa\" import *\nprint(inc(dec(5)))");
    assert_eq!(output, "5\n");
}

#[test]
fn test_import_braces_form() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lib.flowa", "func greet() { return \"hi\" }\n");
    let output = run_in(dir.path(), "import {greet} from \"lib.flowa\"\nprint(greet())");
    assert_eq!(output, "hi\n");
}

#[test]
fn test_transitive_imports() {
    // main imports outer, outer imports inner.
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "inner.flowa", "func base() { return 10 }\n");
    write(
        dir.path(),
        "outer.flowa",
        "from \"inner.flowa\" import base\nfunc doubled() { return base() * 2 }\n",
    );
    let output = run_in(dir.path(), "from \"outer.flowa\" import doubled\nprint(doubled())");
    assert_eq!(output, "20\n");
}

#[test]
fn test_unknown_module_member_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lib.flowa", "func a() { return 1 }\n");
    let runner = Runner::from_source("import \"lib.flowa\"\nprint(lib.missing)", dir.path()).unwrap();
    let err = runner.run_capture().unwrap_err();
    assert!(err.to_string().contains("no member"), "error: {err}");
}

#[test]
fn test_missing_import_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Runner::from_source("import \"nope.flowa\"", dir.path()).unwrap();
    let err = runner.run_capture().unwrap_err();
    assert!(err.to_string().contains("cannot import"), "error: {err}");
}

#[test]
fn test_circular_import_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.flowa", "import \"b.flowa\"\nfunc fa() { return 1 }\n");
    write(dir.path(), "b.flowa", "import \"a.flowa\"\nfunc fb() { return 2 }\n");
    let runner = Runner::from_source("import \"a.flowa\"", dir.path()).unwrap();
    let err = runner.run_capture().unwrap_err();
    assert!(err.to_string().contains("circular import"), "error: {err}");
}

#[test]
fn test_module_top_level_variables_are_not_exported() {
    // Only globals (functions, types, module blocks) populate exports;
    // a module's plain top-level variables are frame locals.
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lib.flowa", "secret = 99\nfunc reveal() { return 1 }\n");
    let runner = Runner::from_source("import \"lib.flowa\"\nprint(lib.secret)", dir.path()).unwrap();
    let err = runner.run_capture().unwrap_err();
    assert!(err.to_string().contains("no member"), "error: {err}");
}

#[test]
fn test_import_parse_failure_reports_all_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "broken.flowa", "x = \ny ==\n");
    let runner = Runner::from_source("import \"broken.flowa\"", dir.path()).unwrap();
    let err = runner.run_capture().unwrap_err();
    assert!(err.to_string().contains("failed to parse"), "error: {err}");
}
