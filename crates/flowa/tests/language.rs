//! Language-level behavior: block styles, control flow, declarations, and
//! the eager task model.

use pretty_assertions::assert_eq;

use flowa::Runner;

fn run(source: &str) -> String {
    Runner::from_source(source, ".")
        .unwrap_or_else(|e| panic!("compile failed: {e}\nsource:\n{source}"))
        .run_capture()
        .unwrap_or_else(|e| panic!("run failed: {e}\nsource:\n{source}"))
}

#[test]
fn test_mixed_brace_and_indent_function_bodies() {
    let source = "func braced(a) { return a + 1 }\ndef indented(a):\n    return a + 2\nprint(braced(1))\nprint(indented(1))";
    assert_eq!(run(source), "2\n3\n");
}

#[test]
fn test_if_elif_else_chain() {
    let source = "func grade(n):\n    if n > 89:\n        return \"A\"\n    elif n > 79:\n        return \"B\"\n    else:\n        return \"C\"\nprint(grade(95))\nprint(grade(85))\nprint(grade(10))";
    assert_eq!(run(source), "A\nB\nC\n");
}

#[test]
fn test_for_in_over_array() {
    let source = "total = 0\nfor n in [1, 2, 3, 4]:\n    total = total + n\nprint(total)";
    assert_eq!(run(source), "10\n");
}

#[test]
fn test_c_style_for() {
    let source = "sum = 0\nfor (i = 0; i < 5; i++) { sum = sum + i }\nprint(sum)";
    assert_eq!(run(source), "10\n");
}

#[test]
fn test_break_exits_innermost_loop() {
    let source = "hits = 0\nfor a in [1, 2, 3]:\n    for b in [1, 2, 3]:\n        if b == 2:\n            break\n        hits = hits + 1\nprint(hits)";
    assert_eq!(run(source), "3\n");
}

#[test]
fn test_while_break() {
    let source = "x = 0\nwhile True:\n    x = x + 1\n    if x == 3:\n        break\nprint(x)";
    assert_eq!(run(source), "3\n");
}

#[test]
fn test_postfix_in_function() {
    let source = "func count() {\n    i = 5\n    i++\n    i++\n    i--\n    return i\n}\nprint(count())";
    assert_eq!(run(source), "6\n");
}

#[test]
fn test_postfix_yields_old_value() {
    let source = "func f() {\n    i = 5\n    old = i++\n    return old + i\n}\nprint(f())";
    assert_eq!(run(source), "11\n");
}

#[test]
fn test_type_declaration_builds_constructor() {
    let source = "type User:\n    name\n    email\nu = User(\"ada\", \"ada@example.com\")\nprint(u[\"name\"])\nprint(u.email)";
    assert_eq!(run(source), "ada\nada@example.com\n");
}

#[test]
fn test_inline_module_block() {
    let source = "module mathx:\n    func double(n):\n        return n * 2\n    func triple(n):\n        return n * 3\nprint(mathx.double(4))\nprint(mathx.triple(4))";
    assert_eq!(run(source), "8\n12\n");
}

#[test]
fn test_spawn_await_eager_semantics() {
    let source = "func work() { return 41 }\nt = spawn work()\nprint(await t + 1)";
    assert_eq!(run(source), "42\n");
}

#[test]
fn test_await_passes_plain_values_through() {
    assert_eq!(run("print(await 7)"), "7\n");
}

#[test]
fn test_async_func_runs_synchronously() {
    let source = "async func fetch() { return \"data\" }\nprint(await fetch())";
    assert_eq!(run(source), "data\n");
}

#[test]
fn test_defer_runs_at_function_exit_in_reverse() {
    let source = "func f() {\n    defer print(\"first registered\")\n    defer print(\"second registered\")\n    print(\"body\")\n    return 0\n}\nf()";
    assert_eq!(run(source), "body\nsecond registered\nfirst registered\n");
}

#[test]
fn test_top_level_defer_runs_before_exit() {
    let source = "defer print(\"bye\")\nprint(\"hi\")";
    assert_eq!(run(source), "hi\nbye\n");
}

#[test]
fn test_unary_operators() {
    assert_eq!(run("print(-5)\nprint(!True)\nprint(!None)"), "-5\nfalse\ntrue\n");
}

#[test]
fn test_truthiness_rules() {
    // Only False and Null are falsy.
    let source = "if 0: print(\"zero truthy\")\nif \"\": print(\"empty truthy\")\nif !False: print(\"not false\")\nif None: print(\"unreachable\")";
    assert_eq!(run(source), "zero truthy\nempty truthy\nnot false\n");
}

#[test]
fn test_string_comparisons() {
    assert_eq!(run("print(\"abc\" == \"abc\")\nprint(\"a\" < \"b\")\nprint(\"b\" <= \"a\")"), "true\ntrue\nfalse\n");
}

#[test]
fn test_map_with_integer_and_bool_keys() {
    let source = "m = {1: \"one\", True: \"yes\"}\nprint(m[1])\nprint(m[True])\nprint(m[2])";
    assert_eq!(run(source), "one\nyes\nnull\n");
}

#[test]
fn test_map_string_keys_compare_by_content() {
    // Two distinct String values with equal content address the same slot.
    let source = "k = \"a\" + \"b\"\nm = {\"ab\": 1}\nprint(m[k])";
    assert_eq!(run(source), "1\n");
}

#[test]
fn test_nested_data_structures() {
    let source = "data = {\"rows\": [[1, 2], [3, 4]]}\nprint(data[\"rows\"][1][0])";
    assert_eq!(run(source), "3\n");
}

#[test]
fn test_len_builtin() {
    assert_eq!(run("print(len(\"hello\"))\nprint(len([1,2,3]))\nprint(len({\"a\":1}))"), "5\n3\n1\n");
}

#[test]
fn test_fast_builtins_agree_with_loops() {
    let source = "total = 0\ni = 0\nwhile i < 100:\n    total = total + i\n    i = i + 1\nprint(total)\nprint(fast_sum_to(100))\nprint(fast_sum_range(0, 100))";
    assert_eq!(run(source), "4950\n4950\n4950\n");
}

#[test]
fn test_semicolon_separated_statements() {
    assert_eq!(run("a = 1; b = 2; print(a + b)"), "3\n");
}

#[test]
fn test_functions_shadow_builtins() {
    let source = "func len(x) { return 99 }\nprint(len(\"abc\"))";
    assert_eq!(run(source), "99\n");
}

#[test]
fn test_error_values_are_first_class() {
    let source = "e = json.decode(\"{bad\")\nprint(e)";
    let output = run(source);
    assert!(output.starts_with("error: "), "output: {output}");
}
