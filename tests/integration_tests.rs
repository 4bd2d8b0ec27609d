use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use vine_lang::config::{MatchMode, RuntimeConfig};
use vine_lang::error::{ErrorCode, ErrorKind, VineError};
use vine_lang::interpreter::debugger::DebugHook;
use vine_lang::interpreter::environment::Environment;
use vine_lang::interpreter::module_context::ModuleRegistry;
use vine_lang::interpreter::value::Value;
use vine_lang::interpreter::Interpreter;
use vine_lang::keywords::load_keywords;
use vine_lang::parser::ast::NodeId;
use vine_lang::parser::{parse_source, Parser};
use vine_lang::printer::print_program;
use vine_lang::scanner::Scanner;

// `print` output shared between the interpreter and the test
#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

fn interpreter(file: Option<PathBuf>, out: &SharedBuf) -> Interpreter {
    Interpreter::new(
        Environment::new_root(file),
        RuntimeConfig::default(),
        ModuleRegistry::standard(),
    )
    .with_output(Box::new(out.clone()))
}

fn run_source(source: &str, file: Option<PathBuf>) -> (Result<Value, VineError>, String) {
    let keywords = load_keywords(None).expect("default keywords");
    let out = SharedBuf::default();
    let result = parse_source(source, &keywords, MatchMode::Strict)
        .and_then(|program| interpreter(file, &out).interpret(&program));
    (result, out.contents())
}

// Mimic what `vine run` does, minus the file
fn eval(source: &str) -> Result<Value, String> {
    run_source(source, None).0.map_err(|e| e.to_string())
}

fn output(source: &str) -> String {
    match run_source(source, None) {
        (Ok(_), out) => out,
        (Err(e), out) => panic!("program failed: {} (output so far: {:?})", e, out),
    }
}

fn eval_err(source: &str) -> VineError {
    match run_source(source, None).0 {
        Err(e) => e,
        Ok(v) => panic!("Expected an error, got {:?}", v),
    }
}

// A fresh directory per test so module fixtures never collide
fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vine_it_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_module(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(name), source).unwrap();
}

// ── arithmetic and coercion ─────────────────────────────────────────────────

#[test]
fn test_stmt_at_eof_no_newline() {
    match eval("true") {
        Ok(Value::Bool(b)) => assert!(b),
        other => panic!("Expected Bool(true), got {:?}", other),
    }
}

#[test]
fn test_arithmetic_is_right_associative() {
    match eval("10 - 2 - 3") {
        Ok(Value::Num(n)) => assert_eq!(n, 11.0),
        other => panic!("Expected Number(11.0), got {:?}", other),
    }
    match eval("2 * 3 + 4") {
        Ok(Value::Num(n)) => assert_eq!(n, 14.0),
        other => panic!("Expected Number(14.0), got {:?}", other),
    }
}

#[test]
fn test_parentheses_group() {
    match eval("(10 - 2) - 3") {
        Ok(Value::Num(n)) => assert_eq!(n, 5.0),
        other => panic!("Expected Number(5.0), got {:?}", other),
    }
}

#[test]
fn test_negation() {
    match eval("let x = 4\nlet y = -x + 1\ny") {
        Ok(Value::Num(n)) => assert_eq!(n, -3.0),
        other => panic!("Expected Number(-3.0), got {:?}", other),
    }
}

#[test]
fn test_plus_follows_left_operand() {
    match eval(r#""3" + 4"#) {
        Ok(Value::Str(s)) => assert_eq!(s.as_ref(), "34"),
        other => panic!("Expected String(\"34\"), got {:?}", other),
    }
    match eval(r#"3 + "4""#) {
        Ok(Value::Num(n)) => assert_eq!(n, 7.0),
        other => panic!("Expected Number(7.0), got {:?}", other),
    }
}

#[test]
fn test_unparseable_operand_is_nan() {
    match eval(r#""abc" * 2"#) {
        Ok(Value::NaN) => {}
        other => panic!("Expected NaN, got {:?}", other),
    }
}

#[test]
fn test_plus_on_boolean_is_an_error() {
    let err = eval_err("true + 1");
    assert_eq!(err.code, ErrorCode::Runtime);
    assert!(err.message.contains("Cannot apply '+'"), "{}", err.message);
}

#[test]
fn test_equality_is_loose_for_primitives_and_identity_for_arrays() {
    assert_eq!(eval(r#"4 == "4""#), Ok(Value::Bool(true)));
    assert_eq!(eval("NaN == NaN"), Ok(Value::Bool(false)));
    assert_eq!(eval("[1] == [1]"), Ok(Value::Bool(false)));
    assert_eq!(eval("let a = [1]\na == a"), Ok(Value::Bool(true)));
    assert_eq!(eval("1 != 2"), Ok(Value::Bool(true)));
}

#[test]
fn test_comparisons() {
    assert_eq!(eval(r#""apple" < "banana""#), Ok(Value::Bool(true)));
    assert_eq!(eval("3 >= 3"), Ok(Value::Bool(true)));
    assert_eq!(eval(r#"10 > "9""#), Ok(Value::Bool(true)));
}

#[test]
fn test_ternary() {
    match eval(r#"let n = 5
n > 3 ? "big" : "small""#)
    {
        Ok(Value::Str(s)) => assert_eq!(s.as_ref(), "big"),
        other => panic!("Expected \"big\", got {:?}", other),
    }
}

// ── control flow ────────────────────────────────────────────────────────────

#[test]
fn test_if_requires_boolean() {
    let err = eval_err(r#"if 1: print("x") end"#);
    assert_eq!(err.message, "Condition must be a boolean, got number");
}

#[test]
fn test_else_if_chain() {
    let code = r#"
fn size(n):
    if n < 10:
        return "small"
    else if n < 100:
        return "medium"
    else:
        return "large"
    end
end
print(size(1))
print(size(50))
print(size(500))
"#;
    assert_eq!(output(code), "small\nmedium\nlarge\n");
}

#[test]
fn test_range_is_inclusive() {
    assert_eq!(output("for i in 1..3: print(i) end"), "1\n2\n3\n");
}

#[test]
fn test_reversed_range_runs_nothing() {
    assert_eq!(output("for i in 3..1: print(i) end"), "");
}

#[test]
fn test_for_over_array_with_index() {
    let code = r#"
for i, fruit in ["apple", "pear"]:
    print("{{ i }}:{{ fruit }}")
end
"#;
    assert_eq!(output(code), "0:apple\n1:pear\n");
}

#[test]
fn test_for_over_object() {
    let code = r#"
let scores = {ann: 3, bob: 5}
for name in scores:
    print(name)
end
for name, score in scores:
    print(name + "=" + score)
end
"#;
    assert_eq!(output(code), "ann\nbob\nann=3\nbob=5\n");
}

#[test]
fn test_for_over_number_is_an_error() {
    let err = eval_err("for x in 5: print(x) end");
    assert_eq!(err.message, "Cannot iterate over number");
}

#[test]
fn test_return_at_top_level_stops_the_program() {
    let (result, out) = run_source("print(\"a\")\nreturn 1\nprint(\"b\")", None);
    assert_eq!(result, Ok(Value::Num(1.0)));
    assert_eq!(out, "a\n");
}

#[test]
fn test_switch_is_strict_and_an_expression() {
    let code = r#"
fn describe(n):
    return switch n:
        case 1: return "one"
        case 2:
            let s = "two"
            s
            break
        default: return "many"
    end
end
describe(1) + describe(2) + describe("1")
"#;
    match eval(code) {
        Ok(Value::Str(s)) => assert_eq!(s.as_ref(), "onetwomany"),
        other => panic!("Expected \"onetwomany\", got {:?}", other),
    }
}

#[test]
fn test_switch_default_taken_in_order() {
    let code = r#"
switch 2:
    default: print("default") break
    case 2: print("two") break
end
"#;
    assert_eq!(output(code), "default\n");
}

#[test]
fn test_return_in_case_does_not_leave_function() {
    let code = r#"
fn f():
    switch 1:
        case 1: return "from case"
    end
    return "from function"
end
f()
"#;
    match eval(code) {
        Ok(Value::Str(s)) => assert_eq!(s.as_ref(), "from function"),
        other => panic!("Expected \"from function\", got {:?}", other),
    }
}

// ── scoping and closures ────────────────────────────────────────────────────

#[test]
fn test_block_variables_do_not_leak() {
    let err = eval_err("if true: let inner = 1 end\ninner");
    assert_eq!(err.kind, ErrorKind::VariableNotFound);
    assert_eq!(err.message, "'inner' is not declared");
}

#[test]
fn test_loop_variable_does_not_leak() {
    let err = eval_err("for i in 1..2: i end\ni");
    assert_eq!(err.kind, ErrorKind::VariableNotFound);
}

#[test]
fn test_shadowing_in_block() {
    let code = r#"
let x = "outer"
if true:
    let x = "inner"
    print(x)
end
print(x)
"#;
    assert_eq!(output(code), "inner\nouter\n");
}

#[test]
fn test_redeclare_in_same_scope_is_an_error() {
    let err = eval_err("let a = 1\nlet a = 2");
    assert_eq!(err.message, "'a' is already declared");
}

#[test]
fn test_const_cannot_be_reassigned() {
    let err = eval_err("const k = 1\nk = 2");
    assert_eq!(err.message, "Cannot assign to constant 'k'");
    let err = eval_err("cst k = 1\nk = 2");
    assert_eq!(err.message, "Cannot assign to constant 'k'");
}

#[test]
fn test_prelude_print_is_constant() {
    let err = eval_err("print = 1");
    assert_eq!(err.message, "Cannot assign to constant 'print'");
}

#[test]
fn test_closure_sees_value_at_call_time() {
    let code = r#"
let count = 0
fn read(): return count end
count = 5
read()
"#;
    assert_eq!(eval(code), Ok(Value::Num(5.0)));
}

#[test]
fn test_counter_closure() {
    let code = r#"
fn counter():
    let n = 0
    return fn (): n = n + 1 return n end
end
let c = counter()
c()
c()
c()
"#;
    assert_eq!(eval(code), Ok(Value::Num(3.0)));
}

#[test]
fn test_loop_closures_capture_their_iteration() {
    let code = r#"
let fns = []
for i in 1..3:
    fns.push(fn (): return i end)
end
fns[0]() + fns[2]()
"#;
    assert_eq!(eval(code), Ok(Value::Num(4.0)));
}

#[test]
fn test_recursion() {
    let code = r#"
fn fib(n):
    if n < 2: return n end
    return fib(n - 1) + fib(n - 2)
end
fib(10)
"#;
    assert_eq!(eval(code), Ok(Value::Num(55.0)));
}

#[test]
fn test_lone_array_argument_spreads() {
    assert_eq!(
        eval("fn add(a, b): return a + b end\nadd([1, 2])"),
        Ok(Value::Num(3.0))
    );
    assert_eq!(
        eval("fn first(a, b): return a end\nfirst(7)"),
        Ok(Value::Num(7.0))
    );
}

#[test]
fn test_missing_argument_is_unbound() {
    let err = eval_err("fn f(a, b): return b end\nf(1)");
    assert_eq!(err.message, "'b' is not declared");
}

#[test]
fn test_calling_a_number_is_an_error() {
    let err = eval_err("let x = 1\nx()");
    assert!(err.message.contains("is not callable"), "{}", err.message);
}

// ── values ──────────────────────────────────────────────────────────────────

#[test]
fn test_template_interpolation() {
    match eval("let name = \"vine\"\n\"hello {{ name }}, {{ 1 + 2 }}!\"") {
        Ok(Value::Str(s)) => assert_eq!(s.as_ref(), "hello vine, 3!"),
        other => panic!("Expected interpolated string, got {:?}", other),
    }
}

#[test]
fn test_objects() {
    let code = r#"
let a = 1
let o = {a, b: "x"}
o.c = 3
print(o)
print(o.missing)
o.keys()
"#;
    let (result, out) = run_source(code, None);
    assert_eq!(out, "{a: 1, b: \"x\", c: 3}\nnil\n");
    match result {
        Ok(Value::Array(keys)) => {
            let keys: Vec<String> = keys.borrow().iter().map(|k| k.to_string()).collect();
            assert_eq!(keys, vec!["a", "b", "c"]);
        }
        other => panic!("Expected key array, got {:?}", other),
    }
}

#[test]
fn test_array_index_assignment() {
    let code = r#"
let xs = [1, 2]
xs[1] = 5
xs[2] = 9
xs
"#;
    match eval(code) {
        Ok(v) => assert_eq!(v.to_string(), "[1, 5, 9]"),
        other => panic!("Expected array, got {:?}", other),
    }
    let err = eval_err("let xs = []\nxs[3] = 1");
    assert_eq!(err.code, ErrorCode::Runtime);
}

#[test]
fn test_array_callbacks() {
    match eval("[1, 2, 3].map(fn (x): return x * 2 end).join(\"-\")") {
        Ok(Value::Str(s)) => assert_eq!(s.as_ref(), "2-4-6"),
        other => panic!("Expected \"2-4-6\", got {:?}", other),
    }
    match eval("[1, 2, 3, 4].filter(fn (x): return x % 2 == 0 end)") {
        Ok(v) => assert_eq!(v.to_string(), "[2, 4]"),
        other => panic!("Expected [2, 4], got {:?}", other),
    }
    assert_eq!(
        output("[\"a\", \"b\"].forEach(fn (v, i): print(\"{{ i }}:{{ v }}\") end)"),
        "0:a\n1:b\n"
    );
}

#[test]
fn test_filter_requires_boolean() {
    let err = eval_err("[1].filter(fn (x): return x end)");
    assert_eq!(err.code, ErrorCode::Runtime);
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("\"Vine\".toUpperCase()"), Ok(Value::str("VINE")));
    assert_eq!(eval("\"a,b\".split(\",\").length"), Ok(Value::Num(2.0)));
    assert_eq!(eval("\"hello\".length"), Ok(Value::Num(5.0)));
    assert_eq!(eval("\"hello\"[1]"), Ok(Value::str("e")));
}

// ── diagnostics ─────────────────────────────────────────────────────────────

#[test]
fn test_error_points_at_identifier() {
    let err = eval_err("let a = 1\nlet b = a + c");
    assert_eq!(err.kind, ErrorKind::VariableNotFound);
    let span = err.span.expect("span");
    assert_eq!(span.line, 2);
    assert_eq!(span.col, 13);
}

#[test]
fn test_typo_gets_a_hint() {
    let err = eval_err("let value = 1\nvaleu");
    assert_eq!(err.hint.as_deref(), Some("did you mean 'value'?"));
}

#[test]
fn test_syntax_error_code() {
    let err = eval_err("fn f(: end");
    assert_eq!(err.code, ErrorCode::Syntax);
}

#[test]
fn test_unterminated_string() {
    let err = eval_err("let s = \"open");
    assert_eq!(err.code, ErrorCode::Syntax);
    assert!(err.message.contains("Unterminated string"));
}

// ── tasks ───────────────────────────────────────────────────────────────────

#[test]
fn test_run_is_deferred_until_sync_code_finishes() {
    let code = r#"
task fn f():
    print("task")
    return 1
end
run f() to (x): print("got {{ x }}") end
print("after")
"#;
    assert_eq!(output(code), "after\ntask\ngot 1\n");
}

#[test]
fn test_tasks_run_in_schedule_order() {
    let code = r#"
task fn a(): print("a") end
task fn b(): print("b") end
run b()
run a()
print("sync")
"#;
    assert_eq!(output(code), "sync\nb\na\n");
}

#[test]
fn test_wait_on_run_with_continuations() {
    let code = r#"
task fn f(): return 1 end
let v = wait run f() to (x): return x + 1 to (y): return y * 10 end
v
"#;
    // every continuation sees the call's result; the last one decides the value
    assert_eq!(eval(code), Ok(Value::Num(10.0)));
}

#[test]
fn test_wait_on_stored_handle() {
    let code = r#"
task fn slow(): return "done" end
let t = run slow()
print("scheduled")
print(wait t)
"#;
    assert_eq!(output(code), "scheduled\ndone\n");
}

#[test]
fn test_wait_on_plain_value_passes_through() {
    assert_eq!(eval("wait 5"), Ok(Value::Num(5.0)));
}

#[test]
fn test_task_returning_task_is_flattened() {
    let code = r#"
task fn inner(): return 2 end
task fn outer(): return run inner() end
wait run outer()
"#;
    assert_eq!(eval(code), Ok(Value::Num(2.0)));
}

#[test]
fn test_no_tasks_left_after_interpret() {
    let keywords = load_keywords(None).unwrap();
    let out = SharedBuf::default();
    let mut interpreter = interpreter(None, &out);
    let program = parse_source(
        "task fn f(): print(\"ran\") end\nrun f()",
        &keywords,
        MatchMode::Strict,
    )
    .unwrap();
    interpreter.interpret(&program).unwrap();
    assert_eq!(interpreter.pending_tasks(), 0);
    assert_eq!(out.contents(), "ran\n");
}

#[test]
fn test_failed_pass_drops_its_tasks() {
    let keywords = load_keywords(None).unwrap();
    let out = SharedBuf::default();
    let mut interpreter = interpreter(None, &out);
    let mut pass = |source: &str| {
        let program = parse_source(source, &keywords, MatchMode::Strict).unwrap();
        interpreter.interpret(&program)
    };

    assert_eq!(pass("task fn f(): print(\"stale\") end"), Ok(Value::Nil));
    let err = pass("let t = run f()\nghost").unwrap_err();
    assert_eq!(err.kind, ErrorKind::VariableNotFound);
    assert_eq!(pass("print(\"next\")"), Ok(Value::Nil));
    assert_eq!(out.contents(), "next\n");

    // the handle outlived its job, so it can never resolve
    let err = pass("wait t").unwrap_err();
    assert!(err.message.contains("never resolve"), "{}", err.message);
    assert_eq!(interpreter.pending_tasks(), 0);
}

#[test]
fn test_resolved_handle_survives_into_the_next_pass() {
    let keywords = load_keywords(None).unwrap();
    let out = SharedBuf::default();
    let mut interpreter = interpreter(None, &out);
    for (source, expected) in [
        ("task fn f(): return 7 end\nlet t = run f()", Value::Nil),
        ("wait t", Value::Num(7.0)),
    ] {
        let program = parse_source(source, &keywords, MatchMode::Strict).unwrap();
        assert_eq!(interpreter.interpret(&program), Ok(expected), "{}", source);
    }
}

// ── modules ─────────────────────────────────────────────────────────────────

const UTIL: &str = r#"
expose fn greet(name): return "hi " + name end
fn secret(): return 42 end
expose const VERSION = 2
"#;

#[test]
fn test_wildcard_use_sees_exposed_names_only() {
    let dir = fixture_dir("wildcard");
    write_module(&dir, "util.vine", UTIL);
    let main = Some(dir.join("main.vine"));

    let (result, _) = run_source("use \"./util\"\ngreet(\"bob\")", main.clone());
    assert_eq!(result, Ok(Value::str("hi bob")));

    let (result, _) = run_source("use \"./util\"\nsecret()", main);
    match result {
        Err(e) => assert_eq!(e.kind, ErrorKind::VariableNotFound),
        other => panic!("Expected secret() to be hidden, got {:?}", other),
    }
}

#[test]
fn test_namespace_use() {
    let dir = fixture_dir("namespace");
    write_module(&dir, "util.vine", UTIL);
    let (result, _) = run_source(
        "use \"./util\" as u\nu.VERSION + u.secret()",
        Some(dir.join("main.vine")),
    );
    assert_eq!(result, Ok(Value::Num(44.0)));
}

#[test]
fn test_pick_with_alias() {
    let dir = fixture_dir("pick");
    write_module(&dir, "util.vine", UTIL);
    let main = Some(dir.join("main.vine"));

    let (result, _) = run_source(
        "use \"./util\" pick (greet as hello, VERSION)\nhello(\"amy\") + VERSION",
        main.clone(),
    );
    assert_eq!(result, Ok(Value::str("hi amy2")));

    let (result, _) = run_source("use \"./util\" pick (greet as hello)\ngreet(\"amy\")", main);
    assert!(result.is_err());
}

#[test]
fn test_picking_a_missing_name_fails_at_use() {
    let dir = fixture_dir("pick_missing");
    write_module(&dir, "util.vine", UTIL);
    let (result, _) = run_source("use \"./util\" pick (nope)", Some(dir.join("main.vine")));
    match result {
        Err(e) => assert_eq!(e.message, "'nope' is not declared"),
        other => panic!("Expected missing pick error, got {:?}", other),
    }
}

#[test]
fn test_missing_module() {
    let dir = fixture_dir("missing");
    let (result, _) = run_source("use \"./nope\"", Some(dir.join("main.vine")));
    match result {
        Err(e) => assert_eq!(e.message, "Module './nope' not found"),
        other => panic!("Expected not found, got {:?}", other),
    }
}

#[test]
fn test_cyclic_import_is_an_error() {
    let dir = fixture_dir("cycle");
    write_module(&dir, "a.vine", "use \"./b\"\nexpose let a = 1\n");
    write_module(&dir, "b.vine", "use \"./a\"\nexpose let b = 1\n");
    let (result, _) = run_source("use \"./a\"", Some(dir.join("main.vine")));
    match result {
        Err(e) => assert!(e.message.contains("Cyclic import"), "{}", e.message),
        other => panic!("Expected cycle error, got {:?}", other),
    }
}

#[test]
fn test_module_evaluated_once() {
    let dir = fixture_dir("cache");
    write_module(&dir, "m.vine", "print(\"loading\")\nexpose let x = 1\n");
    let (result, out) = run_source(
        "use \"./m\" as one\nuse \"./m\" as two\none.x + two.x",
        Some(dir.join("main.vine")),
    );
    assert_eq!(result, Ok(Value::Num(2.0)));
    assert_eq!(out, "loading\n");
}

#[test]
fn test_error_in_module_names_its_file() {
    let dir = fixture_dir("module_error");
    write_module(&dir, "broken.vine", "let x = y\n");
    let (result, _) = run_source("use \"./broken\"", Some(dir.join("main.vine")));
    let err = result.expect_err("module should fail");
    assert_eq!(err.kind, ErrorKind::VariableNotFound);
    assert_eq!(err.file, Some(fs::canonicalize(dir.join("broken.vine")).unwrap()));
    assert_eq!(err.span.map(|s| s.line), Some(1));
}

#[test]
fn test_module_closure_resolves_in_its_own_file() {
    let dir = fixture_dir("module_closure");
    write_module(
        &dir,
        "counter.vine",
        "let hits = 0\nexpose fn hit(): hits = hits + 1 return hits end\n",
    );
    let (result, _) = run_source(
        "use \"./counter\"\nhit()\nhit()",
        Some(dir.join("main.vine")),
    );
    assert_eq!(result, Ok(Value::Num(2.0)));
}

// ── builtin modules ─────────────────────────────────────────────────────────

#[test]
fn test_builtin_path() {
    let dir = fixture_dir("builtin_path");
    let (result, _) = run_source(
        "use \"vine:path\" as path\npath.file() + \" \" + path.extname()",
        Some(dir.join("main.vine")),
    );
    assert_eq!(result, Ok(Value::str("main.vine .vine")));
}

#[test]
fn test_builtin_io_is_relative_to_script() {
    let dir = fixture_dir("builtin_io");
    let code = r#"
use "vine:io" pick (write, read, exists)
write("a.txt", "data")
exists("a.txt") ? read("a.txt") : "missing"
"#;
    let (result, _) = run_source(code, Some(dir.join("main.vine")));
    assert_eq!(result, Ok(Value::str("data")));
    assert_eq!(fs::read_to_string(dir.join("a.txt")).unwrap(), "data");
}

#[test]
fn test_builtin_date() {
    assert_eq!(
        eval("use \"vine:date\" pick (getFullYear)\ngetFullYear() > 2000"),
        Ok(Value::Bool(true))
    );
}

#[test]
fn test_unknown_builtin() {
    let err = eval_err("use \"vine:nope\"");
    assert_eq!(err.message, "Module 'vine:nope' not found");
}

// ── hosts: debugger, REPL, printer ──────────────────────────────────────────

struct LineRecorder(Rc<RefCell<Vec<usize>>>);

impl DebugHook for LineRecorder {
    fn report(&mut self, line: usize, _stmt: NodeId, _env: &Rc<Environment>) -> Result<(), VineError> {
        self.0.borrow_mut().push(line);
        Ok(())
    }

    fn is_paused(&self) -> bool {
        false
    }

    fn wait_for_resume(&mut self) -> Result<(), VineError> {
        Ok(())
    }
}

#[test]
fn test_debug_hook_sees_every_statement() {
    let keywords = load_keywords(None).unwrap();
    let program = parse_source(
        "let a = 1\n# note\nlet b = 2\nif true:\n    let c = 3\nend",
        &keywords,
        MatchMode::Strict,
    )
    .unwrap();
    let lines = Rc::new(RefCell::new(Vec::new()));
    let out = SharedBuf::default();
    let mut interpreter =
        interpreter(None, &out).with_debugger(Box::new(LineRecorder(Rc::clone(&lines))));
    interpreter.interpret(&program).unwrap();
    assert_eq!(*lines.borrow(), vec![1, 3, 4, 5]);
}

#[test]
fn test_repl_session_keeps_state() {
    let keywords = load_keywords(None).unwrap();
    let out = SharedBuf::default();
    let mut interpreter = interpreter(None, &out);
    let mut parser = Parser::new(Vec::new()).with_keywords(&keywords);

    for (line, expected) in [
        ("let x = 40", Value::Nil),
        ("fn add(n): return x + n end", Value::Nil),
        ("add(2)", Value::Num(42.0)),
    ] {
        let tokens = Scanner::new(line, &keywords).scan_tokens().tokens;
        parser.push_stack(tokens);
        let program = parser.parse().unwrap();
        assert_eq!(interpreter.interpret(&program), Ok(expected), "{}", line);
    }
}

#[test]
fn test_printer_output_runs_the_same() {
    let code = r#"
fn scale(xs, k):
  return xs.map(fn (x): return x * k end)
end
let total = 0
for i, v in scale([1,2,3], 2):
  total = total + v
end
print("total {{ total }}")
"#;
    let keywords = load_keywords(None).unwrap();
    let printed = print_program(&parse_source(code, &keywords, MatchMode::Strict).unwrap());
    assert_eq!(output(code), output(&printed));
    assert_eq!(output(&printed), "total 12\n");
}
