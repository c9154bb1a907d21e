//! Integration tests for the stepping interpreter and batch grader.
//!
//! Tests key interpreter features:
//! - script semantics (operators, closures, hoisting, built-ins)
//! - stepping and suspension points
//! - loop traps, gas and call depth
//! - runtime faults as implicit failures
//! - per-run state isolation and determinism
//! - the async grader

use serde_json::json;
use tessera_eval::{
    grade_all, BatchGrader, EvalError, Interpreter, RunConfig, Status, TestCaseResult,
    IMPLICIT_FAILURE,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn interpreter(code: &str) -> Interpreter {
    Interpreter::new(code, &json!({}), RunConfig::default())
        .unwrap_or_else(|e| panic!("program does not parse: {e}"))
}

/// Step to the end, collecting every highlighted block id.
fn run(interp: &mut Interpreter) -> Vec<String> {
    let mut trace = Vec::new();
    while interp.step() {
        if let Some(id) = interp.highlighted_block() {
            trace.push(id.to_string());
        }
    }
    trace
}

/// Evaluate `expr` and return `exit`'s message, which is the value as text.
fn eval_str(expr: &str) -> String {
    let mut interp = interpreter(&format!("exit(true, '' + ({expr}));"));
    run(&mut interp);
    assert!(
        interp.fault().is_none(),
        "{expr} faulted: {:?}",
        interp.fault()
    );
    interp.message().unwrap_or_default().to_string()
}

// ══════════════════════════════════════════════════════════════════════════════
// 1. Script semantics
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn arithmetic_and_concatenation() {
    assert_eq!(eval_str("1 + 2 * 3"), "7");
    assert_eq!(eval_str("(1 + 2) * 3"), "9");
    assert_eq!(eval_str("'a' + 1 + 2"), "a12");
    assert_eq!(eval_str("1 + 2 + 'a'"), "3a");
    assert_eq!(eval_str("7 / 2"), "3.5");
    assert_eq!(eval_str("1 / 0"), "Infinity");
    assert_eq!(eval_str("0.1 + 0.2"), "0.30000000000000004");
    assert_eq!(eval_str("-7 % 3"), "-1");
}

#[test]
fn equality_and_typeof() {
    assert_eq!(eval_str("1 == '1'"), "true");
    assert_eq!(eval_str("1 === '1'"), "false");
    assert_eq!(eval_str("null == undefined"), "true");
    assert_eq!(eval_str("NaN == NaN"), "false");
    assert_eq!(eval_str("typeof [] + typeof 1 + typeof undeclared"), "objectnumberundefined");
}

#[test]
fn bitwise_operators_use_int32() {
    assert_eq!(eval_str("5 & 3"), "1");
    assert_eq!(eval_str("~5"), "-6");
    assert_eq!(eval_str("-1 >>> 0"), "4294967295");
    assert_eq!(eval_str("4.7 | 0"), "4");
}

#[test]
fn functions_closures_and_hoisting() {
    let mut interp = interpreter(
        r#"
        var total = add(2, 3);
        function add(a, b) { return a + b; }
        function counter() {
            var n = 0;
            function next() { n += 1; return n; }
            return next;
        }
        var c = counter();
        c(); c();
        exit(total === 5 && c() === 3, "closures");
        "#,
    );
    run(&mut interp);
    assert!(interp.correct(), "{:?}", interp.fault());
}

#[test]
fn arrays_are_shared_by_reference() {
    let mut interp = interpreter(
        r#"
        var a = [1, 2];
        var b = a;
        b.push(3);
        exit(a.length === 3 && a.join('-') === '1-2-3', a.join('-'));
        "#,
    );
    run(&mut interp);
    assert!(interp.correct());
    assert_eq!(interp.message(), Some("1-2-3"));
}

#[test]
fn string_methods() {
    assert_eq!(eval_str("'Hello'.toUpperCase()"), "HELLO");
    assert_eq!(eval_str("'a,b,c'.split(',').length"), "3");
    assert_eq!(eval_str("'block'.charAt(1)"), "l");
    assert_eq!(eval_str("'block'.slice(-3)"), "ock");
    assert_eq!(eval_str("'block'.length"), "5");
}

#[test]
fn object_literals_and_members() {
    assert_eq!(eval_str("({ x: 1, 'y': 2 }).y"), "2");
    assert_eq!(eval_str("[10, 20, 30][1]"), "20");
    assert_eq!(eval_str("[1, [2, 3]]"), "1,2,3");
}

#[test]
fn loops_break_and_continue() {
    let mut interp = interpreter(
        r#"
        var sum = 0;
        for (var i = 0; i < 10; i++) {
            if (i % 2 == 0) continue;
            if (i > 7) break;
            sum += i;
        }
        var k = 0;
        do { k++; } while (k < 3);
        exit(sum === 16 && k === 3, '' + sum);
        "#,
    );
    run(&mut interp);
    assert!(interp.correct(), "sum was {:?}", interp.message());
}

#[test]
fn undeclared_assignment_creates_a_global() {
    let mut interp = interpreter("function f() { fresh = 4; } f(); exit(fresh === 4);");
    run(&mut interp);
    assert!(interp.correct());
    assert_eq!(interp.globals()["fresh"], json!(4));
}

// ══════════════════════════════════════════════════════════════════════════════
// 2. Stepping
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn each_highlight_is_one_step() {
    let mut interp = interpreter(
        r#"
        highlightBlock("a");
        var x = 1;
        highlightBlock("b");
        x = x + 1;
        highlightBlock("c");
        exit(x === 2, "done");
        "#,
    );
    assert_eq!(interp.status(), Status::Ready);

    assert!(interp.step());
    assert_eq!(interp.status(), Status::Suspended);
    assert_eq!(interp.highlighted_block(), Some("a"));

    assert!(interp.step());
    assert_eq!(interp.highlighted_block(), Some("b"));
    assert_eq!(interp.globals()["x"], json!(1));

    assert!(interp.step());
    assert_eq!(interp.highlighted_block(), Some("c"));

    assert!(!interp.step());
    assert_eq!(interp.status(), Status::Finished);
    assert!(interp.correct());
    assert_eq!(interp.message(), Some("done"));

    // finished is terminal
    assert!(!interp.step());
}

#[test]
fn highlights_inside_loops_suspend_every_iteration() {
    let mut interp = interpreter(
        r#"
        for (var i = 0; i < 3; i++) {
            highlightBlock("body");
        }
        exit(true);
        "#,
    );
    assert_eq!(run(&mut interp), vec!["body", "body", "body"]);
}

#[test]
fn pause_suspends_without_highlighting() {
    let mut interp = interpreter("pause(); exit(true);");
    assert!(interp.step());
    assert_eq!(interp.highlighted_block(), None);
    assert!(!interp.step());
}

#[test]
fn run_for_ignores_suspension_points() {
    let mut interp = interpreter(r#"highlightBlock("a"); highlightBlock("b"); exit(true);"#);
    assert!(!interp.run_for(1_000));
    assert_eq!(interp.highlighted_block(), Some("b"));
    assert!(interp.correct());
}

#[test]
fn run_for_respects_its_budget() {
    let mut interp = interpreter("var i = 0; while (true) { i++; }");
    assert!(interp.run_for(50));
    assert_eq!(interp.status(), Status::Running);
    let steps = interp.steps_executed();
    assert!((50..60).contains(&steps), "ran {steps} steps");
}

// ══════════════════════════════════════════════════════════════════════════════
// 3. Budgets
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn loop_trap_ends_an_infinite_loop() {
    let code = r#"
        while (true) {
            if(--loopTrap === 0) exit(false, "infinite loop");
        }
    "#;
    let config = RunConfig {
        loop_budget: 25,
        ..RunConfig::default()
    };
    let mut interp = Interpreter::new(code, &json!({}), config).unwrap();
    run(&mut interp);
    assert!(!interp.correct());
    assert_eq!(interp.message(), Some("infinite loop"));
    assert_eq!(interp.globals()["loopTrap"], json!(0));
}

#[test]
fn gas_bounds_unguarded_loops() {
    let config = RunConfig {
        max_micro_steps: 500,
        ..RunConfig::default()
    };
    let mut interp = Interpreter::new("while (true) {}", &json!({}), config).unwrap();
    run(&mut interp);
    assert_eq!(interp.fault(), Some(&EvalError::GasExhausted { limit: 500 }));
    assert_eq!(interp.outcome().unwrap().message.as_deref(), Some(IMPLICIT_FAILURE));
}

#[test]
fn deep_recursion_is_a_range_error() {
    let config = RunConfig {
        max_call_depth: 32,
        ..RunConfig::default()
    };
    let code = "var depth = 0; function f() { depth++; return f(); } f();";
    let mut interp = Interpreter::new(code, &json!({}), config).unwrap();
    run(&mut interp);
    assert!(matches!(interp.fault(), Some(EvalError::Range(_))));
    assert_eq!(interp.globals()["depth"], json!(32));
    assert!(!interp.correct());
}

// ══════════════════════════════════════════════════════════════════════════════
// 4. Faults
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn reading_undeclared_name_faults() {
    let mut interp = interpreter("highlightBlock('x'); y + 1; exit(true);");
    assert!(interp.step());
    assert!(!interp.step());
    assert_eq!(interp.fault(), Some(&EvalError::Reference("y".into())));
    assert!(interp.verdict().is_none());
    assert!(!interp.correct());
}

#[test]
fn property_of_undefined_faults() {
    let mut interp = interpreter("var a; a.b; exit(true);");
    run(&mut interp);
    assert!(matches!(interp.fault(), Some(EvalError::Type(_))));
}

#[test]
fn calling_a_non_function_faults() {
    let mut interp = interpreter("var a = 1; a(); exit(true);");
    run(&mut interp);
    assert_eq!(
        interp.fault(),
        Some(&EvalError::Type("a is not a function".into()))
    );
}

#[test]
fn unparsable_program_is_a_syntax_error() {
    let err = Interpreter::new("exit(true", &json!({}), RunConfig::default())
        .err()
        .expect("should not parse");
    assert!(err.errors.has_errors());
    assert!(err.position().is_some());
}

// ══════════════════════════════════════════════════════════════════════════════
// 5. Isolation and determinism
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn state_mutation_stays_inside_one_run() {
    let initial = json!({ "items": [1, 2] });
    let code = "state.items.push(3); exit(state.items.length === 3);";
    let mut first = Interpreter::new(code, &initial, RunConfig::default()).unwrap();
    run(&mut first);
    let mut second = Interpreter::new(code, &initial, RunConfig::default()).unwrap();
    run(&mut second);
    assert!(first.correct() && second.correct());
    assert_eq!(initial, json!({ "items": [1, 2] }));
}

#[test]
fn stepping_is_deterministic() {
    let code = r#"
        var path = [];
        for (var i = 0; i < 5; i++) {
            highlightBlock("step" + (i % 2));
            path.push(state.start + i);
        }
        highlightBlock("end");
        exit(path.join(',') === '3,4,5,6,7', path.join(','));
    "#;
    let state = json!({ "start": 3 });
    let baseline = {
        let mut interp = Interpreter::new(code, &state, RunConfig::default()).unwrap();
        let trace = run(&mut interp);
        (trace, interp.outcome())
    };
    assert!(baseline.1.as_ref().unwrap().correct);
    for _ in 0..100 {
        let mut interp = Interpreter::new(code, &state, RunConfig::default()).unwrap();
        let trace = run(&mut interp);
        assert_eq!((trace, interp.outcome()), baseline);
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// 6. Grading
// ══════════════════════════════════════════════════════════════════════════════

const EXPECT_DOUBLE: &str = r#"
    highlightBlock("check");
    if (state.input * 2 === state.expected) {
        exit(true, "passed");
    }
    exit(false, "expected " + state.expected);
"#;

fn cases() -> Vec<serde_json::Value> {
    vec![
        json!({ "input": 2, "expected": 4 }),
        json!({ "input": 3, "expected": 7 }),
        json!({ "input": 5, "expected": 10 }),
    ]
}

fn expected_results() -> Vec<TestCaseResult> {
    vec![
        TestCaseResult {
            index: 0,
            correct: true,
            message: Some("passed".into()),
        },
        TestCaseResult {
            index: 1,
            correct: false,
            message: Some("expected 7".into()),
        },
        TestCaseResult {
            index: 2,
            correct: true,
            message: Some("passed".into()),
        },
    ]
}

#[test]
fn batch_results_are_independent_of_slice_size() {
    for yield_interval in [1, 3, 256, 10_000] {
        let config = RunConfig {
            yield_interval,
            ..RunConfig::default()
        };
        let results = grade_all(EXPECT_DOUBLE, &cases(), config).unwrap();
        assert_eq!(results, expected_results(), "yield_interval {yield_interval}");
    }
}

#[test]
fn a_faulting_case_does_not_affect_others() {
    let code = "if (state.crash) { missing(); } exit(true, 'ok');";
    let states = [json!({ "crash": false }), json!({ "crash": true }), json!({})];
    let results = grade_all(code, &states, RunConfig::default()).unwrap();
    assert!(results[0].correct);
    assert!(!results[1].correct);
    assert_eq!(results[1].message.as_deref(), Some(IMPLICIT_FAILURE));
    assert!(results[2].correct);
}

#[test]
fn infinite_case_is_trapped_while_others_pass() {
    let code = r#"
        while (state.spin) {
            if(--loopTrap === 0) exit(false, "infinite loop");
        }
        exit(true);
    "#;
    let states = [json!({ "spin": false }), json!({ "spin": true })];
    let results = grade_all(code, &states, RunConfig::default()).unwrap();
    assert!(results[0].correct);
    assert_eq!(results[1].message.as_deref(), Some("infinite loop"));
}

#[tokio::test]
async fn async_grader_yields_and_completes() {
    let config = RunConfig {
        yield_interval: 2,
        ..RunConfig::default()
    };
    let grader = BatchGrader::new(EXPECT_DOUBLE, &cases(), config).unwrap();
    let results = grader.grade().await;
    assert_eq!(results, expected_results());
}
