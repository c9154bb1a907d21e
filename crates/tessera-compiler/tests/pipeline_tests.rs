//! End-to-end pipeline tests.
//!
//! Tests verify the full pipeline: definitions JSON → validate → register →
//! generate → interpret → grade, over a small block library and a set of
//! workspaces covering precedence, guards, loop traps and grading.

use serde_json::{json, Value};
use tessera_compiler::{compile, compile_to_result, validate_blocks, CompileResult};
use tessera_eval::{grade_all, Interpreter, RunConfig, Status};
use tessera_types::ErrorCode;

// ══════════════════════════════════════════════════════════════════════════════
// Block library
// ══════════════════════════════════════════════════════════════════════════════

const BLOCKS: &str = r#"[
  {
    "type": "num",
    "message0": "%1",
    "args0": [{ "type": "field_number", "value": 0 }],
    "output": "Number",
    "colour": 230,
    "tooltip": "A number",
    "js": "%1"
  },
  {
    "type": "add",
    "message0": "%1 + %2",
    "args0": [
      { "type": "input_value", "check": "Number" },
      { "type": "input_value", "check": "Number" }
    ],
    "output": "Number",
    "colour": 230,
    "tooltip": "Sum",
    "js": "%1 + %2"
  },
  {
    "type": "mul",
    "message0": "%1 × %2",
    "args0": [
      { "type": "input_value", "check": "Number" },
      { "type": "input_value", "check": "Number" }
    ],
    "output": "Number",
    "colour": 230,
    "tooltip": "Product",
    "js": "%1 * %2"
  },
  {
    "type": "input",
    "message0": "input",
    "output": "Number",
    "colour": 160,
    "tooltip": "The test input",
    "js": "state.input"
  },
  {
    "type": "record_call",
    "message0": "record a call",
    "output": "Number",
    "colour": 160,
    "tooltip": "Counts its evaluations",
    "js": "state.calls.push(1)"
  },
  {
    "type": "set_answer",
    "message0": "answer %1",
    "args0": [{ "type": "input_value", "check": "Number" }],
    "previousStatement": null,
    "nextStatement": null,
    "colour": 20,
    "tooltip": "Set the answer",
    "js": "answer = %1;"
  },
  {
    "type": "steps",
    "message0": "take %1 steps",
    "args0": [{ "type": "input_value", "check": "Integer", "min": "1", "max": "5" }],
    "previousStatement": null,
    "nextStatement": null,
    "colour": 20,
    "tooltip": "Between one and five steps",
    "js": "answer = %1;"
  },
  {
    "type": "submit",
    "message0": "submit %1",
    "args0": [{ "type": "input_value", "check": "Number" }],
    "previousStatement": null,
    "colour": 20,
    "tooltip": "Check against the expected value",
    "js": "answer = %1;\nexit(answer == state.expected, \"got \" + answer);"
  },
  {
    "type": "forever",
    "message0": "forever %1",
    "args0": [{ "type": "input_statement" }],
    "previousStatement": null,
    "nextStatement": null,
    "colour": 120,
    "tooltip": "Repeat forever",
    "js": "while (true) {\n  %1;\n}"
  }
]"#;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn workspace(top: Vec<Value>) -> String {
    json!({ "blocks": { "languageVersion": 0, "blocks": top } }).to_string()
}

fn num(id: &str, n: f64) -> Value {
    json!({ "type": "num", "id": id, "fields": { "_ARG0": n } })
}

fn binary(kind: &str, id: &str, left: Value, right: Value) -> Value {
    json!({
        "type": kind,
        "id": id,
        "inputs": { "_ARG0": { "block": left }, "_ARG1": { "block": right } }
    })
}

fn with_input(kind: &str, id: &str, child: Value) -> Value {
    json!({ "type": kind, "id": id, "inputs": { "_ARG0": { "block": child } } })
}

fn compile_ok(top: Vec<Value>) -> String {
    compile(BLOCKS, &workspace(top))
        .unwrap_or_else(|e| panic!("compile failed: {:?}", e.errors))
        .code
}

/// [`BLOCKS`] plus extra records.
fn library_with(extra: Vec<Value>) -> String {
    let mut records: Vec<Value> = serde_json::from_str(BLOCKS).unwrap();
    records.extend(extra);
    Value::Array(records).to_string()
}

fn compile_with(extra: Vec<Value>, top: Vec<Value>) -> String {
    compile(&library_with(extra), &workspace(top))
        .unwrap_or_else(|e| panic!("compile failed: {:?}", e.errors))
        .code
}

/// A statement block that stores one bounded number in `answer`.
fn bounded_setter(kind: &str, bound: &str, expr: &str) -> Value {
    let mut arg = json!({ "type": "input_value", "check": "Number" });
    arg[bound] = json!(expr);
    json!({
        "type": kind,
        "message0": "answer %1",
        "args0": [arg],
        "previousStatement": null,
        "nextStatement": null,
        "colour": 20,
        "tooltip": "",
        "js": "answer = %1;"
    })
}

/// Run `code` against `state` to the end, returning the highlight trace.
fn run(code: &str, state: Value) -> (Vec<String>, Interpreter) {
    let mut interp = Interpreter::new(code, &state, RunConfig::default())
        .unwrap_or_else(|e| panic!("generated code does not parse: {e}\n{code}"));
    let mut trace = Vec::new();
    while interp.step() {
        trace.extend(interp.highlighted_block().map(String::from));
    }
    (trace, interp)
}

fn message(interp: &Interpreter) -> &str {
    interp.message().unwrap_or_default()
}

// ══════════════════════════════════════════════════════════════════════════════
// 1. Generated code parses and runs
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn library_validates_cleanly() {
    let outcome = validate_blocks(BLOCKS);
    assert!(outcome.is_clean(), "{:?}", outcome.errors);
    assert_eq!(outcome.definitions.len(), 9);
}

#[test]
fn every_chain_is_highlighted_in_order() {
    let code = compile_ok(vec![json!({
        "type": "set_answer", "id": "first",
        "inputs": { "_ARG0": { "block": num("n1", 1.0) } },
        "next": { "block": {
            "type": "set_answer", "id": "second",
            "inputs": { "_ARG0": { "block": num("n2", 2.0) } }
        }}
    })]);
    let (trace, interp) = run(&code, json!({}));
    assert_eq!(trace, vec!["first", "second"]);
    assert_eq!(interp.status(), Status::Finished);
    assert!(!interp.correct());
    assert_eq!(
        message(&interp),
        "ran out of instructions before completing the level"
    );
    assert_eq!(interp.globals()["answer"], json!(2));
}

#[test]
fn empty_workspace_fails_with_out_of_instructions() {
    let code = compile_ok(vec![]);
    let (trace, interp) = run(&code, json!({}));
    assert!(trace.is_empty());
    assert!(!interp.correct());
    assert!(message(&interp).starts_with("ran out of instructions"));
}

// ══════════════════════════════════════════════════════════════════════════════
// 2. Precedence
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn addition_inside_multiplication_is_grouped() {
    let product = binary(
        "mul",
        "m",
        binary("add", "a", num("x", 1.0), num("y", 2.0)),
        num("z", 3.0),
    );
    let code = compile_ok(vec![with_input("set_answer", "s", product)]);
    assert!(code.contains("answer = (1 + 2) * 3;"), "{code}");
    let (_, interp) = run(&code, json!({}));
    assert_eq!(interp.globals()["answer"], json!(9));
}

#[test]
fn multiplication_inside_addition_has_no_parens() {
    let sum = binary(
        "add",
        "a",
        binary("mul", "m", num("x", 2.0), num("y", 3.0)),
        num("z", 4.0),
    );
    let code = compile_ok(vec![with_input("set_answer", "s", sum)]);
    assert!(code.contains("answer = 2 * 3 + 4;"), "{code}");
    let (_, interp) = run(&code, json!({}));
    assert_eq!(interp.globals()["answer"], json!(10));
}

#[test]
fn right_nested_addition_keeps_its_grouping() {
    // `+` is not associative once strings are involved
    let sum = binary(
        "add",
        "outer",
        num("x", 1.0),
        binary("add", "inner", num("y", 2.0), num("z", 3.0)),
    );
    let code = compile_ok(vec![with_input("set_answer", "s", sum)]);
    assert!(code.contains("1 + (2 + 3)"), "{code}");
}

// ══════════════════════════════════════════════════════════════════════════════
// 3. Guards
// ══════════════════════════════════════════════════════════════════════════════

fn steps_with(value: f64) -> Interpreter {
    let code = compile_ok(vec![with_input("steps", "s", num("n", value))]);
    run(&code, json!({})).1
}

#[test]
fn value_below_min_aborts() {
    let interp = steps_with(0.0);
    assert!(!interp.correct());
    assert_eq!(
        message(&interp),
        "the parameter must be greater than or equal to 1"
    );
}

#[test]
fn value_above_max_aborts() {
    let interp = steps_with(7.0);
    assert!(!interp.correct());
    assert_eq!(message(&interp), "the parameter must be less than or equal to 5");
}

#[test]
fn non_integer_aborts() {
    let interp = steps_with(2.5);
    assert!(!interp.correct());
    assert_eq!(message(&interp), "the parameter must be an integer");
}

#[test]
fn valid_value_passes_through_unchanged() {
    let interp = steps_with(3.0);
    assert_eq!(interp.globals()["answer"], json!(3));
    assert!(message(&interp).starts_with("ran out of instructions"));
}

#[test]
fn guarded_value_is_evaluated_once() {
    let code = compile_ok(vec![with_input(
        "steps",
        "s",
        json!({ "type": "record_call", "id": "c" }),
    )]);
    let (_, interp) = run(&code, json!({ "calls": [] }));
    assert_eq!(interp.globals()["answer"], json!(1));
    assert_eq!(interp.globals()["state"]["calls"], json!([1]));
}

#[test]
fn missing_argument_compiles_and_fails_at_run_time() {
    let code = compile_ok(vec![json!({ "type": "set_answer", "id": "s" })]);
    let (trace, interp) = run(&code, json!({}));
    assert_eq!(trace, vec!["s"]);
    assert!(!interp.correct());
    assert_eq!(message(&interp), "missing parameter: the block needs a value");
}

#[test]
fn compound_max_bound_is_grouped() {
    let code = compile_with(
        vec![bounded_setter("capped", "max", "state.limit - 1")],
        vec![with_input("capped", "c", num("n", 10.0))],
    );
    let (_, interp) = run(&code, json!({ "limit": 5 }));
    assert!(!interp.correct());
    assert_eq!(message(&interp), "the parameter must be less than or equal to 4");

    let (_, interp) = run(&code, json!({ "limit": 20 }));
    assert_eq!(interp.globals()["answer"], json!(10));
}

#[test]
fn conditional_min_bound_is_grouped() {
    let code = compile_with(
        vec![bounded_setter("at_least", "min", "state.hard ? 3 : 1")],
        vec![with_input("at_least", "a", num("n", 2.0))],
    );
    let (_, interp) = run(&code, json!({ "hard": true }));
    assert!(!interp.correct());
    assert_eq!(
        message(&interp),
        "the parameter must be greater than or equal to 3"
    );

    let (_, interp) = run(&code, json!({ "hard": false }));
    assert_eq!(interp.globals()["answer"], json!(2));
    assert!(message(&interp).starts_with("ran out of instructions"));
}

#[test]
fn deeply_nested_guarded_blocks_still_parse() {
    let inc = json!({
        "type": "inc",
        "message0": "%1 + 1",
        "args0": [{ "type": "input_value", "check": "Integer", "min": "0", "max": "100" }],
        "output": "Number",
        "colour": 230,
        "tooltip": "",
        "js": "%1 + 1"
    });
    for depth in [4, 12, 20] {
        let mut value = num("zero", 0.0);
        for level in 0..depth {
            value = with_input("inc", &format!("inc{level}"), value);
        }
        let code = compile_with(vec![inc.clone()], vec![with_input("set_answer", "s", value)]);
        let (trace, interp) = run(&code, json!({}));
        assert_eq!(trace, vec!["s"]);
        assert_eq!(interp.globals()["answer"], json!(depth), "depth {depth}");
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// 4. Loop traps
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unconditional_loop_is_trapped() {
    let body = with_input("set_answer", "body", num("n", 1.0));
    let code = compile_ok(vec![json!({
        "type": "forever", "id": "loop",
        "inputs": { "_ARG0": { "block": body } }
    })]);
    for budget in [1, 10, 1000] {
        let config = RunConfig {
            loop_budget: budget,
            ..RunConfig::default()
        };
        let mut interp = Interpreter::new(&code, &json!({}), config).unwrap();
        // run_for passes the highlight inside the body without stopping
        while interp.run_for(10_000) {}
        assert!(!interp.correct());
        assert_eq!(message(&interp), "infinite loop", "budget {budget}");
    }
}

#[test]
fn empty_loop_is_trapped() {
    let code = compile_ok(vec![json!({ "type": "forever", "id": "loop" })]);
    let (trace, interp) = run(&code, json!({}));
    assert_eq!(trace, vec!["loop"]);
    assert_eq!(message(&interp), "infinite loop");
}

// ══════════════════════════════════════════════════════════════════════════════
// 5. Nested statement inputs
// ══════════════════════════════════════════════════════════════════════════════

fn repeat_twice(js: &str) -> Value {
    json!({
        "type": "twice",
        "message0": "twice %1",
        "args0": [{ "type": "input_statement" }],
        "previousStatement": null,
        "nextStatement": null,
        "colour": 120,
        "tooltip": "",
        "js": js
    })
}

fn twice_workspace() -> Vec<Value> {
    let second = json!({
        "type": "set_answer", "id": "b",
        "inputs": { "_ARG0": { "block": num("n2", 2.0) } }
    });
    let first = json!({
        "type": "set_answer", "id": "a",
        "inputs": { "_ARG0": { "block": num("n1", 1.0) } },
        "next": { "block": second }
    });
    vec![json!({ "type": "twice", "id": "t", "inputs": { "_ARG0": { "block": first } } })]
}

#[test]
fn nested_statements_are_stepped_on_every_pass() {
    let code = compile_with(
        vec![repeat_twice("for (var i = 0; i < 2; i++) {\n  %1;\n}")],
        twice_workspace(),
    );
    let (trace, interp) = run(&code, json!({}));
    assert_eq!(trace, vec!["t", "a", "b", "a", "b"]);
    assert!(message(&interp).starts_with("ran out of instructions"));
}

#[test]
fn statement_input_inside_a_snippet_function_is_rejected() {
    let twice = repeat_twice("function body() {\n  %1;\n}\nbody();\nbody();");
    let outcome = validate_blocks(&Value::Array(vec![twice.clone()]).to_string());
    assert!(outcome.definitions.is_empty());
    assert_eq!(outcome.errors.errors[0].code, ErrorCode::INVALID_PLACEHOLDER);

    let result = compile_to_result(&library_with(vec![twice]), &workspace(twice_workspace()));
    assert!(!result.success);
}

// ══════════════════════════════════════════════════════════════════════════════
// 6. Grading
// ══════════════════════════════════════════════════════════════════════════════

fn doubling_program() -> String {
    let doubled = binary(
        "mul",
        "m",
        json!({ "type": "input", "id": "in" }),
        num("two", 2.0),
    );
    compile_ok(vec![with_input("submit", "check", doubled)])
}

#[test]
fn batch_cases_are_graded_independently() {
    let code = doubling_program();
    let states = [
        json!({ "input": 1, "expected": 2 }),
        json!({ "input": 2, "expected": 5 }),
        json!({ "input": 3, "expected": 6 }),
    ];
    for yield_interval in [1, 7, 256] {
        let config = RunConfig {
            yield_interval,
            ..RunConfig::default()
        };
        let results = grade_all(&code, &states, config).unwrap();
        let summary: Vec<_> = results.iter().map(|r| (r.index, r.correct)).collect();
        assert_eq!(summary, vec![(0, true), (1, false), (2, true)]);
        assert_eq!(results[1].message.as_deref(), Some("got 4"));
    }
}

#[test]
fn a_case_missing_its_input_fails_alone() {
    let code = doubling_program();
    let states = [
        json!({ "input": 1, "expected": 2 }),
        json!({ "expected": 2 }),
        json!({ "input": 4, "expected": 8 }),
    ];
    let results = grade_all(&code, &states, RunConfig::default()).unwrap();
    assert!(results[0].correct);
    // undefined * 2 is NaN, which never equals the expectation
    assert!(!results[1].correct);
    assert!(results[2].correct);
}

#[test]
fn pipeline_determinism_100_iterations() {
    let code = doubling_program();
    let state = json!({ "input": 21, "expected": 42 });
    let (trace, first) = run(&code, state.clone());
    assert!(first.correct());
    for _ in 0..100 {
        let again = compile_ok(vec![with_input(
            "submit",
            "check",
            binary("mul", "m", json!({ "type": "input", "id": "in" }), num("two", 2.0)),
        )]);
        assert_eq!(again, code);
        let (t, interp) = run(&again, state.clone());
        assert_eq!(t, trace);
        assert_eq!(interp.outcome(), first.outcome());
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// 7. Compile results
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn compile_result_serialises_for_hosts() {
    let result = compile_to_result(BLOCKS, &workspace(vec![num("orphan", 1.0)]));
    assert!(result.success);
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["success"], json!(true));
    assert!(value["program"]["code"]
        .as_str()
        .unwrap()
        .contains("ran out of instructions"));
    assert_eq!(value["program"]["hash"].as_str().unwrap().len(), 64);

    let back: CompileResult = serde_json::from_value(value).unwrap();
    assert_eq!(back.program.unwrap().hash, result.program.unwrap().hash);
}

#[test]
fn unknown_block_type_fails_compilation() {
    let result = compile_to_result(BLOCKS, &workspace(vec![json!({ "type": "jump", "id": "j" })]));
    assert!(!result.success);
    assert!(result.program.is_none());
    assert_eq!(
        result.errors.first().map(|e| e.code),
        Some(ErrorCode::MISSING_BLOCK_DEFINITION)
    );
}

#[test]
fn rejected_definition_becomes_a_warning() {
    let mut records: Vec<Value> = serde_json::from_str(BLOCKS).unwrap();
    records.push(json!({
        "type": "broken",
        "message0": "broken",
        "output": "Number",
        "colour": 0,
        "tooltip": "",
        "js": "(1 + 2)"
    }));
    let blocks = Value::Array(records).to_string();

    let result = compile_to_result(&blocks, &workspace(vec![]));
    assert!(result.success);
    assert_eq!(result.errors.warnings.len(), 1);
    assert_eq!(result.errors.warnings[0].code, ErrorCode::REDUNDANT_PARENS);

    // placing the rejected block is what fails
    let placed = compile_to_result(&blocks, &workspace(vec![json!({ "type": "broken", "id": "b" })]));
    assert!(!placed.success);
    assert!(placed.errors.has_errors());
}

#[test]
fn unreadable_definition_file_is_fatal() {
    let err = compile("[{", &workspace(vec![])).unwrap_err();
    assert!(err.has_errors());
    assert_eq!(err.first().unwrap().source, "definitions");
}

#[test]
fn dropdown_cannot_reach_reserved_names() {
    let set_var = json!({
        "type": "set_var",
        "message0": "set %1 high",
        "args0": [{
            "type": "field_dropdown",
            "options": [["budget", "budget"], ["trap", "loopTrap"]]
        }],
        "previousStatement": null,
        "nextStatement": null,
        "colour": 20,
        "tooltip": "",
        "js": "%1 = 1000000000;"
    });
    let body = json!({ "type": "set_var", "id": "v", "fields": { "_ARG0": "loopTrap" } });
    let result = compile_to_result(&library_with(vec![set_var]), &workspace(vec![body]));
    assert!(!result.success);
    assert_eq!(
        result.errors.first().map(|e| e.code),
        Some(ErrorCode::RESERVED_IDENTIFIER)
    );
}
