//! Error code coverage tests, ensuring every defined error code (E100–E308)
//! has at least one test that asserts it is emitted.
//!
//! Codes already covered by other test files are referenced in comments.
//! This file adds tests for the rest, going through the public entry points
//! a host would use.

use serde_json::{json, Value};
use tessera_compiler::{compile_to_result, validate_block};
use tessera_types::{CompileErrors, ErrorCode};

fn statement(js: &str) -> Value {
    json!({
        "type": "probe",
        "message0": "probe",
        "previousStatement": null,
        "nextStatement": null,
        "colour": 10,
        "tooltip": "",
        "js": js
    })
}

fn expression(js: &str) -> Value {
    json!({
        "type": "probe",
        "message0": "probe",
        "output": "Number",
        "colour": 10,
        "tooltip": "",
        "js": js
    })
}

fn errors_of(record: &Value) -> CompileErrors {
    match validate_block(0, record) {
        Ok(def) => panic!("expected {record} to be rejected, got {def:?}"),
        Err(errors) => errors,
    }
}

fn assert_code(record: Value, expected: ErrorCode) {
    let errors = errors_of(&record);
    assert!(
        errors.errors.iter().any(|e| e.code == expected),
        "expected {expected}, got: {:?}",
        errors
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
    );
}

fn compile_codes(blocks: Value, top: Vec<Value>) -> Vec<ErrorCode> {
    let workspace = json!({ "blocks": { "blocks": top } }).to_string();
    let result = compile_to_result(&blocks.to_string(), &workspace);
    assert!(!result.success);
    result.errors.errors.iter().map(|e| e.code).collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// E100–E109: syntax errors inside snippets
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn e100_unexpected_token() {
    assert_code(statement("go(;"), ErrorCode::UNEXPECTED_TOKEN);
}

#[test]
fn e101_unterminated_string() {
    assert_code(statement("say('hello);"), ErrorCode::UNTERMINATED_STRING);
}

#[test]
fn e102_invalid_number() {
    assert_code(expression("12abc"), ErrorCode::INVALID_NUMBER);
}

#[test]
fn e103_unexpected_character() {
    assert_code(statement("go(#);"), ErrorCode::UNEXPECTED_CHARACTER);
}

#[test]
fn e104_unterminated_comment() {
    assert_code(statement("go(); /* never closed"), ErrorCode::UNTERMINATED_COMMENT);
}

#[test]
fn e105_unsupported_statement() {
    assert_code(statement("switch (x) { }"), ErrorCode::UNSUPPORTED_STATEMENT);
}

#[test]
fn e106_illegal_break() {
    assert_code(statement("break;"), ErrorCode::ILLEGAL_BREAK);
}

#[test]
fn e107_illegal_return() {
    assert_code(statement("return 1;"), ErrorCode::ILLEGAL_RETURN);
}

#[test]
fn e108_invalid_assignment_target() {
    assert_code(statement("1 = 2;"), ErrorCode::INVALID_ASSIGNMENT_TARGET);
}

#[test]
fn e109_nesting_too_deep() {
    let deep = format!("x = {}1{};", "(".repeat(300), ")".repeat(300));
    assert_code(statement(&deep), ErrorCode::NESTING_TOO_DEEP);
}

// ══════════════════════════════════════════════════════════════════════════════
// E200–E208: block definition schema
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn e200_missing_field() {
    let mut record = statement("go();");
    record.as_object_mut().unwrap().remove("tooltip");
    assert_code(record, ErrorCode::MISSING_FIELD);
}

#[test]
fn e201_unknown_field() {
    let mut record = statement("go();");
    record["category"] = json!("motion");
    assert_code(record, ErrorCode::UNKNOWN_FIELD);
}

#[test]
fn e202_invalid_field() {
    let mut record = statement("go();");
    record["inputsInline"] = json!("yes");
    assert_code(record, ErrorCode::INVALID_FIELD);
}

#[test]
fn e203_invalid_snippet() {
    assert_code(statement("   "), ErrorCode::INVALID_SNIPPET);
}

#[test]
fn e204_not_single_expression() {
    assert_code(expression("a; b"), ErrorCode::NOT_SINGLE_EXPRESSION);
}

#[test]
fn e205_redundant_parens() {
    assert_code(expression("(a + b)"), ErrorCode::REDUNDANT_PARENS);
}

#[test]
fn e206_template_mismatch() {
    let mut record = statement("go();");
    record["message0"] = json!("probe %1");
    assert_code(record, ErrorCode::TEMPLATE_MISMATCH);
}

#[test]
fn e207_unsupported_expression() {
    assert_code(expression("new Date()"), ErrorCode::UNSUPPORTED_EXPRESSION);
}

#[test]
fn e208_invalid_placeholder() {
    assert_code(statement("go(%0);"), ErrorCode::INVALID_PLACEHOLDER);

    // a value input cannot be assigned to
    let mut record = statement("%1 = 3;");
    record["message0"] = json!("probe %1");
    record["args0"] = json!([{ "type": "input_value", "check": "Number" }]);
    assert_code(record, ErrorCode::INVALID_PLACEHOLDER);
}

// ══════════════════════════════════════════════════════════════════════════════
// E300–E308: compilation
// ══════════════════════════════════════════════════════════════════════════════

// E302 TYPE_MISMATCH, E303 INVALID_CONNECTION, E304 MAX_INSTANCES_EXCEEDED,
// E305 INVALID_FIELD_VALUE and E307 DUPLICATE_BLOCK_ID are covered by
// tessera-codegen's codegen_tests.rs.

#[test]
fn e300_missing_block_definition() {
    let codes = compile_codes(json!([]), vec![json!({ "type": "probe", "id": "p" })]);
    assert_eq!(codes, vec![ErrorCode::MISSING_BLOCK_DEFINITION]);
}

#[test]
fn e301_reserved_identifier() {
    let codes = compile_codes(json!([statement("var tmp = 1;")]), vec![]);
    assert_eq!(codes, vec![ErrorCode::RESERVED_IDENTIFIER]);
}

#[test]
fn e306_duplicate_registration() {
    let codes = compile_codes(json!([statement("go();"), statement("stop();")]), vec![]);
    assert_eq!(codes, vec![ErrorCode::DUPLICATE_REGISTRATION]);
}

#[test]
fn e308_malformed_workspace() {
    let result = compile_to_result("[]", "{\"blocks\": 3}");
    assert!(!result.success);
    assert_eq!(
        result.errors.first().map(|e| e.code),
        Some(ErrorCode::MALFORMED_WORKSPACE)
    );
}

#[test]
fn categories_follow_code_ranges() {
    use tessera_types::ErrorCategory;
    assert_eq!(ErrorCode::NESTING_TOO_DEEP.category(), ErrorCategory::Syntax);
    assert_eq!(ErrorCode::INVALID_PLACEHOLDER.category(), ErrorCategory::Schema);
    assert_eq!(ErrorCode::MALFORMED_WORKSPACE.category(), ErrorCategory::Compile);
}
