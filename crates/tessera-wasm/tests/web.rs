//! WASM smoke tests, run with `wasm-pack test --node`.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use tessera_wasm::{compile, validate_blocks, version, Grader, Session};

const BLOCKS: &str = r#"[{
  "type": "finish",
  "message0": "finish",
  "previousStatement": null,
  "colour": 20,
  "tooltip": "",
  "js": "exit(state.ok, 'done');"
}]"#;

const WORKSPACE: &str = r#"{"blocks": {"blocks": [{"type": "finish", "id": "f"}]}}"#;

fn program() -> String {
    let result: serde_json::Value = serde_json::from_str(&compile(BLOCKS, WORKSPACE)).unwrap();
    assert_eq!(result["success"], true);
    result["program"]["code"].as_str().unwrap().to_string()
}

#[wasm_bindgen_test]
fn version_is_the_crate_version() {
    assert_eq!(version(), env!("CARGO_PKG_VERSION"));
}

#[wasm_bindgen_test]
fn validation_names_arguments() {
    let out: serde_json::Value = serde_json::from_str(&validate_blocks(BLOCKS)).unwrap();
    assert_eq!(out["definitions"][0]["type"], "finish");
    assert_eq!(out["errors"]["total_errors"], 0);
}

#[wasm_bindgen_test]
fn session_steps_to_a_verdict() {
    let mut session = Session::new(&program(), r#"{"ok": true}"#, JsValue::UNDEFINED).unwrap();
    session.reset();
    let events: serde_json::Value = serde_json::from_str(&session.step()).unwrap();
    assert_eq!(events[0]["highlighted_block"], "f");
    let events: serde_json::Value = serde_json::from_str(&session.step()).unwrap();
    assert_eq!(events[1]["kind"], "verdict_reached");
    assert_eq!(events[1]["correct"], true);
    assert!(!session.running());
}

#[wasm_bindgen_test]
fn grader_reports_each_case() {
    let mut grader = Grader::new(&program(), r#"[{"ok": true}, {"ok": false}]"#, JsValue::NULL).unwrap();
    while !grader.advance() {}
    let results: serde_json::Value = serde_json::from_str(&grader.results()).unwrap();
    assert_eq!(results[0]["correct"], true);
    assert_eq!(results[1]["correct"], false);
    assert_eq!(grader.error(), "null");
}
