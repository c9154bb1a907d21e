//! Tessera compiler and interpreter as a WASM module for browser hosts.
//!
//! This crate exposes block validation, compilation, stepping sessions and
//! batch grading via `wasm-bindgen`, suitable for running in a browser Web
//! Worker. Every export returns JSON text.
//!
//! # Usage (JavaScript)
//!
//! ```js
//! import init, { compile, Session } from 'tessera-wasm';
//!
//! await init();
//!
//! const result = JSON.parse(compile(blocksJson, workspaceJson));
//! // { success: true, program: { code: "...", hash: "...", ... }, errors: { ... } }
//!
//! const session = new Session(result.program.code, '{"goal": 3}');
//! session.reset();            // [{ kind: "program_ready" }, { kind: "state_changed", ... }]
//! session.step();             // [{ kind: "state_changed", highlighted_block: "a1", ... }]
//! ```

mod session;

pub use session::{HostEvent, HostGrader, HostSession};

use serde::Serialize;
use wasm_bindgen::prelude::*;

use tessera_eval::RunConfig;

/// Serialise `value`, falling back to a JSON error object.
fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        serde_json::json!({ "error": format!("serialization error: {e}") }).to_string()
    })
}

/// `undefined` or `null` selects the defaults; otherwise any subset of the
/// `RunConfig` fields.
fn run_config(config: JsValue) -> Result<RunConfig, JsError> {
    let config: Option<RunConfig> = serde_wasm_bindgen::from_value(config)?;
    Ok(config.unwrap_or_default())
}

/// Validate a block definition file.
///
/// Returns a JSON object:
/// ```json
/// { "definitions": [ { "type": "move", "args0": [...], ... } ], "errors": { ... } }
/// ```
/// `definitions` holds the accepted records re-serialised for the editor,
/// with every argument named.
#[wasm_bindgen]
pub fn validate_blocks(json: &str) -> String {
    let outcome = tessera_compiler::validate_blocks(json);
    let definitions: Vec<serde_json::Value> = outcome
        .definitions
        .iter()
        .map(tessera_compiler::to_blockly_json)
        .collect();
    to_json(&serde_json::json!({
        "definitions": definitions,
        "errors": outcome.errors,
    }))
}

/// Compile block definitions and a workspace into a program.
///
/// Returns a JSON string containing a `CompileResult`:
/// ```json
/// {
///   "success": true,
///   "program": { "code": "...", "hash": "...", "source_map": { ... } },
///   "errors": { "errors": [], "warnings": [], "total_errors": 0, "total_warnings": 0 }
/// }
/// ```
#[wasm_bindgen]
pub fn compile(blocks: &str, workspace: &str) -> String {
    to_json(&tessera_compiler::compile_to_result(blocks, workspace))
}

/// Return the compiler version string.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// One steppable run of a program against one initial state.
#[wasm_bindgen]
pub struct Session {
    inner: HostSession,
}

#[wasm_bindgen]
impl Session {
    #[wasm_bindgen(constructor)]
    pub fn new(code: &str, initial_state: &str, config: JsValue) -> Result<Session, JsError> {
        Ok(Session {
            inner: HostSession::new(code, initial_state, run_config(config)?),
        })
    }

    /// Start (or restart) the run. Returns the host events as JSON.
    pub fn reset(&mut self) -> String {
        to_json(&self.inner.reset())
    }

    /// Run to the next highlighted block. Returns the host events as JSON.
    pub fn step(&mut self) -> String {
        to_json(&self.inner.step())
    }

    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.inner.is_running()
    }
}

/// Grades a program against a JSON array of initial states.
#[wasm_bindgen]
pub struct Grader {
    inner: HostGrader,
}

#[wasm_bindgen]
impl Grader {
    #[wasm_bindgen(constructor)]
    pub fn new(code: &str, initial_states: &str, config: JsValue) -> Result<Grader, JsError> {
        Ok(Grader {
            inner: HostGrader::new(code, initial_states, run_config(config)?),
        })
    }

    /// Run one slice of every unfinished test case; `true` when done.
    pub fn advance(&mut self) -> bool {
        self.inner.advance()
    }

    /// Results so far as a JSON array of `{ index, correct, message }`.
    pub fn results(&self) -> String {
        to_json(&self.inner.results())
    }

    /// The `fatal_error` event if grading could not start, else `null`.
    pub fn error(&self) -> String {
        to_json(&self.inner.error())
    }
}
