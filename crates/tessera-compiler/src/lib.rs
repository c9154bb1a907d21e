//! Tessera compiler: validates block definitions and orchestrates the full
//! compilation pipeline.
//!
//! ```text
//! definitions JSON → Validator → BlockRegistry ┐
//!                                              ├→ Code Generator → GeneratedProgram
//! workspace JSON   → BlockTree ────────────────┘
//! ```
//!
//! Definition records are validated one by one. A rejected record does not
//! stop compilation: its diagnostics are kept as warnings, and the program
//! fails only if the workspace actually places a block of that type.

pub mod snippet;
pub mod validator;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tessera_codegen::{BlockRegistry, GeneratedProgram, RegistryBuilder};
use tessera_types::block::BlockDefinition;
use tessera_types::{CompileErrors, TesseraError};

pub use validator::{
    to_blockly_json, validate_block, validate_blocks, validate_records, ValidationOutcome,
    DEFINITIONS_SOURCE,
};

/// Result of a full compilation, serialisable for hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    /// Whether a program was produced.
    pub success: bool,
    /// The generated program (if successful).
    pub program: Option<GeneratedProgram>,
    /// Errors and warnings.
    pub errors: CompileErrors,
}

/// Register validated definitions, reporting every conflict.
pub fn build_registry(
    definitions: impl IntoIterator<Item = BlockDefinition>,
) -> Result<BlockRegistry, CompileErrors> {
    let mut builder = RegistryBuilder::new();
    let mut errors = CompileErrors::empty();
    for def in definitions {
        if let Err(e) = builder.register(def) {
            errors.push_error(e.into());
        }
    }
    if errors.has_errors() {
        return Err(errors);
    }
    Ok(builder.build())
}

/// Compile a definition file and a workspace into a program.
///
/// Returns the program, or the errors that prevented it. Warnings about
/// unused rejected definitions are dropped; use [`compile_to_result`] to
/// keep them.
pub fn compile(blocks_json: &str, workspace_json: &str) -> Result<GeneratedProgram, CompileErrors> {
    let (program, errors) = run(blocks_json, workspace_json);
    program.ok_or(errors)
}

/// Compile and return a structured result for hosts.
pub fn compile_to_result(blocks_json: &str, workspace_json: &str) -> CompileResult {
    let (program, errors) = run(blocks_json, workspace_json);
    CompileResult {
        success: program.is_some(),
        program,
        errors,
    }
}

fn run(blocks_json: &str, workspace_json: &str) -> (Option<GeneratedProgram>, CompileErrors) {
    let outcome = validate_blocks(blocks_json);
    let mut diagnostics = CompileErrors::empty();

    // an unreadable file leaves nothing to compile against
    let file_level = outcome
        .errors
        .errors
        .iter()
        .any(|e| e.source == DEFINITIONS_SOURCE);
    if file_level {
        return (None, outcome.errors);
    }
    for err in outcome.errors.errors {
        diagnostics.push_warning(err.into_warning());
    }

    debug!(
        definitions = outcome.definitions.len(),
        rejected = outcome.errors.total_errors,
        "validated block definitions"
    );

    let registry = match build_registry(outcome.definitions) {
        Ok(registry) => registry,
        Err(errs) => {
            diagnostics.extend(errs);
            return (None, diagnostics);
        }
    };

    match tessera_codegen::generate_from_json(&registry, workspace_json) {
        Ok(program) => {
            info!(
                hash = %program.hash,
                lines = program.line_count(),
                "compiled workspace"
            );
            (Some(program), diagnostics)
        }
        Err(e) => {
            let err: TesseraError = e.into();
            diagnostics.push_error(err);
            (None, diagnostics)
        }
    }
}
