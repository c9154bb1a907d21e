//! Runtime error types for the interpreter.

use tessera_types::CompileErrors;
use thiserror::Error;

/// A runtime fault: evaluation stopped without the program setting a verdict.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Reading a name that was never declared.
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),
    /// Property access on `undefined`/`null`, calling a non-function, ...
    #[error("TypeError: {0}")]
    Type(String),
    /// Call stack too deep.
    #[error("RangeError: {0}")]
    Range(String),
    /// Micro-step budget exhausted.
    #[error("gas exhausted after {limit} steps")]
    GasExhausted { limit: u64 },
}

/// The program text handed to the interpreter does not parse.
#[derive(Debug, Clone, Error)]
#[error("program does not parse:\n{errors}")]
pub struct SyntaxError {
    pub errors: CompileErrors,
}

impl SyntaxError {
    /// Line and column of the first error, for host reporting.
    pub fn position(&self) -> Option<(u32, u32)> {
        self.errors
            .first()
            .map(|e| e.span.start())
    }
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_use_script_error_names() {
        assert_eq!(
            EvalError::Reference("foo".into()).to_string(),
            "ReferenceError: foo is not defined"
        );
        assert_eq!(
            EvalError::GasExhausted { limit: 10 }.to_string(),
            "gas exhausted after 10 steps"
        );
    }
}
