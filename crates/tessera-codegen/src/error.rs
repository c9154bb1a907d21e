//! Codegen error types.

use tessera_types::block::ValueType;
use tessera_types::{ErrorCode, TesseraError};
use thiserror::Error;

/// Errors that stop a block tree from becoming a program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    /// A block references a type that was never registered.
    #[error("block '{block_id}' has type '{type_name}', which is not registered")]
    MissingBlockDefinition { block_id: String, type_name: String },

    /// A spliced fragment cannot occupy the slot it is placed in.
    #[error("block '{block_id}': {message}")]
    UnsupportedExpression { block_id: String, message: String },

    /// A definition binds or assigns one of the intrinsic names.
    #[error("block type '{type_name}' redefines the reserved identifier '{identifier}'")]
    ReservedIdentifierCollision { type_name: String, identifier: String },

    /// A type was registered twice with different definitions.
    #[error("block type '{type_name}' is already registered with a different definition")]
    DuplicateRegistration { type_name: String },

    #[error("block id '{block_id}' is used more than once")]
    DuplicateBlockId { block_id: String },

    /// Two blocks are connected in a way their definitions do not allow.
    #[error("block '{block_id}': {message}")]
    InvalidConnection { block_id: String, message: String },

    #[error("block '{block_id}': input {input} expects {expected} but got {found}")]
    TypeMismatch {
        block_id: String,
        input: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("block '{block_id}': field {field}: {message}")]
    InvalidFieldValue {
        block_id: String,
        field: String,
        message: String,
    },

    #[error("block type '{type_name}' allows at most {max} instances, found {count}")]
    MaxInstancesExceeded {
        type_name: String,
        max: u32,
        count: usize,
    },

    /// The workspace document could not be read.
    #[error("malformed workspace: {0}")]
    MalformedWorkspace(String),
}

impl CodegenError {
    /// Diagnostic code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CodegenError::MissingBlockDefinition { .. } => ErrorCode::MISSING_BLOCK_DEFINITION,
            CodegenError::UnsupportedExpression { .. } => ErrorCode::UNSUPPORTED_EXPRESSION,
            CodegenError::ReservedIdentifierCollision { .. } => ErrorCode::RESERVED_IDENTIFIER,
            CodegenError::DuplicateRegistration { .. } => ErrorCode::DUPLICATE_REGISTRATION,
            CodegenError::DuplicateBlockId { .. } => ErrorCode::DUPLICATE_BLOCK_ID,
            CodegenError::InvalidConnection { .. } => ErrorCode::INVALID_CONNECTION,
            CodegenError::TypeMismatch { .. } => ErrorCode::TYPE_MISMATCH,
            CodegenError::InvalidFieldValue { .. } => ErrorCode::INVALID_FIELD_VALUE,
            CodegenError::MaxInstancesExceeded { .. } => ErrorCode::MAX_INSTANCES_EXCEEDED,
            CodegenError::MalformedWorkspace(_) => ErrorCode::MALFORMED_WORKSPACE,
        }
    }

    /// The block id or block type this error is about, used as the diagnostic path.
    pub fn subject(&self) -> Option<&str> {
        match self {
            CodegenError::MissingBlockDefinition { block_id, .. }
            | CodegenError::UnsupportedExpression { block_id, .. }
            | CodegenError::DuplicateBlockId { block_id }
            | CodegenError::InvalidConnection { block_id, .. }
            | CodegenError::TypeMismatch { block_id, .. }
            | CodegenError::InvalidFieldValue { block_id, .. } => Some(block_id),
            CodegenError::ReservedIdentifierCollision { type_name, .. }
            | CodegenError::DuplicateRegistration { type_name }
            | CodegenError::MaxInstancesExceeded { type_name, .. } => Some(type_name),
            CodegenError::MalformedWorkspace(_) => None,
        }
    }

    /// Convert into a host-facing diagnostic.
    pub fn to_diagnostic(&self) -> TesseraError {
        let path = self.subject().unwrap_or("workspace");
        TesseraError::at_path(self.code(), path, self.to_string())
    }
}

impl From<CodegenError> for TesseraError {
    fn from(err: CodegenError) -> Self {
        err.to_diagnostic()
    }
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::ErrorCategory;

    #[test]
    fn codes_are_in_compile_range() {
        let err = CodegenError::DuplicateBlockId {
            block_id: "b1".into(),
        };
        assert_eq!(err.code(), ErrorCode::DUPLICATE_BLOCK_ID);
        assert_eq!(err.code().category(), ErrorCategory::Compile);
    }

    #[test]
    fn diagnostic_carries_subject_as_path() {
        let err = CodegenError::TypeMismatch {
            block_id: "b7".into(),
            input: "_ARG0".into(),
            expected: ValueType::Number,
            found: ValueType::String,
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.path.as_deref(), Some("b7"));
        assert_eq!(diag.code, ErrorCode::TYPE_MISMATCH);
        assert!(diag.message.contains("expects Number but got String"));
    }
}
