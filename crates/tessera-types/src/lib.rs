//! Shared types for Tessera.
//!
//! This crate defines the block-script AST, the precedence table, the
//! validated block model, source spans and error types used across all
//! stages.

mod error;
mod span;
pub mod ast;
pub mod block;
pub mod intrinsics;
pub mod literal;
pub mod order;

pub use error::{CompileErrors, ErrorCategory, ErrorCode, Severity, TesseraError, MAX_ERRORS};
pub use order::{needs_parens, Order, Side};
pub use span::{SourceFile, Span};

/// Result type used throughout Tessera.
pub type Result<T> = std::result::Result<T, TesseraError>;
