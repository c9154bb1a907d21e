//! Tessera code generator: block tree → instrumented block-script program.
//!
//! # Architecture
//!
//! Code generation takes a [`BlockTree`] (an arena of placed blocks) and the
//! frozen [`BlockRegistry`] of validated definitions, and produces one
//! [`GeneratedProgram`]:
//!
//! - every statement block is preceded by `highlightBlock("<id>");`
//! - every loop body found in a snippet starts with the loop trap
//!   `if(--loopTrap === 0) exit(false, "infinite loop");`
//! - value inputs are replaced by their child's code, parenthesised by
//!   precedence rank, and wrapped in integer/min/max guards
//! - unconnected value inputs become a `missing parameter` abort
//! - the program ends with an unconditional `ran out of instructions` abort
//!
//! The program is plain text; the interpreter receives nothing else.

pub mod compiler;
pub mod error;
mod expr;
pub mod guards;
pub mod program;
pub mod registry;
pub mod source_map;
mod stmt;
pub mod workspace;

pub use compiler::{generate, generate_from_json};
pub use error::{CodegenError, CodegenResult};
pub use program::GeneratedProgram;
pub use registry::{BlockRegistry, RegistryBuilder};
pub use source_map::SourceMap;
pub use workspace::{BlockNode, BlockTree, FieldValue, NodeId};
