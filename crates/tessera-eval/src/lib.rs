//! Tessera sandbox interpreter and batch grader.
//!
//! Runs a generated block-script program against one initial state at a
//! time. Execution is cooperative: [`Interpreter::step`] runs until the
//! program reaches a suspension point (`highlightBlock` or `pause`), sets a
//! verdict with `exit`, or faults. Loop traps in the program and a
//! micro-step budget in the interpreter bound every run.
//!
//! The language surface has no clock, randomness or I/O, so a program and
//! an initial state fully determine the highlight sequence and the verdict.

mod builtins;
pub mod config;
mod env;
pub mod error;
mod evaluator;
pub mod grader;
pub mod interpreter;
pub mod value;

pub use config::RunConfig;
pub use error::{EvalError, EvalResult, SyntaxError};
pub use grader::{grade_all, BatchGrader, TestCaseResult};
pub use interpreter::{Interpreter, Status, Verdict, IMPLICIT_FAILURE};
pub use value::Value;
