//! The stepping interpreter.
//!
//! Top-level program code is lowered to a flat list of ops with explicit
//! jumps, so the interpreter can stop between any two ops and resume later
//! with nothing but a program counter. Each op is one micro-step; the
//! expressions inside it are evaluated to completion.
//!
//! ```text
//! Ready ──step──▶ Running ──highlight / pause──▶ Suspended ──step──▶ Running
//!                    │
//!                    └── exit / fault / end of program ──▶ Finished
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use tessera_types::ast::{Expr, ForInit, Program, Stmt, StmtKind, VarDeclarator};
use tessera_types::{intrinsics, SourceFile};

use crate::config::RunConfig;
use crate::env;
use crate::error::{EvalError, SyntaxError};
use crate::evaluator::{Evaluator, Flow, Signal};
use crate::value::{Intrinsic, Native, Value};

/// Verdict message for a run that stopped without calling `exit`.
pub const IMPLICIT_FAILURE: &str = "execution stopped without a verdict";

/// Source name programs are parsed under.
pub const PROGRAM_SOURCE: &str = "program";

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ready,
    Running,
    Suspended,
    Finished,
}

/// The final (correctness, message) pair of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub correct: bool,
    pub message: Option<String>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Lowering
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
enum Op {
    Eval(Expr),
    /// Initialisers of a `var` statement.
    Declare(Vec<VarDeclarator>),
    JumpUnless(Expr, usize),
    JumpIf(Expr, usize),
    Jump(usize),
    /// Stop without a verdict.
    Halt,
}

#[derive(Default)]
struct LoopLabels {
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

#[derive(Default)]
struct Lowering {
    ops: Vec<Op>,
    loops: Vec<LoopLabels>,
}

impl Lowering {
    fn here(&self) -> usize {
        self.ops.len()
    }

    fn emit(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn patch(&mut self, at: usize, target: usize) {
        if let Some(Op::JumpUnless(_, t) | Op::JumpIf(_, t) | Op::Jump(t)) = self.ops.get_mut(at) {
            *t = target;
        }
    }

    fn close_loop(&mut self, continue_to: usize, break_to: usize) {
        let labels = self.loops.pop().unwrap_or_default();
        for at in labels.continues {
            self.patch(at, continue_to);
        }
        for at in labels.breaks {
            self.patch(at, break_to);
        }
    }

    fn stmts(&mut self, stmts: Vec<Stmt>) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: Stmt) {
        match stmt.kind {
            StmtKind::Var(decls) => {
                self.emit(Op::Declare(decls));
            }
            StmtKind::Expr(expr) => {
                self.emit(Op::Eval(expr));
            }
            StmtKind::Block(body) => self.stmts(body),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                let skip_then = self.emit(Op::JumpUnless(test, 0));
                self.stmt(*consequent);
                match alternate {
                    Some(alt) => {
                        let skip_else = self.emit(Op::Jump(0));
                        let else_start = self.here();
                        self.patch(skip_then, else_start);
                        self.stmt(*alt);
                        let end = self.here();
                        self.patch(skip_else, end);
                    }
                    None => {
                        let end = self.here();
                        self.patch(skip_then, end);
                    }
                }
            }
            StmtKind::While { test, body } => {
                let top = self.here();
                let exit = self.emit(Op::JumpUnless(test, 0));
                self.loops.push(LoopLabels::default());
                self.stmt(*body);
                self.emit(Op::Jump(top));
                let end = self.here();
                self.patch(exit, end);
                self.close_loop(top, end);
            }
            StmtKind::DoWhile { body, test } => {
                let top = self.here();
                self.loops.push(LoopLabels::default());
                self.stmt(*body);
                let check = self.here();
                self.emit(Op::JumpIf(test, top));
                let end = self.here();
                self.close_loop(check, end);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                match init {
                    Some(ForInit::Var(decls)) => {
                        self.emit(Op::Declare(decls));
                    }
                    Some(ForInit::Expr(expr)) => {
                        self.emit(Op::Eval(expr));
                    }
                    None => {}
                }
                let top = self.here();
                let exit = test.map(|t| self.emit(Op::JumpUnless(t, 0)));
                self.loops.push(LoopLabels::default());
                self.stmt(*body);
                let next = self.here();
                if let Some(update) = update {
                    self.emit(Op::Eval(update));
                }
                self.emit(Op::Jump(top));
                let end = self.here();
                if let Some(exit) = exit {
                    self.patch(exit, end);
                }
                self.close_loop(next, end);
            }
            StmtKind::Break => {
                let at = self.emit(Op::Jump(0));
                if let Some(labels) = self.loops.last_mut() {
                    labels.breaks.push(at);
                }
            }
            StmtKind::Continue => {
                let at = self.emit(Op::Jump(0));
                if let Some(labels) = self.loops.last_mut() {
                    labels.continues.push(at);
                }
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.emit(Op::Eval(value));
                }
                self.emit(Op::Halt);
            }
            StmtKind::Function(_) | StmtKind::Empty => {}
        }
    }
}

fn lower(body: Vec<Stmt>) -> Vec<Op> {
    let mut lowering = Lowering::default();
    lowering.stmts(body);
    lowering.ops
}

// ══════════════════════════════════════════════════════════════════════════════
// Interpreter
// ══════════════════════════════════════════════════════════════════════════════

/// One run of a generated program against one initial state.
pub struct Interpreter {
    ops: Vec<Op>,
    pc: usize,
    eval: Evaluator,
    status: Status,
    fault: Option<EvalError>,
}

impl Interpreter {
    /// Parse `code` and prepare a run.
    pub fn new(
        code: &str,
        initial_state: &serde_json::Value,
        config: RunConfig,
    ) -> Result<Self, SyntaxError> {
        let program = parse(code)?;
        Ok(Self::from_program(program, initial_state, config))
    }

    /// Prepare a run of an already-parsed program.
    pub fn from_program(
        program: Program,
        initial_state: &serde_json::Value,
        config: RunConfig,
    ) -> Self {
        let eval = Evaluator::new(&config);
        let global = &eval.global;
        let intrinsic = |i| Value::native(Native::Intrinsic(i));
        env::declare(global, intrinsics::HIGHLIGHT_BLOCK, intrinsic(Intrinsic::HighlightBlock));
        env::declare(global, intrinsics::PAUSE, intrinsic(Intrinsic::Pause));
        env::declare(global, intrinsics::EXIT, intrinsic(Intrinsic::Exit));
        env::declare(global, intrinsics::STATE, Value::from_json(initial_state));
        env::declare(
            global,
            intrinsics::LOOP_TRAP,
            Value::Number(f64::from(config.loop_budget)),
        );
        eval.hoist(&program.body, global);

        let ops = lower(program.body);
        debug!(ops = ops.len(), "interpreter ready");
        Self {
            ops,
            pc: 0,
            eval,
            status: Status::Ready,
            fault: None,
        }
    }

    /// Run until the next suspension point or the end of the run. Returns
    /// whether the run can continue.
    pub fn step(&mut self) -> bool {
        if self.status == Status::Finished {
            return false;
        }
        self.status = Status::Running;
        while self.status == Status::Running {
            self.micro_step();
            if self.eval.take_suspend() && self.status == Status::Running {
                self.status = Status::Suspended;
            }
        }
        self.is_running()
    }

    /// Run at most `budget` micro-steps, passing through suspension points.
    /// Returns whether the run can continue.
    pub fn run_for(&mut self, budget: u64) -> bool {
        if self.status == Status::Finished {
            return false;
        }
        self.status = Status::Running;
        let start = self.eval.steps();
        while self.status == Status::Running && self.eval.steps() - start < budget {
            self.micro_step();
            self.eval.take_suspend();
        }
        self.is_running()
    }

    fn micro_step(&mut self) {
        let Some(op) = self.ops.get(self.pc) else {
            debug!("program ended without a verdict");
            self.status = Status::Finished;
            return;
        };
        match exec_op(&mut self.eval, op, self.pc, self.ops.len()) {
            Ok(next) => self.pc = next,
            Err(Signal::Exit) => {
                trace!(verdict = ?self.eval.verdict, "exit");
                self.status = Status::Finished;
            }
            Err(Signal::Fault(e)) => {
                warn!(error = %e, steps = self.eval.steps(), "runtime fault");
                self.fault = Some(e);
                self.status = Status::Finished;
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status != Status::Finished
    }

    /// Id of the most recently highlighted block.
    pub fn highlighted_block(&self) -> Option<&str> {
        self.eval.highlighted.as_deref()
    }

    /// The verdict set by `exit`, if any.
    pub fn verdict(&self) -> Option<&Verdict> {
        self.eval.verdict.as_ref()
    }

    pub fn correct(&self) -> bool {
        self.verdict().is_some_and(|v| v.correct)
    }

    pub fn message(&self) -> Option<&str> {
        self.verdict().and_then(|v| v.message.as_deref())
    }

    /// The runtime fault that stopped the run, if any.
    pub fn fault(&self) -> Option<&EvalError> {
        self.fault.as_ref()
    }

    pub fn steps_executed(&self) -> u64 {
        self.eval.steps()
    }

    /// Final verdict of a finished run, counting a run that stopped without
    /// `exit` as failed.
    pub fn outcome(&self) -> Option<Verdict> {
        if self.is_running() {
            return None;
        }
        Some(self.verdict().cloned().unwrap_or_else(|| Verdict {
            correct: false,
            message: Some(IMPLICIT_FAILURE.to_string()),
        }))
    }

    /// Global bindings, intrinsics excluded.
    pub fn globals(&self) -> BTreeMap<String, serde_json::Value> {
        self.eval
            .global
            .borrow()
            .bindings()
            .iter()
            .filter(|(_, v)| !matches!(v, Value::Native(_)))
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

/// Parse a program for [`Interpreter::from_program`].
pub fn parse(code: &str) -> Result<Program, SyntaxError> {
    let source = SourceFile::new(PROGRAM_SOURCE, code);
    tessera_parser::parse_program(&source).map_err(|errors| SyntaxError { errors })
}

/// Execute one op; returns the next program counter.
fn exec_op(eval: &mut Evaluator, op: &Op, pc: usize, end: usize) -> Flow<usize> {
    eval.tick()?;
    let global = eval.global.clone();
    match op {
        Op::Eval(expr) => {
            eval.eval(expr, &global)?;
            Ok(pc + 1)
        }
        Op::Declare(decls) => {
            eval.declarators(decls, &global)?;
            Ok(pc + 1)
        }
        Op::JumpUnless(test, target) => {
            let taken = !eval.eval(test, &global)?.truthy();
            Ok(if taken { *target } else { pc + 1 })
        }
        Op::JumpIf(test, target) => {
            let taken = eval.eval(test, &global)?.truthy();
            Ok(if taken { *target } else { pc + 1 })
        }
        Op::Jump(target) => Ok(*target),
        Op::Halt => Ok(end),
    }
}
