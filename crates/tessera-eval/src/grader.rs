//! Batch grading: one fresh interpreter per test case, driven in slices.
//!
//! The grader is a poll-style state machine. Each call to
//! [`BatchGrader::advance`] gives every unfinished run one slice of at most
//! `yield_interval` micro-steps, round-robin, then returns so the host can
//! do other work. Runs share nothing, so a result never depends on how
//! slices interleave.

use serde::{Deserialize, Serialize};
use tracing::info;

use tessera_types::ast::Program;

use crate::config::RunConfig;
use crate::error::SyntaxError;
use crate::interpreter::{self, Interpreter};

/// Verdict for one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub index: usize,
    pub correct: bool,
    pub message: Option<String>,
}

enum Slot {
    Running(Box<Interpreter>),
    Done(TestCaseResult),
}

pub struct BatchGrader {
    slots: Vec<Slot>,
    yield_interval: u64,
    rounds: u64,
}

impl BatchGrader {
    /// Parse `code` once and prepare one run per initial state.
    pub fn new(
        code: &str,
        initial_states: &[serde_json::Value],
        config: RunConfig,
    ) -> Result<Self, SyntaxError> {
        let program = interpreter::parse(code)?;
        Ok(Self::from_program(&program, initial_states, config))
    }

    pub fn from_program(
        program: &Program,
        initial_states: &[serde_json::Value],
        config: RunConfig,
    ) -> Self {
        let slots = initial_states
            .iter()
            .map(|state| {
                let run = Interpreter::from_program(program.clone(), state, config);
                Slot::Running(Box::new(run))
            })
            .collect();
        Self {
            slots,
            // a zero slice would never make progress
            yield_interval: config.yield_interval.max(1),
            rounds: 0,
        }
    }

    /// Run one slice of every unfinished test case. Returns `true` once all
    /// test cases have a result.
    pub fn advance(&mut self) -> bool {
        self.rounds += 1;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Slot::Running(run) = slot else {
                continue;
            };
            if run.run_for(self.yield_interval) {
                continue;
            }
            let verdict = run.outcome().unwrap_or_else(|| interpreter::Verdict {
                correct: false,
                message: Some(interpreter::IMPLICIT_FAILURE.to_string()),
            });
            info!(
                index,
                correct = verdict.correct,
                steps = run.steps_executed(),
                "graded test case"
            );
            *slot = Slot::Done(TestCaseResult {
                index,
                correct: verdict.correct,
                message: verdict.message,
            });
        }
        self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.slots.iter().all(|s| matches!(s, Slot::Done(_)))
    }

    /// Number of `advance` calls so far.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Results of the finished test cases, in input order.
    pub fn results(&self) -> Vec<TestCaseResult> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                Slot::Done(result) => Some(result.clone()),
                Slot::Running(_) => None,
            })
            .collect()
    }

    /// Drive every test case to completion without yielding.
    pub fn run_to_completion(mut self) -> Vec<TestCaseResult> {
        while !self.advance() {}
        self.results()
    }

    /// Drive every test case to completion, yielding to the async runtime
    /// between slices.
    #[cfg(feature = "tokio")]
    pub async fn grade(mut self) -> Vec<TestCaseResult> {
        while !self.advance() {
            tokio::task::yield_now().await;
        }
        self.results()
    }
}

/// Grade `code` against every initial state synchronously.
pub fn grade_all(
    code: &str,
    initial_states: &[serde_json::Value],
    config: RunConfig,
) -> Result<Vec<TestCaseResult>, SyntaxError> {
    Ok(BatchGrader::new(code, initial_states, config)?.run_to_completion())
}
