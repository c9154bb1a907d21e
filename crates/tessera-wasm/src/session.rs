//! Host-facing run sessions.
//!
//! A [`HostSession`] wraps one interpreter and reports what happened after
//! each call as a list of [`HostEvent`]s. The wasm classes in `lib.rs` are
//! thin JSON wrappers around it so the logic stays testable natively.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use tessera_eval::{BatchGrader, Interpreter, RunConfig, TestCaseResult};

/// Notifications for the embedding UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostEvent {
    /// The program parsed and a fresh run is ready to step.
    ProgramReady,
    StateChanged {
        highlighted_block: Option<String>,
        variables: BTreeMap<String, serde_json::Value>,
    },
    VerdictReached {
        correct: bool,
        message: Option<String>,
        /// Runtime fault that ended the run, if it did not end through `exit`.
        #[serde(skip_serializing_if = "Option::is_none")]
        fault: Option<String>,
    },
    /// The run cannot start. Line and column are 1-based.
    FatalError {
        message: String,
        line: Option<u32>,
        column: Option<u32>,
    },
}

impl HostEvent {
    fn fatal(message: impl Into<String>, position: Option<(u32, u32)>) -> Self {
        HostEvent::FatalError {
            message: message.into(),
            line: position.map(|(line, _)| line),
            column: position.map(|(_, column)| column),
        }
    }
}

pub struct HostSession {
    code: String,
    initial_state: String,
    config: RunConfig,
    run: Option<Interpreter>,
}

impl HostSession {
    /// Create a session; nothing runs until [`reset`](Self::reset).
    pub fn new(code: impl Into<String>, initial_state: impl Into<String>, config: RunConfig) -> Self {
        Self {
            code: code.into(),
            initial_state: initial_state.into(),
            config,
            run: None,
        }
    }

    /// Start a fresh run of the program.
    pub fn reset(&mut self) -> Vec<HostEvent> {
        self.run = None;
        let state: serde_json::Value = match serde_json::from_str(&self.initial_state) {
            Ok(state) => state,
            Err(e) => {
                let message = format!("initial state is not valid JSON: {e}");
                let position = Some((e.line() as u32, e.column() as u32));
                return vec![HostEvent::fatal(message, position)];
            }
        };
        match Interpreter::new(&self.code, &state, self.config) {
            Ok(run) => {
                debug!(lines = self.code.lines().count(), "session ready");
                let variables = run.globals();
                self.run = Some(run);
                vec![
                    HostEvent::ProgramReady,
                    HostEvent::StateChanged {
                        highlighted_block: None,
                        variables,
                    },
                ]
            }
            Err(e) => {
                let message = e
                    .errors
                    .first()
                    .map(|err| err.message.clone())
                    .unwrap_or_else(|| e.to_string());
                vec![HostEvent::fatal(message, e.position())]
            }
        }
    }

    /// Step to the next suspension point. Returns no events when there is
    /// no run or the run has already finished.
    pub fn step(&mut self) -> Vec<HostEvent> {
        let Some(run) = self.run.as_mut() else {
            return Vec::new();
        };
        if !run.is_running() {
            return Vec::new();
        }
        run.step();
        let mut events = vec![HostEvent::StateChanged {
            highlighted_block: run.highlighted_block().map(String::from),
            variables: run.globals(),
        }];
        if let Some(verdict) = run.outcome() {
            events.push(HostEvent::VerdictReached {
                correct: verdict.correct,
                message: verdict.message,
                fault: run.fault().map(|f| f.to_string()),
            });
        }
        events
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(Interpreter::is_running)
    }
}

/// Grades one program against many states, a slice at a time.
pub struct HostGrader {
    grader: Result<BatchGrader, HostEvent>,
}

impl HostGrader {
    pub fn new(code: &str, initial_states: &str, config: RunConfig) -> Self {
        let grader = serde_json::from_str::<Vec<serde_json::Value>>(initial_states)
            .map_err(|e| {
                HostEvent::fatal(
                    format!("test cases are not a JSON array: {e}"),
                    Some((e.line() as u32, e.column() as u32)),
                )
            })
            .and_then(|states| {
                BatchGrader::new(code, &states, config).map_err(|e| {
                    let message = e
                        .errors
                        .first()
                        .map(|err| err.message.clone())
                        .unwrap_or_else(|| e.to_string());
                    HostEvent::fatal(message, e.position())
                })
            });
        Self { grader }
    }

    /// Run one slice; `true` once every test case has a result or the
    /// program could not be graded at all.
    pub fn advance(&mut self) -> bool {
        match &mut self.grader {
            Ok(grader) => grader.advance(),
            Err(_) => true,
        }
    }

    pub fn results(&self) -> Vec<TestCaseResult> {
        match &self.grader {
            Ok(grader) => grader.results(),
            Err(_) => Vec::new(),
        }
    }

    /// Why grading could not start, if it could not.
    pub fn error(&self) -> Option<&HostEvent> {
        self.grader.as_ref().err()
    }
}
