//! Scripted test double for [`Runner`].
//!
//! ```ignore
//! let runner = ScriptedRunner::new();
//! runner.on("chown", Scripted::exit(0));
//! runner.on("chgrp", Scripted::exit(1));
//! // ... exercise code that takes `Arc<dyn Runner>` ...
//! assert_eq!(runner.calls_to("chown"), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::{Completed, ExecError, Invocation, Result, Runner};

/// Outcome returned for one scripted call
#[derive(Debug, Clone)]
pub enum Scripted {
    Exit { code: i32, stdout: Vec<u8> },
    LaunchFailure,
    Terminated,
}

impl Scripted {
    pub fn exit(code: i32) -> Self {
        Scripted::Exit {
            code,
            stdout: Vec::new(),
        }
    }

    pub fn output(code: i32, stdout: impl Into<Vec<u8>>) -> Self {
        Scripted::Exit {
            code,
            stdout: stdout.into(),
        }
    }
}

/// Records every invocation and answers from a per-program script.
///
/// A program with several queued outcomes answers them in order and
/// keeps repeating the last one. Unscripted programs fail to launch.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, program: &str, outcome: Scripted) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(program.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|inv| inv.program() == program)
            .count()
    }
}

impl Runner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<Completed> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(invocation.clone());

        let outcome = {
            let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
            match script.get_mut(invocation.program()) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match outcome {
            Some(Scripted::Exit { code, stdout }) => Ok(Completed {
                code,
                stdout,
                stderr: Vec::new(),
            }),
            Some(Scripted::Terminated) => Err(ExecError::Terminated {
                program: invocation.program().to_string(),
            }),
            Some(Scripted::LaunchFailure) | None => Err(ExecError::Launch {
                program: invocation.program().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not scripted"),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
