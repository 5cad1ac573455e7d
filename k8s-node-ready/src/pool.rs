use serde::{Deserialize, Serialize};

use crate::READY_STATUS_TRUE;

/// The set of machines labeled as workers in the target cluster.
///
/// `ready` is whatever the most recent poll observed; it is recomputed from
/// a fresh query every iteration and never cached across iterations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPool {
    pub expected: usize,
    pub ready: usize,
}

impl WorkerPool {
    /// A pool that expects `expected` workers and has observed none yet.
    pub fn new(expected: usize) -> Self {
        Self { expected, ready: 0 }
    }

    /// A pool with an already-observed ready count.
    pub fn observed(expected: usize, ready: usize) -> Self {
        Self { expected, ready }
    }

    /// Whether every expected worker currently reports ready.
    pub fn is_converged(&self) -> bool {
        self.ready == self.expected
    }
}

/// One query cycle: the raw collaborator output and the ready count derived
/// from it. Built, evaluated, and discarded every iteration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAttempt {
    pub raw_output: String,
    pub succeeded: bool,
    pub ready: usize,
}

impl PollAttempt {
    /// An attempt whose query command completed successfully.
    pub fn from_output(raw: impl ToString) -> Self {
        let raw_output = raw.to_string();
        let ready = count_ready(&raw_output);
        Self {
            raw_output,
            succeeded: true,
            ready,
        }
    }

    /// An attempt whose query command never produced usable output.
    pub fn failed() -> Self {
        Self {
            raw_output: String::new(),
            succeeded: false,
            ready: 0,
        }
    }
}

/// Count the lines whose whitespace-separated fields contain a literal
/// `True`.
///
/// The match is deliberately loose: extra columns and field order are
/// ignored, and lines that match nothing count as zero rather than failing.
/// Output-format drift in the query command must not break the caller.
pub fn count_ready(output: &str) -> usize {
    output
        .lines()
        .filter(|line| line.split_whitespace().any(|field| field == READY_STATUS_TRUE))
        .count()
}
