//! Worker pool readiness model.
//!
//! The types here describe what one poll of the cluster observed; they carry
//! no cluster access of their own. Readiness is counted from the free-form
//! text the query collaborator prints, one line per worker node, with a
//! literal `True` somewhere on the line when the node's `Ready` condition
//! holds.

use constcat::concat;

pub use config::{
    ConfigError, ConvergeConfig, DEFAULT_EXPECTED_WORKERS, DEFAULT_QUERY_RETRIES,
    ENV_EXPECTED_WORKERS, ENV_PAUSE, ENV_POLL_INTERVAL, ENV_QUERY_RETRIES, ENV_QUERY_RETRY_DELAY,
};
pub use error::{QueryError, RemediationError};
pub use pool::{count_ready, PollAttempt, WorkerPool};

pub const NODE_ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";
pub const WORKER_ROLE_LABEL: &str = concat!(NODE_ROLE_LABEL_PREFIX, "worker");

pub const READY_CONDITION: &str = "Ready";
pub const READY_STATUS_TRUE: &str = "True";

mod config;
pub mod duration;
mod error;
mod pool;
