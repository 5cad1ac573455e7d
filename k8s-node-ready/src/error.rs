use std::process::ExitStatus;

use thiserror::Error;

/// A single failed invocation of the cluster-state query command.
///
/// One of these is eligible for bounded retry; it only becomes fatal for
/// the caller once every retry attempt has been spent.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to launch query command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("query command `{command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// A failed invocation of the CSR approval script.
///
/// Remediation is best-effort: there may legitimately be nothing pending to
/// approve, so callers log these and keep going.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("failed to launch approval script `{script}`: {source}")]
    Spawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("approval script `{script}` failed ({status}): {stderr}")]
    Failed {
        script: String,
        status: ExitStatus,
        stderr: String,
    },
}
