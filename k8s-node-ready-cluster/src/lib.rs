//! External collaborators for the target cluster.
//!
//! The provisioning tooling around this crate drives the cluster through
//! `oc` and helper scripts rather than an in-process API client, and this
//! crate keeps that surface: worker readiness is read from an
//! `oc get nodes` invocation and stuck certificate requests are approved by
//! an operator-supplied script, both pointed at the cluster through
//! `KUBECONFIG` on the child process.

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use constcat::concat;
use tokio::process::Command;

use k8s_node_ready::{QueryError, RemediationError, READY_CONDITION, WORKER_ROLE_LABEL};

pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

const ENV_PREFIX: &str = "NODE_READY_";
pub const ENV_QUERY_PROGRAM: &str = concat!(ENV_PREFIX, "OC");
pub const ENV_APPROVE_SCRIPT: &str = concat!(ENV_PREFIX, "APPROVE_SCRIPT");

const DEFAULT_QUERY_PROGRAM: &str = "oc";
const DEFAULT_APPROVE_SCRIPT: &str = "./approve-csrs.sh";

/// One free-form line per worker node: name, then the status of the node's
/// `Ready` condition.
const WORKER_STATUS_JSONPATH: &str = concat!(
    "jsonpath={range .items[*]}{.metadata.name}{\"\\t\"}{.status.conditions[?(@.type==\"",
    READY_CONDITION,
    "\")].status}{\"\\n\"}{end}",
);

/// Reads the readiness of the cluster's worker pool.
#[async_trait]
pub trait ClusterStateQuery: Send + Sync {
    /// List the worker nodes with their readiness condition, one free-form
    /// text line per node. A non-zero exit or a spawn failure is a
    /// transient failure eligible for retry by the caller.
    async fn list_worker_status(&self) -> Result<String, QueryError>;
}

/// Approves certificate signing requests stuck pending authorization.
#[async_trait]
pub trait PendingCsrApprover: Send + Sync {
    /// Approve whatever is currently pending. Callers treat a failure here
    /// as best-effort; there may be nothing to approve.
    async fn approve_pending(&self) -> Result<(), RemediationError>;
}

/// Lists worker readiness by shelling out to `oc get nodes`.
///
/// The default invocation selects nodes by the worker role label and prints
/// one `name<TAB>ready-status` line per node. Both the program and its
/// arguments can be replaced for clusters driven by a different CLI or a
/// different selector.
#[derive(Clone, Debug)]
pub struct KubectlWorkerQuery {
    program: PathBuf,
    args: Vec<OsString>,
    kubeconfig: Option<PathBuf>,
}

impl KubectlWorkerQuery {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Self::default_args(),
            kubeconfig: None,
        }
    }

    /// Program from `NODE_READY_OC` (default `oc`), kubeconfig from the
    /// ambient `KUBECONFIG`.
    pub fn from_env() -> Self {
        let program = std::env::var(ENV_QUERY_PROGRAM)
            .unwrap_or_else(|_| DEFAULT_QUERY_PROGRAM.to_string());
        let kubeconfig = std::env::var_os(KUBECONFIG_ENV).map(PathBuf::from);
        Self {
            kubeconfig,
            ..Self::new(program)
        }
    }

    /// Point the query at a cluster other than the ambient one.
    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// Replace the `get nodes` arguments wholesale.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn default_args() -> Vec<OsString> {
        ["get", "nodes", "-l", WORKER_ROLE_LABEL, "-o", WORKER_STATUS_JSONPATH]
            .into_iter()
            .map(OsString::from)
            .collect()
    }

    fn display(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl ClusterStateQuery for KubectlWorkerQuery {
    async fn list_worker_status(&self) -> Result<String, QueryError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(kubeconfig) = &self.kubeconfig {
            command.env(KUBECONFIG_ENV, kubeconfig);
        }
        tracing::debug!(command = %self.display(), "listing worker status");
        let output = command.output().await.map_err(|source| QueryError::Spawn {
            command: self.display(),
            source,
        })?;
        if !output.status.success() {
            return Err(QueryError::Failed {
                command: self.display(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Approves pending CSRs by running an operator-supplied script.
#[derive(Clone, Debug)]
pub struct ApproveCsrScript {
    script: PathBuf,
    kubeconfig: Option<PathBuf>,
}

impl ApproveCsrScript {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            kubeconfig: None,
        }
    }

    /// Script from `NODE_READY_APPROVE_SCRIPT` (default `./approve-csrs.sh`),
    /// kubeconfig from the ambient `KUBECONFIG`.
    pub fn from_env() -> Self {
        let script = std::env::var(ENV_APPROVE_SCRIPT)
            .unwrap_or_else(|_| DEFAULT_APPROVE_SCRIPT.to_string());
        let kubeconfig = std::env::var_os(KUBECONFIG_ENV).map(PathBuf::from);
        Self {
            kubeconfig,
            ..Self::new(script)
        }
    }

    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    fn display(&self) -> String {
        self.script.display().to_string()
    }
}

#[async_trait]
impl PendingCsrApprover for ApproveCsrScript {
    async fn approve_pending(&self) -> Result<(), RemediationError> {
        let mut command = Command::new(&self.script);
        if let Some(kubeconfig) = &self.kubeconfig {
            command.env(KUBECONFIG_ENV, kubeconfig);
        }
        tracing::debug!(script = %self.display(), "approving pending csrs");
        let output = command
            .output()
            .await
            .map_err(|source| RemediationError::Spawn {
                script: self.display(),
                source,
            })?;
        if !output.status.success() {
            return Err(RemediationError::Failed {
                script: self.display(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_collects_stdout() {
        let query = KubectlWorkerQuery::new("/bin/sh")
            .with_args(["-c", "printf 'worker-0\\tTrue\\nworker-1\\tFalse\\n'"]);
        let raw = query.list_worker_status().await.unwrap();
        assert_eq!(k8s_node_ready::count_ready(&raw), 1);
    }

    #[tokio::test]
    async fn query_reports_nonzero_exit_with_stderr() {
        let query = KubectlWorkerQuery::new("/bin/sh")
            .with_args(["-c", "echo api server unreachable >&2; exit 3"]);
        let err = query.list_worker_status().await.unwrap_err();
        match err {
            QueryError::Failed { status, stderr, .. } => {
                assert!(!status.success());
                assert_eq!(stderr, "api server unreachable");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_reports_spawn_failure() {
        let query = KubectlWorkerQuery::new("/nonexistent/oc");
        let err = query.list_worker_status().await.unwrap_err();
        assert!(matches!(err, QueryError::Spawn { .. }));
    }

    #[tokio::test]
    async fn default_invocation_fails_without_a_cluster() {
        // `/bin/sh get nodes ...` exits non-zero without needing `oc`.
        let query = KubectlWorkerQuery::new("/bin/sh").with_kubeconfig("/tmp/kubeconfig");
        let err = query.list_worker_status().await.unwrap_err();
        assert!(matches!(err, QueryError::Failed { .. }));
    }

    #[tokio::test]
    async fn approver_succeeds_when_script_does() {
        let approver = ApproveCsrScript::new("true");
        approver.approve_pending().await.unwrap();
    }

    #[tokio::test]
    async fn approver_surfaces_script_failure() {
        let approver = ApproveCsrScript::new("false").with_kubeconfig("/tmp/kubeconfig");
        let err = approver.approve_pending().await.unwrap_err();
        assert!(matches!(err, RemediationError::Failed { .. }));
    }
}
