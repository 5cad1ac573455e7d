//! The readiness convergence loop.
//!
//! Polls the cluster for worker readiness, nudges stuck certificate
//! requests along, and returns once every expected worker reports `Ready`.
//! There is deliberately no backoff, no jitter, and no iteration cap:
//! absent external progress the loop runs until its cancellation token
//! fires or its optional deadline elapses. Iterations are fully
//! sequential; polling never overlaps remediation.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use k8s_node_ready::{ConvergeConfig, PollAttempt, QueryError, WorkerPool};
use k8s_node_ready_cluster::{ClusterStateQuery, PendingCsrApprover};

#[derive(Debug, Error)]
pub enum ConvergeError {
    /// The query collaborator failed every attempt of one poll cycle. This
    /// aborts the loop; an unreachable cluster is not the same thing as a
    /// cluster with no ready workers.
    #[error("cluster state query failed after {attempts} attempts")]
    QueryExhausted {
        attempts: u32,
        #[source]
        source: QueryError,
    },

    #[error("convergence cancelled before the worker pool was ready")]
    Cancelled,

    #[error("deadline elapsed before the worker pool was ready")]
    DeadlineExceeded,
}

/// Loop state. `Converged` is terminal; everything else the loop does is a
/// self-loop on `Polling`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopState {
    #[default]
    Polling,
    Converged,
}

impl LoopState {
    /// Apply one observation of the pool.
    pub fn advance(self, pool: &WorkerPool) -> Self {
        match self {
            Self::Converged => Self::Converged,
            Self::Polling if pool.is_converged() => Self::Converged,
            Self::Polling => Self::Polling,
        }
    }
}

/// Drives a worker pool to full readiness.
#[derive(Debug)]
pub struct Converger<Q, A> {
    query: Q,
    approver: A,
    config: ConvergeConfig,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl<Q, A> Converger<Q, A>
where
    Q: ClusterStateQuery,
    A: PendingCsrApprover,
{
    pub fn new(query: Q, approver: A, config: ConvergeConfig) -> Self {
        Self {
            query,
            approver,
            config,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Replace the loop's cancellation token, e.g. with one shared by a
    /// larger shutdown sequence.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Give up with [`ConvergeError::DeadlineExceeded`] once `timeout` has
    /// elapsed. Without this the loop runs until convergence or
    /// cancellation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// A token that aborts the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until every expected worker reports ready.
    ///
    /// Each iteration re-derives the ready count from a fresh query; nothing
    /// observed in one iteration survives into the next.
    pub async fn converge(&self) -> Result<WorkerPool, ConvergeError> {
        let mut state = LoopState::default();
        let mut pool = WorkerPool::new(self.config.expected_workers);
        self.wait(self.config.pause).await?;
        loop {
            let attempt = self.poll_once().await?;
            pool.ready = attempt.ready;
            tracing::info!(
                ready = pool.ready,
                expected = pool.expected,
                "polled worker readiness"
            );
            self.remediate(&pool).await;
            state = state.advance(&pool);
            if state == LoopState::Converged {
                tracing::info!(expected = pool.expected, "worker pool converged");
                return Ok(pool);
            }
            self.wait(self.config.poll_interval).await?;
        }
    }

    /// One query cycle.
    ///
    /// The command invocation itself is retried up to the configured bound,
    /// covering transient query-infrastructure failures. Exhausting the
    /// bound is fatal for the caller rather than being reported as zero
    /// ready workers.
    pub async fn poll_once(&self) -> Result<PollAttempt, ConvergeError> {
        let attempts = self.config.query_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.query.list_worker_status().await {
                Ok(raw) => return Ok(PollAttempt::from_output(raw)),
                Err(source) => {
                    tracing::warn!(
                        attempt,
                        max = attempts,
                        error = %source,
                        "worker status query failed"
                    );
                    if attempt >= attempts {
                        return Err(ConvergeError::QueryExhausted { attempts, source });
                    }
                }
            }
            self.wait(self.config.query_retry_delay).await?;
        }
    }

    /// Invoke the approver once if the pool has not converged.
    ///
    /// Best-effort: a failure is logged and the loop moves on, since there
    /// may be nothing pending to approve.
    pub async fn remediate(&self, pool: &WorkerPool) {
        if pool.is_converged() {
            return;
        }
        if let Err(err) = self.approver.approve_pending().await {
            tracing::warn!(error = %err, "csr approval failed");
        }
    }

    async fn wait(&self, period: Duration) -> Result<(), ConvergeError> {
        if self.cancel.is_cancelled() {
            return Err(ConvergeError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ConvergeError::DeadlineExceeded);
            }
        }
        let until_deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            () = self.cancel.cancelled() => Err(ConvergeError::Cancelled),
            () = until_deadline => Err(ConvergeError::DeadlineExceeded),
            () = sleep(period) => Ok(()),
        }
    }
}
