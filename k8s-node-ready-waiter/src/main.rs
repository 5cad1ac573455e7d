use k8s_node_ready::{duration, ConvergeConfig};
use k8s_node_ready_cluster::{ApproveCsrScript, KubectlWorkerQuery};
use k8s_node_ready_converge::Converger;

const ENV_TIMEOUT: &str = "NODE_READY_TIMEOUT";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    tracing::info!("Starting k8s-node-ready-waiter");

    let config = ConvergeConfig::from_env()?;
    tracing::info!(
        expected = config.expected_workers,
        "Waiting for worker pool to converge"
    );

    let query = KubectlWorkerQuery::from_env();
    let approver = ApproveCsrScript::from_env();
    let mut converger = Converger::new(query, approver, config);
    if let Ok(raw) = std::env::var(ENV_TIMEOUT) {
        converger = converger.with_timeout(duration::parse(&raw)?);
    }

    let cancel = converger.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping convergence loop");
            cancel.cancel();
        }
    });

    let pool = converger.converge().await?;
    tracing::info!(ready = pool.ready, "All workers ready");

    Ok(())
}
