use alertdist::client::ClientConfig;
use alertdist::distributor::{Distributor, DistributorConfig, spawn_distributor};
use alertdist::routing::StaticReplicaDirectory;
use alertdist::web::build_router;
use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tenant-sharded distributor for replicated alerting backends.
#[derive(Parser, Debug)]
#[command(name = "alertdist", version, about)]
struct Cli {
    /// Address the HTTP server listens on
    #[arg(long, env = "ALERTDIST_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Replica address (host:port); repeat for every replica
    #[arg(long = "replica", env = "ALERTDIST_REPLICAS", value_delimiter = ',', required = true)]
    replicas: Vec<String>,

    /// Number of replicas each tenant is written to
    #[arg(long, env = "ALERTDIST_REPLICATION_FACTOR", default_value_t = 3)]
    replication_factor: usize,

    /// Per-replica deadline for write calls, in milliseconds
    #[arg(long, env = "ALERTDIST_REMOTE_TIMEOUT_MS", default_value_t = 2000)]
    remote_timeout_ms: u64,

    /// TCP connect timeout for replica clients, in milliseconds
    #[arg(long, env = "ALERTDIST_CONNECT_TIMEOUT_MS", default_value_t = 5000)]
    connect_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = DistributorConfig::default()
        .remote_timeout(Duration::from_millis(cli.remote_timeout_ms))
        .client(ClientConfig::default().connect_timeout(Duration::from_millis(cli.connect_timeout_ms)));

    let directory = Arc::new(
        StaticReplicaDirectory::new(cli.replication_factor, cli.replicas.clone())
            .context("failed to build replica directory")?,
    );
    let distributor = Arc::new(
        Distributor::with_http_clients(config, directory).context("failed to create distributor")?,
    );
    let worker = spawn_distributor(distributor.clone())
        .await
        .context("failed to start distributor")?;

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;

    info!(
        listen = %cli.listen,
        replicas = ?cli.replicas,
        replication_factor = cli.replication_factor,
        "alertdist started"
    );

    let served = axum::serve(listener, build_router(distributor))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    // Drain in-flight writes and stop the directory even when the server failed.
    worker.stop().await.context("distributor did not stop cleanly")?;
    served?;

    info!("alertdist stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("alertdist=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
