//! The distributor: tenant placement, quorum writes, single-replica reads.
//!
//! Every request is hashed to a shard key, the replica directory turns that
//! key into a replica set, and the request is then either replicated to the
//! whole set (writes) or proxied to its first member (reads). Failures coming
//! back from replicas are translated into caller-facing responses by
//! [`respond_from_failure`].

mod call;
pub mod config;
pub mod context;
pub mod metrics;
mod read;
pub mod respond;
pub mod worker;
mod write;

use crate::client::{CachedClientPool, ClientPool};
use crate::core::{
    HttpRequest, HttpResponse, Result, STATUS_SERVICE_UNAVAILABLE, STATUS_UNAUTHORIZED,
};
use crate::routing::{HealthFilter, ReplicaDirectory};
use crate::service::{InFlightGuard, LifecycleController, ServiceState, Subservice, SubserviceManager};
use call::ReplicaCaller;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

pub use config::DistributorConfig;
pub use context::RequestContext;
pub use metrics::{DistributorMetrics, DistributorMetricsSnapshot};
pub use respond::respond_from_failure;
pub use worker::{DistributorWorker, spawn_distributor};

/// Path suffixes the distributor currently serves.
pub const SUPPORTED_PATH_SUFFIXES: [&str; 2] = ["/alerts", "/alerts/groups"];

/// Returns true if requests to `path` may be handed to the distributor.
///
/// Matching is an exact, case-sensitive suffix match. Callers must reject
/// every other path before distribution.
pub fn is_path_supported(path: &str) -> bool {
    SUPPORTED_PATH_SUFFIXES
        .iter()
        .any(|suffix| path.ends_with(suffix))
}

pub struct Distributor {
    config: DistributorConfig,
    directory: Arc<dyn ReplicaDirectory>,
    caller: ReplicaCaller,
    health_filter: HealthFilter,
    replication_factor: usize,
    lifecycle: LifecycleController,
    metrics: Arc<DistributorMetrics>,
}

impl Distributor {
    /// Creates a distributor over `directory`, whose lifecycle it manages.
    pub fn new<D>(
        config: DistributorConfig,
        directory: Arc<D>,
        clients: Arc<dyn ClientPool>,
    ) -> Result<Self>
    where
        D: ReplicaDirectory + Subservice + 'static,
    {
        config
            .validate()
            .map_err(crate::core::DistributorError::Config)?;

        let replication_factor = directory.replication_factor();
        let metrics = Arc::new(DistributorMetrics::new(replication_factor));
        let subservices = SubserviceManager::new(vec![directory.clone() as Arc<dyn Subservice>]);

        Ok(Self {
            config,
            directory,
            caller: ReplicaCaller::new(clients, metrics.clone()),
            health_filter: HealthFilter::active_only(),
            replication_factor,
            lifecycle: LifecycleController::new(subservices),
            metrics,
        })
    }

    /// Creates a distributor talking to replicas over HTTP.
    pub fn with_http_clients<D>(config: DistributorConfig, directory: Arc<D>) -> Result<Self>
    where
        D: ReplicaDirectory + Subservice + 'static,
    {
        let clients = Arc::new(CachedClientPool::http(&config.client)?);
        Self::new(config, directory, clients)
    }

    pub fn is_path_supported(&self, path: &str) -> bool {
        is_path_supported(path)
    }

    /// Shards writes and returns once quorum is decided; proxies reads to one replica.
    ///
    /// Assumes the caller has already checked [`is_path_supported`].
    ///
    /// ```
    /// use alertdist::client::{InMemoryClientPool, ReplicaBehavior};
    /// use alertdist::core::HttpRequest;
    /// use alertdist::distributor::{Distributor, DistributorConfig, RequestContext};
    /// use alertdist::routing::StaticReplicaDirectory;
    /// use std::sync::Arc;
    ///
    /// # tokio_test::block_on(async {
    /// let addrs = vec!["am-0:9094".to_string(), "am-1:9094".to_string(), "am-2:9094".to_string()];
    /// let clients = InMemoryClientPool::new();
    /// for addr in &addrs {
    ///     clients.register_replica(addr.clone(), ReplicaBehavior::ok());
    /// }
    /// let directory = Arc::new(StaticReplicaDirectory::new(3, addrs).unwrap());
    /// let distributor =
    ///     Distributor::new(DistributorConfig::default(), directory, Arc::new(clients)).unwrap();
    /// distributor.start().await.unwrap();
    ///
    /// let ctx = RequestContext::for_tenant("tenant-1");
    /// let response = distributor
    ///     .distribute_request(&ctx, HttpRequest::new("POST", "/api/v1/alerts").with_body("[]"))
    ///     .await;
    /// assert_eq!(response.code, 200);
    /// # });
    /// ```
    pub async fn distribute_request(
        &self,
        ctx: &RequestContext,
        request: HttpRequest,
    ) -> HttpResponse {
        let span = info_span!(
            "distribute_request",
            method = %request.method,
            url = %request.url,
        );

        async move {
            if request.is_read() {
                match self.read(ctx, request).await {
                    Ok(response) | Err(response) => response,
                }
            } else {
                match self.write(ctx, request).await {
                    Ok(()) => HttpResponse::ok(),
                    Err(response) => response,
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn start(&self) -> Result<()> {
        self.lifecycle.start().await
    }

    /// Runs until stopped, then drains in-flight requests and stops the directory.
    pub async fn run(&self) -> Result<()> {
        self.lifecycle.run().await
    }

    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    pub async fn await_terminated(&self) -> Result<()> {
        self.lifecycle.await_terminated().await
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    pub fn in_flight_requests(&self) -> usize {
        self.lifecycle.in_flight().count()
    }

    pub fn metrics(&self) -> &Arc<DistributorMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Extracts the tenant and counts the request against it.
    fn authenticate<'a>(&self, ctx: &'a RequestContext) -> std::result::Result<&'a str, HttpResponse> {
        let tenant_id = ctx
            .tenant_id()
            .map_err(|err| HttpResponse::text(STATUS_UNAUTHORIZED, err.to_string()))?;
        self.metrics.record_received(tenant_id);
        Ok(tenant_id)
    }

    fn admit(&self) -> std::result::Result<InFlightGuard, HttpResponse> {
        self.lifecycle.admit().map_err(|err| {
            event!(Level::DEBUG, error = %err, "rejecting request");
            HttpResponse::text(STATUS_SERVICE_UNAVAILABLE, err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_alert_paths_are_supported() {
        assert!(is_path_supported("/api/v1/alerts"));
        assert!(is_path_supported("/alertmanager/api/v2/alerts/groups"));
        assert!(!is_path_supported("/api/v1/silences"));
        assert!(!is_path_supported("/api/v1/Alerts"));
        assert!(!is_path_supported("/api/v1/alerts/"));
    }
}
