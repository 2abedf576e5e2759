use super::metrics::DistributorMetrics;
use crate::client::{CallMetadata, ClientPool};
use crate::core::{HttpRequest, ReplicaFailure, ReplicaResponse};
use std::sync::Arc;

/// Issues one call to one replica, keeping the send counters.
#[derive(Clone)]
pub(crate) struct ReplicaCaller {
    clients: Arc<dyn ClientPool>,
    metrics: Arc<DistributorMetrics>,
}

impl ReplicaCaller {
    pub(crate) fn new(clients: Arc<dyn ClientPool>, metrics: Arc<DistributorMetrics>) -> Self {
        Self { clients, metrics }
    }

    /// Calls `addr`. A transport failure counts as a failed send here; a
    /// declared non-OK reply is counted by the caller, which decides what it means.
    pub(crate) async fn call(
        &self,
        addr: &str,
        metadata: &CallMetadata,
        request: &HttpRequest,
    ) -> Result<ReplicaResponse, ReplicaFailure> {
        self.metrics.record_send(addr);
        let result = self.do_request(addr, metadata, request).await;
        if result.is_err() {
            self.metrics.record_send_failure(addr);
        }
        result
    }

    pub(crate) fn record_failure(&self, addr: &str) {
        self.metrics.record_send_failure(addr);
    }

    async fn do_request(
        &self,
        addr: &str,
        metadata: &CallMetadata,
        request: &HttpRequest,
    ) -> Result<ReplicaResponse, ReplicaFailure> {
        let client = self.clients.get_client_for(addr).map_err(|err| {
            ReplicaFailure::message(format!("failed to get client from pool {}: {}", addr, err))
        })?;
        client
            .handle_request(metadata, request)
            .await
            .map_err(|failure| {
                failure.with_context(format!(
                    "failed to proxy request to replica {}",
                    client.remote_address()
                ))
            })
    }
}
