use super::Distributor;
use super::call::ReplicaCaller;
use super::context::RequestContext;
use super::respond::respond_from_failure;
use crate::client::CallMetadata;
use crate::core::{DistributorError, HttpRequest, HttpResponse, ReplicaFailure};
use crate::routing::{quorum_for, shard_by_tenant};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, Level, event, info_span, warn};

impl Distributor {
    /// Replicates `request` to the tenant's replica set and waits for quorum.
    ///
    /// Returns as soon as a majority of the replication factor has succeeded,
    /// or as soon as enough replicas failed that a majority is out of reach.
    /// Calls still running at that point keep going on their own tasks, each
    /// bounded by `remote_timeout` and counted as in-flight until they end.
    pub async fn write(
        &self,
        ctx: &RequestContext,
        request: HttpRequest,
    ) -> Result<(), HttpResponse> {
        let tenant_id = self.authenticate(ctx)?;
        let _guard = self.admit()?;

        let key = shard_by_tenant(tenant_id);
        let replicas = self
            .directory
            .get(key, &self.health_filter)
            .map_err(|err| {
                event!(Level::ERROR, tenant = tenant_id, error = %err, "failed to get replica set for write");
                HttpResponse::internal_error(err.to_string())
            })?;

        let min_success = quorum_for(self.replication_factor);
        if replicas.len() < min_success {
            let err = DistributorError::DirectoryUnavailable(format!(
                "at least {} live replicas required, could only find {}",
                min_success,
                replicas.len()
            ));
            event!(Level::ERROR, tenant = tenant_id, error = %err, "failed to get replica set for write");
            return Err(HttpResponse::internal_error(err.to_string()));
        }
        let max_failures = replicas.len() - min_success;

        let request = Arc::new(request);
        let metadata = Arc::new(ctx.call_metadata(tenant_id));
        let (tx, mut rx) = mpsc::channel(replicas.len());

        for replica in replicas {
            // Registered directly: the write itself was admitted, its calls must drain too.
            let guard = self.lifecycle.in_flight().enter();
            let caller = self.caller.clone();
            let request = request.clone();
            let metadata = metadata.clone();
            let tx = tx.clone();
            let timeout = self.config.remote_timeout;
            let span = info_span!("replica_write", replica = %replica.addr);

            tokio::spawn(
                async move {
                    let outcome =
                        send_write(&caller, &replica.addr, &metadata, &request, timeout).await;
                    // The receiver is gone once quorum was decided.
                    let _ = tx.send(outcome).await;
                    drop(guard);
                }
                .instrument(span),
            );
        }
        drop(tx);

        let mut succeeded = 0;
        let mut failed = 0;
        // A structured replica response wins over any plain message.
        let mut relayed: Option<ReplicaFailure> = None;
        while let Some(outcome) = rx.recv().await {
            match outcome {
                Ok(()) => {
                    succeeded += 1;
                    if succeeded >= min_success {
                        return Ok(());
                    }
                }
                Err(failure) => {
                    failed += 1;
                    if !relayed.as_ref().is_some_and(ReplicaFailure::is_response) {
                        relayed = Some(failure);
                    }
                    if failed > max_failures {
                        if let Some(failure) = relayed.take() {
                            return Err(respond_from_failure(&failure));
                        }
                    }
                }
            }
        }

        Err(HttpResponse::internal_error("write quorum was not decided"))
    }
}

async fn send_write(
    caller: &ReplicaCaller,
    addr: &str,
    metadata: &CallMetadata,
    request: &HttpRequest,
    timeout: Duration,
) -> Result<(), ReplicaFailure> {
    let failure = match tokio::time::timeout(timeout, caller.call(addr, metadata, request)).await {
        Ok(Ok(response)) if response.is_ok() => return Ok(()),
        Ok(Ok(response)) => {
            caller.record_failure(addr);
            ReplicaFailure::message(format!(
                "replica {} declared an error: {}",
                addr, response.error
            ))
        }
        Ok(Err(failure)) => failure,
        Err(_) => {
            caller.record_failure(addr);
            ReplicaFailure::message(format!(
                "failed to proxy request to replica {}: deadline of {:?} exceeded",
                addr, timeout
            ))
        }
    };

    warn!(replica = addr, error = %failure, "replica write failed");
    Err(failure)
}
