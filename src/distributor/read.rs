use super::Distributor;
use super::context::RequestContext;
use super::respond::respond_from_failure;
use crate::core::{HttpRequest, HttpResponse, ReplicaFailure};
use crate::routing::shard_by_tenant;
use tracing::{Level, event};

impl Distributor {
    /// Proxies `request` to the first replica of the tenant's set.
    ///
    /// There is no fallback to the other replicas and no merging of results.
    /// The call is bound to the caller: dropping the returned future cancels
    /// it, and the context deadline (if any) limits it.
    pub async fn read(
        &self,
        ctx: &RequestContext,
        request: HttpRequest,
    ) -> Result<HttpResponse, HttpResponse> {
        let tenant_id = self.authenticate(ctx)?;
        let _guard = self.admit()?;

        let key = shard_by_tenant(tenant_id);
        let replicas = self
            .directory
            .get(key, &self.health_filter)
            .map_err(|err| {
                event!(Level::ERROR, tenant = tenant_id, error = %err, "failed to get replica set for read");
                HttpResponse::internal_error(err.to_string())
            })?;
        let replica = replicas.first().ok_or_else(|| {
            event!(Level::ERROR, tenant = tenant_id, "replica set for read is empty");
            HttpResponse::internal_error("no replicas available for read")
        })?;

        let metadata = ctx.call_metadata(tenant_id);
        let call = self.caller.call(&replica.addr, &metadata, &request);
        let outcome = match ctx.deadline() {
            Some(deadline) => match tokio::time::timeout(deadline, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.caller.record_failure(&replica.addr);
                    Err(ReplicaFailure::message(format!(
                        "failed to proxy request to replica {}: deadline of {:?} exceeded",
                        replica.addr, deadline
                    )))
                }
            },
            None => call.await,
        };

        let response = outcome.map_err(|failure| {
            event!(Level::WARN, replica = %replica.addr, error = %failure, "replica read failed");
            respond_from_failure(&failure)
        })?;

        if !response.is_ok() {
            self.caller.record_failure(&replica.addr);
            event!(Level::WARN, replica = %replica.addr, error = %response.error, "replica declared a read error");
            return Err(HttpResponse::internal_error(response.error));
        }

        match response.http_response {
            Some(upstream) => Ok(HttpResponse::new(upstream.code, upstream.body)),
            None => {
                event!(Level::ERROR, replica = %replica.addr, "replica returned no response for read");
                Err(HttpResponse::internal_error(format!(
                    "empty response from replica {}",
                    replica.addr
                )))
            }
        }
    }
}
