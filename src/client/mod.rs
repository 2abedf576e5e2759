//! Replica clients and the pool that hands them out.

pub mod config;
pub mod in_memory;
pub mod pool;
pub mod transport;

use crate::core::{HttpRequest, ReplicaFailure, ReplicaResponse, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub use config::ClientConfig;
pub use in_memory::{InMemoryClientPool, RecordedCall, ReplicaBehavior};
pub use pool::{CachedClientPool, ClientFactory};
pub use transport::HttpReplicaClient;

/// Header carrying the tenant identity to replicas.
pub const ORG_ID_HEADER: &str = "X-Scope-OrgID";
/// W3C trace-context header used for span correlation.
pub const TRACEPARENT_HEADER: &str = "traceparent";
/// Header carrying the original client address chain.
pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// Per-call metadata forwarded alongside the request envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallMetadata {
    pub org_id: String,
    pub trace_parent: Option<String>,
    pub source_ips: Option<String>,
}

impl CallMetadata {
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            ..Self::default()
        }
    }

    /// Metadata rendered as outbound headers.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![(ORG_ID_HEADER, self.org_id.clone())];
        if let Some(trace_parent) = &self.trace_parent {
            headers.push((TRACEPARENT_HEADER, trace_parent.clone()));
        }
        if let Some(source_ips) = &self.source_ips {
            headers.push((FORWARDED_FOR_HEADER, source_ips.clone()));
        }
        headers
    }
}

/// Unary request/response transport to a single replica.
#[async_trait]
pub trait ReplicaClient: Send + Sync {
    /// Sends one request. Failures are classified here, at the point they happen.
    async fn handle_request(
        &self,
        metadata: &CallMetadata,
        request: &HttpRequest,
    ) -> std::result::Result<ReplicaResponse, ReplicaFailure>;

    /// Address of the remote end, for diagnostics.
    fn remote_address(&self) -> &str;
}

/// Shared source of replica clients, one per address.
pub trait ClientPool: Send + Sync {
    fn get_client_for(&self, addr: &str) -> Result<Arc<dyn ReplicaClient>>;
}
