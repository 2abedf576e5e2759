use crate::client::CallMetadata;
use crate::core::{DistributorError, Result};
use std::time::Duration;

/// Caller-side facts about an inbound request.
///
/// The tenant is optional here because extraction happens outside the
/// distributor; a missing tenant is rejected before any replica is touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    tenant_id: Option<String>,
    trace_parent: Option<String>,
    source_ips: Option<String>,
    deadline: Option<Duration>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self::new().with_tenant(tenant_id)
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        let tenant_id = tenant_id.into();
        self.tenant_id = (!tenant_id.is_empty()).then_some(tenant_id);
        self
    }

    pub fn with_trace_parent(mut self, trace_parent: impl Into<String>) -> Self {
        self.trace_parent = Some(trace_parent.into());
        self
    }

    pub fn with_source_ips(mut self, source_ips: impl Into<String>) -> Self {
        self.source_ips = Some(source_ips.into());
        self
    }

    /// Bounds the single call made by a read. Writes use their own deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn tenant_id(&self) -> Result<&str> {
        self.tenant_id
            .as_deref()
            .ok_or_else(|| DistributorError::Authentication("no org id".to_string()))
    }

    pub fn trace_parent(&self) -> Option<&str> {
        self.trace_parent.as_deref()
    }

    pub fn source_ips(&self) -> Option<&str> {
        self.source_ips.as_deref()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub(crate) fn call_metadata(&self, tenant_id: &str) -> CallMetadata {
        CallMetadata {
            org_id: tenant_id.to_string(),
            trace_parent: self.trace_parent.clone(),
            source_ips: self.source_ips.clone(),
        }
    }
}
