use super::{CallMetadata, ClientPool, ReplicaClient};
use crate::core::{
    DistributorError, HttpRequest, HttpResponse, ReplicaFailure, ReplicaResponse, Result,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Scripted reaction of an in-memory replica.
#[derive(Debug, Clone)]
pub enum ReplicaBehavior {
    /// Answer OK with the given response.
    Respond(HttpResponse),
    /// Answer with a declared non-OK status and message.
    Declare(String),
    /// Fail the call.
    Fail(ReplicaFailure),
    /// Wait, then behave as the inner behaviour.
    Delayed(Duration, Box<ReplicaBehavior>),
}

impl ReplicaBehavior {
    pub fn ok() -> Self {
        Self::Respond(HttpResponse::ok())
    }

    pub fn unreachable() -> Self {
        Self::Fail(ReplicaFailure::message("connection refused"))
    }

    pub fn delayed(delay: Duration, then: ReplicaBehavior) -> Self {
        Self::Delayed(delay, Box::new(then))
    }
}

/// A call observed by an in-memory replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub metadata: CallMetadata,
    pub request: HttpRequest,
}

struct InMemoryReplica {
    behavior: ReplicaBehavior,
    calls: Vec<RecordedCall>,
    completed: usize,
}

type ReplicaTable = Arc<Mutex<HashMap<String, InMemoryReplica>>>;

/// An in-memory implementation of `ClientPool` for testing.
///
/// Replicas are registered by address with a scripted behaviour, and every
/// call they receive is recorded for later inspection.
#[derive(Clone, Default)]
pub struct InMemoryClientPool {
    replicas: ReplicaTable,
}

impl InMemoryClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a replica at `addr`.
    pub fn register_replica(&self, addr: impl Into<String>, behavior: ReplicaBehavior) {
        let mut replicas = self.replicas.lock().unwrap_or_else(PoisonError::into_inner);
        replicas.insert(
            addr.into(),
            InMemoryReplica {
                behavior,
                calls: Vec::new(),
                completed: 0,
            },
        );
    }

    /// Changes the behaviour of a registered replica, keeping its call log.
    pub fn set_behavior(&self, addr: &str, behavior: ReplicaBehavior) -> Result<()> {
        let mut replicas = self.replicas.lock()?;
        let replica = replicas.get_mut(addr).ok_or_else(|| DistributorError::ClientPool {
            addr: addr.to_string(),
            message: "replica is not registered".to_string(),
        })?;
        replica.behavior = behavior;
        Ok(())
    }

    pub fn calls(&self, addr: &str) -> usize {
        self.recorded_calls(addr).len()
    }

    pub fn recorded_calls(&self, addr: &str) -> Vec<RecordedCall> {
        let replicas = self.replicas.lock().unwrap_or_else(PoisonError::into_inner);
        replicas
            .get(addr)
            .map(|replica| replica.calls.clone())
            .unwrap_or_default()
    }

    /// Calls that ran to an outcome; a cancelled call is recorded but never completes.
    pub fn completed_calls(&self, addr: &str) -> usize {
        let replicas = self.replicas.lock().unwrap_or_else(PoisonError::into_inner);
        replicas.get(addr).map_or(0, |replica| replica.completed)
    }

    pub fn total_calls(&self) -> usize {
        let replicas = self.replicas.lock().unwrap_or_else(PoisonError::into_inner);
        replicas.values().map(|replica| replica.calls.len()).sum()
    }
}

impl ClientPool for InMemoryClientPool {
    fn get_client_for(&self, addr: &str) -> Result<Arc<dyn ReplicaClient>> {
        if !self.replicas.lock()?.contains_key(addr) {
            return Err(DistributorError::ClientPool {
                addr: addr.to_string(),
                message: "replica is not registered".to_string(),
            });
        }
        Ok(Arc::new(InMemoryReplicaClient {
            addr: addr.to_string(),
            replicas: self.replicas.clone(),
        }))
    }
}

struct InMemoryReplicaClient {
    addr: String,
    replicas: ReplicaTable,
}

#[async_trait]
impl ReplicaClient for InMemoryReplicaClient {
    async fn handle_request(
        &self,
        metadata: &CallMetadata,
        request: &HttpRequest,
    ) -> std::result::Result<ReplicaResponse, ReplicaFailure> {
        let mut behavior = {
            let mut replicas = self.replicas.lock().unwrap_or_else(PoisonError::into_inner);
            let replica = replicas
                .get_mut(&self.addr)
                .ok_or_else(|| ReplicaFailure::message(format!("replica {} went away", self.addr)))?;
            replica.calls.push(RecordedCall {
                metadata: metadata.clone(),
                request: request.clone(),
            });
            replica.behavior.clone()
        };

        let outcome = loop {
            match behavior {
                ReplicaBehavior::Delayed(delay, then) => {
                    tokio::time::sleep(delay).await;
                    behavior = *then;
                }
                ReplicaBehavior::Respond(response) => break Ok(ReplicaResponse::ok(response)),
                ReplicaBehavior::Declare(message) => break Ok(ReplicaResponse::error(message)),
                ReplicaBehavior::Fail(failure) => break Err(failure),
            }
        };

        let mut replicas = self.replicas.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(replica) = replicas.get_mut(&self.addr) {
            replica.completed += 1;
        }
        outcome
    }

    fn remote_address(&self) -> &str {
        &self.addr
    }
}
