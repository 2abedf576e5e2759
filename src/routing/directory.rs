use super::shard_hash::fnv1a_32;
use super::types::{HealthFilter, ReplicaDesc, ReplicaSet, ReplicaState};
use crate::core::{DistributorError, Result};
use crate::service::{FailureReporter, Subservice};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use tracing::{Level, event};

/// Default number of ring tokens owned by each replica.
pub const DEFAULT_TOKENS_PER_REPLICA: usize = 128;

/// Source of replica placement for shard keys.
pub trait ReplicaDirectory: Send + Sync {
    /// Returns the replicas responsible for `key`, in preference order,
    /// restricted to what `filter` allows.
    fn get(&self, key: u32, filter: &HealthFilter) -> Result<ReplicaSet>;

    fn replication_factor(&self) -> usize;
}

struct DirectoryRing {
    replicas: Vec<ReplicaDesc>,
    /// `(token, replica index)` sorted by token.
    tokens: Vec<(u32, usize)>,
}

/// Replica directory over a fixed membership list.
///
/// Every replica owns a set of tokens on a 32-bit hash ring. A lookup walks
/// the ring clockwise from the shard key and collects distinct replicas
/// until the replication factor is reached.
pub struct StaticReplicaDirectory {
    replication_factor: usize,
    ring: RwLock<DirectoryRing>,
    running: AtomicBool,
    reporter: Mutex<Option<FailureReporter>>,
}

impl StaticReplicaDirectory {
    /// Creates a directory where every replica starts ACTIVE.
    pub fn new(replication_factor: usize, addrs: Vec<String>) -> Result<Self> {
        Self::with_tokens(replication_factor, addrs, DEFAULT_TOKENS_PER_REPLICA)
    }

    pub fn with_tokens(
        replication_factor: usize,
        addrs: Vec<String>,
        tokens_per_replica: usize,
    ) -> Result<Self> {
        if replication_factor == 0 {
            return Err(DistributorError::Config(
                "replication_factor must be >= 1".to_string(),
            ));
        }
        if tokens_per_replica == 0 {
            return Err(DistributorError::Config(
                "tokens_per_replica must be >= 1".to_string(),
            ));
        }
        if addrs.is_empty() {
            return Err(DistributorError::Config(
                "replica directory needs at least one replica".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut replicas = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let addr = addr.trim().to_string();
            if addr.is_empty() {
                return Err(DistributorError::Config(
                    "replica address must not be empty".to_string(),
                ));
            }
            if !seen.insert(addr.clone()) {
                return Err(DistributorError::Config(format!(
                    "replica '{}' appears more than once",
                    addr
                )));
            }
            replicas.push(ReplicaDesc::new(addr, ReplicaState::Active));
        }

        let mut tokens = Vec::with_capacity(replicas.len() * tokens_per_replica);
        for (index, replica) in replicas.iter().enumerate() {
            for n in 0..tokens_per_replica {
                let token = fnv1a_32(format!("{}#{}", replica.addr, n).as_bytes());
                tokens.push((token, index));
            }
        }
        tokens.sort_unstable();

        Ok(Self {
            replication_factor,
            ring: RwLock::new(DirectoryRing { replicas, tokens }),
            running: AtomicBool::new(false),
            reporter: Mutex::new(None),
        })
    }

    /// Updates the health state of a replica.
    pub fn set_state(&self, addr: &str, state: ReplicaState) -> Result<()> {
        let mut ring = self.ring.write()?;
        let replica = ring
            .replicas
            .iter_mut()
            .find(|replica| replica.addr == addr)
            .ok_or_else(|| {
                DistributorError::DirectoryUnavailable(format!("replica '{}' is not registered", addr))
            })?;
        replica.state = state;
        Ok(())
    }

    /// Snapshot of all known replicas in registration order.
    pub fn replicas(&self) -> Result<Vec<ReplicaDesc>> {
        Ok(self.ring.read()?.replicas.clone())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Marks the directory as failed and notifies the owning service.
    pub fn report_failure(&self, message: impl Into<String>) {
        let message = message.into();
        event!(Level::ERROR, error = %message, "replica directory failure");
        self.running.store(false, Ordering::SeqCst);
        if let Ok(reporter) = self.reporter.lock() {
            if let Some(reporter) = reporter.as_ref() {
                reporter.report(self.name(), message);
            }
        }
    }
}

impl ReplicaDirectory for StaticReplicaDirectory {
    fn get(&self, key: u32, filter: &HealthFilter) -> Result<ReplicaSet> {
        if !self.is_running() {
            return Err(DistributorError::DirectoryUnavailable(
                "replica directory is not running".to_string(),
            ));
        }

        let ring = self.ring.read()?;
        let start = ring.tokens.partition_point(|(token, _)| *token < key);
        let mut remaining = self.replication_factor;
        let mut seen = HashSet::new();
        let mut replicas = Vec::with_capacity(self.replication_factor);

        for offset in 0..ring.tokens.len() {
            if remaining == 0 {
                break;
            }
            let (_, index) = ring.tokens[(start + offset) % ring.tokens.len()];
            if !seen.insert(index) {
                continue;
            }
            let replica = &ring.replicas[index];
            if filter.is_eligible(replica.state) {
                replicas.push(replica.clone());
                remaining -= 1;
            } else if !filter.extends_on_ineligible() {
                // The ineligible replica keeps its slot; no substitute is looked up.
                remaining -= 1;
            }
        }

        if replicas.is_empty() {
            return Err(DistributorError::DirectoryUnavailable(format!(
                "no eligible replicas for key {}",
                key
            )));
        }
        Ok(ReplicaSet::new(replicas))
    }

    fn replication_factor(&self) -> usize {
        self.replication_factor
    }
}

#[async_trait]
impl Subservice for StaticReplicaDirectory {
    fn name(&self) -> &str {
        "replica-directory"
    }

    async fn start(&self, reporter: FailureReporter) -> Result<()> {
        *self.reporter.lock()? = Some(reporter);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        self.reporter.lock()?.take();
        Ok(())
    }
}
