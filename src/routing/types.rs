use serde::{Deserialize, Serialize};
use std::fmt;

/// Health state of a replica as tracked by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicaState {
    Pending,
    Joining,
    Active,
    Leaving,
    Left,
    Unhealthy,
}

impl fmt::Display for ReplicaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplicaState::Pending => "PENDING",
            ReplicaState::Joining => "JOINING",
            ReplicaState::Active => "ACTIVE",
            ReplicaState::Leaving => "LEAVING",
            ReplicaState::Left => "LEFT",
            ReplicaState::Unhealthy => "UNHEALTHY",
        };
        f.write_str(name)
    }
}

/// A replica known to the directory. Read-only from the distributor's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaDesc {
    pub addr: String,
    pub state: ReplicaState,
}

impl ReplicaDesc {
    pub fn new(addr: impl Into<String>, state: ReplicaState) -> Self {
        Self {
            addr: addr.into(),
            state,
        }
    }
}

/// Ordered replicas responsible for one shard key, fetched per routing decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaSet {
    pub replicas: Vec<ReplicaDesc>,
}

impl ReplicaSet {
    pub fn new(replicas: Vec<ReplicaDesc>) -> Self {
        Self { replicas }
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn first(&self) -> Option<&ReplicaDesc> {
        self.replicas.first()
    }

    pub fn addrs(&self) -> Vec<&str> {
        self.replicas.iter().map(|r| r.addr.as_str()).collect()
    }
}

impl IntoIterator for ReplicaSet {
    type Item = ReplicaDesc;
    type IntoIter = std::vec::IntoIter<ReplicaDesc>;

    fn into_iter(self) -> Self::IntoIter {
        self.replicas.into_iter()
    }
}

/// Which replicas may receive fresh requests.
///
/// Built once by the distributor and passed to every directory query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthFilter {
    eligible: Vec<ReplicaState>,
    extend_on_ineligible: bool,
}

impl HealthFilter {
    pub fn new(eligible: Vec<ReplicaState>, extend_on_ineligible: bool) -> Self {
        Self {
            eligible,
            extend_on_ineligible,
        }
    }

    /// Only ACTIVE replicas serve; any other replica is skipped and the
    /// directory looks further along the ring for a substitute.
    pub fn active_only() -> Self {
        Self::new(vec![ReplicaState::Active], true)
    }

    pub fn is_eligible(&self, state: ReplicaState) -> bool {
        self.eligible.contains(&state)
    }

    /// Whether an ineligible replica should be replaced rather than leave its slot empty.
    pub fn extends_on_ineligible(&self) -> bool {
        self.extend_on_ineligible
    }
}

/// Minimum number of acknowledgements for a strict majority of `replication_factor`.
pub fn quorum_for(replication_factor: usize) -> usize {
    replication_factor / 2 + 1
}
