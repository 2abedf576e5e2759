// Replica placement: tenant hashing, replica health and directory lookups.
pub mod directory;
pub mod shard_hash;
pub mod types;

pub use directory::{DEFAULT_TOKENS_PER_REPLICA, ReplicaDirectory, StaticReplicaDirectory};
pub use shard_hash::{fnv1a_32, shard_by_tenant};
pub use types::{HealthFilter, ReplicaDesc, ReplicaSet, ReplicaState, quorum_for};
