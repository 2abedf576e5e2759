// ============================================================================
// alertdist Library
// ============================================================================

pub mod client;
pub mod core;
pub mod distributor;
pub mod routing;
pub mod service;
pub mod web;

// Re-export main types for convenience
pub use core::{DistributorError, HttpRequest, HttpResponse, Result};
pub use distributor::{
    Distributor, DistributorConfig, DistributorWorker, RequestContext, is_path_supported,
    spawn_distributor,
};
pub use routing::{ReplicaDirectory, StaticReplicaDirectory, shard_by_tenant};
