pub mod envelope;
pub mod error;

pub use envelope::{
    HttpHeader, HttpRequest, HttpResponse, ReplicaResponse, ReplicaStatus, STATUS_INTERNAL_SERVER_ERROR,
    STATUS_NOT_FOUND, STATUS_OK, STATUS_SERVICE_UNAVAILABLE, STATUS_UNAUTHORIZED, headers_from_map,
};
pub use error::{DistributorError, ReplicaFailure, Result};
