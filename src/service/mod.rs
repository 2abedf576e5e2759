pub mod in_flight;
pub mod lifecycle;
pub mod state;
pub mod subservice;

pub use in_flight::{InFlight, InFlightGuard};
pub use lifecycle::LifecycleController;
pub use state::ServiceState;
pub use subservice::{FailureReporter, Subservice, SubserviceFailure, SubserviceManager};
