use super::in_flight::{InFlight, InFlightGuard};
use super::state::ServiceState;
use super::subservice::{SubserviceFailure, SubserviceManager};
use crate::core::{DistributorError, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{Level, event, info};

/// Drives the distributor through its service states.
///
/// Stop ordering is strict: admission closes, in-flight requests drain to
/// zero, and only then are subservices torn down, since replica selection
/// during the drain depends on them.
pub struct LifecycleController {
    state: watch::Sender<ServiceState>,
    stop_requested: watch::Sender<bool>,
    in_flight: Arc<InFlight>,
    subservices: SubserviceManager,
    failure: Mutex<Option<String>>,
}

impl LifecycleController {
    pub fn new(subservices: SubserviceManager) -> Self {
        let (state, _) = watch::channel(ServiceState::Idle);
        let (stop_requested, _) = watch::channel(false);
        Self {
            state,
            stop_requested,
            in_flight: InFlight::new(),
            subservices,
            failure: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    /// Registers a request if the service is running.
    pub fn admit(&self) -> Result<InFlightGuard> {
        // Register first, then check: once `run` has observed Stopping, any
        // request that saw Running is already counted and will be drained.
        let guard = self.in_flight.enter();
        let state = self.state();
        if !state.accepts_requests() {
            return Err(DistributorError::NotRunning(state.to_string()));
        }
        Ok(guard)
    }

    /// Starts all subservices. Any failure fails the whole service.
    pub async fn start(&self) -> Result<()> {
        self.transition(ServiceState::Idle, ServiceState::Starting)?;
        info!(subservices = ?self.subservices.names(), "starting distributor");

        match self.subservices.start_and_await_healthy().await {
            Ok(()) => {
                self.transition(ServiceState::Starting, ServiceState::Running)?;
                info!("distributor running");
                Ok(())
            }
            Err(err) => {
                event!(Level::ERROR, error = %err, "distributor failed to start");
                self.record_failure(&err);
                self.transition(ServiceState::Starting, ServiceState::Failed)?;
                Err(err)
            }
        }
    }

    /// Blocks until stop is requested or a subservice fails, then drains and stops.
    pub async fn run(&self) -> Result<()> {
        let state = self.state();
        if state != ServiceState::Running {
            return Err(DistributorError::NotRunning(state.to_string()));
        }

        let mut stop_rx = self.stop_requested.subscribe();
        let failure: Option<SubserviceFailure> = tokio::select! {
            _ = async {
                let _ = stop_rx.wait_for(|requested| *requested).await;
            } => None,
            failure = self.subservices.next_failure() => Some(failure),
        };

        self.transition(ServiceState::Running, ServiceState::Stopping)?;
        if let Some(failure) = &failure {
            log_subservice_failure(failure, "subservice failed, stopping distributor");
        }

        info!(in_flight = self.in_flight.count(), "draining in-flight requests");
        let mut failure = failure;
        if failure.is_none() {
            // Failures are still watched while draining.
            tokio::select! {
                _ = self.in_flight.wait_idle() => {}
                late = self.subservices.next_failure() => {
                    log_subservice_failure(&late, "subservice failed while draining");
                    failure = Some(late);
                    self.in_flight.wait_idle().await;
                }
            }
        } else {
            self.in_flight.wait_idle().await;
        }

        let stopped = self.subservices.stop_and_await_stopped().await;
        if failure.is_none() {
            if let Some(late) = self.subservices.pending_failure().await {
                log_subservice_failure(&late, "subservice failed during teardown");
                failure = Some(late);
            }
        }
        match (failure, stopped) {
            (None, Ok(())) => {
                self.transition(ServiceState::Stopping, ServiceState::Stopped)?;
                info!("distributor stopped");
                Ok(())
            }
            (Some(failure), _) => {
                let err = DistributorError::from(failure);
                self.record_failure(&err);
                self.transition(ServiceState::Stopping, ServiceState::Failed)?;
                Err(err)
            }
            (None, Err(err)) => {
                self.record_failure(&err);
                self.transition(ServiceState::Stopping, ServiceState::Failed)?;
                Err(err)
            }
        }
    }

    /// Requests a stop. Idempotent; observed by `run`.
    pub fn stop(&self) {
        self.stop_requested.send_replace(true);
    }

    /// Waits until the service reaches Stopped or Failed.
    pub async fn await_terminated(&self) -> Result<()> {
        let mut state_rx = self.state.subscribe();
        let terminal = *state_rx
            .wait_for(|state| state.is_terminal())
            .await
            .map_err(|err| DistributorError::ExecutionError(err.to_string()))?;

        match terminal {
            ServiceState::Failed => {
                let message = self
                    .failure
                    .lock()?
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string());
                Err(DistributorError::ExecutionError(message))
            }
            _ => Ok(()),
        }
    }

    fn transition(&self, from: ServiceState, to: ServiceState) -> Result<()> {
        let mut actual = from;
        let changed = self.state.send_if_modified(|current| {
            actual = *current;
            if *current == from && from.can_transition_to(to) {
                *current = to;
                true
            } else {
                false
            }
        });

        if changed {
            Ok(())
        } else {
            Err(DistributorError::InvalidTransition(format!(
                "{} -> {} (current state: {})",
                from, to, actual
            )))
        }
    }

    fn record_failure(&self, err: &DistributorError) {
        if let Ok(mut failure) = self.failure.lock() {
            if failure.is_none() {
                *failure = Some(err.to_string());
            }
        }
    }
}

fn log_subservice_failure(failure: &SubserviceFailure, message: &str) {
    event!(
        Level::ERROR,
        subservice = %failure.name,
        error = %failure.message,
        "{}",
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::subservice::{FailureReporter, Subservice};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Noop;

    #[async_trait]
    impl Subservice for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn start(&self, _reporter: FailureReporter) -> Result<()> {
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Watched {
        reporter: Mutex<Option<FailureReporter>>,
    }

    #[async_trait]
    impl Subservice for Watched {
        fn name(&self) -> &str {
            "ring"
        }

        async fn start(&self, reporter: FailureReporter) -> Result<()> {
            *self.reporter.lock()? = Some(reporter);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }
    }

    fn controller() -> Arc<LifecycleController> {
        Arc::new(LifecycleController::new(SubserviceManager::new(vec![
            Arc::new(Noop) as Arc<dyn Subservice>,
        ])))
    }

    #[tokio::test]
    async fn admission_is_refused_before_start() {
        let lifecycle = controller();
        let err = lifecycle.admit().unwrap_err();
        assert!(matches!(err, DistributorError::NotRunning(_)));
        assert_eq!(lifecycle.in_flight().count(), 0);
    }

    #[tokio::test]
    async fn start_twice_is_an_invalid_transition() {
        let lifecycle = controller();
        lifecycle.start().await.unwrap();
        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, DistributorError::InvalidTransition(_)));
        assert_eq!(lifecycle.state(), ServiceState::Running);
    }

    #[tokio::test]
    async fn stop_waits_for_registered_requests() {
        let lifecycle = controller();
        lifecycle.start().await.unwrap();
        let guard = lifecycle.admit().unwrap();

        let runner = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.run().await })
        };
        lifecycle.stop();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(lifecycle.state(), ServiceState::Stopping);
        assert!(lifecycle.admit().is_err());

        drop(guard);
        runner.await.unwrap().unwrap();
        assert_eq!(lifecycle.state(), ServiceState::Stopped);
        lifecycle.await_terminated().await.unwrap();
    }

    #[tokio::test]
    async fn failure_reported_while_draining_fails_the_service() {
        let ring = Arc::new(Watched::default());
        let lifecycle = Arc::new(LifecycleController::new(SubserviceManager::new(vec![
            ring.clone() as Arc<dyn Subservice>,
        ])));
        lifecycle.start().await.unwrap();
        let guard = lifecycle.admit().unwrap();

        let runner = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.run().await })
        };
        lifecycle.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(lifecycle.state(), ServiceState::Stopping);

        let reporter = ring.reporter.lock().unwrap().clone().unwrap();
        reporter.report("ring", "kv store lost during drain");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!runner.is_finished());

        drop(guard);
        let err = runner.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("kv store lost during drain"));
        assert_eq!(lifecycle.state(), ServiceState::Failed);
        assert!(lifecycle.await_terminated().await.is_err());
    }
}
