use crate::core::{DistributorError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{Level, event};

/// A dependency whose lifetime is bound to the distributor's.
#[async_trait]
pub trait Subservice: Send + Sync {
    fn name(&self) -> &str;

    /// Starts the subservice and returns once it is healthy.
    ///
    /// The reporter stays valid for the subservice's lifetime; failures found
    /// after startup are sent through it.
    async fn start(&self, reporter: FailureReporter) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

/// A failure raised by a subservice after it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubserviceFailure {
    pub name: String,
    pub message: String,
}

impl From<SubserviceFailure> for DistributorError {
    fn from(failure: SubserviceFailure) -> Self {
        DistributorError::Subservice {
            name: failure.name,
            message: failure.message,
        }
    }
}

/// Channel handle subservices use to report asynchronous failures.
#[derive(Debug, Clone)]
pub struct FailureReporter {
    tx: mpsc::UnboundedSender<SubserviceFailure>,
}

impl FailureReporter {
    pub fn report(&self, name: impl Into<String>, message: impl Into<String>) {
        let failure = SubserviceFailure {
            name: name.into(),
            message: message.into(),
        };
        // The watcher outlives every reporter it hands out; a closed channel
        // only happens during teardown and there is no one left to tell.
        let _ = self.tx.send(failure);
    }
}

/// Starts, watches and stops a fixed group of subservices.
pub struct SubserviceManager {
    services: Vec<Arc<dyn Subservice>>,
    reporter: FailureReporter,
    failures: Mutex<mpsc::UnboundedReceiver<SubserviceFailure>>,
}

impl SubserviceManager {
    pub fn new(services: Vec<Arc<dyn Subservice>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            services,
            reporter: FailureReporter { tx },
            failures: Mutex::new(rx),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name().to_string()).collect()
    }

    /// Starts every subservice in order and waits for each to be healthy.
    ///
    /// Fail-fast: the first error stops whatever already started and is returned.
    pub async fn start_and_await_healthy(&self) -> Result<()> {
        for (started, service) in self.services.iter().enumerate() {
            if let Err(err) = service.start(self.reporter.clone()).await {
                self.stop_services(&self.services[..started]).await;
                return Err(DistributorError::Subservice {
                    name: service.name().to_string(),
                    message: err.to_string(),
                });
            }
        }

        let early_failure = self.failures.lock().await.try_recv().ok();
        if let Some(failure) = early_failure {
            self.stop_services(&self.services).await;
            return Err(failure.into());
        }
        Ok(())
    }

    /// Stops every subservice in reverse start order.
    ///
    /// All of them are asked to stop even if one fails; the first error is returned.
    pub async fn stop_and_await_stopped(&self) -> Result<()> {
        let mut first_err = None;
        for service in self.services.iter().rev() {
            if let Err(err) = service.stop().await {
                event!(Level::ERROR, subservice = service.name(), error = %err, "subservice failed to stop");
                if first_err.is_none() {
                    first_err = Some(DistributorError::Subservice {
                        name: service.name().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Resolves with the next failure reported by any subservice.
    pub async fn next_failure(&self) -> SubserviceFailure {
        let mut failures = self.failures.lock().await;
        match failures.recv().await {
            Some(failure) => failure,
            // The manager keeps a sender alive, so the channel never closes while it exists.
            None => std::future::pending().await,
        }
    }

    /// Returns a failure that was already reported, without waiting.
    pub async fn pending_failure(&self) -> Option<SubserviceFailure> {
        self.failures.lock().await.try_recv().ok()
    }

    async fn stop_services(&self, services: &[Arc<dyn Subservice>]) {
        for service in services.iter().rev() {
            if let Err(err) = service.stop().await {
                event!(Level::WARN, subservice = service.name(), error = %err, "subservice failed to stop after startup error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct Recording {
        name: String,
        fail_start: bool,
        log: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Subservice for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        async fn start(&self, _reporter: FailureReporter) -> Result<()> {
            self.log.lock()?.push(format!("start {}", self.name));
            if self.fail_start {
                return Err(DistributorError::Config("boom".to_string()));
            }
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.log.lock()?.push(format!("stop {}", self.name));
            Ok(())
        }
    }

    fn recording(name: &str, fail_start: bool, log: &Arc<StdMutex<Vec<String>>>) -> Arc<dyn Subservice> {
        Arc::new(Recording {
            name: name.to_string(),
            fail_start,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn start_failure_stops_already_started_services() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let manager = SubserviceManager::new(vec![
            recording("ring", false, &log),
            recording("kv", true, &log),
            recording("never", false, &log),
        ]);

        let err = manager.start_and_await_healthy().await.unwrap_err();
        assert!(err.to_string().contains("'kv'"), "unexpected error: {err}");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start ring", "start kv", "stop ring"]
        );
    }

    #[tokio::test]
    async fn stop_runs_in_reverse_order() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let manager = SubserviceManager::new(vec![
            recording("first", false, &log),
            recording("second", false, &log),
        ]);
        manager.start_and_await_healthy().await.unwrap();
        manager.stop_and_await_stopped().await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start first", "start second", "stop second", "stop first"]
        );
    }

    #[tokio::test]
    async fn reported_failures_reach_the_watcher() {
        let manager = SubserviceManager::new(Vec::new());
        manager.reporter.report("ring", "heartbeat lost");
        let failure = manager.next_failure().await;
        assert_eq!(failure.name, "ring");
        assert_eq!(failure.message, "heartbeat lost");
    }
}
