use super::Distributor;
use crate::core::{DistributorError, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Running distributor service.
pub struct DistributorWorker {
    distributor: Arc<Distributor>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl DistributorWorker {
    pub fn distributor(&self) -> &Arc<Distributor> {
        &self.distributor
    }

    /// Signals the distributor to stop and waits until it has drained and stopped.
    pub async fn stop(mut self) -> Result<()> {
        self.distributor.stop();
        self.join().await
    }

    /// Waits for the distributor to stop on its own, e.g. after a subservice failure.
    pub async fn wait(mut self) -> Result<()> {
        self.join().await
    }

    async fn join(&mut self) -> Result<()> {
        match self.join_handle.take() {
            Some(join_handle) => join_handle.await.map_err(|err| {
                DistributorError::ExecutionError(format!("distributor worker join: {}", err))
            })?,
            None => Ok(()),
        }
    }
}

impl Drop for DistributorWorker {
    fn drop(&mut self) {
        if self.join_handle.is_some() {
            self.distributor.stop();
        }
    }
}

/// Starts the distributor and runs it on a background task.
///
/// Startup failures are returned directly; nothing is spawned in that case.
pub async fn spawn_distributor(distributor: Arc<Distributor>) -> Result<DistributorWorker> {
    distributor.start().await?;

    let runner = distributor.clone();
    let join_handle = tokio::spawn(async move { runner.run().await });

    Ok(DistributorWorker {
        distributor,
        join_handle: Some(join_handle),
    })
}
