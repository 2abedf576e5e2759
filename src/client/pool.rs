use super::config::ClientConfig;
use super::transport::HttpReplicaClient;
use super::{ClientPool, ReplicaClient};
use crate::core::{DistributorError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type ClientFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn ReplicaClient>> + Send + Sync>;

/// Client pool that creates a client on first use of an address and reuses it afterwards.
pub struct CachedClientPool {
    factory: ClientFactory,
    clients: RwLock<HashMap<String, Arc<dyn ReplicaClient>>>,
}

impl CachedClientPool {
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Pool of HTTP clients sharing one connection pool.
    pub fn http(config: &ClientConfig) -> Result<Self> {
        let http_client = config.build_http_client()?;
        Ok(Self::new(Arc::new(move |addr: &str| {
            Ok(Arc::new(HttpReplicaClient::new(http_client.clone(), addr)) as Arc<dyn ReplicaClient>)
        })))
    }

    /// Number of clients created so far.
    pub fn len(&self) -> usize {
        self.clients.read().map(|clients| clients.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClientPool for CachedClientPool {
    fn get_client_for(&self, addr: &str) -> Result<Arc<dyn ReplicaClient>> {
        if let Some(client) = self.clients.read()?.get(addr) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write()?;
        // Another caller may have created it between the two locks.
        if let Some(client) = clients.get(addr) {
            return Ok(client.clone());
        }
        let client = (self.factory)(addr).map_err(|err| DistributorError::ClientPool {
            addr: addr.to_string(),
            message: err.to_string(),
        })?;
        clients.insert(addr.to_string(), client.clone());
        Ok(client)
    }
}
