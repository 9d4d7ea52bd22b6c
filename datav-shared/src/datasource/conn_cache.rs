/// Datasource connection cache
///
/// Query plugins need a live connection to the system behind a datasource.
/// Connections are created on first use and then shared for the lifetime of
/// the process.
///
/// Lookup and creation happen under one async mutex, so concurrent callers
/// asking for the same datasource wait for the first connect instead of
/// racing it. There is no eviction and no health checking; a failed connect
/// caches nothing and the next caller retries.

use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;
use tracing::info;

/// Map from datasource ID to a shared connection handle
pub struct ConnCache<C> {
    conns: Mutex<HashMap<i64, C>>,
}

impl<C: Clone> ConnCache<C> {
    pub fn new() -> Self {
        Self {
            conns: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached connection or creates it with `connect`
    pub async fn get_or_connect<F, Fut, E>(&self, datasource_id: i64, connect: F) -> Result<C, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, E>>,
    {
        let mut conns = self.conns.lock().await;

        if let Some(conn) = conns.get(&datasource_id) {
            return Ok(conn.clone());
        }

        let conn = connect().await?;
        conns.insert(datasource_id, conn.clone());
        info!(datasource_id, "Opened datasource connection");
        Ok(conn)
    }

    pub async fn len(&self) -> usize {
        self.conns.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conns.lock().await.is_empty()
    }
}

impl<C: Clone> Default for ConnCache<C> {
    fn default() -> Self {
        Self::new()
    }
}
