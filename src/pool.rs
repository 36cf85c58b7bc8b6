//! Connection pooling.
//!
//! A bounded pool of lazily created connections to one endpoint. Checkout is
//! guarded by a semaphore sized to `max_size`; the returned
//! [`PooledConnection`] goes back to the pool when dropped, or is discarded
//! if a transport failure broke it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::connection::Connection;
use crate::error::{Error, Result};

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful borrows.
    pub acquired: u64,
    /// Borrows that failed (connect error, timeout, closed pool).
    pub failed: u64,
    /// Connections handed back to the idle stack.
    pub released: u64,
    /// Connections dropped instead of being reused.
    pub discarded: u64,
    /// Connections currently idle.
    pub idle: usize,
    /// Configured capacity.
    pub max_size: usize,
}

/// A pool of reusable connections to one store endpoint.
pub struct Pool {
    name: String,
    config: EndpointConfig,
    connections: Mutex<Vec<Connection>>,
    semaphore: Arc<Semaphore>,
    max_size: usize,
    acquire_timeout: Option<Duration>,
    closed: AtomicBool,
    acquired: AtomicU64,
    failed: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

impl Pool {
    /// Create a pool for `config`. No connection is opened until first use.
    ///
    /// `name` labels the pool in logs (`"master"`, `"replica"`).
    pub fn new(name: impl Into<String>, config: EndpointConfig) -> Self {
        let max_size = config.pool.max_size.max(1);
        Self {
            name: name.into(),
            acquire_timeout: config.pool.acquire_timeout,
            connections: Mutex::new(Vec::with_capacity(max_size)),
            semaphore: Arc::new(Semaphore::new(max_size)),
            max_size,
            config,
            closed: AtomicBool::new(false),
            acquired: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            released: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Pool label used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The endpoint this pool connects to.
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.config
    }

    /// Borrow a connection.
    ///
    /// Reuses an idle connection when one exists, otherwise opens a new one.
    /// Waits while all `max_size` connections are checked out, up to the
    /// configured acquire timeout.
    pub async fn get(&self) -> Result<PooledConnection<'_>> {
        let result = self.checkout().await;
        match result {
            Ok(_) => self.acquired.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    async fn checkout(&self) -> Result<PooledConnection<'_>> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let acquire = self.semaphore.clone().acquire_owned();
        let permit = match self.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, acquire)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => acquire.await,
        }
        .map_err(|_| Error::PoolClosed)?;

        let idle = { self.connections.lock().pop() };
        let conn = match idle {
            Some(c) => c,
            None => {
                debug!(pool = %self.name, addr = %self.config.addr(), "opening connection");
                Connection::connect(&self.config).await?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: self,
            _permit: permit,
        })
    }

    fn put_back(&self, conn: Connection) {
        if conn.is_broken() || self.is_closed() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            if conn.is_broken() {
                warn!(pool = %self.name, "discarding broken connection");
            }
            return;
        }
        self.released.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().push(conn);
    }

    /// Current number of idle connections sitting in the pool.
    pub fn idle_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle: self.idle_count(),
            max_size: self.max_size,
        }
    }

    /// Close the pool: drop idle connections and fail future borrows.
    ///
    /// Connections still checked out are dropped when their guard is.
    /// Calling this more than once has no further effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.semaphore.close();
        let dropped = {
            let mut idle = self.connections.lock();
            let n = idle.len();
            idle.clear();
            n
        };
        debug!(pool = %self.name, dropped, "pool closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A connection checked out from a [`Pool`].
///
/// Dropping it returns the connection to the pool, or discards it when it is
/// broken or the pool has been closed.
pub struct PooledConnection<'a> {
    conn: Option<Connection>,
    pool: &'a Pool,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl<'a> PooledConnection<'a> {
    /// Name of the pool this connection came from.
    pub fn pool_name(&self) -> &str {
        self.pool.name()
    }

    /// Drop the connection instead of returning it to the pool.
    pub fn discard(mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.mark_broken();
            self.pool.put_back(conn);
        }
    }
}

impl<'a> Drop for PooledConnection<'a> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}

#[allow(clippy::expect_used)]
impl<'a> std::ops::Deref for PooledConnection<'a> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection taken")
    }
}

#[allow(clippy::expect_used)]
impl<'a> std::ops::DerefMut for PooledConnection<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection taken")
    }
}
