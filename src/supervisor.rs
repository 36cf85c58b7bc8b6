//! Master/replica pool ownership and routing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::FacadeConfig;
use crate::error::{Error, Result};
use crate::policy::Routing;
use crate::pool::{Pool, PooledConnection};

/// Owns the master and replica pools and decides which one serves a call.
///
/// When only a master is configured the replica slot holds the same pool, so
/// reads and writes share one set of connections.
pub struct ConnectionSupervisor {
    master: Option<Arc<Pool>>,
    replica: Option<Arc<Pool>>,
    closed: AtomicBool,
}

impl ConnectionSupervisor {
    /// Build pools from configuration. Connections open lazily.
    pub fn from_config(config: &FacadeConfig) -> Self {
        let master = Arc::new(Pool::new("master", config.master.clone()));
        let replica = config
            .replica
            .as_ref()
            .map(|endpoint| Arc::new(Pool::new("replica", endpoint.clone())));
        Self::new(Some(master), replica)
    }

    /// Build from existing pools. A missing replica aliases the master.
    pub fn new(master: Option<Arc<Pool>>, replica: Option<Arc<Pool>>) -> Self {
        let replica = replica.or_else(|| master.clone());
        Self {
            master,
            replica,
            closed: AtomicBool::new(false),
        }
    }

    /// The master pool, if set.
    pub fn master(&self) -> Option<&Arc<Pool>> {
        self.master.as_ref()
    }

    /// The replica pool, if set. Same instance as master when aliased.
    pub fn replica(&self) -> Option<&Arc<Pool>> {
        self.replica.as_ref()
    }

    /// Whether reads share the master pool.
    pub fn replica_is_master(&self) -> bool {
        match (&self.master, &self.replica) {
            (Some(m), Some(r)) => Arc::ptr_eq(m, r),
            _ => false,
        }
    }

    /// Borrow a connection using the given routing strategy.
    pub async fn acquire(&self, routing: Routing) -> Result<PooledConnection<'_>> {
        match routing {
            Routing::ReadPreferReplica => self.acquire_for_read().await,
            Routing::WriteOnly => self.acquire_for_write().await,
        }
    }

    /// Borrow for a read: replica first, then master exactly once.
    pub async fn acquire_for_read(&self) -> Result<PooledConnection<'_>> {
        let replica_err = match self.replica.as_deref() {
            Some(replica) => match replica.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => e,
            },
            None => {
                let master = self
                    .master
                    .as_deref()
                    .ok_or(Error::ConnectionUnavailable("no master or replica pool set"))?;
                return master.get().await;
            }
        };

        match self.master.as_deref() {
            Some(master) => {
                warn!(error = %replica_err, "cannot get connection from replica, trying master");
                master.get().await
            }
            None => Err(replica_err),
        }
    }

    /// Borrow for a write: master only.
    pub async fn acquire_for_write(&self) -> Result<PooledConnection<'_>> {
        let master = self
            .master
            .as_deref()
            .ok_or(Error::ConnectionUnavailable("master pool not set"))?;
        master.get().await
    }

    /// Close the replica pool (when distinct) and then the master pool.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.replica_is_master() {
            if let Some(ref replica) = self.replica {
                replica.close();
            }
        }
        if let Some(ref master) = self.master {
            master.close();
        }
        debug!("connection supervisor closed");
    }
}
