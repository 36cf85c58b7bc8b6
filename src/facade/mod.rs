//! The blocking, policy-gated command facade.
//!
//! Every call follows the same path: classify the operation, check it
//! against the [`ActionPolicy`], borrow a connection according to the
//! action's [`Routing`](crate::Routing), run the command(s), and hand the
//! connection back. A denied call never touches the network.

mod collections;
mod pubsub;
mod transaction;

pub use transaction::Transaction;

use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

use crate::commands::strings::{self, SetOptions, MAX_EXPIRE_SECONDS};
use crate::commands::{composite, scripting};
use crate::config::FacadeConfig;
use crate::error::{Error, Result};
use crate::policy::{ActionPolicy, Operation};
use crate::pool::PooledConnection;
use crate::serializer::{JsonSerializer, Serializer};
use crate::supervisor::ConnectionSupervisor;
use crate::types::{ToArg, Value};

/// A master/replica command facade that only performs allowed actions.
///
/// All methods block the calling thread. They drive an internal Tokio
/// runtime and must not be called from inside an async context; doing so
/// panics.
///
/// # Examples
///
/// ```ignore
/// use ferrite_facade::{Action, ActionPolicy, CommandFacade, FacadeConfig};
///
/// let mut config = FacadeConfig::default();
/// config.policy.allow = vec![Action::Read, Action::Check];
/// let facade = CommandFacade::from_config(config)?;
/// let value = facade.get("greeting")?;
/// ```
pub struct CommandFacade {
    supervisor: ConnectionSupervisor,
    policy: ActionPolicy,
    serializer: Arc<dyn Serializer>,
    runtime: Runtime,
}

impl CommandFacade {
    /// Validate `config` and build pools, policy and runtime from it.
    ///
    /// No connection is opened until the first call.
    pub fn from_config(config: FacadeConfig) -> Result<Self> {
        config.validate()?;
        let supervisor = ConnectionSupervisor::from_config(&config);
        Self::new(supervisor, config.policy.to_policy())
    }

    /// Wrap an existing supervisor with `policy`.
    pub fn new(supervisor: ConnectionSupervisor, policy: ActionPolicy) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ferrite-facade-io")
            .enable_all()
            .build()
            .map_err(Error::Io)?;
        debug!(allowed = %policy, "command facade created");
        Ok(Self {
            supervisor,
            policy,
            serializer: Arc::new(JsonSerializer),
            runtime,
        })
    }

    /// Replace the list serializer used by the `*_list` hash operations.
    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    /// The allow-list this facade enforces.
    pub fn policy(&self) -> ActionPolicy {
        self.policy
    }

    /// The pools behind this facade.
    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    /// Close both pools. Later calls fail with [`Error::PoolClosed`].
    pub fn close(&self) {
        self.supervisor.close();
    }

    fn authorize(&self, op: Operation) -> Result<()> {
        self.policy.check(op.action())
    }

    async fn acquire(&self, op: Operation) -> Result<PooledConnection<'_>> {
        self.authorize(op)?;
        let conn = self.supervisor.acquire(op.routing()).await?;
        trace!(?op, pool = conn.pool_name(), "connection borrowed");
        Ok(conn)
    }

    // ── Keys and strings ────────────────────────────────────────────────

    /// Whether `key` exists.
    pub fn has_key(&self, key: impl ToArg) -> Result<bool> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::HasKey).await?;
            Ok(strings::exists(&mut conn, &[key]).await? > 0)
        })
    }

    /// The string at `key`, or `""` when the key does not exist.
    pub fn get(&self, key: impl ToArg) -> Result<String> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Get).await?;
            match strings::get(&mut conn, key).await? {
                Some(raw) => Value::String(raw).into_string(),
                None => Ok(String::new()),
            }
        })
    }

    /// The raw bytes at `key`, `None` when the key does not exist.
    pub fn get_bytes(&self, key: impl ToArg) -> Result<Option<Bytes>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::GetBytes).await?;
            strings::get(&mut conn, key).await
        })
    }

    /// SET key value.
    pub fn set(&self, key: impl ToArg, value: impl ToArg) -> Result<()> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Set).await?;
            strings::set(&mut conn, key, value, SetOptions::new()).await?;
            Ok(())
        })
    }

    /// SET with EX/PX/KEEPTTL and NX/XX modifiers. `None` when a condition
    /// prevented the write.
    pub fn set_with_options(
        &self,
        key: impl ToArg,
        value: impl ToArg,
        options: SetOptions,
    ) -> Result<Option<String>> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::SetWithOptions).await?;
            strings::set(&mut conn, key, value, options).await
        })
    }

    /// SETNX key value. True when the key was set.
    pub fn set_nx(&self, key: impl ToArg, value: impl ToArg) -> Result<bool> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::SetNx).await?;
            strings::setnx(&mut conn, key, value).await
        })
    }

    /// SETEX key seconds value.
    pub fn set_ex(&self, key: impl ToArg, seconds: u64, value: impl ToArg) -> Result<()> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::SetEx).await?;
            strings::setex(&mut conn, key, seconds, value).await?;
            Ok(())
        })
    }

    /// DEL key. True when the key existed.
    pub fn del(&self, key: impl ToArg) -> Result<bool> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Del).await?;
            Ok(strings::del(&mut conn, &[key]).await? > 0)
        })
    }

    /// EXPIRE key seconds.
    ///
    /// False when the key does not exist, or without contacting the store
    /// when `seconds` exceeds `i32::MAX`.
    pub fn expire(&self, key: impl ToArg, seconds: u64) -> Result<bool> {
        self.authorize(Operation::Expire)?;
        if seconds > MAX_EXPIRE_SECONDS {
            debug!(seconds, "expiry out of range, not applied");
            return Ok(false);
        }
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Expire).await?;
            strings::expire(&mut conn, key, seconds).await
        })
    }

    /// TTL key in seconds (-2 missing, -1 no expiry).
    pub fn ttl(&self, key: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Ttl).await?;
            strings::ttl(&mut conn, key).await
        })
    }

    /// PTTL key in milliseconds.
    pub fn pttl(&self, key: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Pttl).await?;
            strings::pttl(&mut conn, key).await
        })
    }

    /// INCR key.
    pub fn incr(&self, key: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Incr).await?;
            strings::incr(&mut conn, key).await
        })
    }

    /// DECR key.
    pub fn decr(&self, key: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Decr).await?;
            strings::decr(&mut conn, key).await
        })
    }

    /// Increment `key`, applying `ttl_seconds` only when the counter is
    /// created. Returns the pre-read value plus one.
    pub fn incr_with_expiry(&self, key: &str, ttl_seconds: u64) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::IncrWithExpiry).await?;
            composite::incr_with_expiry(&mut conn, key, ttl_seconds).await
        })
    }

    // ── Scripting and server time ───────────────────────────────────────

    /// The server clock in epoch milliseconds.
    pub fn current_time(&self) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::CurrentTime).await?;
            scripting::current_time(&mut conn).await
        })
    }

    /// Store the server clock (epoch milliseconds) under `key` and return it.
    pub fn set_to_current_time(&self, key: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::SetToCurrentTime).await?;
            scripting::set_to_current_time(&mut conn, key).await
        })
    }

    /// EVAL `script` with `keys` and `args`, returning the raw reply.
    pub fn eval(
        &self,
        script: &str,
        keys: &[impl ToArg],
        args: &[impl ToArg],
    ) -> Result<Value> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Eval).await?;
            scripting::eval(&mut conn, script, keys, args).await
        })
    }
}

impl Drop for CommandFacade {
    fn drop(&mut self) {
        self.supervisor.close();
    }
}
