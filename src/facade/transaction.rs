//! Scoped WATCH/MULTI/EXEC transactions.

use bytes::Bytes;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::CommandFacade;
use crate::commands::{strings, transaction};
use crate::error::{Error, Result};
use crate::policy::Operation;
use crate::pool::PooledConnection;
use crate::types::{ToArg, Value};

impl CommandFacade {
    /// Run `body` against one master connection held for its whole duration.
    ///
    /// After `body` returns, an open MULTI is discarded and any watches are
    /// released before the connection goes back to the pool, whatever the
    /// outcome. The result of `body` is returned unchanged. If `body` panics
    /// with MULTI or WATCH still open, the connection is discarded instead.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let applied = facade.transaction(|tx| {
    ///     tx.watch(&["balance"])?;
    ///     let balance: i64 = tx.get("balance")?.unwrap_or_default().parse().unwrap_or(0);
    ///     tx.multi()?;
    ///     tx.queue(&["SET", "balance", (balance + 10).to_string().as_str()])?;
    ///     Ok(tx.exec()?.is_some())
    /// })?;
    /// ```
    pub fn transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let conn = self
            .runtime
            .block_on(self.acquire(Operation::Transaction))?;
        let mut tx = Transaction {
            conn,
            runtime: &self.runtime,
            in_multi: false,
            watching: false,
        };
        let outcome = body(&mut tx);
        drop(tx);
        outcome
    }
}

/// A connection reserved for one transaction.
///
/// Obtained through [`CommandFacade::transaction`]. Reads are only allowed
/// before [`multi`](Self::multi); once MULTI is open every command is queued
/// until [`exec`](Self::exec) or [`discard`](Self::discard).
pub struct Transaction<'a> {
    conn: PooledConnection<'a>,
    runtime: &'a Runtime,
    in_multi: bool,
    watching: bool,
}

impl Transaction<'_> {
    /// WATCH keys. EXEC fails if any of them changes before it runs.
    pub fn watch(&mut self, keys: &[impl ToArg]) -> Result<()> {
        self.ensure_not_in_multi("WATCH")?;
        self.runtime
            .block_on(transaction::watch(&mut self.conn, keys))?;
        self.watching = true;
        Ok(())
    }

    /// UNWATCH all keys.
    pub fn unwatch(&mut self) -> Result<()> {
        self.ensure_not_in_multi("UNWATCH")?;
        self.runtime.block_on(transaction::unwatch(&mut self.conn))?;
        self.watching = false;
        Ok(())
    }

    /// GET key, `None` when missing.
    pub fn get(&mut self, key: impl ToArg) -> Result<Option<String>> {
        self.ensure_not_in_multi("GET")?;
        match self.runtime.block_on(strings::get(&mut self.conn, key))? {
            Some(raw) => Value::String(raw).into_string().map(Some),
            None => Ok(None),
        }
    }

    /// Whether `key` exists.
    pub fn exists(&mut self, key: impl ToArg) -> Result<bool> {
        self.ensure_not_in_multi("EXISTS")?;
        let count = self
            .runtime
            .block_on(strings::exists(&mut self.conn, &[key]))?;
        Ok(count > 0)
    }

    /// Open MULTI.
    pub fn multi(&mut self) -> Result<()> {
        self.ensure_not_in_multi("MULTI")?;
        self.runtime.block_on(transaction::multi(&mut self.conn))?;
        self.in_multi = true;
        Ok(())
    }

    /// Queue a command, given as its name followed by its arguments.
    pub fn queue(&mut self, command: &[impl ToArg]) -> Result<()> {
        if !self.in_multi {
            return Err(Error::InvalidArgument("queue called outside MULTI".into()));
        }
        if command.is_empty() {
            return Err(Error::InvalidArgument("empty command".into()));
        }
        let args: Vec<Bytes> = command.iter().map(ToArg::to_arg).collect();
        self.runtime
            .block_on(transaction::queue(&mut self.conn, args))
    }

    /// EXEC the queued commands.
    ///
    /// `None` when a watched key changed and nothing was applied. Watches are
    /// released either way. A queued command the store rejected at run time
    /// holds a [`Value::Error`] in its slot while the rest are applied.
    pub fn exec(&mut self) -> Result<Option<Vec<Value>>> {
        if !self.in_multi {
            return Err(Error::InvalidArgument("EXEC without MULTI".into()));
        }
        self.in_multi = false;
        self.watching = false;
        self.runtime
            .block_on(transaction::exec_transaction(&mut self.conn))
    }

    /// DISCARD the queued commands and release watches.
    pub fn discard(&mut self) -> Result<()> {
        if !self.in_multi {
            return Err(Error::InvalidArgument("DISCARD without MULTI".into()));
        }
        self.in_multi = false;
        self.watching = false;
        self.runtime.block_on(transaction::discard(&mut self.conn))
    }

    fn ensure_not_in_multi(&self, cmd: &str) -> Result<()> {
        if self.in_multi {
            return Err(Error::InvalidArgument(format!(
                "{} is not allowed inside MULTI",
                cmd
            )));
        }
        Ok(())
    }

    /// Leave the connection with no MULTI or WATCH state.
    fn finish(&mut self) {
        if self.conn.is_broken() {
            return;
        }
        let cleanup = if self.in_multi {
            debug!("discarding unfinished MULTI");
            self.runtime.block_on(transaction::discard(&mut self.conn))
        } else if self.watching {
            self.runtime.block_on(transaction::unwatch(&mut self.conn))
        } else {
            Ok(())
        };
        self.in_multi = false;
        self.watching = false;
        if let Err(e) = cleanup {
            warn!(error = %e, "transaction cleanup failed, dropping connection");
            self.conn.mark_broken();
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.in_multi && !self.watching {
            return;
        }
        if std::thread::panicking() {
            warn!("transaction body panicked, dropping connection");
            self.conn.mark_broken();
        } else {
            self.finish();
        }
    }
}
