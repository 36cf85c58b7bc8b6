//! Key and string commands (GET, SET, DEL, EXPIRE, INCR, etc.).

use bytes::Bytes;

use crate::commands::{arg, command, exec, expect_ok};
use crate::connection::Connection;
use crate::error::Result;
use crate::types::{ToArg, Value};

/// Expiry modifier for [`SetOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetExpiry {
    /// EX seconds.
    Seconds(u64),
    /// PX milliseconds.
    Millis(u64),
    /// KEEPTTL.
    KeepTtl,
}

/// Existence condition for [`SetOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// NX: only set when the key does not exist.
    IfAbsent,
    /// XX: only set when the key already exists.
    IfPresent,
}

/// Modifiers for `SET`.
///
/// # Example
/// ```
/// use ferrite_facade::commands::strings::SetOptions;
///
/// let opts = SetOptions::new().ex(3600).nx();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    expiry: Option<SetExpiry>,
    condition: Option<SetCondition>,
}

impl SetOptions {
    /// No modifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set expiry in seconds (EX).
    pub fn ex(mut self, seconds: u64) -> Self {
        self.expiry = Some(SetExpiry::Seconds(seconds));
        self
    }

    /// Set expiry in milliseconds (PX).
    pub fn px(mut self, milliseconds: u64) -> Self {
        self.expiry = Some(SetExpiry::Millis(milliseconds));
        self
    }

    /// Keep the existing TTL (KEEPTTL).
    pub fn keepttl(mut self) -> Self {
        self.expiry = Some(SetExpiry::KeepTtl);
        self
    }

    /// Only set if the key does not already exist (NX).
    pub fn nx(mut self) -> Self {
        self.condition = Some(SetCondition::IfAbsent);
        self
    }

    /// Only set if the key already exists (XX).
    pub fn xx(mut self) -> Self {
        self.condition = Some(SetCondition::IfPresent);
        self
    }

    fn append_to(&self, args: &mut Vec<Bytes>) {
        match self.expiry {
            Some(SetExpiry::Seconds(s)) => {
                args.push(Bytes::from("EX"));
                args.push(arg(s));
            }
            Some(SetExpiry::Millis(ms)) => {
                args.push(Bytes::from("PX"));
                args.push(arg(ms));
            }
            Some(SetExpiry::KeepTtl) => args.push(Bytes::from("KEEPTTL")),
            None => {}
        }
        match self.condition {
            Some(SetCondition::IfAbsent) => args.push(Bytes::from("NX")),
            Some(SetCondition::IfPresent) => args.push(Bytes::from("XX")),
            None => {}
        }
    }
}

/// SET key value [EX|PX|KEEPTTL] [NX|XX].
///
/// Returns `None` when an NX/XX condition prevented the write. Any reply
/// other than `OK` or nil is an error.
pub async fn set(
    conn: &mut Connection,
    key: impl ToArg,
    value: impl ToArg,
    options: SetOptions,
) -> Result<Option<String>> {
    let mut args = vec![Bytes::from("SET"), arg(key), arg(value)];
    options.append_to(&mut args);
    match exec(conn, args).await? {
        Value::Nil => Ok(None),
        reply => {
            expect_ok(reply, "SET")?;
            Ok(Some("OK".to_string()))
        }
    }
}

/// GET key, nil mapped to `None`.
pub async fn get(conn: &mut Connection, key: impl ToArg) -> Result<Option<Bytes>> {
    exec(conn, vec![Bytes::from("GET"), arg(key)])
        .await?
        .into_opt_bytes()
}

/// DEL key [key ...]. Number of keys removed.
pub async fn del(conn: &mut Connection, keys: &[impl ToArg]) -> Result<i64> {
    exec(conn, command("DEL", &[], keys)).await?.into_integer()
}

/// EXISTS key [key ...]. Number of given keys that exist.
pub async fn exists(conn: &mut Connection, keys: &[impl ToArg]) -> Result<i64> {
    exec(conn, command("EXISTS", &[], keys))
        .await?
        .into_integer()
}

/// INCR key.
pub async fn incr(conn: &mut Connection, key: impl ToArg) -> Result<i64> {
    exec(conn, vec![Bytes::from("INCR"), arg(key)])
        .await?
        .into_integer()
}

/// DECR key.
pub async fn decr(conn: &mut Connection, key: impl ToArg) -> Result<i64> {
    exec(conn, vec![Bytes::from("DECR"), arg(key)])
        .await?
        .into_integer()
}

/// SETNX key value. True when the key was set.
pub async fn setnx(conn: &mut Connection, key: impl ToArg, value: impl ToArg) -> Result<bool> {
    exec(conn, vec![Bytes::from("SETNX"), arg(key), arg(value)])
        .await?
        .into_bool()
}

/// SETEX key seconds value.
pub async fn setex(
    conn: &mut Connection,
    key: impl ToArg,
    seconds: u64,
    value: impl ToArg,
) -> Result<()> {
    let reply = exec(
        conn,
        vec![Bytes::from("SETEX"), arg(key), arg(seconds), arg(value)],
    )
    .await?;
    expect_ok(reply, "SETEX")
}

/// TTL key. Remaining time to live in seconds (-2 missing, -1 no expiry).
pub async fn ttl(conn: &mut Connection, key: impl ToArg) -> Result<i64> {
    exec(conn, vec![Bytes::from("TTL"), arg(key)])
        .await?
        .into_integer()
}

/// PTTL key. Remaining time to live in milliseconds.
pub async fn pttl(conn: &mut Connection, key: impl ToArg) -> Result<i64> {
    exec(conn, vec![Bytes::from("PTTL"), arg(key)])
        .await?
        .into_integer()
}

/// Largest expiry, in seconds, forwarded to the store.
pub const MAX_EXPIRE_SECONDS: u64 = i32::MAX as u64;

/// EXPIRE key seconds. True when the timeout was set.
pub async fn expire(conn: &mut Connection, key: impl ToArg, seconds: u64) -> Result<bool> {
    exec(conn, vec![Bytes::from("EXPIRE"), arg(key), arg(seconds)])
        .await?
        .into_bool()
}
