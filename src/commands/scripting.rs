//! Lua scripting (EVAL) and the server-clock scripts.
//!
//! The store's TIME command returns seconds and microseconds as two strings.
//! The scripts below fold them into one epoch-milliseconds integer on the
//! server, so callers get a timestamp that does not depend on their own clock.

use bytes::Bytes;

use crate::commands::{arg, exec};
use crate::connection::Connection;
use crate::error::Result;
use crate::types::{ToArg, Value};

/// Returns the server time in epoch milliseconds.
///
/// `redis.replicate_commands()` lets the non-deterministic TIME call coexist
/// with writes on servers older than 5.0; newer servers treat it as a no-op.
pub const CURRENT_TIME_SCRIPT: &str = "\
redis.replicate_commands()
local t = redis.call('TIME')
return tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)";

/// Like [`CURRENT_TIME_SCRIPT`], and also stores the value under `KEYS[1]`.
pub const SET_TO_CURRENT_TIME_SCRIPT: &str = "\
redis.replicate_commands()
local t = redis.call('TIME')
local ms = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
redis.call('SET', KEYS[1], ms)
return ms";

/// EVAL script numkeys key [key ...] arg [arg ...].
pub async fn eval(
    conn: &mut Connection,
    script: &str,
    keys: &[impl ToArg],
    args: &[impl ToArg],
) -> Result<Value> {
    let mut cmd = Vec::with_capacity(3 + keys.len() + args.len());
    cmd.push(Bytes::from("EVAL"));
    cmd.push(Bytes::copy_from_slice(script.as_bytes()));
    cmd.push(arg(keys.len()));
    cmd.extend(keys.iter().map(ToArg::to_arg));
    cmd.extend(args.iter().map(ToArg::to_arg));
    exec(conn, cmd).await
}

/// Server time in epoch milliseconds.
pub async fn current_time(conn: &mut Connection) -> Result<i64> {
    eval(conn, CURRENT_TIME_SCRIPT, &[] as &[&str], &[] as &[&str])
        .await?
        .into_integer()
}

/// Server time in epoch milliseconds, also written to `key`.
pub async fn set_to_current_time(conn: &mut Connection, key: impl ToArg) -> Result<i64> {
    eval(conn, SET_TO_CURRENT_TIME_SCRIPT, &[key], &[] as &[&str])
        .await?
        .into_integer()
}
