//! List commands (LPUSH, RPUSH, LPOP, RPOP, BLPOP, LRANGE, LLEN).

use std::time::Duration;

use bytes::Bytes;

use crate::commands::{arg, command, exec};
use crate::connection::Connection;
use crate::error::Result;
use crate::types::ToArg;

/// LPUSH key element [element ...]. Prepend elements, returns the new length.
pub async fn lpush(conn: &mut Connection, key: impl ToArg, values: &[impl ToArg]) -> Result<i64> {
    exec(conn, command("LPUSH", &[arg(key)], values))
        .await?
        .into_integer()
}

/// RPUSH key element [element ...]. Append elements, returns the new length.
pub async fn rpush(conn: &mut Connection, key: impl ToArg, values: &[impl ToArg]) -> Result<i64> {
    exec(conn, command("RPUSH", &[arg(key)], values))
        .await?
        .into_integer()
}

/// LPOP key. Remove and get the first element.
pub async fn lpop(conn: &mut Connection, key: impl ToArg) -> Result<Option<String>> {
    exec(conn, vec![Bytes::from("LPOP"), arg(key)])
        .await?
        .into_opt_string()
}

/// RPOP key. Remove and get the last element.
pub async fn rpop(conn: &mut Connection, key: impl ToArg) -> Result<Option<String>> {
    exec(conn, vec![Bytes::from("RPOP"), arg(key)])
        .await?
        .into_opt_string()
}

/// BLPOP key [key ...] timeout. `[key, element]`, empty when timed out.
///
/// Holds the connection for up to `timeout_secs` (0 blocks indefinitely).
pub async fn blpop(
    conn: &mut Connection,
    timeout_secs: u64,
    keys: &[impl ToArg],
) -> Result<Vec<String>> {
    blocking_pop(conn, "BLPOP", timeout_secs, keys).await
}

/// BRPOP key [key ...] timeout. `[key, element]`, empty when timed out.
pub async fn brpop(
    conn: &mut Connection,
    timeout_secs: u64,
    keys: &[impl ToArg],
) -> Result<Vec<String>> {
    blocking_pop(conn, "BRPOP", timeout_secs, keys).await
}

async fn blocking_pop(
    conn: &mut Connection,
    name: &'static str,
    timeout_secs: u64,
    keys: &[impl ToArg],
) -> Result<Vec<String>> {
    let mut args = command(name, &[], keys);
    args.push(arg(timeout_secs));
    let reply = if timeout_secs == 0 {
        // 0 blocks server-side forever; no read deadline applies.
        conn.send_command(&args).await?;
        conn.read_push().await?
    } else {
        conn.execute_blocking(&args, Duration::from_secs(timeout_secs))
            .await?
    };
    reply.into_strings()
}

/// LRANGE key start stop.
pub async fn lrange(
    conn: &mut Connection,
    key: impl ToArg,
    start: i64,
    stop: i64,
) -> Result<Vec<String>> {
    exec(
        conn,
        vec![Bytes::from("LRANGE"), arg(key), arg(start), arg(stop)],
    )
    .await?
    .into_strings()
}

/// LLEN key. Length of the list, 0 when missing.
pub async fn llen(conn: &mut Connection, key: impl ToArg) -> Result<i64> {
    exec(conn, vec![Bytes::from("LLEN"), arg(key)])
        .await?
        .into_integer()
}
