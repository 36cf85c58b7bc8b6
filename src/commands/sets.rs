//! Set commands (SADD, SREM, SMEMBERS, SCARD, SISMEMBER).

use std::collections::HashSet;

use bytes::Bytes;

use crate::commands::{arg, command, exec};
use crate::connection::Connection;
use crate::error::Result;
use crate::types::ToArg;

/// SADD key member [member ...]. Number of members added.
pub async fn sadd(conn: &mut Connection, key: impl ToArg, members: &[impl ToArg]) -> Result<i64> {
    exec(conn, command("SADD", &[arg(key)], members))
        .await?
        .into_integer()
}

/// SREM key member [member ...]. Number of members removed.
pub async fn srem(conn: &mut Connection, key: impl ToArg, members: &[impl ToArg]) -> Result<i64> {
    exec(conn, command("SREM", &[arg(key)], members))
        .await?
        .into_integer()
}

/// SMEMBERS key.
pub async fn smembers(conn: &mut Connection, key: impl ToArg) -> Result<HashSet<String>> {
    Ok(exec(conn, vec![Bytes::from("SMEMBERS"), arg(key)])
        .await?
        .into_strings()?
        .into_iter()
        .collect())
}

/// SCARD key.
pub async fn scard(conn: &mut Connection, key: impl ToArg) -> Result<i64> {
    exec(conn, vec![Bytes::from("SCARD"), arg(key)])
        .await?
        .into_integer()
}

/// SISMEMBER key member.
pub async fn sismember(
    conn: &mut Connection,
    key: impl ToArg,
    member: impl ToArg,
) -> Result<bool> {
    exec(conn, vec![Bytes::from("SISMEMBER"), arg(key), arg(member)])
        .await?
        .into_bool()
}
