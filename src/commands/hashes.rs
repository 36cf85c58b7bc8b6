//! Hash commands (HSET, HGET, HMGET, HGETALL, HKEYS, HDEL, HLEN).

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::commands::{arg, command, exec};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::ToArg;

/// HSET key field value [field value ...]. Number of new fields.
pub async fn hset(
    conn: &mut Connection,
    key: impl ToArg,
    fields: &[(impl ToArg, impl ToArg)],
) -> Result<i64> {
    if fields.is_empty() {
        return Err(Error::InvalidArgument("HSET needs at least one field".into()));
    }
    let mut args = Vec::with_capacity(2 + fields.len() * 2);
    args.push(Bytes::from("HSET"));
    args.push(arg(key));
    for (f, v) in fields {
        args.push(f.to_arg());
        args.push(v.to_arg());
    }
    exec(conn, args).await?.into_integer()
}

/// HGET key field. Raw bytes, nil mapped to `None`.
pub async fn hget(
    conn: &mut Connection,
    key: impl ToArg,
    field: impl ToArg,
) -> Result<Option<Bytes>> {
    exec(conn, vec![Bytes::from("HGET"), arg(key), arg(field)])
        .await?
        .into_opt_bytes()
}

/// HMGET key field [field ...]. One entry per field, `None` where missing.
pub async fn hmget(
    conn: &mut Connection,
    key: impl ToArg,
    fields: &[impl ToArg],
) -> Result<Vec<Option<String>>> {
    exec(conn, command("HMGET", &[arg(key)], fields))
        .await?
        .into_opt_strings()
}

/// HGETALL key. All fields and values.
pub async fn hgetall(conn: &mut Connection, key: impl ToArg) -> Result<HashMap<String, String>> {
    let flat = exec(conn, vec![Bytes::from("HGETALL"), arg(key)])
        .await?
        .into_strings()?;
    let mut map = HashMap::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        map.insert(field, value);
    }
    Ok(map)
}

/// HKEYS key. All field names.
pub async fn hkeys(conn: &mut Connection, key: impl ToArg) -> Result<HashSet<String>> {
    Ok(exec(conn, vec![Bytes::from("HKEYS"), arg(key)])
        .await?
        .into_strings()?
        .into_iter()
        .collect())
}

/// HDEL key field [field ...]. Number of fields removed.
pub async fn hdel(conn: &mut Connection, key: impl ToArg, fields: &[impl ToArg]) -> Result<i64> {
    exec(conn, command("HDEL", &[arg(key)], fields))
        .await?
        .into_integer()
}

/// HLEN key. Number of fields.
pub async fn hlen(conn: &mut Connection, key: impl ToArg) -> Result<i64> {
    exec(conn, vec![Bytes::from("HLEN"), arg(key)])
        .await?
        .into_integer()
}
