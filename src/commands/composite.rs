//! Multi-command list and counter helpers.
//!
//! None of the list helpers are atomic: each is a read followed by a rewrite,
//! and a concurrent writer in between can lose updates. The counter helper
//! uses WATCH/MULTI/EXEC so the increment itself is never lost.

use std::collections::HashSet;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::commands::{arg, lists, strings, transaction};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::Value;

/// `existing` followed by the values of `new` it does not already hold,
/// keeping the first occurrence of every element.
pub fn dedup_union<S: AsRef<str>>(existing: Vec<String>, new: &[S]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(existing.len() + new.len());
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + new.len());
    let candidates = existing
        .into_iter()
        .chain(new.iter().map(|v| v.as_ref().to_owned()));
    for value in candidates {
        if seen.insert(value.clone()) {
            merged.push(value);
        }
    }
    merged
}

/// `list` without the first element equal to `value`, or `None` when it has
/// no such element.
pub fn remove_first(list: &[String], value: &str) -> Option<Vec<String>> {
    let index = list.iter().position(|v| v == value)?;
    let mut rest = Vec::with_capacity(list.len() - 1);
    rest.extend_from_slice(&list[..index]);
    rest.extend_from_slice(&list[index + 1..]);
    Some(rest)
}

/// EXPIRE, skipped when `seconds` exceeds the store's range.
async fn expire_in_range(conn: &mut Connection, key: &str, seconds: u64) -> Result<bool> {
    if seconds > strings::MAX_EXPIRE_SECONDS {
        debug!(key, seconds, "expiry out of range, not applied");
        return Ok(false);
    }
    strings::expire(conn, key, seconds).await
}

/// Merge `values` into the list at `key` so every element appears once.
///
/// Reads the whole list, deletes the key and writes the merged list back,
/// then reapplies `ttl_seconds` when given. Returns the new length.
pub async fn lpush_unique<S: AsRef<str>>(
    conn: &mut Connection,
    key: &str,
    values: &[S],
    ttl_seconds: Option<u64>,
) -> Result<i64> {
    let existing = lists::lrange(conn, key, 0, -1).await?;
    let before = existing.len();
    let merged = dedup_union(existing, values);
    strings::del(conn, &[key]).await?;
    if merged.is_empty() {
        return Ok(0);
    }
    let len = lists::rpush(conn, key, &merged).await?;
    if let Some(seconds) = ttl_seconds {
        expire_in_range(conn, key, seconds).await?;
    }
    debug!(key, before, after = len, "rewrote deduplicated list");
    Ok(len)
}

/// LPUSH followed by EXPIRE. Returns the new length.
pub async fn lpush_with_expiry<S: AsRef<str>>(
    conn: &mut Connection,
    key: &str,
    values: &[S],
    ttl_seconds: u64,
) -> Result<i64> {
    let args: Vec<&str> = values.iter().map(AsRef::as_ref).collect();
    let len = lists::lpush(conn, key, &args).await?;
    expire_in_range(conn, key, ttl_seconds).await?;
    Ok(len)
}

/// Remove exactly one occurrence of `value` from the list at `key`.
///
/// Returns `false` without touching the list when `value` is absent. The
/// key is deleted and the remaining elements, if any, written back in order.
pub async fn pop_single(conn: &mut Connection, key: &str, value: &str) -> Result<bool> {
    let list = lists::lrange(conn, key, 0, -1).await?;
    let rest = match remove_first(&list, value) {
        Some(rest) => rest,
        None => return Ok(false),
    };
    strings::del(conn, &[key]).await?;
    if !rest.is_empty() {
        lists::rpush(conn, key, &rest).await?;
    }
    Ok(true)
}

/// Whether the list at `key` holds `value`.
pub async fn list_contains(conn: &mut Connection, key: &str, value: &str) -> Result<bool> {
    let list = lists::lrange(conn, key, 0, -1).await?;
    Ok(list.iter().any(|v| v == value))
}

/// Increment the counter at `key`, setting `ttl_seconds` only when the
/// increment creates it.
///
/// Returns the value read before the transaction plus one. When a concurrent
/// writer touches the key between WATCH and EXEC the transaction is dropped
/// by the server; the returned value is still `prior + 1`.
///
/// On error the connection is marked broken so no WATCH or MULTI state
/// reaches the next borrower.
pub async fn incr_with_expiry(conn: &mut Connection, key: &str, ttl_seconds: u64) -> Result<i64> {
    let result = watched_increment(conn, key, ttl_seconds).await;
    if result.is_err() {
        conn.mark_broken();
    }
    result
}

async fn watched_increment(conn: &mut Connection, key: &str, ttl_seconds: u64) -> Result<i64> {
    transaction::watch(conn, &[key]).await?;
    let existed = strings::exists(conn, &[key]).await? > 0;
    let prior = match strings::get(conn, key).await? {
        Some(raw) => Value::String(raw).into_integer()?,
        None => 0,
    };

    transaction::multi(conn).await?;
    transaction::queue(conn, vec![Bytes::from("INCRBY"), arg(key), arg(1i64)]).await?;
    if !existed && ttl_seconds <= strings::MAX_EXPIRE_SECONDS {
        transaction::queue(
            conn,
            vec![Bytes::from("EXPIRE"), arg(key), arg(ttl_seconds)],
        )
        .await?;
    }
    match transaction::exec_transaction(conn).await? {
        Some(replies) => {
            let failed = replies.into_iter().find_map(|reply| match reply {
                Value::Error(msg) => Some(msg),
                _ => None,
            });
            if let Some(msg) = failed {
                return Err(Error::Server(msg));
            }
            debug!(key, prior, created = !existed, "counter incremented");
        }
        None => warn!(key, "counter changed during increment, transaction aborted"),
    }
    Ok(prior + 1)
}
