//! Sorted set commands (ZADD, ZRANGE, ZREM, ZRANGEBYSCORE, ZSCORE).

use bytes::Bytes;

use crate::commands::{arg, command, exec};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{ToArg, Value};

/// ZADD key score member. Number of new members.
pub async fn zadd(
    conn: &mut Connection,
    key: impl ToArg,
    score: f64,
    member: impl ToArg,
) -> Result<i64> {
    exec(
        conn,
        vec![Bytes::from("ZADD"), arg(key), arg(score), arg(member)],
    )
    .await?
    .into_integer()
}

/// ZRANGE key start stop. Members by rank.
pub async fn zrange(
    conn: &mut Connection,
    key: impl ToArg,
    start: i64,
    stop: i64,
) -> Result<Vec<String>> {
    exec(
        conn,
        vec![Bytes::from("ZRANGE"), arg(key), arg(start), arg(stop)],
    )
    .await?
    .into_strings()
}

/// ZREM key member [member ...].
pub async fn zrem(conn: &mut Connection, key: impl ToArg, members: &[impl ToArg]) -> Result<i64> {
    exec(conn, command("ZREM", &[arg(key)], members))
        .await?
        .into_integer()
}

/// ZREMRANGEBYSCORE key min max.
pub async fn zremrangebyscore(
    conn: &mut Connection,
    key: impl ToArg,
    min: f64,
    max: f64,
) -> Result<i64> {
    exec(
        conn,
        vec![
            Bytes::from("ZREMRANGEBYSCORE"),
            arg(key),
            arg(min),
            arg(max),
        ],
    )
    .await?
    .into_integer()
}

/// ZRANGEBYSCORE key min max WITHSCORES. `(member, score)` pairs.
pub async fn zrangebyscore_withscores(
    conn: &mut Connection,
    key: impl ToArg,
    min: f64,
    max: f64,
) -> Result<Vec<(String, f64)>> {
    let flat = exec(
        conn,
        vec![
            Bytes::from("ZRANGEBYSCORE"),
            arg(key),
            arg(min),
            arg(max),
            Bytes::from("WITHSCORES"),
        ],
    )
    .await?
    .into_array()?;
    pair_scores(flat)
}

/// ZSCORE key member.
pub async fn zscore(
    conn: &mut Connection,
    key: impl ToArg,
    member: impl ToArg,
) -> Result<Option<f64>> {
    exec(conn, vec![Bytes::from("ZSCORE"), arg(key), arg(member)])
        .await?
        .into_opt_f64()
}

fn pair_scores(flat: Vec<Value>) -> Result<Vec<(String, f64)>> {
    if flat.len() % 2 != 0 {
        return Err(Error::Protocol(format!(
            "WITHSCORES reply has odd length {}",
            flat.len()
        )));
    }
    let mut pairs = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
        let score = score
            .into_opt_f64()?
            .ok_or_else(|| Error::Protocol("nil score in WITHSCORES reply".into()))?;
        pairs.push((member.into_string()?, score));
    }
    Ok(pairs)
}
