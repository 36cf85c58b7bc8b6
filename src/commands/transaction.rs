//! Optimistic transactions (WATCH, MULTI, EXEC, DISCARD, UNWATCH).

use bytes::Bytes;

use crate::commands::{command, exec, expect_ok};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{ToArg, Value};

/// WATCH key [key ...].
pub async fn watch(conn: &mut Connection, keys: &[impl ToArg]) -> Result<()> {
    expect_ok(exec(conn, command("WATCH", &[], keys)).await?, "WATCH")
}

/// UNWATCH.
pub async fn unwatch(conn: &mut Connection) -> Result<()> {
    expect_ok(exec(conn, vec![Bytes::from("UNWATCH")]).await?, "UNWATCH")
}

/// MULTI.
pub async fn multi(conn: &mut Connection) -> Result<()> {
    expect_ok(exec(conn, vec![Bytes::from("MULTI")]).await?, "MULTI")
}

/// Queue one command inside MULTI.
pub async fn queue(conn: &mut Connection, args: Vec<Bytes>) -> Result<()> {
    match exec(conn, args).await? {
        Value::Status(ref s) if s == "QUEUED" => Ok(()),
        other => Err(Error::Protocol(format!(
            "expected QUEUED, got {}",
            other
        ))),
    }
}

/// EXEC. `None` when a watched key changed and nothing ran.
pub async fn exec_transaction(conn: &mut Connection) -> Result<Option<Vec<Value>>> {
    match exec(conn, vec![Bytes::from("EXEC")]).await? {
        Value::Nil => Ok(None),
        Value::Array(results) => Ok(Some(results)),
        other => Err(Error::UnexpectedResponse {
            expected: "array",
            actual: other.type_name().to_string(),
        }),
    }
}

/// DISCARD.
pub async fn discard(conn: &mut Connection) -> Result<()> {
    expect_ok(exec(conn, vec![Bytes::from("DISCARD")]).await?, "DISCARD")
}
