//! Store commands, grouped by data type.
//!
//! Every function here issues its command(s) on a connection the caller has
//! already borrowed; authorization and routing happen one level up in
//! [`CommandFacade`](crate::CommandFacade).

pub mod composite;
pub mod geo;
pub mod hashes;
pub mod lists;
pub mod pubsub;
pub mod scripting;
pub mod sets;
pub mod sorted_sets;
pub mod strings;
pub mod transaction;

use bytes::Bytes;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{ToArg, Value};

/// Execute a prepared argument vector.
pub(crate) async fn exec(conn: &mut Connection, args: Vec<Bytes>) -> Result<Value> {
    conn.execute(&args).await
}

/// Helper to create a Bytes arg from anything that implements ToArg.
#[inline]
pub(crate) fn arg<T: ToArg>(val: T) -> Bytes {
    val.to_arg()
}

/// `name` followed by `head` and every element of `rest`.
pub(crate) fn command<T: ToArg>(name: &'static str, head: &[Bytes], rest: &[T]) -> Vec<Bytes> {
    let mut args = Vec::with_capacity(1 + head.len() + rest.len());
    args.push(Bytes::from_static(name.as_bytes()));
    args.extend_from_slice(head);
    args.extend(rest.iter().map(ToArg::to_arg));
    args
}

/// Accept only a `+OK` status reply to `cmd`.
pub(crate) fn expect_ok(reply: Value, cmd: &str) -> Result<()> {
    match reply {
        Value::Status(ref s) if s == "OK" => Ok(()),
        other => Err(Error::Protocol(format!(
            "unexpected {} response: {}",
            cmd, other
        ))),
    }
}
