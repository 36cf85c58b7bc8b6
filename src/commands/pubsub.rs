//! Pattern subscriptions and publishing.
//!
//! A subscribed connection stops answering ordinary commands; it only pushes
//! `pmessage` frames. [`psubscribe`] therefore owns the connection until the
//! subscription ends, either through an [`Unsubscribe`] handle or because the
//! transport failed.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::commands::{arg, command, exec};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{ToArg, Value};

/// Receives messages delivered to a pattern subscription.
pub trait MessageHandler {
    /// Called once per message, with the pattern that matched its channel.
    fn handle(&mut self, message: &str, pattern: &str);
}

impl<F> MessageHandler for F
where
    F: FnMut(&str, &str),
{
    fn handle(&mut self, message: &str, pattern: &str) {
        self(message, pattern)
    }
}

/// Cloneable handle that ends a running pattern subscription.
///
/// Firing it before the subscription starts makes the subscription return as
/// soon as its patterns are confirmed.
#[derive(Debug, Clone)]
pub struct Unsubscribe {
    tx: Arc<watch::Sender<bool>>,
}

impl Unsubscribe {
    /// A handle that has not fired.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Ask every subscription listening on this handle to stop.
    pub fn unsubscribe(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has been called.
    pub fn is_unsubscribed(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn listen(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Unsubscribe {
    fn default() -> Self {
        Self::new()
    }
}

/// PUBLISH channel message, returns the number of receiving subscribers.
pub async fn publish(
    conn: &mut Connection,
    channel: impl ToArg,
    message: impl ToArg,
) -> Result<i64> {
    exec(
        conn,
        vec![Bytes::from("PUBLISH"), arg(channel), arg(message)],
    )
    .await?
    .into_integer()
}

/// PSUBSCRIBE pattern [pattern ...] and dispatch messages to `handler`.
///
/// With `stop` set, returns `Ok(())` after the handle fires and every pattern
/// has been unsubscribed, leaving the connection reusable. Otherwise runs
/// until the connection fails.
pub async fn psubscribe<H>(
    conn: &mut Connection,
    handler: &mut H,
    patterns: &[impl ToArg],
    mut stop: Option<watch::Receiver<bool>>,
) -> Result<()>
where
    H: MessageHandler + ?Sized,
{
    if patterns.is_empty() {
        return Err(Error::InvalidArgument(
            "PSUBSCRIBE needs at least one pattern".into(),
        ));
    }

    conn.send_command(&command("PSUBSCRIBE", &[], patterns))
        .await?;
    let mut confirmed = 0;
    while confirmed < patterns.len() {
        let frame = conn.read_push().await?;
        match push_kind(&frame).as_deref() {
            Some("psubscribe") => confirmed += 1,
            Some("pmessage") => dispatch(handler, frame)?,
            _ => return Err(unexpected_push(frame)),
        }
    }
    debug!(patterns = patterns.len(), "pattern subscription active");

    loop {
        let frame = match stop.as_mut() {
            Some(rx) => {
                if *rx.borrow_and_update() {
                    break;
                }
                tokio::select! {
                    frame = conn.read_push() => frame?,
                    changed = rx.changed() => {
                        // A dropped sender can never fire again; treat it as a stop.
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }
            None => conn.read_push().await?,
        };
        match push_kind(&frame).as_deref() {
            Some("pmessage") => dispatch(handler, frame)?,
            kind => trace!(?kind, "ignoring push frame"),
        }
    }

    unsubscribe_all(conn).await
}

/// PUNSUBSCRIBE every pattern and drain until the server reports zero
/// remaining subscriptions.
async fn unsubscribe_all(conn: &mut Connection) -> Result<()> {
    conn.send_command(&[Bytes::from("PUNSUBSCRIBE")]).await?;
    loop {
        let frame = conn.read_push().await?;
        if push_kind(&frame).as_deref() != Some("punsubscribe") {
            // Messages published before the server processed PUNSUBSCRIBE.
            continue;
        }
        let remaining = match frame {
            Value::Array(mut parts) if parts.len() == 3 => {
                parts.pop().map(Value::into_integer).transpose()?
            }
            other => return Err(unexpected_push(other)),
        };
        if remaining == Some(0) {
            debug!("pattern subscription closed");
            return Ok(());
        }
    }
}

fn push_kind(frame: &Value) -> Option<String> {
    match frame {
        Value::Array(parts) => parts
            .first()
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase),
        _ => None,
    }
}

/// `[pmessage, pattern, channel, payload]`
fn dispatch<H>(handler: &mut H, frame: Value) -> Result<()>
where
    H: MessageHandler + ?Sized,
{
    let parts = match frame {
        Value::Array(parts) if parts.len() == 4 => parts,
        other => return Err(unexpected_push(other)),
    };
    let pattern = text(&parts[1]);
    let payload = text(&parts[3]);
    handler.handle(&payload, &pattern);
    Ok(())
}

fn text(value: &Value) -> String {
    match value {
        Value::String(b) => String::from_utf8_lossy(b).into_owned(),
        other => other.as_str().map(str::to_owned).unwrap_or_default(),
    }
}

fn unexpected_push(frame: Value) -> Error {
    Error::Protocol(format!("unexpected frame on subscribed connection: {}", frame))
}
