//! Publishing and pattern subscriptions.

use tracing::{info, warn};

use super::CommandFacade;
use crate::commands::pubsub::{self, MessageHandler, Unsubscribe};
use crate::error::Result;
use crate::policy::Operation;
use crate::types::ToArg;

impl CommandFacade {
    /// PUBLISH channel message. Returns the number of receivers.
    pub fn publish(&self, channel: impl ToArg, message: impl ToArg) -> Result<i64> {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::Publish).await?;
            pubsub::publish(&mut conn, channel, message).await
        })
    }

    /// Subscribe to `patterns` and feed every message to `handler`.
    ///
    /// Blocks until the connection fails, which is always returned as an
    /// error. Use [`pattern_subscribe_until`](Self::pattern_subscribe_until)
    /// to stop cleanly.
    pub fn pattern_subscribe<H>(&self, handler: &mut H, patterns: &[impl ToArg]) -> Result<()>
    where
        H: MessageHandler + ?Sized,
    {
        self.subscribe(handler, patterns, None)
    }

    /// Like [`pattern_subscribe`](Self::pattern_subscribe), returning `Ok(())`
    /// once `stop` fires and the patterns have been released.
    pub fn pattern_subscribe_until<H>(
        &self,
        handler: &mut H,
        patterns: &[impl ToArg],
        stop: &Unsubscribe,
    ) -> Result<()>
    where
        H: MessageHandler + ?Sized,
    {
        self.subscribe(handler, patterns, Some(stop))
    }

    fn subscribe<H>(
        &self,
        handler: &mut H,
        patterns: &[impl ToArg],
        stop: Option<&Unsubscribe>,
    ) -> Result<()>
    where
        H: MessageHandler + ?Sized,
    {
        self.runtime.block_on(async {
            let mut conn = self.acquire(Operation::PatternSubscribe).await?;
            info!(patterns = patterns.len(), pool = conn.pool_name(), "starting pattern subscription");
            let result =
                pubsub::psubscribe(&mut conn, handler, patterns, stop.map(Unsubscribe::listen))
                    .await;
            if let Err(ref e) = result {
                warn!(error = %e, "pattern subscription ended");
                // The stream may still be in subscribed mode.
                conn.mark_broken();
            }
            result
        })
    }
}
