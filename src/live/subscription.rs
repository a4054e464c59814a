#![expect(
    clippy::module_name_repetitions,
    reason = "Subscription types deliberately include the module name for clarity"
)]

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::types::{EventKind, Listener, LiveMessage, RawEnvelope};
use crate::Result;
use crate::ws::WsError;
use crate::ws::traits::{MessageHandler, MessageParser};

/// Broadcast channel capacity for message streams.
const BROADCAST_CAPACITY: usize = 1024;

/// Parses text frames as `{type, data, timestamp}` envelopes.
///
/// Frames naming an event outside [`EventKind`] are dropped without an error.
#[non_exhaustive]
#[derive(Clone, Debug, Default)]
pub struct EnvelopeParser;

impl MessageParser<LiveMessage> for EnvelopeParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<LiveMessage>> {
        let raw: RawEnvelope = serde_json::from_slice(bytes).map_err(WsError::MessageParse)?;

        match LiveMessage::try_from(raw) {
            Ok(message) => Ok(vec![message]),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %e, "Ignoring live message");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                Ok(Vec::new())
            }
        }
    }
}

/// Listeners by event kind, plus the broadcast feeding [`LiveUpdateClient::stream`].
///
/// [`LiveUpdateClient::stream`]: super::LiveUpdateClient::stream
pub struct SubscriptionRegistry {
    listeners: DashMap<EventKind, HashSet<Listener>>,
    broadcast_tx: broadcast::Sender<LiveMessage>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            listeners: DashMap::new(),
            broadcast_tx,
        }
    }

    /// Register `listener` for `kind`. Registering it again is a no-op.
    pub fn subscribe(&self, kind: EventKind, listener: &Listener) {
        let inserted = self
            .listeners
            .entry(kind)
            .or_default()
            .insert(listener.clone());

        #[cfg(feature = "tracing")]
        if !inserted {
            tracing::debug!(%kind, ?listener, "Listener already subscribed");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = inserted;
    }

    /// Remove `listener` from `kind`, if it was registered.
    pub fn unsubscribe(&self, kind: EventKind, listener: &Listener) {
        if let Some(mut listeners) = self.listeners.get_mut(&kind) {
            listeners.remove(listener);
        }
    }

    /// Number of distinct listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, |listeners| listeners.len())
    }

    /// A receiver of every dispatched message.
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<LiveMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Invoke every listener registered for the message's kind with its `data`.
    ///
    /// The listener set is copied before any callback runs, so listeners may
    /// subscribe or unsubscribe from inside a callback. Changes take effect from
    /// the next message. A panicking listener is logged and the rest still run.
    pub fn dispatch(&self, message: &LiveMessage) {
        let listeners = self.snapshot(message.kind);

        #[cfg(feature = "tracing")]
        tracing::trace!(kind = %message.kind, listeners = listeners.len(), "Dispatching live message");

        for listener in listeners {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.call(&message.data))) {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    kind = %message.kind,
                    ?listener,
                    panic = panic_message(&*panic),
                    "Live listener panicked"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = &panic;
            }
        }
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.listeners
            .get(&kind)
            .map(|listeners| listeners.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl MessageHandler<LiveMessage> for SubscriptionRegistry {
    fn handle(&self, message: LiveMessage) {
        self.dispatch(&message);
        // No receivers is the common case for callback-only users
        _ = self.broadcast_tx.send(message);
    }
}

#[cfg(feature = "tracing")]
fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
