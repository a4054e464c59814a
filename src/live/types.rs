use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::serde_helpers::lenient_timestamp;
use crate::types::{DateTime, MemberChange, Stats, Utc};
use crate::ws::WsError;

/// Event names carried in the `type` field of the live-update envelope.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// Members joined, left or moved on the leaderboard
    MemberChanges,
    /// Aggregate statistics changed
    StatsUpdate,
    /// Greeting sent by the server right after the connection opens
    Connected,
}

impl EventKind {
    /// Every kind this client understands.
    pub const ALL: [Self; 3] = [Self::MemberChanges, Self::StatsUpdate, Self::Connected];

    /// Name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MemberChanges => "member_changes",
            Self::StatsUpdate => "stats_update",
            Self::Connected => "connected",
        }
    }
}

impl FromStr for EventKind {
    type Err = WsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WsError::UnknownEvent(s.to_owned()))
    }
}

/// Envelope exactly as it arrives, before the event name is checked.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEnvelope {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) data: Value,
    /// Unparseable timestamps are dropped rather than failing the frame
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub(crate) timestamp: Option<DateTime<Utc>>,
}

/// An inbound live-update message.
///
/// Deserializing fails for event names outside [`EventKind`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct LiveMessage {
    /// The event type
    pub kind: EventKind,
    /// Event-specific payload, the only part listeners receive
    pub data: Value,
    /// When the server emitted the event
    pub timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<RawEnvelope> for LiveMessage {
    type Error = WsError;

    fn try_from(raw: RawEnvelope) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            kind: raw.kind.parse()?,
            data: raw.data,
            timestamp: raw.timestamp,
        })
    }
}

impl LiveMessage {
    /// Decode the payload into the typed event for its kind.
    pub fn event(&self) -> Result<Event> {
        let event = match self.kind {
            EventKind::MemberChanges => {
                Event::MemberChanges(serde_json::from_value(self.data.clone())?)
            }
            EventKind::StatsUpdate => Event::StatsUpdate(serde_json::from_value(self.data.clone())?),
            EventKind::Connected => Event::Connected(self.data.clone()),
        };
        Ok(event)
    }
}

/// Typed live-update event.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    MemberChanges(Vec<MemberChange>),
    StatsUpdate(Stats),
    /// The greeting payload has no fixed shape
    Connected(Value),
}

impl Event {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::MemberChanges(_) => EventKind::MemberChanges,
            Self::StatsUpdate(_) => EventKind::StatsUpdate,
            Self::Connected(_) => EventKind::Connected,
        }
    }
}

/// Outbound envelope. The server stamps its own timestamps, so none is sent.
#[derive(Debug, Serialize)]
pub(crate) struct OutboundEnvelope<'data, D: Serialize> {
    #[serde(rename = "type")]
    pub(crate) kind: EventKind,
    pub(crate) data: &'data D,
}

/// Callback registered against an [`EventKind`].
///
/// Listeners compare equal only to clones of themselves, which is what makes
/// registering the same listener twice a no-op. Keep a clone around to
/// unsubscribe later.
///
/// # Example
///
/// ```
/// use leaderboard_live::live::Listener;
///
/// let listener = Listener::new(|data| println!("received {data}"));
/// let same = listener.clone();
/// assert_eq!(listener, same);
/// assert_ne!(listener, Listener::new(|_| {}));
/// ```
#[derive(Clone)]
pub struct Listener {
    callback: Arc<dyn Fn(&Value) + Send + Sync>,
}

impl Listener {
    /// Wrap a callback that receives the raw `data` payload.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Wrap a callback that receives the payload decoded as `T`.
    ///
    /// Payloads that do not decode are logged and skipped.
    pub fn typed<T, F>(callback: F) -> Self
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::new(move |data| match T::deserialize(data) {
            Ok(payload) => callback(payload),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    type_name = %std::any::type_name::<T>(),
                    error = %e,
                    "Live payload does not match listener type"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
        })
    }

    pub(crate) fn call(&self, data: &Value) {
        (self.callback)(data);
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.callback).cast::<()>()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.address(), other.address())
    }
}

impl Eq for Listener {}

impl Hash for Listener {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.address(), state);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.address()).finish()
    }
}
