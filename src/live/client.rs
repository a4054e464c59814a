use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use url::Url;

use super::subscription::{EnvelopeParser, SubscriptionRegistry};
use super::types::{EventKind, Listener, OutboundEnvelope};
use crate::Result;
use crate::error::Error;
use crate::ws::config::Config;
use crate::ws::{ConnectionManager, ConnectionState, WsError};

/// Push endpoint of the leaderboard backend.
pub const DEFAULT_ENDPOINT: &str = "ws://rpc.servox.store/loudio";

/// Live-update client for the leaderboard push channel.
///
/// Connecting starts as soon as the client is constructed and reconnection is
/// automatic: after a lost connection the client waits `base_delay × attempt`
/// and tries again, up to the configured ceiling (1s, 2s, 3s, 4s, 5s by
/// default). After that it stays [`ConnectionState::Closed`] until
/// [`Self::reconnect`] is called.
///
/// The client is cheap to clone and every clone shares one connection and one
/// set of listeners. Dropping the last clone closes the connection.
///
/// # Examples
///
/// ```rust, no_run
/// use leaderboard_live::live::{EventKind, Listener, LiveUpdateClient};
/// use leaderboard_live::types::MemberChange;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = LiveUpdateClient::default();
///
///     let listener = Listener::typed(|changes: Vec<MemberChange>| {
///         println!("{} members changed", changes.len());
///     });
///     client.subscribe(EventKind::MemberChanges, &listener);
///
///     let mut state = client.state_receiver();
///     state.wait_for(|state| state.is_open()).await?;
///
///     client.send(EventKind::StatsUpdate, &serde_json::json!({ "refresh": true }))?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct LiveUpdateClient {
    inner: Arc<ClientInner>,
}

impl Default for LiveUpdateClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, Config::default())
            .expect("Live-update client with default endpoint should succeed")
    }
}

struct ClientInner {
    /// Endpoint the connection targets
    endpoint: String,
    /// Configuration for the connection
    config: Config,
    /// Connection manager for the WebSocket
    connection: ConnectionManager,
    /// Listener registry, shared with the connection task
    registry: Arc<SubscriptionRegistry>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.connection.close();
    }
}

impl LiveUpdateClient {
    /// Create a client and start connecting to `endpoint`.
    ///
    /// `endpoint` must be a `ws://` or `wss://` URL. Must be called from within
    /// a Tokio runtime.
    pub fn new(endpoint: &str, config: Config) -> Result<Self> {
        validate_endpoint(endpoint)?;

        let registry = Arc::new(SubscriptionRegistry::new());
        let connection = ConnectionManager::new(
            endpoint.to_owned(),
            config.clone(),
            EnvelopeParser,
            Arc::clone(&registry),
        )?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                endpoint: endpoint.to_owned(),
                config,
                connection,
                registry,
            }),
        })
    }

    /// Register `listener` for messages of `kind`.
    ///
    /// Registering the same listener (or a clone of it) twice for one kind has
    /// no further effect; it is still called once per message.
    pub fn subscribe(&self, kind: EventKind, listener: &Listener) {
        self.inner.registry.subscribe(kind, listener);
    }

    /// Stop calling `listener` for messages of `kind`. No-op when it was not registered.
    pub fn unsubscribe(&self, kind: EventKind, listener: &Listener) {
        self.inner.registry.unsubscribe(kind, listener);
    }

    /// Number of distinct listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.registry.listener_count(kind)
    }

    /// Send `{type: kind, data}` to the server.
    ///
    /// When the connection is not open the message is logged and dropped: it is
    /// neither queued nor retried, and this still returns `Ok`. The only error is
    /// a failure to serialize `data`.
    pub fn send<D: Serialize>(&self, kind: EventKind, data: &D) -> Result<()> {
        let frame = serde_json::to_string(&OutboundEnvelope { kind, data })?;

        if let Err(e) = self.inner.connection.send_text(frame) {
            #[cfg(feature = "tracing")]
            tracing::error!(%kind, error = %e, "WebSocket is not connected, dropping message");
            #[cfg(not(feature = "tracing"))]
            let _ = &e;
        }

        Ok(())
    }

    /// Stream the `data` of every message of `kind`.
    ///
    /// Each call returns an independent stream. A stream that falls too far
    /// behind yields a [`WsError::Lagged`] error and then continues with newer
    /// messages. Every stream ends once the client is closed or dropped.
    pub fn stream(&self, kind: EventKind) -> impl Stream<Item = Result<Value>> + use<> {
        let mut rx = self.inner.registry.receiver();
        let shutdown = self.inner.connection.shutdown_token();

        try_stream! {
            loop {
                let received = tokio::select! {
                    () = shutdown.cancelled() => break,
                    received = rx.recv() => received,
                };

                match received {
                    Ok(message) => {
                        if message.kind == kind {
                            yield message.data;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(%kind, "Live stream lagged, missed {n} messages");
                        Err(WsError::Lagged { count: n })?;
                    }
                    Err(RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    /// Drop the current connection or pending retry and connect again now,
    /// with the attempt counter reset.
    ///
    /// This is the way out of [`ConnectionState::Closed`] after the retry
    /// ceiling was reached. It does nothing after [`Self::close`].
    pub fn reconnect(&self) {
        self.inner.connection.reconnect();
    }

    /// Close the connection for good. Listeners stay registered but receive nothing further.
    pub fn close(&self) {
        self.inner.connection.close();
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// `true` while the connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Subscribe to the latest connection state.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state_receiver()
    }

    /// Subscribe to every connection state transition.
    #[must_use]
    pub fn state_events(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.connection.state_events()
    }

    /// The endpoint this client connects to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// The configuration this client was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.trim().is_empty() {
        return Err(Error::validation("live-update endpoint must not be empty"));
    }

    let url = Url::parse(endpoint)?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        scheme => Err(Error::validation(format!(
            "live-update endpoint must use ws or wss, got {scheme}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn empty_endpoint_is_rejected() {
        let err = validate_endpoint("  ").unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);
    }

    #[test]
    fn http_endpoint_is_rejected() {
        let err = validate_endpoint("http://rpc.servox.store/loudio").unwrap_err();
        assert_eq!(err.kind(), Kind::Validation);
        assert!(err.to_string().contains("got http"));
    }

    #[test]
    fn websocket_endpoints_are_accepted() {
        validate_endpoint(DEFAULT_ENDPOINT).unwrap();
        validate_endpoint("wss://example.com/live").unwrap();
    }

    #[tokio::test]
    async fn starts_in_connecting_state() {
        // Port 9 (discard) on a TEST-NET address never answers
        let mut config = Config::default();
        config.connect_timeout = std::time::Duration::from_secs(30);
        let client = LiveUpdateClient::new("ws://192.0.2.1:9", config).unwrap();

        assert_eq!(client.state(), ConnectionState::Connecting { attempt: 0 });
        assert!(!client.is_open());
        assert_eq!(client.endpoint(), "ws://192.0.2.1:9");
    }
}
