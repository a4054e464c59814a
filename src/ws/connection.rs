#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::time::{Duration, Instant};

use backoff::backoff::Backoff as _;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use super::config::{Config, LinearBackoff};
use super::error::WsError;
use super::traits::{MessageHandler, MessageParser};
use crate::Result;
use crate::error::Error;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for connection state transitions.
const STATE_EVENTS_CAPACITY: usize = 64;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening handshake in flight
    Connecting {
        /// Reconnect attempt this handshake belongs to, `0` for a fresh start
        attempt: u32,
    },
    /// Successfully connected
    Open {
        /// When the connection was established
        since: Instant,
    },
    /// Connection lost, next attempt scheduled
    Reconnecting {
        /// Reconnect attempt number that will run after `delay`
        attempt: u32,
        /// How long until that attempt starts
        delay: Duration,
    },
    /// No connection and none scheduled: the ceiling was reached or the client was closed
    Closed,
}

impl ConnectionState {
    /// Check if the connection is currently open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Check if the connection has stopped retrying.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Requests from handles to the connection task.
#[derive(Debug, Clone, Copy)]
enum Command {
    /// Drop whatever is in progress and start a fresh attempt now
    Reconnect,
}

/// Why a session (one handshake plus the open connection, if any) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    /// Failed open, remote close or transport error
    Lost,
    /// [`ConnectionManager::reconnect`] was called
    Requested,
    /// [`ConnectionManager::close`] was called
    Shutdown,
}

/// The connection task is the only writer of both state channels.
struct StatePublisher {
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<ConnectionState>,
}

impl StatePublisher {
    fn publish(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });

        if changed {
            #[cfg(feature = "tracing")]
            tracing::debug!(?state, "Connection state changed");
            _ = self.events_tx.send(state);
        }
    }
}

/// Manages WebSocket connection lifecycle and reconnection.
///
/// A single background task owns the socket, the reconnect counter and the
/// connection state, so at most one handshake is ever in flight and the
/// counter and state always move together. Handles talk to the task through
/// channels:
/// - outgoing text frames (only accepted while the connection is open)
/// - reconnect requests, which supersede a pending retry
/// - a cancellation token for shutdown
///
/// Every parsed inbound message is handed to the [`MessageHandler`] on the
/// connection task.
///
/// # Example
///
/// ```ignore
/// let connection = ConnectionManager::new(
///     "wss://example.com".to_owned(),
///     config,
///     SimpleParser,
///     handler,
/// )?;
///
/// let mut states = connection.state_receiver();
/// states.wait_for(|state| state.is_open()).await?;
/// connection.send_text(r#"{"type":"ping"}"#.to_owned())?;
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    /// Watch channel receiver for state changes (for use in checking the current state)
    state_rx: watch::Receiver<ConnectionState>,
    /// Broadcast sender for every state transition
    events_tx: broadcast::Sender<ConnectionState>,
    /// Sender channel for outgoing frames
    sender_tx: mpsc::UnboundedSender<String>,
    /// Sender channel for control commands
    command_tx: mpsc::UnboundedSender<Command>,
    /// Cancels the connection task
    shutdown: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager and start the connection loop.
    ///
    /// The state is `Connecting` as soon as this returns. The `parser` turns
    /// text frames into messages and the `handler` receives them. Must be
    /// called from within a Tokio runtime.
    pub fn new<M, P, H>(endpoint: String, config: Config, parser: P, handler: H) -> Result<Self>
    where
        M: Send + 'static,
        P: MessageParser<M>,
        H: MessageHandler<M>,
    {
        let runtime = Handle::try_current().map_err(|e| {
            Error::validation(format!(
                "a Tokio runtime is required to start the connection: {e}"
            ))
        })?;

        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(STATE_EVENTS_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting { attempt: 0 });
        let shutdown = CancellationToken::new();

        let publisher = StatePublisher {
            state_tx,
            events_tx: events_tx.clone(),
        };
        let task_shutdown = shutdown.clone();

        runtime.spawn(async move {
            Self::connection_loop(
                endpoint,
                config,
                sender_rx,
                command_rx,
                parser,
                handler,
                publisher,
                task_shutdown,
            )
            .await;
        });

        Ok(Self {
            state_rx,
            events_tx,
            sender_tx,
            command_tx,
            shutdown,
        })
    }

    /// Main connection loop with automatic reconnection.
    #[expect(
        clippy::too_many_arguments,
        reason = "The task takes ownership of every channel end it drives"
    )]
    async fn connection_loop<M, P, H>(
        endpoint: String,
        config: Config,
        mut sender_rx: mpsc::UnboundedReceiver<String>,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        parser: P,
        handler: H,
        publisher: StatePublisher,
        shutdown: CancellationToken,
    ) where
        M: Send + 'static,
        P: MessageParser<M>,
        H: MessageHandler<M>,
    {
        let mut backoff: LinearBackoff = config.reconnect.clone().into();

        loop {
            publisher.publish(ConnectionState::Connecting {
                attempt: backoff.attempt(),
            });

            let opened = tokio::select! {
                () = shutdown.cancelled() => break,
                Some(Command::Reconnect) = command_rx.recv() => {
                    backoff.reset();
                    continue;
                }
                result = timeout(config.connect_timeout, connect_async(endpoint.as_str())) => result,
            };

            let disconnect = match opened {
                Ok(Ok((ws_stream, _))) => {
                    backoff.reset();
                    // Before publishing, so a send made by a caller woken on Open is kept
                    Self::discard_stale(&mut sender_rx);
                    publisher.publish(ConnectionState::Open {
                        since: Instant::now(),
                    });

                    #[cfg(feature = "tracing")]
                    tracing::info!(%endpoint, "WebSocket connected");

                    Self::handle_connection(
                        ws_stream,
                        &mut sender_rx,
                        &mut command_rx,
                        &parser,
                        &handler,
                        &shutdown,
                    )
                    .await
                }
                Ok(Err(e)) => {
                    let error = Error::from(WsError::Connection(e));
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%endpoint, "Unable to connect: {error}");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &error;
                    Disconnect::Lost
                }
                Err(_elapsed) => {
                    let error = Error::from(WsError::Timeout);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%endpoint, timeout = ?config.connect_timeout, "Unable to connect: {error}");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &error;
                    Disconnect::Lost
                }
            };

            match disconnect {
                Disconnect::Shutdown => break,
                Disconnect::Requested => {
                    backoff.reset();
                    continue;
                }
                Disconnect::Lost => {}
            }

            let Some(delay) = backoff.next_backoff() else {
                #[cfg(feature = "tracing")]
                tracing::error!(
                    max_attempts = ?backoff.max_attempts(),
                    "Max reconnection attempts reached"
                );
                publisher.publish(ConnectionState::Closed);

                if Self::wait_for_restart(&mut command_rx, &shutdown).await {
                    backoff.reset();
                    continue;
                }
                break;
            };

            publisher.publish(ConnectionState::Reconnecting {
                attempt: backoff.attempt(),
                delay,
            });

            #[cfg(feature = "tracing")]
            tracing::info!(
                attempt = backoff.attempt(),
                max_attempts = ?backoff.max_attempts(),
                ?delay,
                "Attempting to reconnect"
            );

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = sleep(delay) => {}
                Some(Command::Reconnect) = command_rx.recv() => backoff.reset(),
            }
        }

        publisher.publish(ConnectionState::Closed);
    }

    /// Park after the ceiling is reached. Returns `true` when a reconnect was requested.
    async fn wait_for_restart(
        command_rx: &mut mpsc::UnboundedReceiver<Command>,
        shutdown: &CancellationToken,
    ) -> bool {
        tokio::select! {
            () = shutdown.cancelled() => false,
            command = command_rx.recv() => matches!(command, Some(Command::Reconnect)),
        }
    }

    /// Drop frames accepted while a previous connection was dying; they are not replayed.
    fn discard_stale(sender_rx: &mut mpsc::UnboundedReceiver<String>) {
        let mut stale = 0_usize;
        while sender_rx.try_recv().is_ok() {
            stale += 1;
        }

        #[cfg(feature = "tracing")]
        if stale > 0 {
            tracing::warn!(count = stale, "Discarding frames queued for a closed connection");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = stale;
    }

    /// Handle an active WebSocket connection until it ends.
    async fn handle_connection<M, P, H>(
        ws_stream: WsStream,
        sender_rx: &mut mpsc::UnboundedReceiver<String>,
        command_rx: &mut mpsc::UnboundedReceiver<Command>,
        parser: &P,
        handler: &H,
        shutdown: &CancellationToken,
    ) -> Disconnect
    where
        P: MessageParser<M>,
        H: MessageHandler<M>,
    {
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    _ = write.close().await;
                    return Disconnect::Shutdown;
                }

                Some(Command::Reconnect) = command_rx.recv() => {
                    _ = write.close().await;
                    return Disconnect::Requested;
                }

                // Handle incoming messages
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            #[cfg(feature = "tracing")]
                            tracing::trace!(%text, "Received WebSocket text message");

                            match parser.parse(text.as_bytes()) {
                                Ok(messages) => {
                                    for message in messages {
                                        handler.handle(message);
                                    }
                                }
                                Err(e) => {
                                    #[cfg(feature = "tracing")]
                                    tracing::warn!(%text, error = %e, "Failed to parse WebSocket message");
                                    #[cfg(not(feature = "tracing"))]
                                    let _ = (&text, &e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            #[cfg(feature = "tracing")]
                            tracing::info!(?frame, "WebSocket disconnected");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &frame;
                            return Disconnect::Lost;
                        }
                        Some(Ok(_)) => {
                            // Binary frames are ignored; PING/PONG is answered by tungstenite.
                        }
                        Some(Err(e)) => {
                            let error = Error::from(WsError::Connection(e));
                            #[cfg(feature = "tracing")]
                            tracing::error!("WebSocket error: {error}");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &error;
                            return Disconnect::Lost;
                        }
                        None => return Disconnect::Lost,
                    }
                }

                // Handle outgoing frames
                Some(text) = sender_rx.recv() => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        let error = Error::from(WsError::Connection(e));
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Unable to send WebSocket frame: {error}");
                        #[cfg(not(feature = "tracing"))]
                        let _ = &error;
                        return Disconnect::Lost;
                    }
                }
            }
        }
    }

    /// Queue a text frame for the open connection.
    ///
    /// Returns [`WsError::ConnectionClosed`] without queueing anything when the
    /// connection is not open.
    pub fn send_text(&self, text: String) -> Result<()> {
        if !self.state().is_open() {
            return Err(WsError::ConnectionClosed.into());
        }

        self.sender_tx
            .send(text)
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }

    /// Abandon the current connection or pending retry and start a fresh
    /// attempt immediately, with the attempt counter reset.
    ///
    /// Also revives a connection that had given up after the retry ceiling.
    pub fn reconnect(&self) {
        if self.command_tx.send(Command::Reconnect).is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!("Reconnect requested after the connection was closed");
        }
    }

    /// Close the connection permanently. The state ends in [`ConnectionState::Closed`].
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Token cancelled by [`Self::close`], for work that must end with the connection.
    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to the latest connection state.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribe to every connection state transition, in order.
    ///
    /// Unlike [`Self::state_receiver`], short-lived states are not coalesced
    /// away unless the receiver falls more than a few dozen transitions behind.
    #[must_use]
    pub fn state_events(&self) -> broadcast::Receiver<ConnectionState> {
        self.events_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_state_is_open() {
        assert!(
            ConnectionState::Open {
                since: Instant::now()
            }
            .is_open()
        );
        assert!(!ConnectionState::Connecting { attempt: 0 }.is_open());
        assert!(
            !ConnectionState::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
            .is_open()
        );
        assert!(!ConnectionState::Closed.is_open());
        assert!(ConnectionState::Closed.is_closed());
    }

    #[test]
    fn discard_stale_empties_queue() {
        let (sender_tx, mut sender_rx) = mpsc::unbounded_channel();
        sender_tx.send("one".to_owned()).unwrap();
        sender_tx.send("two".to_owned()).unwrap();

        ConnectionManager::discard_stale(&mut sender_rx);

        assert!(sender_rx.try_recv().is_err(), "queue should be empty");
        sender_tx.send("three".to_owned()).unwrap();
        assert_eq!(sender_rx.try_recv().unwrap(), "three");
    }

    #[test]
    fn publisher_skips_unchanged_states() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting { attempt: 0 });
        let (events_tx, mut events_rx) = broadcast::channel(STATE_EVENTS_CAPACITY);
        let publisher = StatePublisher {
            state_tx,
            events_tx,
        };

        publisher.publish(ConnectionState::Connecting { attempt: 0 });
        publisher.publish(ConnectionState::Closed);
        publisher.publish(ConnectionState::Closed);

        assert_eq!(events_rx.try_recv().unwrap(), ConnectionState::Closed);
        assert!(events_rx.try_recv().is_err());
        assert_eq!(*state_rx.borrow(), ConnectionState::Closed);
    }

    #[test]
    fn new_requires_runtime() {
        struct NoopParser;
        impl MessageParser<()> for NoopParser {
            fn parse(&self, _bytes: &[u8]) -> Result<Vec<()>> {
                Ok(Vec::new())
            }
        }

        struct NoopHandler;
        impl MessageHandler<()> for NoopHandler {
            fn handle(&self, _message: ()) {}
        }

        let Err(error) = ConnectionManager::new(
            "ws://127.0.0.1:1".to_owned(),
            Config::default(),
            NoopParser,
            NoopHandler,
        ) else {
            panic!("connection manager must not start without a runtime");
        };

        assert_eq!(error.kind(), crate::error::Kind::Validation);
    }
}
