#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    dead_code,
    reason = "Each integration test binary uses a different subset of the helpers"
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use leaderboard_live::ws::ConnectionState;
use leaderboard_live::ws::config::Config;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// How long a test waits for something that should happen.
pub const WAIT: Duration = Duration::from_secs(5);

/// Mock live-update server.
pub struct MockWsServer {
    addr: SocketAddr,
    /// Broadcast frames to ALL connected clients
    message_tx: broadcast::Sender<String>,
    /// Frames received from clients
    inbound_rx: mpsc::UnboundedReceiver<String>,
    /// While set, connections are dropped and new ones closed right after the handshake
    reject: Arc<AtomicBool>,
}

impl MockWsServer {
    /// Start a mock WebSocket server on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (message_tx, _) = broadcast::channel::<String>(100);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let reject = Arc::new(AtomicBool::new(false));

        let broadcast_tx = message_tx.clone();
        let server_reject = Arc::clone(&reject);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                // Subscribe before the handshake completes so nothing sent after the
                // client sees the connection open is missed
                let mut msg_rx = broadcast_tx.subscribe();

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };

                let (mut write, mut read) = ws_stream.split();
                let frames_tx = inbound_tx.clone();
                let reject = Arc::clone(&server_reject);

                tokio::spawn(async move {
                    loop {
                        if reject.load(Ordering::SeqCst) {
                            _ = write.send(Message::Close(None)).await;
                            break;
                        }

                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        drop(frames_tx.send(text.to_string()));
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            msg = msg_rx.recv() => {
                                match msg {
                                    Ok(text) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                }
                            }
                            () = tokio::time::sleep(Duration::from_millis(20)) => {}
                        }
                    }
                });
            }
        });

        Self {
            addr,
            message_tx,
            inbound_rx,
            reject,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/loudio", self.addr)
    }

    /// Send a frame to all connected clients.
    pub fn send(&self, message: &str) {
        drop(self.message_tx.send(message.to_owned()));
    }

    /// Close every connection and keep closing new ones until [`Self::accept_again`].
    pub fn reject_connections(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn accept_again(&self) {
        self.reject.store(false, Ordering::SeqCst);
    }

    /// Receive the next frame a client sent.
    pub async fn recv_frame(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.inbound_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Receive a frame within `within`, or `None`.
    pub async fn try_recv_frame(&mut self, within: Duration) -> Option<String> {
        timeout(within, self.inbound_rx.recv()).await.ok().flatten()
    }
}

/// An endpoint nothing listens on, so every connection attempt is refused.
pub async fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/loudio")
}

/// Fast reconnect schedule for tests.
pub fn fast_config(base_delay: Duration, max_attempts: Option<u32>) -> Config {
    let mut config = Config::default();
    config.connect_timeout = Duration::from_secs(2);
    config.reconnect.base_delay = base_delay;
    config.reconnect.max_attempts = max_attempts;
    config
}

/// Receive state transitions until `predicate` matches, returning everything seen.
pub async fn collect_states_until(
    events: &mut broadcast::Receiver<ConnectionState>,
    predicate: impl Fn(&ConnectionState) -> bool,
) -> Vec<ConnectionState> {
    let mut seen = Vec::new();
    loop {
        let state = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for connection state")
            .unwrap();
        seen.push(state);
        if predicate(&state) {
            return seen;
        }
    }
}
