//! Live leaderboard watcher.
//!
//! Connects to the push channel, logs every membership change and stats update,
//! and reports connection state transitions including reconnects.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example live
//! ```
//!
//! Pass an endpoint to watch a different backend:
//! ```sh
//! cargo run --example live -- ws://localhost:3001/loudio
//! ```

use std::time::Duration;

use futures::StreamExt as _;
use leaderboard_live::live::{DEFAULT_ENDPOINT, EventKind, Listener, LiveUpdateClient};
use leaderboard_live::types::{MemberChange, Stats};
use leaderboard_live::ws::ConnectionState;
use leaderboard_live::ws::config::Config;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
    let client = LiveUpdateClient::new(&endpoint, Config::default())?;
    info!(endpoint = %client.endpoint(), state = ?client.state());

    let mut states = client.state_events();
    tokio::spawn(async move {
        while let Ok(state) = states.recv().await {
            match state {
                ConnectionState::Open { .. } => info!(event = "open"),
                ConnectionState::Reconnecting { attempt, delay } => {
                    warn!(event = "reconnecting", attempt, ?delay);
                }
                ConnectionState::Closed => {
                    warn!(event = "closed");
                    break;
                }
                other => debug!(event = "state", state = ?other),
            }
        }
    });

    let changes = Listener::typed(|changes: Vec<MemberChange>| {
        for change in changes {
            info!(
                stream = "member_changes",
                change = %change.change_type,
                handle = %change.member.handle,
                rank = change.member.rank,
                previous_rank = ?change.previous_rank
            );
        }
    });
    client.subscribe(EventKind::MemberChanges, &changes);

    let greeting = Listener::new(|data| info!(stream = "connected", %data));
    client.subscribe(EventKind::Connected, &greeting);

    let mut stats = Box::pin(client.stream(EventKind::StatsUpdate));
    while let Ok(Some(result)) = timeout(Duration::from_secs(120), stats.next()).await {
        match result.and_then(|data| serde_json::from_value::<Stats>(data).map_err(Into::into)) {
            Ok(stats) => info!(
                stream = "stats_update",
                members = stats.total_members,
                changes = stats.total_changes,
                clients = stats.ws_clients
            ),
            Err(e) => debug!(stream = "stats_update", error = %e),
        }
    }

    client.unsubscribe(EventKind::MemberChanges, &changes);
    client.close();

    Ok(())
}
