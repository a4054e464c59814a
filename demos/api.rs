//! Leaderboard data API explorer.
//!
//! Fetches the leaderboard, recent changes, the change history and backend
//! statistics, logging a summary of each.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example api --features api
//! ```

use leaderboard_live::api::Client;
use leaderboard_live::api::types::ChangesRequest;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let client = Client::default();
    info!(host = %client.host());

    match client.members().await {
        Ok(members) => {
            info!(endpoint = "members", count = members.len());
            for member in members.iter().take(10) {
                info!(endpoint = "members", rank = member.rank, handle = %member.handle, balance = %member.balance_usd);
            }
        }
        Err(e) => error!(endpoint = "members", error = %e),
    }

    let request = ChangesRequest::builder().limit(10).time_range("24h").build();
    match client.changes(&request).await {
        Ok(changes) => {
            info!(
                endpoint = "changes",
                joined = changes.new_members.len(),
                left = changes.removed_members.len(),
                moved = changes.rank_changes.len()
            );
            for change in &changes.rank_changes {
                info!(endpoint = "changes", handle = %change.member.handle, delta = change.delta());
            }
        }
        Err(e) => error!(endpoint = "changes", error = %e),
    }

    match client.all_changes().await {
        Ok(history) => info!(endpoint = "changes/all", count = history.len()),
        Err(e) => error!(endpoint = "changes/all", error = %e),
    }

    match client.stats().await {
        Ok(stats) => info!(
            endpoint = "stats",
            uptime = stats.uptime,
            members = stats.total_members,
            snapshots = stats.history_snapshots,
            last_update = %stats.last_update
        ),
        Err(e) => error!(endpoint = "stats", error = %e),
    }

    Ok(())
}
