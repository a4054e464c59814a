#![expect(
    clippy::module_name_repetitions,
    reason = "Re-exported names intentionally match their modules for API clarity"
)]

//! Live-update client for the leaderboard push channel.
//!
//! The server pushes text frames shaped as
//! `{"type": "...", "data": ..., "timestamp": "..."}`. Listeners register per
//! [`EventKind`] and receive only the `data` payload.
//!
//! # Available Events
//!
//! - **`member_changes`**: members joined, left or changed rank ([`Event::MemberChanges`])
//! - **`stats_update`**: aggregate backend statistics changed ([`Event::StatsUpdate`])
//! - **`connected`**: greeting sent when a connection opens ([`Event::Connected`])
//!
//! # Example
//!
//! ```rust, no_run
//! use leaderboard_live::live::{EventKind, Listener, LiveUpdateClient};
//! use futures::StreamExt as _;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = LiveUpdateClient::default();
//!
//!     // Callback style
//!     let refetch = Listener::new(|_| println!("leaderboard changed, refetching"));
//!     client.subscribe(EventKind::MemberChanges, &refetch);
//!     client.subscribe(EventKind::StatsUpdate, &refetch);
//!
//!     // Stream style
//!     let mut stats = Box::pin(client.stream(EventKind::StatsUpdate));
//!     while let Some(data) = stats.next().await {
//!         println!("stats: {}", data?);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod subscription;
pub mod types;

// Re-export commonly used types
pub use client::{DEFAULT_ENDPOINT, LiveUpdateClient};
pub use subscription::{EnvelopeParser, SubscriptionRegistry};
pub use types::{Event, EventKind, Listener, LiveMessage};
