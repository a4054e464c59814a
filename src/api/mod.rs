//! Leaderboard data API client.
//!
//! **Feature flag:** `api` (required to use this module)
//!
//! The live-update channel only says *that* something changed; this client
//! fetches *what* changed.
//!
//! ## Available Endpoints
//!
//! | Endpoint | Description |
//! |----------|-------------|
//! | `GET /members` | Current leaderboard |
//! | `GET /changes` | Latest joins, removals and rank movements |
//! | `GET /changes/all` | Full change history |
//! | `GET /stats` | Backend statistics |
//! | `POST /scrape` | Trigger a scrape |
//!
//! # Example
//!
//! ```no_run
//! use leaderboard_live::api::{Client, types::ChangesRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::default();
//!
//! let request = ChangesRequest::builder().limit(10).build();
//! let changes = client.changes(&request).await?;
//!
//! for member in &changes.new_members {
//!     println!("joined: {} at #{}", member.name, member.rank);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # API Base URL
//!
//! The default API endpoint is `http://rpc.servox.store/loud/api`.

pub mod client;
pub mod types;

pub use client::{Client, DEFAULT_HOST};
