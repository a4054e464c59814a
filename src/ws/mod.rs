//! Core WebSocket infrastructure.
//!
//! This module provides connection management that is independent of the
//! messages carried over it. The live-update client in [`crate::live`] plugs a
//! parser and a handler into it.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: WebSocket connection handler with linear-backoff reconnection
//! - [`MessageParser`]: Trait for parsing incoming WebSocket frames
//! - [`MessageHandler`]: Trait for consuming parsed messages on the connection task
//!
//! # Example
//!
//! ```ignore
//! let connection = ConnectionManager::new(endpoint, config, SimpleParser, handler)?;
//! let state = connection.state();
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod traits;

pub use connection::{ConnectionManager, ConnectionState};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
