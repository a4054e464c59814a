//! Core traits for generic WebSocket infrastructure.

use std::sync::Arc;

/// Message parser trait for converting raw frame bytes to messages.
///
/// # Example
///
/// ```ignore
/// pub struct SimpleParser;
///
/// impl MessageParser<MyMessage> for SimpleParser {
///     fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<MyMessage>> {
///         let msg: MyMessage = serde_json::from_slice(bytes)?;
///         Ok(vec![msg])
///     }
/// }
/// ```
pub trait MessageParser<M>: Send + Sync + 'static {
    /// Parse incoming bytes into messages.
    ///
    /// May return an empty vec when the frame is well-formed but carries nothing
    /// this client is interested in. An error means the frame was malformed; the
    /// connection logs it and keeps going.
    fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<M>>;
}

/// Receives every parsed message on the connection task.
///
/// Handlers run synchronously between socket reads, so they must not block.
pub trait MessageHandler<M>: Send + Sync + 'static {
    fn handle(&self, message: M);
}

impl<M, H: MessageHandler<M>> MessageHandler<M> for Arc<H> {
    fn handle(&self, message: M) {
        (**self).handle(message);
    }
}
