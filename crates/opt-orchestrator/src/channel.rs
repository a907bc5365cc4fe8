use async_trait::async_trait;

use opt_wire::{ClientMessage, ServerMessage};

/// One event read from a session's bidirectional client channel.
pub enum ChannelEvent {
    Message(ClientMessage),
    /// A frame arrived but failed to parse or failed `ClientMessage::validate()`.
    /// Distinct from `Disconnected` so a `Session` can report the protocol
    /// error to the client before terminating, rather than hanging or
    /// silently dropping the frame.
    Invalid(String),
    Disconnected,
}

/// Abstracts the bidirectional message channel (WebSocket, or an in-process
/// REST-backed equivalent) a [`crate::Session`] drives. Transport mechanics
/// below this boundary are a `Session`'s collaborator, not its concern.
#[async_trait]
pub trait SessionChannel: Send {
    async fn send(&mut self, message: ServerMessage) -> anyhow::Result<()>;
    async fn recv(&mut self) -> ChannelEvent;
}
