//! Per-peer duplex message channels.

use crate::protocol::Message;

/// A duplex channel to one peer. Framing, transport and encryption live
/// behind this trait; the protocol only sees whole [`Message`]s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()>;
    async fn recv(&mut self) -> anyhow::Result<Message>;
}

pub mod in_memory;
pub mod tcp;
