//! MessageSender port - the transport the scheduler drives.

use async_trait::async_trait;

use crate::domain::{Recipient, SendError};

/// Sends one rendered message to one recipient.
///
/// The scheduler knows nothing about the transport. It calls `send` at most
/// once at a time and classifies any `SendError` it gets back.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, recipient: &Recipient, message: &str) -> Result<(), SendError>;
}
