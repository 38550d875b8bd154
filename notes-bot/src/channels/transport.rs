use async_trait::async_trait;

use super::types::OutboundMessage;
use crate::error::TransportError;

/// Outbound side of a chat channel. The controller never assumes which
/// protocol sits behind it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, user_id: i64, message: OutboundMessage) -> Result<(), TransportError>;
}
