use crate::bot::IncomingMessage;
use anyhow::Result;
use async_trait::async_trait;

/// Connection to a chat platform
#[async_trait]
pub trait ChatTransport: Send {
    /// Next batch of new messages. `None` once the transport has closed.
    async fn poll(&mut self) -> Result<Option<Vec<IncomingMessage>>>;

    async fn send(&self, channel_id: &str, text: &str) -> Result<()>;

    /// Whether an empty poll should be followed by a pause before polling again
    fn needs_pacing(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str;
}
