//! Extract stage: one bounded receive from the queue.

use crate::error::{EtlError, Stage};
use crate::queue::{MessageSource, RawMessage, ReceiveRequest};

/// Fetches a single batch from a [`MessageSource`]
pub struct Extractor<S> {
    source: S,
}

impl<S: MessageSource> Extractor<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Receive one batch
    ///
    /// There is exactly one receive attempt. `max_messages` and
    /// `wait_time_secs` are forwarded to the queue service as hints.
    ///
    /// # Errors
    /// * `QueueUnavailable` if the queue cannot be reached or answers garbage
    /// * `EmptyBatch(Extract)` if the queue returned no messages
    pub async fn fetch(&self, request: &ReceiveRequest) -> Result<Vec<RawMessage>, EtlError> {
        tracing::info!("Fetching messages from {}...", self.source.describe());

        let messages = self.source.receive(request).await?;

        if messages.is_empty() {
            return Err(EtlError::EmptyBatch(Stage::Extract));
        }

        // max_messages is only a hint to the service
        if messages.len() > request.max_messages as usize {
            tracing::warn!(
                received = messages.len(),
                max_messages = request.max_messages,
                "Queue returned more messages than requested"
            );
        }

        tracing::info!("Received {} messages", messages.len());
        Ok(messages)
    }
}
