/// In-memory message source for tests and local replays

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::EtlError;
use crate::queue::message::RawMessage;
use crate::queue::{MessageSource, ReceiveRequest};

#[derive(Debug, Clone)]
enum Reply {
    Messages(Vec<RawMessage>),
    Unavailable(String),
}

/// Returns a fixed batch, truncated to the requested `max_messages`
#[derive(Debug, Clone)]
pub struct MemorySource {
    reply: Reply,
    receives: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            reply: Reply::Messages(messages),
            receives: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build a source from raw message bodies
    pub fn from_bodies<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(bodies.into_iter().map(RawMessage::new).collect())
    }

    /// A source whose every receive fails with `QueueUnavailable`
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            reply: Reply::Unavailable(reason.into()),
            receives: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of receive calls made so far
    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<RawMessage>, EtlError> {
        self.receives.fetch_add(1, Ordering::SeqCst);

        match &self.reply {
            Reply::Messages(messages) => Ok(messages
                .iter()
                .take(request.max_messages as usize)
                .cloned()
                .collect()),
            Reply::Unavailable(reason) => Err(EtlError::QueueUnavailable(reason.clone())),
        }
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
