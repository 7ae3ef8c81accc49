//! Queue backends the extractor can pull from.
//!
//! Every backend implements [`MessageSource`]: one receive call per run,
//! bounded by a [`ReceiveRequest`]. Backends return whatever the service
//! handed back, empty or not; the batch policy lives in the extractor.

pub mod memory;
pub mod message;
pub mod nats;
pub mod sqs;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::error::EtlError;

pub use memory::MemorySource;
pub use message::{RawMessage, ReceiveResponse};
pub use nats::{NatsConfig, NatsSource};
pub use sqs::SqsSource;

/// Hints forwarded to the queue service for a single receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub max_messages: u32,
    pub wait_time_secs: u32,
}

/// A network queue that can hand out a batch of messages
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Receive up to `request.max_messages` messages in one call
    ///
    /// # Errors
    /// `QueueUnavailable` on transport or response-format failures.
    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<RawMessage>, EtlError>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Supported queue services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueBackend {
    /// SQS JSON protocol (AWS or LocalStack)
    #[default]
    Sqs,
    /// NATS JetStream pull consumer
    Nats,
}

impl FromStr for QueueBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqs" => Ok(QueueBackend::Sqs),
            "nats" | "jetstream" => Ok(QueueBackend::Nats),
            other => Err(format!("Unsupported queue backend: '{}'. Supported: sqs, nats", other)),
        }
    }
}

impl fmt::Display for QueueBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueBackend::Sqs => write!(f, "sqs"),
            QueueBackend::Nats => write!(f, "nats"),
        }
    }
}
