//! SQS-compatible queue client (AWS JSON protocol).
//!
//! Sends a single `ReceiveMessage` call per run. Requests are unsigned, which
//! is what LocalStack accepts; signing for real AWS endpoints is left to a
//! fronting proxy.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::EtlError;
use crate::queue::message::{RawMessage, ReceiveResponse};
use crate::queue::{MessageSource, ReceiveRequest};

const RECEIVE_MESSAGE_TARGET: &str = "AmazonSQS.ReceiveMessage";
const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Service-side bound on `MaxNumberOfMessages`
pub const SQS_MAX_MESSAGES: u32 = 10;

/// Service-side bound on `WaitTimeSeconds`
pub const SQS_MAX_WAIT_TIME_SECS: u32 = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageInput<'a> {
    queue_url: &'a str,
    max_number_of_messages: u32,
    wait_time_seconds: u32,
}

/// Receives messages from `{endpoint}/{queue}`
#[derive(Debug, Clone)]
pub struct SqsSource {
    client: reqwest::Client,
    endpoint_url: String,
    queue_url: String,
}

impl SqsSource {
    /// Create a client for one queue
    ///
    /// # Arguments
    /// * `endpoint_url` - Service endpoint, e.g. `http://localhost:4566/000000000000`
    /// * `queue_url` - Full queue URL, usually `{endpoint_url}/{queue_name}`
    pub fn new(endpoint_url: impl Into<String>, queue_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint_url: endpoint_url.into(),
            queue_url: queue_url.into(),
        }
    }

    fn request_body(&self, request: &ReceiveRequest) -> Result<Vec<u8>, EtlError> {
        if request.max_messages == 0 || request.max_messages > SQS_MAX_MESSAGES {
            return Err(EtlError::Config(format!(
                "SQS max messages must be between 1 and {}, got {}",
                SQS_MAX_MESSAGES, request.max_messages
            )));
        }
        if request.wait_time_secs > SQS_MAX_WAIT_TIME_SECS {
            return Err(EtlError::Config(format!(
                "SQS wait time must be at most {} seconds, got {}",
                SQS_MAX_WAIT_TIME_SECS, request.wait_time_secs
            )));
        }

        let input = ReceiveMessageInput {
            queue_url: &self.queue_url,
            max_number_of_messages: request.max_messages,
            wait_time_seconds: request.wait_time_secs,
        };

        serde_json::to_vec(&input)
            .map_err(|e| EtlError::QueueUnavailable(format!("failed to encode request: {}", e)))
    }
}

/// Parse a `ReceiveMessage` response body; a missing `Messages` key is an empty batch
pub fn parse_receive_body(body: &str) -> Result<Vec<RawMessage>, EtlError> {
    let response: ReceiveResponse = serde_json::from_str(body)
        .map_err(|e| EtlError::QueueUnavailable(format!("unparseable response: {}", e)))?;

    Ok(response.messages.unwrap_or_default())
}

#[async_trait]
impl MessageSource for SqsSource {
    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<RawMessage>, EtlError> {
        let body = self.request_body(request)?;

        tracing::debug!(
            queue_url = %self.queue_url,
            max_messages = request.max_messages,
            wait_time_secs = request.wait_time_secs,
            "Sending ReceiveMessage"
        );

        let response = self
            .client
            .post(&self.endpoint_url)
            .header("Content-Type", AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", RECEIVE_MESSAGE_TARGET)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(EtlError::QueueUnavailable(format!("HTTP {}: {}", status, text)));
        }

        parse_receive_body(&text)
    }

    fn describe(&self) -> String {
        format!("sqs {}", self.queue_url)
    }
}
