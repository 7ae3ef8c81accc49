/// NATS JetStream message source
///
/// Pulls a single batch through a durable pull consumer. Acknowledgements are
/// disabled on the consumer, so delivered messages are never redelivered.

use async_nats::jetstream::{self, consumer::pull};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

use crate::error::EtlError;
use crate::queue::message::RawMessage;
use crate::queue::{MessageSource, ReceiveRequest};

pub const DEFAULT_CONSUMER_NAME: &str = "login-etl";

#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URL, e.g. `nats://localhost:4222`
    pub url: String,
    /// JetStream stream holding the login events
    pub stream_name: String,
    /// Durable consumer name
    pub consumer_name: String,
}

impl NatsConfig {
    pub fn new(url: impl Into<String>, stream_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream_name: stream_name.into(),
            consumer_name: DEFAULT_CONSUMER_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NatsSource {
    config: NatsConfig,
}

impl NatsSource {
    pub fn new(config: NatsConfig) -> Self {
        Self { config }
    }

    /// Connect and bind the durable pull consumer
    async fn consumer(&self) -> Result<jetstream::consumer::Consumer<pull::Config>, EtlError> {
        let client = async_nats::connect(&self.config.url)
            .await
            .map_err(|e| unavailable("connect", e))?;
        tracing::info!("Connected to NATS at {}", self.config.url);

        let jetstream = jetstream::new(client);

        let stream = jetstream
            .get_stream(&self.config.stream_name)
            .await
            .map_err(|e| unavailable("get stream", e))?;

        stream
            .get_or_create_consumer(
                &self.config.consumer_name,
                pull::Config {
                    durable_name: Some(self.config.consumer_name.clone()),
                    ack_policy: jetstream::consumer::AckPolicy::None,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| unavailable("create consumer", e))
    }
}

fn unavailable(action: &str, err: impl std::fmt::Display) -> EtlError {
    EtlError::QueueUnavailable(format!("NATS {} failed: {}", action, err))
}

#[async_trait]
impl MessageSource for NatsSource {
    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<RawMessage>, EtlError> {
        let consumer = self.consumer().await?;

        let mut batch = consumer
            .batch()
            .max_messages(request.max_messages as usize)
            .expires(Duration::from_secs(u64::from(request.wait_time_secs)))
            .messages()
            .await
            .map_err(|e| unavailable("fetch", e))?;

        let mut messages = Vec::new();
        while let Some(message) = batch.next().await {
            let message = message.map_err(|e| unavailable("receive", e))?;

            let message_id = message.info().ok().map(|info| info.stream_sequence.to_string());
            messages.push(RawMessage::from_payload(message_id, message.payload.to_vec()));
        }

        Ok(messages)
    }

    fn describe(&self) -> String {
        format!("nats {}/{}", self.config.url, self.config.stream_name)
    }
}
