//! Transform stage: parse message bodies and mask PII.

use crate::error::{EtlError, Stage};
use crate::queue::RawMessage;
use crate::record::{RawRecord, SanitizedRecord};

/// Records that survived the transform, plus the ones that were skipped
#[derive(Debug, Default)]
pub struct TransformOutput {
    /// Sanitized records in arrival order
    pub records: Vec<SanitizedRecord>,
    /// One validation error per skipped message
    pub rejected: Vec<EtlError>,
}

/// Masks `ip` and `device_id` in every valid message
#[derive(Debug, Default, Clone, Copy)]
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Self
    }

    /// Transform a batch
    ///
    /// Messages are processed in order. A message whose body is unusable or
    /// lacks `ip`/`device_id` is logged and skipped; the rest of the batch
    /// carries on. The output is never longer than the input.
    ///
    /// # Errors
    /// `EmptyBatch(Transform)` if `messages` is empty.
    pub fn transform(&self, messages: Vec<RawMessage>) -> Result<TransformOutput, EtlError> {
        if messages.is_empty() {
            return Err(EtlError::EmptyBatch(Stage::Transform));
        }

        let mut output = TransformOutput::default();

        for (index, message) in messages.into_iter().enumerate() {
            let position = index + 1;

            match RawRecord::parse(position, &message.body) {
                Ok(record) => output.records.push(record.sanitize(position)),
                Err(e) => {
                    tracing::warn!(
                        position,
                        message_id = message.message_id.as_deref().unwrap_or("-"),
                        "Skipping message: {}",
                        e
                    );
                    output.rejected.push(e);
                }
            }
        }

        tracing::info!(
            "Masked {} records ({} skipped)",
            output.records.len(),
            output.rejected.len()
        );

        Ok(output)
    }
}
