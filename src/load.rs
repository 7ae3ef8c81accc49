//! Load stage: normalize sanitized records and write one committed row each.

use chrono::{Local, NaiveDate};

use crate::config::FailurePolicy;
use crate::db::{RowSink, RowWriter};
use crate::error::{EtlError, Stage};
use crate::record::SanitizedRecord;

/// Outcome of a load call
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Rows inserted and committed
    pub inserted: usize,
    /// Records that were skipped, each error naming its message position
    pub failures: Vec<EtlError>,
}

/// Today's date in local time, used to stamp `create_date`
pub fn processing_date() -> NaiveDate {
    Local::now().date_naive()
}

/// Writes sanitized records through a [`RowSink`]
pub struct Loader<K> {
    sink: K,
    policy: FailurePolicy,
    clock: fn() -> NaiveDate,
}

impl<K: RowSink> Loader<K> {
    pub fn new(sink: K, policy: FailurePolicy) -> Self {
        Self {
            sink,
            policy,
            clock: processing_date,
        }
    }

    /// Replace the date source used for `create_date`
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    /// Load a batch
    ///
    /// One connection is opened for the whole call and released when the
    /// call returns, whatever the outcome. Each record is normalized right
    /// before its insert, and each insert commits on its own.
    ///
    /// Under [`FailurePolicy::Isolate`] a record with a malformed version or a
    /// failed insert is reported in [`LoadReport::failures`] and the loader
    /// moves on. Under [`FailurePolicy::Abort`] the first such failure is
    /// returned; rows written before it stay committed.
    ///
    /// # Errors
    /// * `EmptyBatch(Load)` if `records` is empty (no connection is opened)
    /// * `Connection` if the sink cannot be opened
    /// * any record-level error when the policy is `Abort`
    pub fn load(&self, records: Vec<SanitizedRecord>) -> Result<LoadReport, EtlError> {
        if records.is_empty() {
            return Err(EtlError::EmptyBatch(Stage::Load));
        }

        let mut writer = self.sink.open()?;
        let mut report = LoadReport::default();
        let total = records.len();

        for record in records {
            let position = record.position;
            let result = record
                .into_row((self.clock)())
                .and_then(|row| writer.insert(position, &row));

            match result {
                Ok(()) => report.inserted += 1,
                Err(e) if e.is_record_level() && self.policy == FailurePolicy::Isolate => {
                    tracing::warn!(position, "Skipping record: {}", e);
                    report.failures.push(e);
                }
                Err(e) => {
                    tracing::error!(
                        position,
                        committed = report.inserted,
                        "Aborting load: {}",
                        e
                    );
                    return Err(e);
                }
            }
        }

        tracing::info!(
            "Loaded {} of {} records into user_logins",
            report.inserted,
            total
        );

        Ok(report)
    }
}
