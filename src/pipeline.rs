//! Pipeline driver: extract, transform, load, in that order, once.
//!
//! Record-level failures are collected into the [`RunSummary`]; any other
//! error stops the run and is returned to the caller before later stages
//! start. The database connection is scoped to the load stage, so nothing is
//! left open when an error propagates out of [`Pipeline::run`].

use std::fmt;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RunConfig;
use crate::db::RowSink;
use crate::error::{EtlError, Stage};
use crate::extract::Extractor;
use crate::load::Loader;
use crate::queue::MessageSource;
use crate::transform::Transformer;

/// What a completed run did
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Messages received from the queue
    pub received: usize,
    /// Records that passed validation and were masked
    pub masked: usize,
    /// Rows committed to `user_logins`
    pub inserted: usize,
    /// Messages skipped by the transformer
    pub rejected: Vec<EtlError>,
    /// Records skipped by the loader
    pub load_failures: Vec<EtlError>,
}

impl RunSummary {
    /// True when the queue had nothing to offer
    pub fn is_idle(&self) -> bool {
        self.received == 0
    }

    /// All record-level failures, transform first
    pub fn failures(&self) -> impl Iterator<Item = &EtlError> {
        self.rejected.iter().chain(self.load_failures.iter())
    }

    pub fn skipped(&self) -> usize {
        self.rejected.len() + self.load_failures.len()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received {}, masked {}, inserted {}, skipped {}",
            self.received,
            self.masked,
            self.inserted,
            self.skipped()
        )
    }
}

/// One configured ETL run
pub struct Pipeline<S, K> {
    config: RunConfig,
    extractor: Extractor<S>,
    transformer: Transformer,
    loader: Loader<K>,
}

impl<S: MessageSource, K: RowSink> Pipeline<S, K> {
    pub fn new(config: RunConfig, source: S, sink: K) -> Self {
        let loader = Loader::new(sink, config.failure_policy);
        Self::with_loader(config, source, loader)
    }

    /// Build a pipeline around a preconfigured loader
    pub fn with_loader(config: RunConfig, source: S, loader: Loader<K>) -> Self {
        Self {
            config,
            extractor: Extractor::new(source),
            transformer: Transformer::new(),
            loader,
        }
    }

    /// Run the pipeline once
    ///
    /// # Errors
    /// Any terminal error from a stage; record-level failures are reported in
    /// the summary instead (or returned, for load failures under
    /// `FailurePolicy::Abort`).
    pub async fn run(&self) -> Result<RunSummary, EtlError> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("etl_run", %run_id, queue = %self.config.queue_name);

        self.run_stages().instrument(span).await
    }

    async fn run_stages(&self) -> Result<RunSummary, EtlError> {
        let request = self.config.receive_request();

        let messages = match self.extractor.fetch(&request).await {
            Ok(messages) => messages,
            Err(EtlError::EmptyBatch(Stage::Extract)) if self.config.allow_empty => {
                tracing::info!("Queue is empty, nothing to do");
                return Ok(RunSummary::default());
            }
            Err(e) => return Err(e),
        };

        let mut summary = RunSummary {
            received: messages.len(),
            ..Default::default()
        };

        tracing::info!("Masking PIIs from the messages...");
        let output = self.transformer.transform(messages)?;
        summary.masked = output.records.len();
        summary.rejected = output.rejected;

        tracing::info!("Loading messages to Postgres...");
        let report = self.loader.load(output.records)?;
        summary.inserted = report.inserted;
        summary.load_failures = report.failures;

        tracing::info!("Run complete: {}", summary);
        Ok(summary)
    }
}
