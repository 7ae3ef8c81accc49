//! # login-etl: masked login event loader
//!
//! Pulls a batch of login events from a message queue, masks the two PII
//! fields (`ip`, `device_id`) with a reversible encoding and writes the
//! normalized records into the Postgres table `user_logins`.
//!
//! ## Pipeline
//!
//! - **Extract**: one bounded receive from an SQS-compatible queue or a NATS
//!   JetStream stream. An unreachable queue or an empty batch stops the run.
//! - **Transform**: parse each message body and mask `ip` / `device_id`.
//!   Messages missing either field are skipped and reported by position.
//! - **Load**: default `locale` to `"None"`, stamp `create_date` with today's
//!   date, truncate `app_version` to its major number, then insert and commit
//!   one row at a time over a single connection.
//!
//! ## Example
//!
//! ```ignore
//! use login_etl::{DatabaseConfig, Pipeline, PostgresSink, RunConfig, SqsSource};
//!
//! let config = RunConfig::new("http://localhost:4566/000000000000", "login-queue");
//! let source = SqsSource::new(&config.endpoint_url, config.queue_url());
//! let db = DatabaseConfig::resolve("postgres.yaml", std::env::var("DATABASE_URL").ok())?;
//! let sink = PostgresSink::new(db, false);
//!
//! let summary = Pipeline::new(config, source, sink).run().await?;
//! println!("{}", summary);
//! ```

// Core modules
pub mod codec;
pub mod config;
pub mod error;
pub mod record;

// Pipeline stages
pub mod extract;
pub mod transform;
pub mod load;
pub mod pipeline;

// External collaborators
pub mod db;
pub mod queue;

// Re-export key types
pub use codec::{decode, encode, DecodingError};
pub use config::{DatabaseConfig, FailurePolicy, PostgresCredentials, RunConfig};
pub use error::{EtlError, EtlResult, Stage};
pub use record::{PersistedRow, RawRecord, SanitizedRecord};

pub use extract::Extractor;
pub use load::{LoadReport, Loader};
pub use pipeline::{Pipeline, RunSummary};
pub use transform::{TransformOutput, Transformer};

pub use db::{MemorySink, RowSink, RowWriter};
pub use queue::{
    MemorySource, MessageSource, NatsConfig, NatsSource, QueueBackend, RawMessage, ReceiveRequest,
    SqsSource,
};

#[cfg(feature = "postgres")]
pub use db::PostgresSink;
