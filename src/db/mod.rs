//! Database sink for sanitized login rows.
//!
//! The loader talks to the database through the [`RowSink`] / [`RowWriter`]
//! seam. The Postgres implementation is gated behind the `postgres` feature.

pub mod memory;
pub mod schema;

#[cfg(feature = "postgres")]
pub mod postgres;

use crate::error::EtlError;
use crate::record::PersistedRow;

/// Source of database connections for one load call
pub trait RowSink {
    type Writer: RowWriter;

    /// Open the connection used for the whole load call
    ///
    /// The connection is released when the returned writer is dropped.
    fn open(&self) -> Result<Self::Writer, EtlError>;
}

/// Connection that writes one committed row per call
pub trait RowWriter {
    /// Insert a single row; it is committed before this returns
    ///
    /// `position` is the 1-based ordinal of the source message, used in errors.
    fn insert(&mut self, position: usize, row: &PersistedRow) -> Result<(), EtlError>;
}

pub use memory::{MemorySink, MemoryWriter};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresSink, PostgresWriter};
