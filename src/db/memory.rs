use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::{RowSink, RowWriter};
use crate::error::EtlError;
use crate::record::PersistedRow;

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<PersistedRow>,
    opened: usize,
    closed: usize,
    refuse_connections: bool,
    failing_positions: HashSet<usize>,
}

/// In-memory row sink for tests and dry runs.
///
/// Clones share the same storage, so a test can hand one clone to the loader
/// and inspect the captured rows through another. Connection opens and
/// closes are counted to check that every load call releases its writer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open` fail as if the database were unreachable
    pub fn refuse_connections(self) -> Self {
        self.lock().refuse_connections = true;
        self
    }

    /// Make inserts for the given 1-based message positions fail
    pub fn fail_inserts_at(self, positions: impl IntoIterator<Item = usize>) -> Self {
        self.lock().failing_positions.extend(positions);
        self
    }

    /// Rows written so far, in insert order
    pub fn rows(&self) -> Vec<PersistedRow> {
        self.lock().rows.clone()
    }

    /// Number of writers opened
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Number of writers dropped
    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RowSink for MemorySink {
    type Writer = MemoryWriter;

    fn open(&self) -> Result<MemoryWriter, EtlError> {
        let mut inner = self.lock();
        if inner.refuse_connections {
            return Err(EtlError::Connection("connection refused".to_string()));
        }
        inner.opened += 1;

        Ok(MemoryWriter { sink: self.clone() })
    }
}

/// Writer handed out by [`MemorySink`]
pub struct MemoryWriter {
    sink: MemorySink,
}

impl RowWriter for MemoryWriter {
    fn insert(&mut self, position: usize, row: &PersistedRow) -> Result<(), EtlError> {
        let mut inner = self.sink.lock();

        if inner.failing_positions.contains(&position) {
            return Err(EtlError::Insert {
                position,
                source: DieselError::DatabaseError(
                    DatabaseErrorKind::CheckViolation,
                    Box::new(format!("row {} rejected", position)),
                ),
            });
        }

        inner.rows.push(row.clone());
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.sink.lock().closed += 1;
    }
}
