//! Postgres connection management and row inserts.

use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::config::DatabaseConfig;
use crate::db::schema::{self, user_logins};
use crate::db::{RowSink, RowWriter};
use crate::error::EtlError;
use crate::record::PersistedRow;

/// Opens one Postgres connection per load call
#[derive(Debug, Clone)]
pub struct PostgresSink {
    config: DatabaseConfig,
    create_table: bool,
}

impl PostgresSink {
    /// Create a sink
    ///
    /// # Arguments
    /// * `config` - Resolved connection settings
    /// * `create_table` - Issue `CREATE TABLE IF NOT EXISTS user_logins` after connecting
    pub fn new(config: DatabaseConfig, create_table: bool) -> Self {
        Self { config, create_table }
    }

    /// Test database connectivity
    pub fn test_connection(&self) -> Result<(), EtlError> {
        let mut conn = PgConnection::establish(&self.config.connection_string())?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .map_err(|e| EtlError::Connection(e.to_string()))?;
        Ok(())
    }
}

impl RowSink for PostgresSink {
    type Writer = PostgresWriter;

    fn open(&self) -> Result<PostgresWriter, EtlError> {
        let mut conn = PgConnection::establish(&self.config.connection_string())?;
        tracing::info!("Connected to Postgres at {}", self.config.describe());

        if self.create_table {
            tracing::info!("Ensuring user_logins table exists...");
            diesel::sql_query(schema::CREATE_USER_LOGINS)
                .execute(&mut conn)
                .map_err(|e| EtlError::Connection(format!("failed to create user_logins: {}", e)))?;
        }

        Ok(PostgresWriter { conn })
    }
}

/// Live connection held for the duration of one load call
///
/// Each insert runs outside an explicit transaction, so Postgres commits it
/// on its own. Dropping the writer closes the connection.
pub struct PostgresWriter {
    conn: PgConnection,
}

impl RowWriter for PostgresWriter {
    fn insert(&mut self, position: usize, row: &PersistedRow) -> Result<(), EtlError> {
        diesel::insert_into(user_logins::table)
            .values(row)
            .execute(&mut self.conn)
            .map_err(|source| EtlError::Insert { position, source })?;
        Ok(())
    }
}

impl Drop for PostgresWriter {
    fn drop(&mut self) {
        tracing::debug!("Closing Postgres connection");
    }
}
