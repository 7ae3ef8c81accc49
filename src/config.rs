//! Run configuration and database credentials.
//!
//! Everything here is resolved once at startup and passed by reference into
//! the stages; nothing is re-read while the pipeline runs.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::EtlError;
use crate::queue::ReceiveRequest;

pub const DEFAULT_WAIT_TIME_SECS: u32 = 10;
pub const DEFAULT_MAX_MESSAGES: u32 = 10;
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// What the loader does when a single record fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and continue with the next record
    #[default]
    Isolate,
    /// Stop at the first failure; rows already inserted stay committed
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "isolate" | "skip" => Ok(FailurePolicy::Isolate),
            "abort" | "fail" => Ok(FailurePolicy::Abort),
            other => Err(format!("Unsupported failure policy: '{}'. Supported: isolate, abort", other)),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Isolate => write!(f, "isolate"),
            FailurePolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Settings for one pipeline run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Queue service endpoint (SQS endpoint URL or NATS server URL)
    pub endpoint_url: String,
    /// Queue name (SQS queue or JetStream stream)
    pub queue_name: String,
    /// Long-poll hint passed to the queue service
    pub wait_time_secs: u32,
    /// Upper bound on the batch size, passed to the queue service
    pub max_messages: u32,
    pub failure_policy: FailurePolicy,
    /// Treat an empty poll as "no work" instead of an error
    pub allow_empty: bool,
}

impl RunConfig {
    pub fn new(endpoint_url: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            queue_name: queue_name.into(),
            wait_time_secs: DEFAULT_WAIT_TIME_SECS,
            max_messages: DEFAULT_MAX_MESSAGES,
            failure_policy: FailurePolicy::default(),
            allow_empty: false,
        }
    }

    /// Check the settings before any stage runs
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(EtlError::Config("endpoint URL must not be empty".to_string()));
        }
        if self.queue_name.trim().is_empty() {
            return Err(EtlError::Config("queue name must not be empty".to_string()));
        }
        if self.max_messages == 0 {
            return Err(EtlError::Config("max messages must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Full queue URL, `{endpoint}/{queue}`
    pub fn queue_url(&self) -> String {
        format!("{}/{}", self.endpoint_url.trim_end_matches('/'), self.queue_name)
    }

    pub fn receive_request(&self) -> ReceiveRequest {
        ReceiveRequest {
            max_messages: self.max_messages,
            wait_time_secs: self.wait_time_secs,
        }
    }
}

/// Postgres credentials as stored in the configuration file
#[derive(Clone, Deserialize)]
pub struct PostgresCredentials {
    pub username: String,
    pub password: String,
    pub host: String,
    pub database: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_POSTGRES_PORT
}

#[derive(Deserialize)]
struct CredentialsFile {
    postgres: PostgresCredentials,
}

/// Where the loader connects
#[derive(Clone)]
pub enum DatabaseConfig {
    /// Full connection URL, taken from `DATABASE_URL`
    Url(String),
    Credentials(PostgresCredentials),
}

impl DatabaseConfig {
    /// Resolve the database settings
    ///
    /// A `DATABASE_URL` value wins over the credentials file, which is then
    /// not read at all.
    ///
    /// # Example
    /// ```ignore
    /// let db = DatabaseConfig::resolve("postgres.yaml", std::env::var("DATABASE_URL").ok())?;
    /// ```
    pub fn resolve<P: AsRef<Path>>(path: P, database_url: Option<String>) -> Result<Self, EtlError> {
        match database_url {
            Some(url) if !url.trim().is_empty() => Ok(DatabaseConfig::Url(url)),
            _ => Self::load_from_file(path),
        }
    }

    /// Load credentials from a YAML file with a `postgres:` section
    ///
    /// ```yaml
    /// postgres:
    ///   username: postgres
    ///   password: postgres
    ///   host: localhost
    ///   database: postgres
    ///   port: 5432
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, EtlError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let file: CredentialsFile = serde_yaml::from_str(&contents)
            .map_err(|e| EtlError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(DatabaseConfig::Credentials(file.postgres))
    }

    /// Connection string accepted by libpq
    pub fn connection_string(&self) -> String {
        match self {
            DatabaseConfig::Url(url) => url.clone(),
            DatabaseConfig::Credentials(c) => format!(
                "host={} port={} user={} password={} dbname={}",
                quote_conninfo(&c.host),
                c.port,
                quote_conninfo(&c.username),
                quote_conninfo(&c.password),
                quote_conninfo(&c.database),
            ),
        }
    }

    /// Password-free description for logs
    pub fn describe(&self) -> String {
        match self {
            DatabaseConfig::Url(_) => "DATABASE_URL".to_string(),
            DatabaseConfig::Credentials(c) => format!("{}:{}/{}", c.host, c.port, c.database),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatabaseConfig").field(&self.describe()).finish()
    }
}

// libpq keyword/value quoting: wrap in single quotes, escape `\` and `'`
fn quote_conninfo(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_credentials_file() {
        let file = write_config(
            "postgres:\n  username: etl\n  password: s3cr'et\n  host: db.local\n  database: logins\n",
        );

        let config = DatabaseConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.describe(), "db.local:5432/logins");
        assert_eq!(
            config.connection_string(),
            "host='db.local' port=5432 user='etl' password='s3cr\\'et' dbname='logins'"
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let file = write_config(
            "postgres:\n  username: etl\n  password: hunter2\n  host: h\n  database: d\n  port: 6543\n",
        );

        let config = DatabaseConfig::load_from_file(file.path()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("h:6543/d"));
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let file = write_config("postgres:\n  username: etl\n  host: h\n  database: d\n");
        let err = DatabaseConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_database_url_takes_precedence() {
        let config = DatabaseConfig::resolve(
            "/nonexistent/postgres.yaml",
            Some("postgres://u:p@localhost/db".to_string()),
        )
        .unwrap();
        assert_eq!(config.connection_string(), "postgres://u:p@localhost/db");

        let err = DatabaseConfig::resolve("/nonexistent/postgres.yaml", None).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_run_config_defaults_and_validation() {
        let config = RunConfig::new("http://localhost:4566/000000000000/", "login-queue");
        assert_eq!(config.wait_time_secs, 10);
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.failure_policy, FailurePolicy::Isolate);
        assert_eq!(config.queue_url(), "http://localhost:4566/000000000000/login-queue");
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.max_messages = 0;
        assert!(matches!(bad.validate(), Err(EtlError::Config(_))));

        let bad = RunConfig::new("  ", "q");
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_failure_policy_from_str() {
        assert_eq!("isolate".parse::<FailurePolicy>().unwrap(), FailurePolicy::Isolate);
        assert_eq!("ABORT".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
