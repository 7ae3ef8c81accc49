//! login-etl CLI - mask PII in queued login events and load them into Postgres
//!
//! `run` executes the pipeline once; `encode` / `decode` apply the masking by
//! hand, which is handy when tracing a stored row back to its source value.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use login_etl::config::{DEFAULT_MAX_MESSAGES, DEFAULT_WAIT_TIME_SECS};
use login_etl::queue::nats::DEFAULT_CONSUMER_NAME;
use login_etl::{
    DatabaseConfig, FailurePolicy, MessageSource, NatsConfig, NatsSource, Pipeline, PostgresSink,
    QueueBackend, RunConfig, SqsSource,
};

#[derive(Parser)]
#[command(name = "login-etl")]
#[command(version, about = "Extracts login events from a queue, masks PIIs and loads them into Postgres", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the extract / transform / load pipeline once
    Run {
        /// Queue service endpoint URL
        #[arg(short, long)]
        endpoint_url: String,

        /// Queue name (SQS queue or JetStream stream)
        #[arg(short, long)]
        queue_name: String,

        /// Long-poll wait time in seconds
        #[arg(short = 't', long, default_value_t = DEFAULT_WAIT_TIME_SECS)]
        wait_time: u32,

        /// Max messages to pull in one batch
        #[arg(short, long, default_value_t = DEFAULT_MAX_MESSAGES)]
        max_messages: u32,

        /// Queue backend (sqs, nats)
        #[arg(short, long, default_value = "sqs")]
        backend: QueueBackend,

        /// Durable consumer name for the nats backend
        #[arg(long, default_value = DEFAULT_CONSUMER_NAME)]
        nats_consumer: String,

        /// Postgres credentials file (ignored when DATABASE_URL is set)
        #[arg(short = 'c', long, default_value = "postgres.yaml")]
        db_config: PathBuf,

        /// What to do when a single record fails to load (isolate, abort)
        #[arg(long, default_value = "isolate")]
        on_load_error: FailurePolicy,

        /// Exit successfully when the queue is empty
        #[arg(long)]
        allow_empty: bool,

        /// Create the user_logins table if it does not exist
        #[arg(long)]
        create_table: bool,
    },

    /// Mask a value the way the pipeline does
    Encode {
        value: String,
    },

    /// Recover the original value of a masked field
    Decode {
        value: String,
    },

    /// Check that the configured database is reachable
    CheckDb {
        /// Postgres credentials file (ignored when DATABASE_URL is set)
        #[arg(short = 'c', long, default_value = "postgres.yaml")]
        db_config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            endpoint_url,
            queue_name,
            wait_time,
            max_messages,
            backend,
            nats_consumer,
            db_config,
            on_load_error,
            allow_empty,
            create_table,
        } => {
            let config = RunConfig {
                endpoint_url,
                queue_name,
                wait_time_secs: wait_time,
                max_messages,
                failure_policy: on_load_error,
                allow_empty,
            };
            run(config, backend, nats_consumer, db_config, create_table).await
        }
        Commands::Encode { value } => {
            println!("{}", login_etl::encode(&value));
            Ok(())
        }
        Commands::Decode { value } => login_etl::decode(&value)
            .map(|decoded| println!("{}", decoded))
            .map_err(|e| e.to_string()),
        Commands::CheckDb { db_config } => check_db(db_config),
    };

    if let Err(e) = result {
        eprintln!("Error - {}", e);
        process::exit(1);
    }
}

/// Resolve configuration, build the chosen backend and run the pipeline
async fn run(
    config: RunConfig,
    backend: QueueBackend,
    nats_consumer: String,
    db_config: PathBuf,
    create_table: bool,
) -> Result<(), String> {
    // Everything is resolved before the first stage runs
    config.validate().map_err(|e| e.to_string())?;
    let database = resolve_database(db_config)?;
    let sink = PostgresSink::new(database, create_table);

    tracing::info!(
        backend = %backend,
        wait_time_secs = config.wait_time_secs,
        max_messages = config.max_messages,
        policy = %config.failure_policy,
        "Starting login ETL"
    );

    match backend {
        QueueBackend::Sqs => {
            let source = SqsSource::new(config.endpoint_url.clone(), config.queue_url());
            run_pipeline(config, source, sink).await
        }
        QueueBackend::Nats => {
            let mut nats = NatsConfig::new(config.endpoint_url.clone(), config.queue_name.clone());
            nats.consumer_name = nats_consumer;
            run_pipeline(config, NatsSource::new(nats), sink).await
        }
    }
}

async fn run_pipeline<S: MessageSource>(
    config: RunConfig,
    source: S,
    sink: PostgresSink,
) -> Result<(), String> {
    let pipeline = Pipeline::new(config, source, sink);

    match pipeline.run().await {
        Ok(summary) => {
            for failure in summary.failures() {
                tracing::warn!("Skipped: {}", failure);
            }
            println!("✨ {}", summary);
            Ok(())
        }
        Err(e) => {
            let stage = e.stage().map(|s| s.to_string()).unwrap_or_else(|| "setup".to_string());
            tracing::error!(stage = %stage, "Run aborted: {}", e);
            Err(format!("{} stage failed: {}", stage, e))
        }
    }
}

fn check_db(db_config: PathBuf) -> Result<(), String> {
    let database = resolve_database(db_config)?;
    let description = database.describe();

    PostgresSink::new(database, false)
        .test_connection()
        .map_err(|e| e.to_string())?;

    println!("  ✓ Connected to {}", description);
    Ok(())
}

fn resolve_database(db_config: PathBuf) -> Result<DatabaseConfig, String> {
    DatabaseConfig::resolve(&db_config, std::env::var("DATABASE_URL").ok()).map_err(|e| e.to_string())
}
