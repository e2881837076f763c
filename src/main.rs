use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aprs_inject::config::{PacketIdMode, WorkerConfig};

mod commands;

#[derive(Parser)]
#[command(name = "aprs-inject", about = "APRS-IS firehose injection worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume frames from the durable queue and inject them into the
    /// relational store
    Run {
        /// NATS server URL
        #[arg(long, default_value = "nats://127.0.0.1:4222")]
        nats_url: String,

        /// JetStream stream holding raw frames
        #[arg(long, default_value = "APRS_RAW")]
        stream: String,

        /// Subject the raw frames are published under
        #[arg(long, default_value = "aprs.raw")]
        subject: String,

        /// Durable consumer name; one per worker instance
        #[arg(long, default_value = "aprs-inject")]
        consumer_name: String,

        /// Default TTL for entity ID cache entries, seconds
        #[arg(long, default_value_t = 3600)]
        cache_ttl: u64,

        /// Drop deferred packets once retries are exhausted
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        drop_defer: bool,

        /// Store stats report interval, seconds
        #[arg(long, default_value_t = 3600)]
        report_interval: u64,

        /// How packet rows get their identity
        #[arg(long, value_enum, default_value = "generated")]
        packet_id_mode: PacketIdMode,

        /// Prometheus listener port; metrics disabled when omitted
        #[arg(long)]
        metrics_port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let _sentry_guard = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            nats_url,
            stream,
            subject,
            consumer_name,
            cache_ttl,
            drop_defer,
            report_interval,
            packet_id_mode,
            metrics_port,
        } => {
            let database_url =
                std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
            let redis_url = std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

            let config = WorkerConfig {
                nats_url,
                stream,
                subject,
                consumer_name,
                database_url,
                redis_url,
                cache_ttl,
                drop_defer,
                report_interval,
                packet_id_mode,
                metrics_port,
            };
            commands::handle_run(config).await
        }
    }
}
