use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use aprs_inject::cache::CacheClient;
use aprs_inject::config::WorkerConfig;
use aprs_inject::consumer::FrameConsumer;
use aprs_inject::db;
use aprs_inject::entity_repo::EntityRepository;
use aprs_inject::metrics::{init_metrics, initialize_ingest_metrics};
use aprs_inject::packets_repo::PacketsRepository;
use aprs_inject::publisher::Publisher;
use aprs_inject::store::Store;
use aprs_inject::worker::Worker;

pub async fn handle_run(config: WorkerConfig) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "run-worker");
    });

    // Metrics must be installed before the first event so every series is
    // present on the first scrape.
    if let Some(port) = config.metrics_port {
        init_metrics(port)?;
        initialize_ingest_metrics();
    }

    info!("Connecting to NATS at {}...", config.nats_url);
    let nats_client = async_nats::ConnectOptions::new()
        .name("aprs-inject")
        .connect(&config.nats_url)
        .await
        .context("Failed to connect to NATS")?;
    info!("Connected to NATS");
    let jetstream = async_nats::jetstream::new(nats_client.clone());

    let pool = db::connect_pool(&config.database_url, 4)?;
    info!("Database pool ready");

    let cache = CacheClient::connect(&config.redis_url, config.cache_ttl)
        .await
        .context("Failed to connect to cache")?;
    info!("Cache client ready");

    let store = Store::new(
        EntityRepository::new(pool.clone()),
        PacketsRepository::new(pool),
        cache,
        config.packet_id_mode,
        Duration::from_secs(config.report_interval),
    );
    let worker = Worker::new(store, Publisher::new(nats_client), config.drop_defer);

    let consumer = FrameConsumer::new(
        jetstream,
        config.stream.clone(),
        config.subject.clone(),
        config.consumer_name.clone(),
    )
    .await?;

    // Unacked frames redeliver on restart and the deduplicator absorbs the
    // replay, so shutdown can be immediate.
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm =
                signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, exiting...");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT (Ctrl+C), exiting...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for SIGINT signal: {}", err);
                return;
            }
            info!("Received SIGINT (Ctrl+C), exiting...");
        }

        std::process::exit(0);
    });

    info!("Starting injection worker...");
    consumer.run(worker).await
}
