//! Durable frame consumer.
//!
//! Pulls batched frames from the JetStream queue and drives the worker's
//! cooperative loop: service the result queue and periodic tasks, pull the
//! next frame, enqueue its packets, ack. The ack follows the enqueue (not
//! the injection), so redelivery after a crash is bounded by the in-memory
//! queue and the deduplicator absorbs replays.

use anyhow::{Context, Result, anyhow};
use async_nats::jetstream::consumer::pull::{Config as PullConfig, Stream as MessageStream};
use async_nats::jetstream::consumer::AckPolicy;
use async_nats::jetstream::context::Context as JetStreamContext;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::worker::Worker;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);
/// How long to wait on the frame stream before servicing the result queue
/// again.
const IDLE_POLL: Duration = Duration::from_secs(1);

pub struct FrameConsumer {
    jetstream: JetStreamContext,
    stream_name: String,
    consumer_name: String,
}

impl FrameConsumer {
    /// Ensure the stream and a durable pull consumer exist, reusing the
    /// consumer when a previous instance already created it.
    pub async fn new(
        jetstream: JetStreamContext,
        stream_name: String,
        subject: String,
        consumer_name: String,
    ) -> Result<Self> {
        let stream = jetstream
            .get_stream(&stream_name)
            .await
            .map_err(|e| anyhow!("Failed to get JetStream stream '{stream_name}': {e}"))?;

        match stream.get_consumer::<PullConfig>(&consumer_name).await {
            Ok(_) => {
                info!("JetStream consumer '{}' already exists, reusing it", consumer_name);
            }
            Err(_) => {
                info!("Creating JetStream consumer '{}'...", consumer_name);
                stream
                    .create_consumer(PullConfig {
                        durable_name: Some(consumer_name.clone()),
                        ack_policy: AckPolicy::Explicit,
                        filter_subject: subject,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| {
                        anyhow!("Failed to create JetStream consumer '{consumer_name}': {e}")
                    })?;
            }
        }

        Ok(Self {
            jetstream,
            stream_name,
            consumer_name,
        })
    }

    /// Run the worker loop until the process is stopped. Broker failures
    /// tear the subscription down and retry after a short sleep.
    pub async fn run(&self, mut worker: Worker) -> Result<()> {
        loop {
            worker.note_connect();
            let mut messages = match self.subscribe().await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!("Not connected, retry in 2 seconds; {}", e);
                    worker.note_disconnect();
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    continue;
                }
            };
            info!(
                "Consuming frames from stream '{}' as '{}'",
                self.stream_name, self.consumer_name
            );

            loop {
                worker.try_stats();
                worker.try_locators().await;
                worker.handle_results().await;

                let next = tokio::time::timeout(IDLE_POLL, messages.next()).await;
                match next {
                    // Idle: go service the queue and timers again.
                    Err(_) => continue,
                    Ok(None) => {
                        warn!("Frame stream ended unexpectedly");
                        worker.note_disconnect();
                        break;
                    }
                    Ok(Some(Err(e))) => {
                        error!("Error receiving frame: {}", e);
                        metrics::counter!("aprs.jetstream.receive_error").increment(1);
                        worker.note_disconnect();
                        break;
                    }
                    Ok(Some(Ok(message))) => {
                        match std::str::from_utf8(&message.payload) {
                            Ok(body) => worker.ingest_frame(body).await,
                            Err(e) => {
                                error!("Frame payload is not UTF-8: {}", e);
                                metrics::counter!("aprs.jetstream.decode_error").increment(1);
                            }
                        }

                        // Ack order matches receive order; the frame's
                        // packets are enqueued either way.
                        if let Err(e) = message.ack().await {
                            error!("Failed to ack frame: {}", e);
                            metrics::counter!("aprs.jetstream.ack_error").increment(1);
                        } else {
                            metrics::counter!("aprs.jetstream.consumed").increment(1);
                        }
                    }
                }
            }

            tokio::time::sleep(RECONNECT_BACKOFF).await;
        }
    }

    async fn subscribe(&self) -> Result<MessageStream> {
        let consumer = self
            .jetstream
            .get_stream(&self.stream_name)
            .await
            .map_err(|e| anyhow!("Failed to get stream: {e}"))?
            .get_consumer::<PullConfig>(&self.consumer_name)
            .await
            .map_err(|e| anyhow!("Failed to get consumer: {e}"))?;

        consumer.messages().await.context("Failed to get messages")
    }
}
