//! Downstream feed publisher.
//!
//! Terminal packet outcomes go to the feed subjects; successfully injected
//! messages go to the notification subject. Publishing is best-effort: a
//! failed publish is logged and counted, never retried, and never blocks
//! the pipeline.

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

pub const SUBJECT_ERRORS: &str = "feeds.aprs.is.errors";
pub const SUBJECT_REJECTS: &str = "feeds.aprs.is.rejects";
pub const SUBJECT_DUPLICATES: &str = "feeds.aprs.is.duplicates";
pub const SUBJECT_NOTIFY_MESSAGES: &str = "notify.aprs.messages";

#[derive(Serialize)]
struct ErrorPost<'a> {
    packet: &'a str,
    error: &'a str,
    status: &'a str,
    created: i64,
}

#[derive(Clone)]
pub struct Publisher {
    client: async_nats::Client,
}

impl Publisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    pub async fn publish(&self, subject: &'static str, payload: String) -> bool {
        match self.client.publish(subject, payload.into()).await {
            Ok(()) => {
                metrics::counter!("aprs.published", "subject" => subject).increment(1);
                true
            }
            Err(e) => {
                warn!("Failed to publish to {}: {}", subject, e);
                metrics::counter!("aprs.publish_errors", "subject" => subject).increment(1);
                false
            }
        }
    }

    /// JSON envelope for parse failures, rejects, and duplicates.
    pub async fn post_error(
        &self,
        subject: &'static str,
        packet: &str,
        error: &str,
        status: &str,
    ) -> bool {
        let post = ErrorPost {
            packet,
            error,
            status,
            created: Utc::now().timestamp(),
        };
        match serde_json::to_string(&post) {
            Ok(payload) => self.publish(subject, payload).await,
            Err(e) => {
                warn!("Failed to encode error post: {}", e);
                false
            }
        }
    }
}
