//! Prometheus exporter setup and counter pre-registration.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use tracing::info;

use crate::cache::NAMESPACES;

const SQL_ENTITIES: &[&str] = &[
    "callsign",
    "name",
    "dest",
    "digi",
    "maidenhead",
    "icon",
    "packet",
    "path",
    "status",
];

const PACKET_TYPES: &[&str] = &[
    "position",
    "message",
    "telemetry",
    "status",
    "capabilities",
    "peet_logging",
    "weather",
    "dx",
    "experimental",
    "beacon",
    "unknown",
];

const REJECT_REASONS: &[&str] = &["invparse", "duplicate", "tosoon", "tofast"];

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(port: u16) -> Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics listening on {}", addr);
    Ok(())
}

/// Zero every labeled counter so dashboards see the full series before the
/// first event occurs. Must run after `init_metrics`.
pub fn initialize_ingest_metrics() {
    for ns in NAMESPACES {
        for name in [
            "aprs.cache.tries",
            "aprs.cache.hits",
            "aprs.cache.misses",
            "aprs.cache.stored",
            "aprs.cache.errors",
        ] {
            metrics::counter!(name, "namespace" => *ns).increment(0);
        }
    }

    for entity in SQL_ENTITIES {
        for name in [
            "aprs.sql.tries",
            "aprs.sql.hits",
            "aprs.sql.misses",
            "aprs.sql.inserted",
            "aprs.sql.failed",
        ] {
            metrics::counter!(name, "entity" => *entity).increment(0);
        }
    }

    for kind in ["raw", "position", "message", "telemetry"] {
        metrics::counter!("aprs.sql.tx_failed", "kind" => kind).increment(0);
    }

    for packet_type in PACKET_TYPES {
        metrics::counter!("aprs.packets", "type" => *packet_type).increment(0);
    }

    for reason in REJECT_REASONS {
        metrics::counter!("aprs.rejects", "reason" => *reason).increment(0);
    }

    metrics::counter!("aprs.deferred.dropped").increment(0);
    metrics::counter!("aprs.worker.disconnects").increment(0);
    metrics::counter!("aprs.jetstream.consumed").increment(0);
}
