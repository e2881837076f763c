//! Namespaced key-value cache over Redis with a failure circuit breaker.
//!
//! The cache is advisory: every operation degrades to a miss when the
//! server is unreachable, and after any failure the breaker suppresses
//! traffic entirely for a holdoff window so a dead cache cannot stall the
//! packet pipeline.

use anyhow::{Context, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::{Duration, Instant};
use tracing::error;

use crate::stats::{CacheStats, CacheStatsMap};

/// How long cache traffic stays suppressed after a failure.
const BREAKER_HOLDOFF: Duration = Duration::from_secs(60);

/// Every namespace the worker touches. Keys are stored as `<ns>:<key>`.
pub const NAMESPACES: &[&str] = &[
    "callsign",
    "objectname",
    "dest",
    "digi",
    "icon",
    "path",
    "status",
    "message",
    "duplicates",
    "position",
    "positions",
    "lastpositions",
    "locatorseen",
];

/// Trip-and-recover state for the cache circuit breaker, kept separate so
/// the holdoff arithmetic is testable without a connection.
#[derive(Debug, Default)]
pub struct Breaker {
    last_fail_at: Option<Instant>,
}

impl Breaker {
    pub fn trip(&mut self) {
        self.last_fail_at = Some(Instant::now());
    }

    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    fn is_open_at(&self, now: Instant) -> bool {
        match self.last_fail_at {
            Some(failed_at) => now.duration_since(failed_at) <= BREAKER_HOLDOFF,
            None => false,
        }
    }
}

pub struct CacheClient {
    conn: ConnectionManager,
    default_ttl: u64,
    breaker: Breaker,
    stats: CacheStatsMap,
}

impl CacheClient {
    pub async fn connect(url: &str, default_ttl: u64) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid cache URL")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("Failed to connect to cache")?;

        let mut stats = CacheStatsMap::new();
        for &ns in NAMESPACES {
            stats.insert(ns, CacheStats::default());
        }

        Ok(Self {
            conn,
            default_ttl,
            breaker: Breaker::default(),
            stats,
        })
    }

    pub fn is_available(&self) -> bool {
        !self.breaker.is_open()
    }

    /// Fetch a value. Failures trip the breaker and read as a miss.
    pub async fn get(&mut self, ns: &'static str, key: &str) -> Option<String> {
        if self.breaker.is_open() {
            return None;
        }

        let entry = self.stats.entry(ns).or_default();
        entry.tries += 1;
        metrics::counter!("aprs.cache.tries", "namespace" => ns).increment(1);

        let started = Instant::now();
        let result: redis::RedisResult<Option<String>> =
            self.conn.get(format!("{ns}:{key}")).await;
        metrics::histogram!("aprs.cache.seconds", "namespace" => ns)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(Some(value)) => {
                let entry = self.stats.entry(ns).or_default();
                entry.hits += 1;
                metrics::counter!("aprs.cache.hits", "namespace" => ns).increment(1);
                Some(value)
            }
            Ok(None) => {
                let entry = self.stats.entry(ns).or_default();
                entry.misses += 1;
                metrics::counter!("aprs.cache.misses", "namespace" => ns).increment(1);
                None
            }
            Err(e) => {
                error!("Cache get failed for {}:{}: {}", ns, key, e);
                metrics::counter!("aprs.cache.errors", "namespace" => ns).increment(1);
                self.breaker.trip();
                let entry = self.stats.entry(ns).or_default();
                entry.misses += 1;
                None
            }
        }
    }

    /// Store a value under the default TTL.
    pub async fn put(&mut self, ns: &'static str, key: &str, value: &str) -> bool {
        let ttl = self.default_ttl;
        self.put_ttl(ns, key, value, ttl).await
    }

    /// Store a value with an explicit TTL in seconds.
    pub async fn put_ttl(&mut self, ns: &'static str, key: &str, value: &str, ttl: u64) -> bool {
        if self.breaker.is_open() {
            return false;
        }

        let started = Instant::now();
        let result: redis::RedisResult<()> =
            self.conn.set_ex(format!("{ns}:{key}"), value, ttl).await;
        metrics::histogram!("aprs.cache.seconds", "namespace" => ns)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                let entry = self.stats.entry(ns).or_default();
                entry.stored += 1;
                metrics::counter!("aprs.cache.stored", "namespace" => ns).increment(1);
                true
            }
            Err(e) => {
                error!("Cache put failed for {}:{}: {}", ns, key, e);
                metrics::counter!("aprs.cache.errors", "namespace" => ns).increment(1);
                self.breaker.trip();
                false
            }
        }
    }

    /// Drain the per-namespace counters for a log report, resetting them.
    pub fn take_stats(&mut self) -> CacheStatsMap {
        let mut drained = CacheStatsMap::new();
        for (&ns, entry) in self.stats.iter_mut() {
            if entry.tries > 0 || entry.stored > 0 {
                drained.insert(ns, *entry);
            }
            *entry = CacheStats::default();
        }
        drained
    }
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("default_ttl", &self.default_ttl)
            .field("breaker", &self.breaker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_starts_closed() {
        let breaker = Breaker::default();
        assert!(!breaker.is_open());
    }

    #[test]
    fn breaker_opens_on_trip_and_recovers_after_holdoff() {
        let mut breaker = Breaker::default();
        breaker.trip();
        let tripped_at = breaker.last_fail_at.unwrap();

        assert!(breaker.is_open_at(tripped_at + Duration::from_secs(1)));
        assert!(breaker.is_open_at(tripped_at + Duration::from_secs(60)));
        assert!(!breaker.is_open_at(tripped_at + Duration::from_secs(61)));
    }

    #[test]
    fn breaker_retrips_on_new_failure() {
        let mut breaker = Breaker::default();
        breaker.trip();
        let first = breaker.last_fail_at.unwrap();
        breaker.trip();
        assert!(breaker.last_fail_at.unwrap() >= first);
    }
}
