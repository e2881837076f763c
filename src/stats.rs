//! Counter and latency-profile primitives for the periodic log reports.
//!
//! Continuous telemetry goes straight to the `metrics` recorder at event
//! sites; these structs back the human-readable reports that are logged on
//! a long interval and reset afterwards.

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub tries: u64,
    pub hits: u64,
    pub misses: u64,
    pub stored: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqlStats {
    pub tries: u64,
    pub hits: u64,
    pub misses: u64,
    pub inserted: u64,
    pub failed: u64,
}

/// Running mean without an unbounded accumulator:
/// `mean += (sample - mean) / count`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Profile {
    mean_us: i64,
    count: u64,
}

impl Profile {
    pub fn sample(&mut self, elapsed: Duration) {
        self.count += 1;
        let micros = elapsed.as_micros() as i64;
        self.mean_us += (micros - self.mean_us) / self.count as i64;
    }

    pub fn mean_us(&self) -> i64 {
        self.mean_us
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Per-namespace stat maps, keyed by the cache/SQL namespace label so the
/// report loop stays table-driven.
pub type CacheStatsMap = BTreeMap<&'static str, CacheStats>;
pub type SqlStatsMap = BTreeMap<&'static str, SqlStats>;
pub type ProfileMap = BTreeMap<&'static str, Profile>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_converges_on_the_mean() {
        let mut profile = Profile::default();
        for _ in 0..100 {
            profile.sample(Duration::from_micros(500));
        }
        assert_eq!(profile.count(), 100);
        assert!((profile.mean_us() - 500).abs() <= 1);
    }

    #[test]
    fn profile_tracks_drift() {
        let mut profile = Profile::default();
        profile.sample(Duration::from_micros(100));
        profile.sample(Duration::from_micros(300));
        // mean moves half of the distance on the second sample
        assert_eq!(profile.mean_us(), 200);
    }
}
