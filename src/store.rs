//! Two-tier entity resolution (cache in front of SQL) and the injection
//! facade the worker drives.
//!
//! Every ID class follows the same resolver loop: check the cache, fall
//! through to a SELECT, then try up to three cycles of insert-on-miss with
//! a re-read in between so a concurrent worker winning the race is picked
//! up instead of faulting. Hits are written through to the cache on every
//! path. The duplicate, position, positions, lastpositions, and
//! locatorseen records are cache-only; the database never sees them.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::CacheClient;
use crate::config::PacketIdMode;
use crate::entity_repo::EntityRepository;
use crate::packet::{AprsPacket, IconDescriptor};
use crate::packets_repo::PacketsRepository;
use crate::stats::{Profile, ProfileMap, SqlStats, SqlStatsMap};
use crate::vars::Vars;

const RESOLVE_ATTEMPTS: u32 = 3;
const RESOLVE_BACKOFF: Duration = Duration::from_secs(3);

const DUPLICATE_TTL: u64 = 3600;
const POSITION_TTL: u64 = 3600;
const POSITIONS_TTL: u64 = 86400;

/// Records older than a day fall out of the stacked cache entries.
const RECORD_MAX_AGE: i64 = 86400;
/// A station's positions record keeps at most this many fixes.
const POSITIONS_CAP: usize = 100;

#[derive(Debug, Clone, Copy)]
enum Entity {
    Callsign,
    ObjectName,
    Destination,
    Digi,
    Maidenhead,
}

impl Entity {
    /// Cache namespace; the maidenhead resolver is SQL-only.
    fn cache_ns(self) -> Option<&'static str> {
        match self {
            Entity::Callsign => Some("callsign"),
            Entity::ObjectName => Some("objectname"),
            Entity::Destination => Some("dest"),
            Entity::Digi => Some("digi"),
            Entity::Maidenhead => None,
        }
    }

    fn sql_label(self) -> &'static str {
        match self {
            Entity::Callsign => "callsign",
            Entity::ObjectName => "name",
            Entity::Destination => "dest",
            Entity::Digi => "digi",
            Entity::Maidenhead => "maidenhead",
        }
    }
}

pub struct Store {
    repo: EntityRepository,
    packets: PacketsRepository,
    cache: CacheClient,
    packet_id_mode: PacketIdMode,
    sql_stats: SqlStatsMap,
    profiles: ProfileMap,
    report_interval: Duration,
    last_report_at: Instant,
}

impl Store {
    pub fn new(
        repo: EntityRepository,
        packets: PacketsRepository,
        cache: CacheClient,
        packet_id_mode: PacketIdMode,
        report_interval: Duration,
    ) -> Self {
        Self {
            repo,
            packets,
            cache,
            packet_id_mode,
            sql_stats: SqlStatsMap::new(),
            profiles: ProfileMap::new(),
            report_interval,
            last_report_at: Instant::now(),
        }
    }

    pub async fn callsign_id(&mut self, source: &str) -> Option<i64> {
        self.resolve_id(Entity::Callsign, source).await
    }

    pub async fn object_name_id(&mut self, name: &str) -> Option<i64> {
        self.resolve_id(Entity::ObjectName, name).await
    }

    pub async fn destination_id(&mut self, dest: &str) -> Option<i64> {
        self.resolve_id(Entity::Destination, dest).await
    }

    pub async fn digi_id(&mut self, name: &str) -> Option<i64> {
        self.resolve_id(Entity::Digi, name).await
    }

    pub async fn maidenhead_id(&mut self, locator: &str) -> Option<i64> {
        self.resolve_id(Entity::Maidenhead, locator).await
    }

    /// The resolver loop shared by every ID class.
    async fn resolve_id(&mut self, entity: Entity, key: &str) -> Option<i64> {
        let cache_key = key.to_uppercase();
        if let Some(ns) = entity.cache_ns()
            && let Some(cached) = self.cache.get(ns, &cache_key).await
            && let Ok(id) = cached.parse::<i64>()
        {
            return Some(id);
        }

        let label = entity.sql_label();
        self.sql_entry(label).tries += 1;
        metrics::counter!("aprs.sql.tries", "entity" => label).increment(1);

        let started = Instant::now();
        let found = self.db_get(entity, key).await;
        self.profile_entry(label).sample(started.elapsed());

        match found {
            Ok(Some(id)) => {
                self.sql_entry(label).hits += 1;
                metrics::counter!("aprs.sql.hits", "entity" => label).increment(1);
                self.write_through(entity, &cache_key, id).await;
                return Some(id);
            }
            Ok(None) => {
                self.sql_entry(label).misses += 1;
                metrics::counter!("aprs.sql.misses", "entity" => label).increment(1);
            }
            Err(e) => {
                self.sql_entry(label).misses += 1;
                warn!("SQL lookup failed for {} '{}': {}", label, key, e);
            }
        }

        // Insert on miss, tolerating a concurrent writer: when the insert
        // reports a conflict, re-read and adopt the winner's row.
        for _ in 0..RESOLVE_ATTEMPTS {
            match self.db_insert(entity, key).await {
                Ok(Some(id)) => {
                    self.sql_entry(label).inserted += 1;
                    metrics::counter!("aprs.sql.inserted", "entity" => label).increment(1);
                    self.write_through(entity, &cache_key, id).await;
                    return Some(id);
                }
                Ok(None) => {}
                Err(e) => warn!("SQL insert failed for {} '{}': {}", label, key, e),
            }

            if let Ok(Some(id)) = self.db_get(entity, key).await {
                self.write_through(entity, &cache_key, id).await;
                return Some(id);
            }

            tokio::time::sleep(RESOLVE_BACKOFF).await;
        }

        self.sql_entry(label).failed += 1;
        metrics::counter!("aprs.sql.failed", "entity" => label).increment(1);
        None
    }

    async fn db_get(&self, entity: Entity, key: &str) -> anyhow::Result<Option<i64>> {
        match entity {
            Entity::Callsign => self.repo.get_callsign_id(key).await,
            Entity::ObjectName => self.repo.get_object_name_id(key).await,
            Entity::Destination => self.repo.get_destination_id(key).await,
            Entity::Digi => self.repo.get_digi_id(key).await,
            Entity::Maidenhead => self.repo.get_maidenhead_id(key).await,
        }
    }

    async fn db_insert(&self, entity: Entity, key: &str) -> anyhow::Result<Option<i64>> {
        match entity {
            Entity::Callsign => self.repo.insert_callsign(key).await,
            Entity::ObjectName => self.repo.insert_object_name(key).await,
            Entity::Destination => self.repo.insert_destination(key).await,
            Entity::Digi => self.repo.insert_digi(key).await,
            Entity::Maidenhead => self.repo.insert_maidenhead(key).await,
        }
    }

    async fn write_through(&mut self, entity: Entity, cache_key: &str, id: i64) {
        if let Some(ns) = entity.cache_ns() {
            self.cache.put(ns, cache_key, &id.to_string()).await;
        }
    }

    /// Resolve an icon for a symbol pair, rewriting rotating icons to the
    /// compass variant matching the course.
    pub async fn icon_by_symbol(
        &mut self,
        symbol_table: &str,
        symbol_code: &str,
        course: i32,
    ) -> Option<IconDescriptor> {
        let key = format!(
            "{:x}",
            md5::compute(format!("{symbol_table}{symbol_code}").as_bytes())
        );

        if let Some(cached) = self.cache.get("icon", &key).await {
            let v = Vars::decode(&cached);
            if v.has_all("id,pa,ic,dir")
                && let Ok(id) = v.get("id").unwrap_or_default().parse::<i64>()
            {
                let path = v.get("pa").unwrap_or_default().to_string();
                let image = v.get("ic").unwrap_or_default().to_string();
                let direction = v.get("dir").unwrap_or_default().to_string();
                let icon = compose_icon_path(&path, &image, &direction, course);
                return Some(IconDescriptor {
                    id,
                    path,
                    image,
                    icon,
                    direction,
                });
            }
        }

        self.sql_entry("icon").tries += 1;
        metrics::counter!("aprs.sql.tries", "entity" => "icon").increment(1);
        match self
            .repo
            .get_icon_by_symbols(symbol_table, symbol_code, course)
            .await
        {
            Ok(Some(row)) => {
                self.sql_entry("icon").hits += 1;
                metrics::counter!("aprs.sql.hits", "entity" => "icon").increment(1);
                let mut record = Vars::new();
                record
                    .add("id", &row.id.to_string())
                    .add("pa", &row.path)
                    .add("ic", &row.image)
                    .add("dir", &row.direction);
                self.cache.put("icon", &key, &record.encode()).await;
                let icon = compose_icon_path(&row.path, &row.image, &row.direction, course);
                Some(IconDescriptor {
                    id: row.id,
                    path: row.path,
                    image: row.image,
                    icon,
                    direction: row.direction,
                })
            }
            Ok(None) => {
                self.sql_entry("icon").misses += 1;
                metrics::counter!("aprs.sql.misses", "entity" => "icon").increment(1);
                None
            }
            Err(e) => {
                warn!(
                    "Icon lookup failed for {}{}: {}",
                    symbol_table, symbol_code, e
                );
                self.sql_entry("icon").failed += 1;
                metrics::counter!("aprs.sql.failed", "entity" => "icon").increment(1);
                None
            }
        }
    }

    /// Create the per-observation packet row, retrying transient failures.
    pub async fn packet_id(&mut self, callsign_id: i64) -> Option<Uuid> {
        let started = Instant::now();
        for _ in 0..RESOLVE_ATTEMPTS {
            let inserted = match self.packet_id_mode {
                PacketIdMode::Generated => self.repo.insert_packet(callsign_id).await,
                PacketIdMode::ClientUuid => {
                    let id = Uuid::new_v4();
                    self.repo
                        .insert_packet_with_id(id, callsign_id)
                        .await
                        .map(|()| id)
                }
            };
            match inserted {
                Ok(id) => {
                    self.sql_entry("packet").inserted += 1;
                    metrics::counter!("aprs.sql.inserted", "entity" => "packet").increment(1);
                    self.profile_entry("packet").sample(started.elapsed());
                    return Some(id);
                }
                Err(e) => warn!("Packet insert failed: {}", e),
            }
            tokio::time::sleep(RESOLVE_BACKOFF).await;
        }

        self.sql_entry("packet").failed += 1;
        metrics::counter!("aprs.sql.failed", "entity" => "packet").increment(1);
        self.profile_entry("packet").sample(started.elapsed());
        None
    }

    pub async fn set_path(&mut self, packet_id: Uuid, body: &str) -> bool {
        let started = Instant::now();
        for _ in 0..RESOLVE_ATTEMPTS {
            match self.repo.insert_path(packet_id, body).await {
                Ok(()) => {
                    self.sql_entry("path").inserted += 1;
                    metrics::counter!("aprs.sql.inserted", "entity" => "path").increment(1);
                    self.profile_entry("path").sample(started.elapsed());
                    return true;
                }
                Err(e) => warn!("Path insert failed: {}", e),
            }
            tokio::time::sleep(RESOLVE_BACKOFF).await;
        }
        self.sql_entry("path").failed += 1;
        metrics::counter!("aprs.sql.failed", "entity" => "path").increment(1);
        false
    }

    pub async fn set_status(&mut self, packet_id: Uuid, body: &str) -> bool {
        for _ in 0..RESOLVE_ATTEMPTS {
            match self.repo.insert_status(packet_id, body).await {
                Ok(()) => {
                    self.sql_entry("status").inserted += 1;
                    metrics::counter!("aprs.sql.inserted", "entity" => "status").increment(1);
                    return true;
                }
                Err(e) => warn!("Status insert failed: {}", e),
            }
            tokio::time::sleep(RESOLVE_BACKOFF).await;
        }
        self.sql_entry("status").failed += 1;
        metrics::counter!("aprs.sql.failed", "entity" => "status").increment(1);
        false
    }

    //
    // Cache-only records.
    //

    pub async fn get_duplicate(&mut self, key: &str) -> Option<String> {
        self.cache.get("duplicates", key).await
    }

    pub async fn set_duplicate(&mut self, key: &str, record: &str) -> bool {
        self.cache
            .put_ttl("duplicates", key, record, DUPLICATE_TTL)
            .await
    }

    pub async fn get_position_record(&mut self, source: &str) -> Option<String> {
        self.cache.get("position", &source.to_lowercase()).await
    }

    pub async fn set_position_record(&mut self, source: &str, record: &str) -> bool {
        self.cache
            .put_ttl("position", &source.to_lowercase(), record, POSITION_TTL)
            .await
    }

    pub async fn set_locator_seen(&mut self, locator: &str) -> bool {
        let key = locator.to_uppercase();
        let started = Instant::now();
        let ok = self
            .cache
            .put("locatorseen", &key, &Utc::now().timestamp().to_string())
            .await;
        self.profile_entry("locatorseen").sample(started.elapsed());
        ok
    }

    pub async fn get_lastpositions(&mut self, locator: &str) -> Option<String> {
        // Keys are normalized on every touch, so passing an already
        // upper-cased locator through here is harmless.
        self.cache
            .get("lastpositions", &locator.to_uppercase())
            .await
    }

    /// Record this packet as the latest fix for its source within its grid
    /// square, replacing the source's previous line.
    pub async fn set_lastpositions(&mut self, packet: &AprsPacket) -> bool {
        let Some(report) = packet.position() else {
            return false;
        };
        if report.maidenhead.is_empty() {
            return false;
        }
        let key = report.maidenhead.to_uppercase();
        let existing = self.get_lastpositions(&key).await;

        let started = Instant::now();
        let merged = merge_lastpositions(
            &lastposition_record(packet),
            existing.as_deref(),
            &packet.source,
            Utc::now().timestamp(),
        );
        let ok = self.cache.put("lastpositions", &key, &merged).await;
        self.profile_entry("lastpositions").sample(started.elapsed());
        ok
    }

    pub async fn get_positions(&mut self, callsign_id: i64) -> Option<String> {
        self.cache.get("positions", &callsign_id.to_string()).await
    }

    /// Append this fix to the source's track history. Objects and
    /// near-duplicate fixes are not tracked.
    pub async fn set_positions(&mut self, packet: &AprsPacket) -> bool {
        if packet.is_posdup() || packet.is_object() {
            return false;
        }
        let Some(report) = packet.position() else {
            return false;
        };
        let Some(callsign_id) = packet.ids.callsign_id else {
            return false;
        };

        let existing = self.get_positions(callsign_id).await;

        let started = Instant::now();
        let mut record = Vars::new();
        record
            .add("L", &report.latitude.to_string())
            .add("G", &report.longitude.to_string())
            .add("T", &packet.timestamp.to_string());
        let merged = merge_positions(
            &record.encode(),
            existing.as_deref(),
            Utc::now().timestamp(),
        );
        let ok = self
            .cache
            .put_ttl("positions", &callsign_id.to_string(), &merged, POSITIONS_TTL)
            .await;
        self.profile_entry("positions").sample(started.elapsed());
        ok
    }

    //
    // Injection.
    //

    pub async fn inject_raw(&mut self, packet: &AprsPacket) -> bool {
        match self.packets.raw(packet.clone()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Raw injection failed for {}: {}", packet.source, e);
                metrics::counter!("aprs.sql.tx_failed", "kind" => "raw").increment(1);
                false
            }
        }
    }

    pub async fn inject_position(&mut self, packet: &AprsPacket) -> bool {
        self.set_lastpositions(packet).await;
        self.set_positions(packet).await;

        match self.packets.position(packet.clone()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Position injection failed for {}: {}", packet.source, e);
                metrics::counter!("aprs.sql.tx_failed", "kind" => "position").increment(1);
                false
            }
        }
    }

    pub async fn inject_message(&mut self, packet: &AprsPacket) -> bool {
        match self.packets.message(packet.clone()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Message injection failed for {}: {}", packet.source, e);
                metrics::counter!("aprs.sql.tx_failed", "kind" => "message").increment(1);
                false
            }
        }
    }

    pub async fn inject_telemetry(&mut self, packet: &AprsPacket) -> bool {
        match self.packets.telemetry(packet.clone()).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Telemetry injection failed for {}: {}", packet.source, e);
                metrics::counter!("aprs.sql.tx_failed", "kind" => "telemetry").increment(1);
                false
            }
        }
    }

    /// Periodic log report over the per-namespace counters, reset on emit.
    pub fn try_stats(&mut self) {
        if self.last_report_at.elapsed() < self.report_interval {
            return;
        }
        self.last_report_at = Instant::now();

        for (label, stats) in std::mem::take(&mut self.sql_stats) {
            if stats.tries == 0 && stats.inserted == 0 && stats.failed == 0 {
                continue;
            }
            info!(
                "Stats sql {} tries {}, hits {}, misses {}, inserted {}, failed {}",
                label, stats.tries, stats.hits, stats.misses, stats.inserted, stats.failed
            );
        }
        for (ns, stats) in self.cache.take_stats() {
            info!(
                "Stats cache {} tries {}, hits {}, misses {}, stored {}",
                ns, stats.tries, stats.hits, stats.misses, stats.stored
            );
        }
        for (label, profile) in std::mem::take(&mut self.profiles) {
            if profile.count() == 0 {
                continue;
            }
            info!(
                "Stats profile {} mean {}us over {} samples",
                label,
                profile.mean_us(),
                profile.count()
            );
        }
    }

    fn sql_entry(&mut self, label: &'static str) -> &mut SqlStats {
        self.sql_stats.entry(label).or_default()
    }

    fn profile_entry(&mut self, label: &'static str) -> &mut Profile {
        self.profiles.entry(label).or_default()
    }
}

/// Sixteen-point compass word for a course in degrees.
pub fn direction_by_course(course: i32) -> String {
    const DIRS: [&str; 4] = ["north", "east", "south", "west"];
    let rounded = ((course as f64 / 22.5) as i32).rem_euclid(16) as usize;
    if rounded % 4 == 0 {
        DIRS[rounded / 4].to_string()
    } else {
        let north_south = DIRS[2 * ((((rounded / 4) + 1) % 4) / 2)];
        let east_west = DIRS[1 + 2 * (rounded / 8)];
        format!("{north_south}-{east_west}")
    }
}

/// Rotating icons swap to a compass variant under `compass/`; fixed icons
/// keep their plain image path.
fn compose_icon_path(path: &str, image: &str, direction: &str, course: i32) -> String {
    if direction == "Y" {
        let stem = image.strip_suffix(".png").unwrap_or(image);
        format!("{path}/compass/{stem}-{}.png", direction_by_course(course))
    } else {
        format!("{path}/{image}")
    }
}

fn lastposition_record(packet: &AprsPacket) -> String {
    let report = match packet.position() {
        Some(r) => r,
        None => return String::new(),
    };
    let mut v = Vars::new();
    v.add(
        "id",
        &packet
            .ids
            .packet_id
            .map(|id| id.to_string())
            .unwrap_or_default(),
    );
    v.add(
        "cid",
        &packet
            .ids
            .callsign_id
            .map(|id| id.to_string())
            .unwrap_or_default(),
    );
    v.add(
        "nid",
        &packet
            .ids
            .object_name_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "0".to_string()),
    );
    v.add("sr", &packet.source);
    if let Some(object) = &report.object {
        v.add("nm", &object.name);
    }
    v.add("pa", &packet.path_string());
    if let Some(course) = &report.course {
        v.add("cr", course);
    }
    if let Some(speed) = &report.speed {
        v.add("sp", speed);
    }
    if let Some(altitude) = &report.altitude {
        v.add("at", altitude);
    }
    v.add("st", report.symbol_table.as_deref().unwrap_or(""));
    v.add("sc", report.symbol_code.as_deref().unwrap_or(""));
    if let Some(overlay) = &report.overlay {
        v.add("ovr", overlay);
    }
    if let Some(phg) = &report.phg {
        v.add("phgr", phg.range.as_deref().unwrap_or(""));
        v.add("phgd", phg.directivity.as_deref().unwrap_or(""));
    }
    v.add(
        "ic",
        packet
            .ids
            .icon
            .as_ref()
            .map(|icon| icon.icon.as_str())
            .unwrap_or(""),
    );
    v.add("la", &report.latitude.to_string());
    v.add("ln", &report.longitude.to_string());
    v.add("ct", &packet.timestamp.to_string());
    v.add("cm", &report.comment);
    v.encode()
}

/// Prepend the new record, drop invalid or expired lines, and replace any
/// previous line from the same source.
fn merge_lastpositions(
    new_record: &str,
    existing: Option<&str>,
    source: &str,
    now: i64,
) -> String {
    let mut out = String::from(new_record);
    out.push('\n');
    if let Some(existing) = existing {
        for line in existing.lines() {
            let v = Vars::decode(line);
            if !v.has_all("sr,ct") {
                continue;
            }
            let Some(ct) = v.get("ct").and_then(|ct| ct.parse::<i64>().ok()) else {
                continue;
            };
            if ct < now - RECORD_MAX_AGE {
                continue;
            }
            if v.get("sr") == Some(source) {
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Prepend the new fix; keep previous fixes newest-first until one is
/// expired or the cap is reached.
fn merge_positions(new_record: &str, existing: Option<&str>, now: i64) -> String {
    let mut out = String::from(new_record);
    out.push('\n');
    if let Some(existing) = existing {
        let mut kept = 0usize;
        for line in existing.lines() {
            let v = Vars::decode(line);
            if !v.has_all("L,G,T") {
                continue;
            }
            let Some(ts) = v.get("T").and_then(|t| t.parse::<i64>().ok()) else {
                continue;
            };
            if ts < now - RECORD_MAX_AGE || kept >= POSITIONS_CAP {
                break;
            }
            out.push_str(line);
            out.push('\n');
            kept += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PacketData, PositionReport, ResolvedIds};

    #[test]
    fn compass_words_for_cardinal_courses() {
        assert_eq!(direction_by_course(0), "north");
        assert_eq!(direction_by_course(90), "east");
        assert_eq!(direction_by_course(180), "south");
        assert_eq!(direction_by_course(270), "west");
        assert_eq!(direction_by_course(360), "north");
    }

    #[test]
    fn compass_words_for_intercardinal_courses() {
        assert_eq!(direction_by_course(45), "north-east");
        assert_eq!(direction_by_course(135), "south-east");
        assert_eq!(direction_by_course(225), "south-west");
        assert_eq!(direction_by_course(315), "north-west");
    }

    #[test]
    fn rotating_icon_gets_compass_path() {
        assert_eq!(
            compose_icon_path("p", "abc.png", "Y", 0),
            "p/compass/abc-north.png"
        );
        assert_eq!(
            compose_icon_path("p", "abc.png", "Y", 90),
            "p/compass/abc-east.png"
        );
        assert_eq!(
            compose_icon_path("p", "abc.png", "Y", 45),
            "p/compass/abc-north-east.png"
        );
        assert_eq!(compose_icon_path("p", "abc.png", "N", 90), "p/abc.png");
    }

    fn record(source: &str, ct: i64) -> String {
        let mut v = Vars::new();
        v.add("sr", source).add("ct", &ct.to_string());
        v.encode()
    }

    #[test]
    fn lastpositions_replaces_same_source() {
        let now = 1_700_000_000;
        let existing = format!("{}\n{}\n", record("K1ABC", now - 10), record("N0CALL", now - 20));
        let merged = merge_lastpositions(&record("N0CALL", now), Some(&existing), "N0CALL", now);
        let lines: Vec<&str> = merged.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("sr=N0CALL"));
        assert!(lines[1].contains("sr=K1ABC"));
    }

    #[test]
    fn lastpositions_drops_expired_and_invalid_lines() {
        let now = 1_700_000_000;
        let existing = format!(
            "{}\nnot-a-record\n{}\n",
            record("K1ABC", now - RECORD_MAX_AGE - 1),
            record("W2XYZ", now - 100)
        );
        let merged = merge_lastpositions(&record("N0CALL", now), Some(&existing), "N0CALL", now);
        let lines: Vec<&str> = merged.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("sr=W2XYZ"));
    }

    fn fix(ts: i64) -> String {
        let mut v = Vars::new();
        v.add("L", "34.1").add("G", "-118.2").add("T", &ts.to_string());
        v.encode()
    }

    #[test]
    fn positions_enforces_cap() {
        let now = 1_700_000_000;
        let existing: String = (0..150)
            .map(|i| format!("{}\n", fix(now - i)))
            .collect();
        let merged = merge_positions(&fix(now), Some(&existing), now);
        assert_eq!(merged.lines().count(), POSITIONS_CAP + 1);
    }

    #[test]
    fn positions_stops_at_first_expired_fix() {
        let now = 1_700_000_000;
        let existing = format!(
            "{}\n{}\n{}\n",
            fix(now - 10),
            fix(now - RECORD_MAX_AGE - 1),
            fix(now - 20)
        );
        let merged = merge_positions(&fix(now), Some(&existing), now);
        assert_eq!(merged.lines().count(), 2);
    }

    #[test]
    fn lastposition_record_carries_identity_fields() {
        let packet = AprsPacket {
            source: "N0CALL".to_string(),
            destination: "APRS".to_string(),
            digis: vec!["WIDE1-1".to_string()],
            raw: String::new(),
            body: String::new(),
            timestamp: 1_700_000_000,
            data: PacketData::Position(PositionReport {
                latitude: 34.1,
                longitude: -118.2,
                maidenhead: "DM04vc".to_string(),
                comment: "hello".to_string(),
                ..PositionReport::default()
            }),
            ids: ResolvedIds {
                callsign_id: Some(7),
                ..ResolvedIds::default()
            },
        };
        let v = Vars::decode(&lastposition_record(&packet));
        assert_eq!(v.get("sr"), Some("N0CALL"));
        assert_eq!(v.get("cid"), Some("7"));
        assert_eq!(v.get("nid"), Some("0"));
        assert_eq!(v.get("pa"), Some("APRS,WIDE1-1"));
        assert_eq!(v.get("ct"), Some("1700000000"));
        assert_eq!(v.get("cm"), Some("hello"));
    }
}
