//! The per-packet pipeline state machine.
//!
//! Frames arrive as batches of timestamped lines. Each line becomes a
//! `PacketResult` that moves through parse, duplicate and position-error
//! rejection, preprocessing (ID resolution), transactional injection, and
//! finally notification. Transient failures defer the result for a bounded
//! number of retries with a short backoff.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::packet::{AprsPacket, PacketType};
use crate::parse;
use crate::publisher::{
    Publisher, SUBJECT_DUPLICATES, SUBJECT_ERRORS, SUBJECT_NOTIFY_MESSAGES, SUBJECT_REJECTS,
};
use crate::store::Store;
use crate::vars::Vars;

/// Attempts per result before the drop-defer policy applies.
const MAX_ATTEMPTS: u32 = 3;
const DEFER_BACKOFF: Duration = Duration::from_secs(3);
/// Results handled per loop iteration before yielding back to the frame
/// stream.
const HANDLE_BATCH: usize = 100;
const LOCATOR_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
/// An identical packet inside this window is a duplicate.
const DUPLICATE_WINDOW: i64 = 30;
/// Fixes implying a speed above this are GPS glitches.
const MAX_SPEED_MPH: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    None,
    Rejected,
    Duplicate,
    Deferred,
    PositError,
    Ok,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::None => "none",
            Status::Rejected => "rejected",
            Status::Duplicate => "duplicate",
            Status::Deferred => "deferred",
            Status::PositError => "position error",
            Status::Ok => "ok",
        }
    }
}

#[derive(Debug)]
pub struct PacketResult {
    pub raw: String,
    pub arrived_at: i64,
    pub packet: Option<AprsPacket>,
    pub error: String,
    pub status: Status,
    attempts: u32,
}

impl PacketResult {
    pub fn is_status(&self, status: Status) -> bool {
        self.status == status
    }
}

#[derive(Debug)]
struct WorkerStats {
    connects: u64,
    disconnects: u64,
    packets: u64,
    frames_in: u64,
    frames_out: u64,
    age: i64,
    report_interval: Duration,
    last_report_at: Instant,
}

impl WorkerStats {
    fn new(report_interval: Duration) -> Self {
        Self {
            connects: 0,
            disconnects: 0,
            packets: 0,
            frames_in: 0,
            frames_out: 0,
            age: 0,
            report_interval,
            last_report_at: Instant::now(),
        }
    }

    fn reset(&mut self) {
        self.packets = 0;
        self.frames_in = 0;
        self.frames_out = 0;
        self.age = 0;
        self.connects = 0;
        self.disconnects = 0;
        self.last_report_at = Instant::now();
    }
}

pub struct Worker {
    store: Store,
    publisher: Publisher,
    results: VecDeque<PacketResult>,
    locators: HashSet<String>,
    locators_flushed_at: Instant,
    drop_defer: bool,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(store: Store, publisher: Publisher, drop_defer: bool) -> Self {
        Self {
            store,
            publisher,
            results: VecDeque::new(),
            locators: HashSet::new(),
            locators_flushed_at: Instant::now(),
            drop_defer,
            stats: WorkerStats::new(Duration::from_secs(60)),
        }
    }

    pub fn note_connect(&mut self) {
        self.stats.connects += 1;
    }

    pub fn note_disconnect(&mut self) {
        self.stats.disconnects += 1;
        metrics::counter!("aprs.worker.disconnects").increment(1);
    }

    /// Split a broker frame into per-packet results. Each line carries a
    /// UNIX timestamp, a space, and the raw packet text.
    pub async fn ingest_frame(&mut self, body: &str) {
        self.stats.frames_in += 1;
        let now = Utc::now().timestamp();
        for line in body.lines() {
            if line.is_empty() {
                continue;
            }
            self.stats.packets += 1;
            let Some((created_str, packet_text)) = line.split_once(' ') else {
                continue;
            };
            let aprs_created = created_str.parse::<i64>().unwrap_or(now);
            self.stats.age += (now - aprs_created).abs();

            if let Some(result) = self.create_result(packet_text, aprs_created).await {
                self.results.push_back(result);
            }
        }
    }

    /// Parse one raw line. Parse failures are terminal and publish to the
    /// errors feed immediately.
    async fn create_result(&mut self, packet_text: &str, aprs_created: i64) -> Option<PacketResult> {
        let mut result = PacketResult {
            raw: packet_text.to_string(),
            arrived_at: Utc::now().timestamp(),
            packet: None,
            error: String::new(),
            status: Status::None,
            attempts: 0,
        };

        let started = Instant::now();
        let parsed = parse::parse_packet(packet_text, aprs_created);
        metrics::histogram!("aprs.parse.seconds").record(started.elapsed().as_secs_f64());

        match parsed {
            Ok(packet) => {
                result.packet = Some(packet);
                result.status = Status::Ok;
                Some(result)
            }
            Err(e) => {
                result.error = e.to_string();
                result.status = Status::Rejected;
                metrics::counter!("aprs.rejects", "reason" => "invparse").increment(1);
                self.post_error(SUBJECT_ERRORS, &result).await;
                None
            }
        }
    }

    /// Drain the result queue, retrying deferred results with backoff.
    pub async fn handle_results(&mut self) -> usize {
        let mut handled = 0usize;
        let mut retries = 0u32;
        while handled < HANDLE_BATCH && retries < 3 {
            let Some(mut result) = self.results.pop_front() else {
                break;
            };

            let started = Instant::now();
            let ok = self.handle(&mut result).await;
            metrics::histogram!("aprs.handle.seconds").record(started.elapsed().as_secs_f64());

            if ok {
                handled += 1;
                continue;
            }

            result.attempts += 1;
            warn!(
                "Errors detected while handling result, try #{}: {}",
                result.attempts, result.error
            );

            if result.attempts >= MAX_ATTEMPTS {
                if self.drop_defer {
                    warn!(
                        "Dropping deferred packet after {} attempts: {}",
                        result.attempts, result.raw
                    );
                    metrics::counter!("aprs.deferred.dropped").increment(1);
                    handled += 1;
                    continue;
                }
                // Policy off: stay at the head of the queue and keep
                // blocking on this result until it goes through.
            }

            self.results.push_front(result);
            retries += 1;
            tokio::time::sleep(DEFER_BACKOFF).await;
        }
        handled
    }

    async fn handle(&mut self, result: &mut PacketResult) -> bool {
        // A deferred result already passed the reject checks.
        if !result.is_status(Status::Deferred) {
            if self.check_for_duplicates(result).await {
                trace!("duplicate packet from {}", result.raw);
                return true;
            }
            if self.check_for_position_errors(result).await {
                self.post_error(SUBJECT_REJECTS, result).await;
                return true;
            }
        }

        if !self.preprocess(result).await {
            warn!(
                "Errors detected while preprocessing result; {}",
                result.error
            );
            return false;
        }

        if !self.inject(result).await {
            return false;
        }

        self.process(result).await;
        true
    }

    /// Duplicate suppression over a short window keyed by source and body.
    async fn check_for_duplicates(&mut self, result: &mut PacketResult) -> bool {
        let Some(packet) = &result.packet else {
            return false;
        };
        let key = packet.dup_key();
        let now = Utc::now().timestamp();

        match self.store.get_duplicate(&key).await {
            Some(buf) => {
                debug!("duplicate record found for key {}", key);
                let record = Vars::decode(&buf);
                if is_recent_duplicate(&record, now) {
                    result.status = Status::Duplicate;
                    metrics::counter!("aprs.rejects", "reason" => "duplicate").increment(1);
                    self.post_error(SUBJECT_DUPLICATES, result).await;
                    return true;
                }
                false
            }
            None => {
                let mut record = Vars::new();
                record.add("sr", &packet.source);
                record.add("ct", &packet.timestamp.to_string());
                if let Some(report) = packet.position() {
                    record.add("la", &report.latitude.to_string());
                    record.add("ln", &report.longitude.to_string());
                }
                self.store.set_duplicate(&key, &record.encode()).await;
                false
            }
        }
    }

    /// Impossible-movement heuristics for non-object position packets.
    async fn check_for_position_errors(&mut self, result: &mut PacketResult) -> bool {
        let Some(packet) = result.packet.as_mut() else {
            return false;
        };
        if packet.packet_type() != PacketType::Position || packet.is_object() {
            return false;
        }

        let source = packet.source.clone();
        let timestamp = packet.timestamp;
        let comment_hash = packet.comment_hash();
        let (latitude, longitude) = match packet.position() {
            Some(report) => (report.latitude, report.longitude),
            None => return false,
        };

        let mut is_posit_error = false;
        if let Some(buf) = self.store.get_position_record(&source).await {
            let record = Vars::decode(&buf);
            if let Some(prior) = PriorFix::from_record(&record) {
                let verdict =
                    evaluate_movement(&prior, latitude, longitude, timestamp, &comment_hash);

                if verdict.posdup
                    && let Some(report) = result
                        .packet
                        .as_mut()
                        .and_then(|packet| packet.position_mut())
                {
                    report.posdup = true;
                }

                match verdict.reject {
                    Some(PositionReject::TooSoon(diff)) => {
                        metrics::counter!("aprs.rejects", "reason" => "tosoon").increment(1);
                        result.error = format!("position: tx < 5 seconds ({diff})");
                        is_posit_error = true;
                    }
                    Some(PositionReject::TooFast) => {
                        metrics::counter!("aprs.rejects", "reason" => "tofast").increment(1);
                        result.error = "position: gps glitch speed > 500".to_string();
                        is_posit_error = true;
                    }
                    None => {}
                }
            }
        }

        if is_posit_error {
            result.status = Status::PositError;
        }

        if result.is_status(Status::Ok) {
            let mut record = Vars::new();
            record
                .add("sr", &source)
                .add("la", &latitude.to_string())
                .add("ln", &longitude.to_string())
                .add("ct", &timestamp.to_string())
                .add("cm", &comment_hash);
            self.store.set_position_record(&source, &record.encode()).await;
        }

        is_posit_error
    }

    /// Resolve every ID the injectors need, in a fixed order. Any miss
    /// defers the result.
    async fn preprocess(&mut self, result: &mut PacketResult) -> bool {
        let Some(mut packet) = result.packet.take() else {
            return false;
        };
        let outcome = self.preprocess_packet(&mut packet).await;
        result.packet = Some(packet);
        match outcome {
            Ok(()) => true,
            Err(message) => {
                result.status = Status::Deferred;
                result.error = message;
                false
            }
        }
    }

    async fn preprocess_packet(&mut self, packet: &mut AprsPacket) -> Result<(), String> {
        let callsign_id = self
            .store
            .callsign_id(&packet.source)
            .await
            .ok_or("could not get callsign id")?;
        packet.ids.callsign_id = Some(callsign_id);

        let symbol = packet.position().and_then(|report| {
            match (&report.symbol_table, &report.symbol_code) {
                (Some(table), Some(code)) => {
                    let course = report
                        .course
                        .as_deref()
                        .and_then(|c| c.parse::<i32>().ok())
                        .unwrap_or(0);
                    Some((table.clone(), code.clone(), course))
                }
                _ => None,
            }
        });
        if let Some((table, code, course)) = symbol {
            let icon = self
                .store
                .icon_by_symbol(&table, &code, course)
                .await
                .ok_or_else(|| format!("could not get icon id for {table}{code}"))?;
            packet.ids.icon = Some(icon);
        }

        let packet_id = self
            .store
            .packet_id(callsign_id)
            .await
            .ok_or("could not get packet id")?;
        packet.ids.packet_id = Some(packet_id);

        if !self.store.set_path(packet_id, &packet.path_string()).await {
            return Err("could not set path".to_string());
        }

        let dest_id = self
            .store
            .destination_id(&packet.destination)
            .await
            .ok_or("could not get destination id")?;
        packet.ids.destination_id = Some(dest_id);

        let object_name = packet
            .position()
            .and_then(|report| report.object.as_ref())
            .map(|object| object.name.clone());
        if let Some(name) = object_name {
            let name_id = self
                .store
                .object_name_id(&name)
                .await
                .ok_or("could not get name id")?;
            packet.ids.object_name_id = Some(name_id);
        }

        if packet.packet_type() == PacketType::Position {
            let (comment, locator) = packet
                .position()
                .map(|report| (report.comment.clone(), report.maidenhead.clone()))
                .unwrap_or_default();

            // The status row is written for every position, even empty.
            if !self.store.set_status(packet_id, &comment).await {
                return Err("could not set status".to_string());
            }

            if !locator.is_empty() {
                let maidenhead_id = self
                    .store
                    .maidenhead_id(&locator)
                    .await
                    .ok_or("could not get maidenhead id")?;
                packet.ids.maidenhead_id = Some(maidenhead_id);
            }
        }

        if let Some(target) = packet.message().map(|message| message.target.clone()) {
            let target_id = self
                .store
                .callsign_id(&target)
                .await
                .ok_or("could not get message target callsign id")?;
            packet.ids.message_target_id = Some(target_id);
        }

        for slot in 0..8 {
            let name = packet.digis.get(slot).cloned().unwrap_or_default();
            if name.is_empty() {
                packet.ids.digi_ids[slot] = 0;
                continue;
            }
            let digi_id = self
                .store
                .digi_id(&name)
                .await
                .ok_or_else(|| format!("could not get digi id for path {}", slot + 1))?;
            packet.ids.digi_ids[slot] = digi_id;
        }

        Ok(())
    }

    /// Raw goes in first; the typed tables follow. Any failure defers.
    async fn inject(&mut self, result: &mut PacketResult) -> bool {
        let Some(packet) = result.packet.take() else {
            return false;
        };

        let outcome: Result<(), String> = async {
            if !self.store.inject_raw(&packet).await {
                return Err("could not inject raw".to_string());
            }
            match packet.packet_type() {
                PacketType::Position => {
                    if !self.store.inject_position(&packet).await {
                        return Err("could not inject position".to_string());
                    }
                    if let Some(report) = packet.position()
                        && !report.maidenhead.is_empty()
                    {
                        self.locators.insert(report.maidenhead.clone());
                    }
                }
                PacketType::Message => {
                    if !self.store.inject_message(&packet).await {
                        return Err("could not inject message".to_string());
                    }
                }
                PacketType::Telemetry => {
                    if !self.store.inject_telemetry(&packet).await {
                        return Err("could not inject telemetry".to_string());
                    }
                }
                _ => {}
            }
            Ok(())
        }
        .await;

        result.packet = Some(packet);
        match outcome {
            Ok(()) => true,
            Err(message) => {
                result.status = Status::Deferred;
                result.error = message;
                false
            }
        }
    }

    /// Successful injection: bump the per-type counters and publish the
    /// message notification envelope.
    async fn process(&mut self, result: &mut PacketResult) {
        let Some(packet) = &result.packet else {
            return;
        };
        let packet_type = packet.packet_type();
        metrics::counter!("aprs.packets", "type" => packet_type.label()).increment(1);

        if let Some(message) = packet.message() {
            let mut envelope = Vars::new();
            envelope
                .add("ct", &packet.timestamp.to_string())
                .add("sr", &packet.source)
                .add("to", &message.target)
                .add("ms", &message.text)
                .add("pa", &packet.path_string());
            if let Some(id) = &message.msgid {
                envelope.add("id", id);
            }
            if let Some(ack) = &message.ack {
                envelope.add("ack", ack);
            }
            if let Some(reply) = &message.reply_id {
                envelope.add("rpl", reply);
            }
            if let Some(ack_only) = &message.ack_only {
                envelope.add("ao", ack_only);
            }
            if self
                .publisher
                .publish(SUBJECT_NOTIFY_MESSAGES, envelope.encode())
                .await
            {
                self.stats.frames_out += 1;
            }
        }
    }

    /// One terminal publish per packet: errors, rejects, or duplicates.
    async fn post_error(&mut self, subject: &'static str, result: &PacketResult) {
        metrics::counter!("aprs.posts", "status" => result.status.label()).increment(1);
        if self
            .publisher
            .post_error(subject, &result.raw, &result.error, result.status.label())
            .await
        {
            self.stats.frames_out += 1;
        }
    }

    /// Flush the witnessed-locator set on an interval, coalescing repeat
    /// sightings of the same grid into one cache write.
    pub async fn try_locators(&mut self) {
        if self.locators_flushed_at.elapsed() < LOCATOR_FLUSH_INTERVAL {
            return;
        }
        self.locators_flushed_at = Instant::now();

        let locators: Vec<String> = self.locators.drain().collect();
        for locator in locators {
            self.store.set_locator_seen(&locator).await;
        }
    }

    pub fn try_stats(&mut self) {
        self.store.try_stats();
        metrics::gauge!("aprs.result.queue").set(self.results.len() as f64);

        if self.stats.last_report_at.elapsed() < self.stats.report_interval {
            return;
        }

        let elapsed = self.stats.last_report_at.elapsed().as_secs_f64().max(1.0);
        let pps = self.stats.packets as f64 / elapsed;
        let fps_in = self.stats.frames_in as f64 / elapsed;
        let fps_out = self.stats.frames_out as f64 / elapsed;
        let mean_age = if self.stats.packets > 0 {
            self.stats.age / self.stats.packets as i64
        } else {
            0
        };

        tracing::info!(
            "Stats packets {}, pps {:.1}/s, frames in {}, fps in {:.1}/s, frames out {}, fps out {:.1}/s, age {}s, connect attempts {}",
            self.stats.packets,
            pps,
            self.stats.frames_in,
            fps_in,
            self.stats.frames_out,
            fps_out,
            mean_age,
            self.stats.connects,
        );

        self.stats.reset();
    }
}

/// A usable prior fix decoded from the position cache record.
#[derive(Debug, Clone)]
struct PriorFix {
    latitude: f64,
    longitude: f64,
    timestamp: i64,
    comment_hash: String,
}

impl PriorFix {
    fn from_record(record: &Vars) -> Option<Self> {
        if !record.has_all("la,ln,ct,cm") {
            return None;
        }
        Some(Self {
            latitude: record.get("la")?.parse().ok()?,
            longitude: record.get("ln")?.parse().ok()?,
            timestamp: record.get("ct")?.parse().ok()?,
            comment_hash: record.get("cm")?.to_string(),
        })
    }
}

#[derive(Debug, PartialEq)]
enum PositionReject {
    TooSoon(i64),
    TooFast,
}

#[derive(Debug)]
struct MovementVerdict {
    posdup: bool,
    reject: Option<PositionReject>,
}

/// Compare a fix against the prior one from the same source.
///
/// The comment-hash equality guard keeps a digi that legitimately
/// rebroadcasts distinct frames from being penalized.
fn evaluate_movement(
    prior: &PriorFix,
    latitude: f64,
    longitude: f64,
    timestamp: i64,
    comment_hash: &str,
) -> MovementVerdict {
    let distance =
        haversine_miles(prior.latitude, prior.longitude, latitude, longitude);
    // Packets can arrive out of order, so only the magnitude of the time
    // difference matters.
    let diff = (timestamp - prior.timestamp).abs();

    let posdup = diff < 1 || distance < 0.1;
    let same_comment = comment_hash == prior.comment_hash;

    let reject = if diff < 5 && same_comment {
        Some(PositionReject::TooSoon(diff))
    } else if implied_speed_mph(distance, diff) > MAX_SPEED_MPH && same_comment {
        Some(PositionReject::TooFast)
    } else {
        None
    };

    MovementVerdict { posdup, reject }
}

fn implied_speed_mph(distance_miles: f64, diff_seconds: i64) -> f64 {
    let hours = (diff_seconds.max(1)) as f64 / 3600.0;
    distance_miles / hours
}

fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_MILES: f64 = 3958.8;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_MILES * c
}

/// A stored duplicate record within the window makes the packet a
/// duplicate; an aged record just gets left to expire.
fn is_recent_duplicate(record: &Vars, now: i64) -> bool {
    match record.get("ct").and_then(|ct| ct.parse::<i64>().ok()) {
        Some(created) => now - created < DUPLICATE_WINDOW,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // Los Angeles to New York, roughly 2,445 miles.
        let distance = haversine_miles(34.05, -118.25, 40.71, -74.01);
        assert!(distance > 2400.0 && distance < 2500.0);
    }

    #[test]
    fn implied_speed_guards_small_denominators() {
        assert!(implied_speed_mph(1.0, 0) > 0.0);
        let speed = implied_speed_mph(100.0, 3600);
        assert!((speed - 100.0).abs() < f64::EPSILON);
    }

    fn prior(ts: i64, cm: &str) -> PriorFix {
        PriorFix {
            latitude: 34.12,
            longitude: -118.20,
            timestamp: ts,
            comment_hash: cm.to_string(),
        }
    }

    #[test]
    fn movement_accepts_a_normal_fix() {
        let verdict = evaluate_movement(&prior(1000, "cm"), 34.50, -118.20, 2000, "cm");
        assert!(verdict.reject.is_none());
        assert!(!verdict.posdup);
    }

    #[test]
    fn movement_flags_posdup_for_tiny_displacement() {
        let verdict = evaluate_movement(&prior(1000, "cm"), 34.1201, -118.2001, 2000, "other");
        assert!(verdict.posdup);
        assert!(verdict.reject.is_none());
    }

    #[test]
    fn movement_rejects_too_soon_with_matching_comment() {
        let verdict = evaluate_movement(&prior(1000, "cm"), 34.50, -118.20, 1003, "cm");
        assert_eq!(verdict.reject, Some(PositionReject::TooSoon(3)));
    }

    #[test]
    fn movement_allows_rapid_distinct_frames() {
        // Same source, different comment: a digi rebroadcasting distinct
        // frames is not penalized.
        let verdict = evaluate_movement(&prior(1000, "cm"), 34.50, -118.20, 1003, "other");
        assert!(verdict.reject.is_none());
    }

    #[test]
    fn movement_rejects_impossible_speed() {
        // ~2,446 miles in 30 seconds.
        let verdict = evaluate_movement(&prior(1000, "cm"), 40.00, -74.00, 1030, "cm");
        assert_eq!(verdict.reject, Some(PositionReject::TooFast));
    }

    #[test]
    fn movement_tolerates_out_of_order_timestamps() {
        let verdict = evaluate_movement(&prior(2000, "cm"), 34.50, -118.20, 1000, "other");
        assert!(verdict.reject.is_none());
        assert!(!verdict.posdup);
    }

    #[test]
    fn duplicate_window_is_thirty_seconds() {
        let now = 1_700_000_000;
        let mut record = Vars::new();
        record.add("sr", "N0CALL").add("ct", &(now - 2).to_string());
        assert!(is_recent_duplicate(&record, now));

        let mut aged = Vars::new();
        aged.add("sr", "N0CALL").add("ct", &(now - 31).to_string());
        assert!(!is_recent_duplicate(&aged, now));

        let empty = Vars::decode("sr=N0CALL");
        assert!(!is_recent_duplicate(&empty, now));
    }
}
