//! Per-packet transactional writes: position, message, telemetry, and raw.
//!
//! Each entry point runs a single transaction; any failure rolls the whole
//! packet back and surfaces as an error the worker treats as retryable.
//! Wire values are validated at the bind sites and bound as NULL when they
//! would poison a typed column.

use anyhow::{Result, anyhow};
use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;
use diesel::upsert::excluded;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::db::PgPool;
use crate::packet::{AprsPacket, TelemetryControl};
use crate::schema::{
    last_bulletin, last_dfr, last_dfs, last_frequency, last_message, last_phg, last_position,
    last_position_meta, last_raw, last_raw_meta, last_telemetry, last_weather, message, position,
    position_meta, raw, raw_meta, telemetry, telemetry_bits, telemetry_eqns, telemetry_parm,
    telemetry_unit, weather,
};
use crate::validator::{checked, checked_f64, checked_i32};

/// Bulletins and NWS advisories get routed into `last_bulletin` as well.
static BULLETIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((BLN[0-9A-Z]{1,6})|(NWS-[0-9A-Z]{1,5}))$").unwrap());

pub fn is_bulletin(target: &str) -> bool {
    BULLETIN_RE.is_match(target)
}

const UNIT_ANALOG_LEN: [&str; 5] = ["maxlen:7", "maxlen:6", "maxlen:5", "maxlen:6", "maxlen:4"];
const UNIT_DIGITAL_LEN: [&str; 8] = [
    "maxlen:5", "maxlen:4", "maxlen:3", "maxlen:3", "maxlen:3", "maxlen:2", "maxlen:2", "maxlen:2",
];

fn required(id: Option<i64>, what: &str) -> Result<i64> {
    id.ok_or_else(|| anyhow!("{what} id not resolved"))
}

fn required_packet_id(id: Option<Uuid>) -> Result<Uuid> {
    id.ok_or_else(|| anyhow!("packet id not resolved"))
}

/// Barometric pressure is stored at two-decimal precision.
fn parse_pressure(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| (v * 100.0).round() / 100.0)
}

#[derive(Clone)]
pub struct PacketsRepository {
    pool: PgPool,
}

impl PacketsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn position(&self, packet: AprsPacket) -> Result<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let packet_id = required_packet_id(packet.ids.packet_id)?;
            let callsign_id = required(packet.ids.callsign_id, "callsign")?;
            let dest_id = required(packet.ids.destination_id, "destination")?;
            let name_id = packet.ids.object_name_id.unwrap_or(0);
            let icon_id = packet.ids.icon.as_ref().map(|icon| icon.id);
            let report = packet
                .position()
                .ok_or_else(|| anyhow!("not a position packet"))?;
            let create_ts = packet.timestamp;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                diesel::insert_into(last_position::table)
                    .values((
                        last_position::packet_id.eq(packet_id),
                        last_position::callsign_id.eq(callsign_id),
                        last_position::name_id.eq(name_id),
                        last_position::icon_id.eq(icon_id),
                        last_position::locator.eq(&report.maidenhead),
                        last_position::latitude.eq(report.latitude),
                        last_position::longitude.eq(report.longitude),
                        last_position::create_ts.eq(create_ts),
                    ))
                    .on_conflict((last_position::callsign_id, last_position::name_id))
                    .do_update()
                    .set((
                        last_position::packet_id.eq(excluded(last_position::packet_id)),
                        last_position::icon_id.eq(excluded(last_position::icon_id)),
                        last_position::locator.eq(excluded(last_position::locator)),
                        last_position::latitude.eq(excluded(last_position::latitude)),
                        last_position::longitude.eq(excluded(last_position::longitude)),
                        last_position::create_ts.eq(excluded(last_position::create_ts)),
                    ))
                    .execute(conn)?;

                diesel::insert_into(last_position_meta::table)
                    .values((
                        last_position_meta::packet_id.eq(packet_id),
                        last_position_meta::callsign_id.eq(callsign_id),
                        last_position_meta::name_id.eq(name_id),
                        last_position_meta::dest_id.eq(dest_id),
                        last_position_meta::course
                            .eq(checked_i32("is:int", report.course.as_deref())),
                        last_position_meta::speed.eq(checked_i32("is:int", report.speed.as_deref())),
                        last_position_meta::altitude
                            .eq(checked_i32("is:int", report.altitude.as_deref())),
                        last_position_meta::symbol_table.eq(report.symbol_table.as_deref()),
                        last_position_meta::symbol_code.eq(report.symbol_code.as_deref()),
                        last_position_meta::overlay
                            .eq(checked("maxlen:1", report.overlay.as_deref())),
                        last_position_meta::range.eq(checked_f64("is:float", report.range.as_deref())),
                        last_position_meta::object_type
                            .eq(report.object.as_ref().map(|o| o.kind.clone())),
                        last_position_meta::weather
                            .eq(if report.weather.is_some() { "Y" } else { "N" }),
                        last_position_meta::telemetry.eq("N"),
                        last_position_meta::position_type_id.eq(report.position_type),
                        last_position_meta::mbits.eq(checked("maxlen:3", report.mbits.as_deref())),
                        last_position_meta::create_ts.eq(create_ts),
                    ))
                    .on_conflict((
                        last_position_meta::callsign_id,
                        last_position_meta::name_id,
                    ))
                    .do_update()
                    .set((
                        last_position_meta::packet_id.eq(excluded(last_position_meta::packet_id)),
                        last_position_meta::dest_id.eq(excluded(last_position_meta::dest_id)),
                        last_position_meta::course.eq(excluded(last_position_meta::course)),
                        last_position_meta::speed.eq(excluded(last_position_meta::speed)),
                        last_position_meta::altitude.eq(excluded(last_position_meta::altitude)),
                        last_position_meta::symbol_table
                            .eq(excluded(last_position_meta::symbol_table)),
                        last_position_meta::symbol_code
                            .eq(excluded(last_position_meta::symbol_code)),
                        last_position_meta::overlay.eq(excluded(last_position_meta::overlay)),
                        last_position_meta::range.eq(excluded(last_position_meta::range)),
                        last_position_meta::object_type
                            .eq(excluded(last_position_meta::object_type)),
                        last_position_meta::weather.eq(excluded(last_position_meta::weather)),
                        last_position_meta::telemetry.eq(excluded(last_position_meta::telemetry)),
                        last_position_meta::position_type_id
                            .eq(excluded(last_position_meta::position_type_id)),
                        last_position_meta::mbits.eq(excluded(last_position_meta::mbits)),
                        last_position_meta::create_ts.eq(excluded(last_position_meta::create_ts)),
                    ))
                    .execute(conn)?;

                if let Some(phg) = &report.phg {
                    diesel::insert_into(last_phg::table)
                        .values((
                            last_phg::packet_id.eq(packet_id),
                            last_phg::callsign_id.eq(callsign_id),
                            last_phg::name_id.eq(name_id),
                            last_phg::power.eq(checked_f64("is:float", phg.power.as_deref())),
                            last_phg::haat.eq(checked_f64("is:float", phg.haat.as_deref())),
                            last_phg::gain.eq(checked_f64("is:float", phg.gain.as_deref())),
                            last_phg::range.eq(checked_f64("is:float", phg.range.as_deref())),
                            last_phg::direction
                                .eq(checked_i32("is:int", phg.directivity.as_deref())),
                            last_phg::beacon.eq(checked_i32("is:int", phg.beacon.as_deref())),
                            last_phg::create_ts.eq(create_ts),
                        ))
                        .on_conflict((last_phg::callsign_id, last_phg::name_id))
                        .do_update()
                        .set((
                            last_phg::packet_id.eq(excluded(last_phg::packet_id)),
                            last_phg::power.eq(excluded(last_phg::power)),
                            last_phg::haat.eq(excluded(last_phg::haat)),
                            last_phg::gain.eq(excluded(last_phg::gain)),
                            last_phg::range.eq(excluded(last_phg::range)),
                            last_phg::direction.eq(excluded(last_phg::direction)),
                            last_phg::beacon.eq(excluded(last_phg::beacon)),
                            last_phg::create_ts.eq(excluded(last_phg::create_ts)),
                        ))
                        .execute(conn)?;
                }

                if let Some(dfr) = &report.dfr {
                    diesel::insert_into(last_dfr::table)
                        .values((
                            last_dfr::packet_id.eq(packet_id),
                            last_dfr::callsign_id.eq(callsign_id),
                            last_dfr::name_id.eq(name_id),
                            last_dfr::bearing.eq(checked_i32("is:int", dfr.bearing.as_deref())),
                            last_dfr::hits.eq(checked_i32("is:int", dfr.hits.as_deref())),
                            last_dfr::range.eq(checked_f64("is:float", dfr.range.as_deref())),
                            last_dfr::quality.eq(checked_i32("is:int", dfr.quality.as_deref())),
                            last_dfr::create_ts.eq(create_ts),
                        ))
                        .on_conflict((last_dfr::callsign_id, last_dfr::name_id))
                        .do_update()
                        .set((
                            last_dfr::packet_id.eq(excluded(last_dfr::packet_id)),
                            last_dfr::bearing.eq(excluded(last_dfr::bearing)),
                            last_dfr::hits.eq(excluded(last_dfr::hits)),
                            last_dfr::range.eq(excluded(last_dfr::range)),
                            last_dfr::quality.eq(excluded(last_dfr::quality)),
                            last_dfr::create_ts.eq(excluded(last_dfr::create_ts)),
                        ))
                        .execute(conn)?;
                }

                if let Some(dfs) = &report.dfs {
                    diesel::insert_into(last_dfs::table)
                        .values((
                            last_dfs::packet_id.eq(packet_id),
                            last_dfs::callsign_id.eq(callsign_id),
                            last_dfs::name_id.eq(name_id),
                            last_dfs::power.eq(checked_f64("is:float", dfs.power.as_deref())),
                            last_dfs::haat.eq(checked_f64("is:float", dfs.haat.as_deref())),
                            last_dfs::gain.eq(checked_f64("is:float", dfs.gain.as_deref())),
                            last_dfs::range.eq(checked_f64("is:float", dfs.range.as_deref())),
                            last_dfs::direction
                                .eq(checked_i32("is:int", dfs.directivity.as_deref())),
                            last_dfs::create_ts.eq(create_ts),
                        ))
                        .on_conflict((last_dfs::callsign_id, last_dfs::name_id))
                        .do_update()
                        .set((
                            last_dfs::packet_id.eq(excluded(last_dfs::packet_id)),
                            last_dfs::power.eq(excluded(last_dfs::power)),
                            last_dfs::haat.eq(excluded(last_dfs::haat)),
                            last_dfs::gain.eq(excluded(last_dfs::gain)),
                            last_dfs::range.eq(excluded(last_dfs::range)),
                            last_dfs::direction.eq(excluded(last_dfs::direction)),
                            last_dfs::create_ts.eq(excluded(last_dfs::create_ts)),
                        ))
                        .execute(conn)?;
                }

                if let Some(afrs) = &report.afrs {
                    diesel::insert_into(last_frequency::table)
                        .values((
                            last_frequency::packet_id.eq(packet_id),
                            last_frequency::callsign_id.eq(callsign_id),
                            last_frequency::name_id.eq(name_id),
                            last_frequency::frequency.eq(&afrs.frequency),
                            last_frequency::range
                                .eq(checked_f64("is:float", afrs.range.as_deref())),
                            last_frequency::range_east
                                .eq(checked_f64("is:float", afrs.range_east.as_deref())),
                            last_frequency::tone.eq(checked("maxlen:6", afrs.tone.as_deref())),
                            last_frequency::afrs_type.eq(afrs.afrs_type.as_deref()),
                            last_frequency::receive
                                .eq(checked("maxlen:7", afrs.receive.as_deref())),
                            last_frequency::alternate
                                .eq(checked("maxlen:7", afrs.alternate.as_deref())),
                            last_frequency::object_type
                                .eq(report.object.as_ref().map(|o| o.kind.clone())),
                            last_frequency::create_ts.eq(create_ts),
                        ))
                        .on_conflict((last_frequency::callsign_id, last_frequency::name_id))
                        .do_update()
                        .set((
                            last_frequency::packet_id.eq(excluded(last_frequency::packet_id)),
                            last_frequency::frequency.eq(excluded(last_frequency::frequency)),
                            last_frequency::range.eq(excluded(last_frequency::range)),
                            last_frequency::range_east.eq(excluded(last_frequency::range_east)),
                            last_frequency::tone.eq(excluded(last_frequency::tone)),
                            last_frequency::afrs_type.eq(excluded(last_frequency::afrs_type)),
                            last_frequency::receive.eq(excluded(last_frequency::receive)),
                            last_frequency::alternate.eq(excluded(last_frequency::alternate)),
                            last_frequency::object_type.eq(excluded(last_frequency::object_type)),
                            last_frequency::create_ts.eq(excluded(last_frequency::create_ts)),
                        ))
                        .execute(conn)?;
                }

                // History tables are skipped for near-duplicate fixes and
                // for objects; last-known state above still updates.
                if !report.posdup && report.object.is_none() {
                    let maidenhead_id = required(packet.ids.maidenhead_id, "maidenhead")?;
                    diesel::insert_into(position::table)
                        .values((
                            position::packet_id.eq(packet_id),
                            position::callsign_id.eq(callsign_id),
                            position::maidenhead_id.eq(maidenhead_id),
                            position::latitude.eq(report.latitude),
                            position::longitude.eq(report.longitude),
                            position::create_ts.eq(create_ts),
                        ))
                        .execute(conn)?;

                    diesel::insert_into(position_meta::table)
                        .values((
                            position_meta::packet_id.eq(packet_id),
                            position_meta::course
                                .eq(checked_i32("is:int", report.course.as_deref())),
                            position_meta::speed
                                .eq(checked_i32("is:int", report.speed.as_deref())),
                            position_meta::altitude
                                .eq(checked_i32("is:int", report.altitude.as_deref())),
                            position_meta::symbol_table.eq(report.symbol_table.as_deref()),
                            position_meta::symbol_code.eq(report.symbol_code.as_deref()),
                            position_meta::time_of_fix.eq(Some(create_ts)),
                            position_meta::create_ts.eq(create_ts),
                        ))
                        .execute(conn)?;
                }

                if let Some(wx) = &report.weather {
                    diesel::insert_into(last_weather::table)
                        .values((
                            last_weather::packet_id.eq(packet_id),
                            last_weather::callsign_id.eq(callsign_id),
                            last_weather::latitude.eq(report.latitude),
                            last_weather::longitude.eq(report.longitude),
                            last_weather::wind_direction
                                .eq(checked_i32("is:int", wx.wind_direction.as_deref())),
                            last_weather::wind_speed
                                .eq(checked_i32("is:int", wx.wind_speed.as_deref())),
                            last_weather::wind_gust
                                .eq(checked_i32("is:int", wx.wind_gust.as_deref())),
                            last_weather::temperature
                                .eq(checked_i32("is:int", wx.temperature.as_deref())),
                            last_weather::rain_hour
                                .eq(checked_f64("is:float", wx.rain_hour.as_deref())),
                            last_weather::rain_calendar_day
                                .eq(checked_f64("is:float", wx.rain_midnight.as_deref())),
                            last_weather::rain_24hour_day
                                .eq(checked_f64("is:float", wx.rain_24h.as_deref())),
                            last_weather::humidity
                                .eq(checked_i32("is:int|maxval:100", wx.humidity.as_deref())),
                            last_weather::barometer.eq(parse_pressure(wx.pressure.as_deref())),
                            last_weather::luminosity
                                .eq(checked_i32("is:int", wx.luminosity.as_deref())),
                            last_weather::create_ts.eq(create_ts),
                        ))
                        .on_conflict(last_weather::callsign_id)
                        .do_update()
                        .set((
                            last_weather::packet_id.eq(excluded(last_weather::packet_id)),
                            last_weather::latitude.eq(excluded(last_weather::latitude)),
                            last_weather::longitude.eq(excluded(last_weather::longitude)),
                            last_weather::wind_direction
                                .eq(excluded(last_weather::wind_direction)),
                            last_weather::wind_speed.eq(excluded(last_weather::wind_speed)),
                            last_weather::wind_gust.eq(excluded(last_weather::wind_gust)),
                            last_weather::temperature.eq(excluded(last_weather::temperature)),
                            last_weather::rain_hour.eq(excluded(last_weather::rain_hour)),
                            last_weather::rain_calendar_day
                                .eq(excluded(last_weather::rain_calendar_day)),
                            last_weather::rain_24hour_day
                                .eq(excluded(last_weather::rain_24hour_day)),
                            last_weather::humidity.eq(excluded(last_weather::humidity)),
                            last_weather::barometer.eq(excluded(last_weather::barometer)),
                            last_weather::luminosity.eq(excluded(last_weather::luminosity)),
                            last_weather::create_ts.eq(excluded(last_weather::create_ts)),
                        ))
                        .execute(conn)?;

                    diesel::insert_into(weather::table)
                        .values((
                            weather::packet_id.eq(packet_id),
                            weather::callsign_id.eq(callsign_id),
                            weather::wind_direction
                                .eq(checked_i32("is:int", wx.wind_direction.as_deref())),
                            weather::wind_speed
                                .eq(checked_i32("is:int", wx.wind_speed.as_deref())),
                            weather::wind_gust
                                .eq(checked_i32("is:int", wx.wind_gust.as_deref())),
                            weather::temperature
                                .eq(checked_i32("is:int", wx.temperature.as_deref())),
                            weather::rain_hour
                                .eq(checked_f64("is:float", wx.rain_hour.as_deref())),
                            weather::rain_calendar_day
                                .eq(checked_f64("is:float", wx.rain_midnight.as_deref())),
                            weather::rain_24hour_day
                                .eq(checked_f64("is:float", wx.rain_24h.as_deref())),
                            weather::humidity
                                .eq(checked_i32("is:int|maxval:100", wx.humidity.as_deref())),
                            weather::barometer.eq(parse_pressure(wx.pressure.as_deref())),
                            weather::luminosity
                                .eq(checked_i32("is:int", wx.luminosity.as_deref())),
                            weather::create_ts.eq(create_ts),
                        ))
                        .execute(conn)?;
                }

                Ok(())
            })
        })
        .await?
    }

    pub async fn message(&self, packet: AprsPacket) -> Result<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let packet_id = required_packet_id(packet.ids.packet_id)?;
            let callsign_id = required(packet.ids.callsign_id, "callsign")?;
            let target_id = required(packet.ids.message_target_id, "message target")?;
            let report = packet
                .message()
                .ok_or_else(|| anyhow!("not a message packet"))?;
            let create_ts = packet.timestamp;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                diesel::insert_into(message::table)
                    .values((
                        message::packet_id.eq(packet_id),
                        message::callsign_id.eq(callsign_id),
                        message::callsign_to_id.eq(target_id),
                        message::body.eq(&report.text),
                        message::msgid.eq(report.msgid.as_deref()),
                        message::create_ts.eq(create_ts),
                    ))
                    .execute(conn)?;

                diesel::insert_into(last_message::table)
                    .values((
                        last_message::packet_id.eq(packet_id),
                        last_message::callsign_id.eq(callsign_id),
                        last_message::callsign_to_id.eq(target_id),
                        last_message::create_ts.eq(create_ts),
                    ))
                    .on_conflict((last_message::callsign_id, last_message::callsign_to_id))
                    .do_update()
                    .set((
                        last_message::packet_id.eq(excluded(last_message::packet_id)),
                        last_message::create_ts.eq(excluded(last_message::create_ts)),
                    ))
                    .execute(conn)?;

                if is_bulletin(&report.target) {
                    diesel::insert_into(last_bulletin::table)
                        .values((
                            last_bulletin::packet_id.eq(packet_id),
                            last_bulletin::callsign_id.eq(callsign_id),
                            last_bulletin::addressee.eq(&report.target),
                            last_bulletin::text.eq(Some(report.text.clone())),
                            last_bulletin::msgid.eq(report.msgid.as_deref()),
                            last_bulletin::create_ts.eq(Utc::now().timestamp()),
                        ))
                        .on_conflict((last_bulletin::callsign_id, last_bulletin::addressee))
                        .do_update()
                        .set((
                            last_bulletin::packet_id.eq(excluded(last_bulletin::packet_id)),
                            last_bulletin::text.eq(excluded(last_bulletin::text)),
                            last_bulletin::msgid.eq(excluded(last_bulletin::msgid)),
                            last_bulletin::create_ts.eq(excluded(last_bulletin::create_ts)),
                        ))
                        .execute(conn)?;
                }

                if let Some(control) = &report.telemetry {
                    insert_telemetry_control(conn, packet_id, callsign_id, create_ts, control)?;
                }

                Ok(())
            })
        })
        .await?
    }

    pub async fn telemetry(&self, packet: AprsPacket) -> Result<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let packet_id = required_packet_id(packet.ids.packet_id)?;
            let callsign_id = required(packet.ids.callsign_id, "callsign")?;
            let report = packet
                .telemetry()
                .ok_or_else(|| anyhow!("not a telemetry packet"))?;
            let create_ts = packet.timestamp;

            let sequence = checked_i32("is:int", report.sequence.as_deref());
            let analog: Vec<Option<f64>> = report
                .analog
                .iter()
                .map(|a| checked_f64("is:float", a.as_deref()))
                .collect();
            let digital = checked("maxlen:8", report.digital.as_deref());

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                diesel::insert_into(last_telemetry::table)
                    .values((
                        last_telemetry::packet_id.eq(packet_id),
                        last_telemetry::callsign_id.eq(callsign_id),
                        last_telemetry::sequence.eq(sequence),
                        last_telemetry::analog_0.eq(analog[0]),
                        last_telemetry::analog_1.eq(analog[1]),
                        last_telemetry::analog_2.eq(analog[2]),
                        last_telemetry::analog_3.eq(analog[3]),
                        last_telemetry::analog_4.eq(analog[4]),
                        last_telemetry::digital.eq(digital.as_deref()),
                        last_telemetry::create_ts.eq(create_ts),
                    ))
                    .on_conflict(last_telemetry::callsign_id)
                    .do_update()
                    .set((
                        last_telemetry::packet_id.eq(excluded(last_telemetry::packet_id)),
                        last_telemetry::sequence.eq(excluded(last_telemetry::sequence)),
                        last_telemetry::analog_0.eq(excluded(last_telemetry::analog_0)),
                        last_telemetry::analog_1.eq(excluded(last_telemetry::analog_1)),
                        last_telemetry::analog_2.eq(excluded(last_telemetry::analog_2)),
                        last_telemetry::analog_3.eq(excluded(last_telemetry::analog_3)),
                        last_telemetry::analog_4.eq(excluded(last_telemetry::analog_4)),
                        last_telemetry::digital.eq(excluded(last_telemetry::digital)),
                        last_telemetry::create_ts.eq(excluded(last_telemetry::create_ts)),
                    ))
                    .execute(conn)?;

                diesel::insert_into(telemetry::table)
                    .values((
                        telemetry::packet_id.eq(packet_id),
                        telemetry::callsign_id.eq(callsign_id),
                        telemetry::sequence.eq(sequence),
                        telemetry::analog_0.eq(analog[0]),
                        telemetry::analog_1.eq(analog[1]),
                        telemetry::analog_2.eq(analog[2]),
                        telemetry::analog_3.eq(analog[3]),
                        telemetry::analog_4.eq(analog[4]),
                        telemetry::digital.eq(digital.as_deref()),
                        telemetry::create_ts.eq(create_ts),
                    ))
                    .execute(conn)?;

                Ok(())
            })
        })
        .await?
    }

    pub async fn raw(&self, packet: AprsPacket) -> Result<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let packet_id = required_packet_id(packet.ids.packet_id)?;
            let callsign_id = required(packet.ids.callsign_id, "callsign")?;
            let dest_id = required(packet.ids.destination_id, "destination")?;
            let digi_ids = packet.ids.digi_ids;
            let create_ts = packet.timestamp;
            let now = Utc::now().timestamp();

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                diesel::insert_into(last_raw::table)
                    .values((
                        last_raw::packet_id.eq(packet_id),
                        last_raw::callsign_id.eq(callsign_id),
                        last_raw::information.eq(&packet.raw),
                        last_raw::create_ts.eq(now),
                    ))
                    .on_conflict(last_raw::callsign_id)
                    .do_update()
                    .set((
                        last_raw::packet_id.eq(excluded(last_raw::packet_id)),
                        last_raw::information.eq(excluded(last_raw::information)),
                        last_raw::create_ts.eq(excluded(last_raw::create_ts)),
                    ))
                    .execute(conn)?;

                diesel::insert_into(last_raw_meta::table)
                    .values((
                        last_raw_meta::packet_id.eq(packet_id),
                        last_raw_meta::callsign_id.eq(callsign_id),
                        last_raw_meta::dest_id.eq(dest_id),
                        last_raw_meta::digi0_id.eq(digi_ids[0]),
                        last_raw_meta::digi1_id.eq(digi_ids[1]),
                        last_raw_meta::digi2_id.eq(digi_ids[2]),
                        last_raw_meta::digi3_id.eq(digi_ids[3]),
                        last_raw_meta::digi4_id.eq(digi_ids[4]),
                        last_raw_meta::digi5_id.eq(digi_ids[5]),
                        last_raw_meta::digi6_id.eq(digi_ids[6]),
                        last_raw_meta::digi7_id.eq(digi_ids[7]),
                        last_raw_meta::create_ts.eq(now),
                    ))
                    .on_conflict(last_raw_meta::callsign_id)
                    .do_update()
                    .set((
                        last_raw_meta::packet_id.eq(excluded(last_raw_meta::packet_id)),
                        last_raw_meta::dest_id.eq(excluded(last_raw_meta::dest_id)),
                        last_raw_meta::digi0_id.eq(excluded(last_raw_meta::digi0_id)),
                        last_raw_meta::digi1_id.eq(excluded(last_raw_meta::digi1_id)),
                        last_raw_meta::digi2_id.eq(excluded(last_raw_meta::digi2_id)),
                        last_raw_meta::digi3_id.eq(excluded(last_raw_meta::digi3_id)),
                        last_raw_meta::digi4_id.eq(excluded(last_raw_meta::digi4_id)),
                        last_raw_meta::digi5_id.eq(excluded(last_raw_meta::digi5_id)),
                        last_raw_meta::digi6_id.eq(excluded(last_raw_meta::digi6_id)),
                        last_raw_meta::digi7_id.eq(excluded(last_raw_meta::digi7_id)),
                        last_raw_meta::create_ts.eq(excluded(last_raw_meta::create_ts)),
                    ))
                    .execute(conn)?;

                diesel::insert_into(raw::table)
                    .values((
                        raw::packet_id.eq(packet_id),
                        raw::callsign_id.eq(callsign_id),
                        raw::information.eq(&packet.raw),
                        raw::create_ts.eq(create_ts),
                    ))
                    .execute(conn)?;

                diesel::insert_into(raw_meta::table)
                    .values((
                        raw_meta::packet_id.eq(packet_id),
                        raw_meta::callsign_id.eq(callsign_id),
                        raw_meta::dest_id.eq(dest_id),
                        raw_meta::digi0_id.eq(digi_ids[0]),
                        raw_meta::digi1_id.eq(digi_ids[1]),
                        raw_meta::digi2_id.eq(digi_ids[2]),
                        raw_meta::digi3_id.eq(digi_ids[3]),
                        raw_meta::digi4_id.eq(digi_ids[4]),
                        raw_meta::digi5_id.eq(digi_ids[5]),
                        raw_meta::digi6_id.eq(digi_ids[6]),
                        raw_meta::digi7_id.eq(digi_ids[7]),
                        raw_meta::create_ts.eq(create_ts),
                    ))
                    .execute(conn)?;

                Ok(())
            })
        })
        .await?
    }
}

fn insert_telemetry_control(
    conn: &mut PgConnection,
    packet_id: Uuid,
    callsign_id: i64,
    create_ts: i64,
    control: &TelemetryControl,
) -> Result<()> {
    match control {
        TelemetryControl::Eqns { coefficients } => {
            let c: Vec<Option<f64>> = coefficients
                .iter()
                .flatten()
                .map(|v| checked_f64("is:float", v.as_deref()))
                .collect();
            diesel::insert_into(telemetry_eqns::table)
                .values((
                    telemetry_eqns::packet_id.eq(packet_id),
                    telemetry_eqns::callsign_id.eq(callsign_id),
                    telemetry_eqns::a_0.eq(c[0]),
                    telemetry_eqns::b_0.eq(c[1]),
                    telemetry_eqns::c_0.eq(c[2]),
                    telemetry_eqns::a_1.eq(c[3]),
                    telemetry_eqns::b_1.eq(c[4]),
                    telemetry_eqns::c_1.eq(c[5]),
                    telemetry_eqns::a_2.eq(c[6]),
                    telemetry_eqns::b_2.eq(c[7]),
                    telemetry_eqns::c_2.eq(c[8]),
                    telemetry_eqns::a_3.eq(c[9]),
                    telemetry_eqns::b_3.eq(c[10]),
                    telemetry_eqns::c_3.eq(c[11]),
                    telemetry_eqns::a_4.eq(c[12]),
                    telemetry_eqns::b_4.eq(c[13]),
                    telemetry_eqns::c_4.eq(c[14]),
                    telemetry_eqns::create_ts.eq(create_ts),
                ))
                .on_conflict(telemetry_eqns::callsign_id)
                .do_update()
                .set((
                    telemetry_eqns::packet_id.eq(excluded(telemetry_eqns::packet_id)),
                    telemetry_eqns::a_0.eq(excluded(telemetry_eqns::a_0)),
                    telemetry_eqns::b_0.eq(excluded(telemetry_eqns::b_0)),
                    telemetry_eqns::c_0.eq(excluded(telemetry_eqns::c_0)),
                    telemetry_eqns::a_1.eq(excluded(telemetry_eqns::a_1)),
                    telemetry_eqns::b_1.eq(excluded(telemetry_eqns::b_1)),
                    telemetry_eqns::c_1.eq(excluded(telemetry_eqns::c_1)),
                    telemetry_eqns::a_2.eq(excluded(telemetry_eqns::a_2)),
                    telemetry_eqns::b_2.eq(excluded(telemetry_eqns::b_2)),
                    telemetry_eqns::c_2.eq(excluded(telemetry_eqns::c_2)),
                    telemetry_eqns::a_3.eq(excluded(telemetry_eqns::a_3)),
                    telemetry_eqns::b_3.eq(excluded(telemetry_eqns::b_3)),
                    telemetry_eqns::c_3.eq(excluded(telemetry_eqns::c_3)),
                    telemetry_eqns::a_4.eq(excluded(telemetry_eqns::a_4)),
                    telemetry_eqns::b_4.eq(excluded(telemetry_eqns::b_4)),
                    telemetry_eqns::c_4.eq(excluded(telemetry_eqns::c_4)),
                    telemetry_eqns::create_ts.eq(excluded(telemetry_eqns::create_ts)),
                ))
                .execute(conn)?;
        }
        TelemetryControl::Unit { analog, digital } => {
            let a: Vec<Option<String>> = analog
                .iter()
                .zip(UNIT_ANALOG_LEN)
                .map(|(v, len)| checked(len, v.as_deref()))
                .collect();
            let d: Vec<Option<String>> = digital
                .iter()
                .zip(UNIT_DIGITAL_LEN)
                .map(|(v, len)| checked(len, v.as_deref()))
                .collect();
            diesel::insert_into(telemetry_unit::table)
                .values((
                    telemetry_unit::packet_id.eq(packet_id),
                    telemetry_unit::callsign_id.eq(callsign_id),
                    telemetry_unit::a_0.eq(a[0].as_deref()),
                    telemetry_unit::a_1.eq(a[1].as_deref()),
                    telemetry_unit::a_2.eq(a[2].as_deref()),
                    telemetry_unit::a_3.eq(a[3].as_deref()),
                    telemetry_unit::a_4.eq(a[4].as_deref()),
                    telemetry_unit::d_0.eq(d[0].as_deref()),
                    telemetry_unit::d_1.eq(d[1].as_deref()),
                    telemetry_unit::d_2.eq(d[2].as_deref()),
                    telemetry_unit::d_3.eq(d[3].as_deref()),
                    telemetry_unit::d_4.eq(d[4].as_deref()),
                    telemetry_unit::d_5.eq(d[5].as_deref()),
                    telemetry_unit::d_6.eq(d[6].as_deref()),
                    telemetry_unit::d_7.eq(d[7].as_deref()),
                    telemetry_unit::create_ts.eq(create_ts),
                ))
                .on_conflict(telemetry_unit::callsign_id)
                .do_update()
                .set((
                    telemetry_unit::packet_id.eq(excluded(telemetry_unit::packet_id)),
                    telemetry_unit::a_0.eq(excluded(telemetry_unit::a_0)),
                    telemetry_unit::a_1.eq(excluded(telemetry_unit::a_1)),
                    telemetry_unit::a_2.eq(excluded(telemetry_unit::a_2)),
                    telemetry_unit::a_3.eq(excluded(telemetry_unit::a_3)),
                    telemetry_unit::a_4.eq(excluded(telemetry_unit::a_4)),
                    telemetry_unit::d_0.eq(excluded(telemetry_unit::d_0)),
                    telemetry_unit::d_1.eq(excluded(telemetry_unit::d_1)),
                    telemetry_unit::d_2.eq(excluded(telemetry_unit::d_2)),
                    telemetry_unit::d_3.eq(excluded(telemetry_unit::d_3)),
                    telemetry_unit::d_4.eq(excluded(telemetry_unit::d_4)),
                    telemetry_unit::d_5.eq(excluded(telemetry_unit::d_5)),
                    telemetry_unit::d_6.eq(excluded(telemetry_unit::d_6)),
                    telemetry_unit::d_7.eq(excluded(telemetry_unit::d_7)),
                    telemetry_unit::create_ts.eq(excluded(telemetry_unit::create_ts)),
                ))
                .execute(conn)?;
        }
        TelemetryControl::Parm { analog, digital } => {
            diesel::insert_into(telemetry_parm::table)
                .values((
                    telemetry_parm::packet_id.eq(packet_id),
                    telemetry_parm::callsign_id.eq(callsign_id),
                    telemetry_parm::a_0.eq(analog[0].as_deref()),
                    telemetry_parm::a_1.eq(analog[1].as_deref()),
                    telemetry_parm::a_2.eq(analog[2].as_deref()),
                    telemetry_parm::a_3.eq(analog[3].as_deref()),
                    telemetry_parm::a_4.eq(analog[4].as_deref()),
                    telemetry_parm::d_0.eq(digital[0].as_deref()),
                    telemetry_parm::d_1.eq(digital[1].as_deref()),
                    telemetry_parm::d_2.eq(digital[2].as_deref()),
                    telemetry_parm::d_3.eq(digital[3].as_deref()),
                    telemetry_parm::d_4.eq(digital[4].as_deref()),
                    telemetry_parm::d_5.eq(digital[5].as_deref()),
                    telemetry_parm::d_6.eq(digital[6].as_deref()),
                    telemetry_parm::d_7.eq(digital[7].as_deref()),
                    telemetry_parm::create_ts.eq(create_ts),
                ))
                .on_conflict(telemetry_parm::callsign_id)
                .do_update()
                .set((
                    telemetry_parm::packet_id.eq(excluded(telemetry_parm::packet_id)),
                    telemetry_parm::a_0.eq(excluded(telemetry_parm::a_0)),
                    telemetry_parm::a_1.eq(excluded(telemetry_parm::a_1)),
                    telemetry_parm::a_2.eq(excluded(telemetry_parm::a_2)),
                    telemetry_parm::a_3.eq(excluded(telemetry_parm::a_3)),
                    telemetry_parm::a_4.eq(excluded(telemetry_parm::a_4)),
                    telemetry_parm::d_0.eq(excluded(telemetry_parm::d_0)),
                    telemetry_parm::d_1.eq(excluded(telemetry_parm::d_1)),
                    telemetry_parm::d_2.eq(excluded(telemetry_parm::d_2)),
                    telemetry_parm::d_3.eq(excluded(telemetry_parm::d_3)),
                    telemetry_parm::d_4.eq(excluded(telemetry_parm::d_4)),
                    telemetry_parm::d_5.eq(excluded(telemetry_parm::d_5)),
                    telemetry_parm::d_6.eq(excluded(telemetry_parm::d_6)),
                    telemetry_parm::d_7.eq(excluded(telemetry_parm::d_7)),
                    telemetry_parm::create_ts.eq(excluded(telemetry_parm::create_ts)),
                ))
                .execute(conn)?;
        }
        TelemetryControl::Bits { bitsense, project } => {
            diesel::insert_into(telemetry_bits::table)
                .values((
                    telemetry_bits::packet_id.eq(packet_id),
                    telemetry_bits::callsign_id.eq(callsign_id),
                    telemetry_bits::bitsense.eq(bitsense),
                    telemetry_bits::project_title.eq(project),
                    telemetry_bits::create_ts.eq(create_ts),
                ))
                .on_conflict(telemetry_bits::callsign_id)
                .do_update()
                .set((
                    telemetry_bits::packet_id.eq(excluded(telemetry_bits::packet_id)),
                    telemetry_bits::bitsense.eq(excluded(telemetry_bits::bitsense)),
                    telemetry_bits::project_title.eq(excluded(telemetry_bits::project_title)),
                    telemetry_bits::create_ts.eq(excluded(telemetry_bits::create_ts)),
                ))
                .execute(conn)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulletin_targets() {
        assert!(is_bulletin("BLN1"));
        assert!(is_bulletin("BLN1ABC"));
        assert!(is_bulletin("NWS-WARN"));
        assert!(!is_bulletin("BLN"));
        assert!(!is_bulletin("NWS-TOOLONG"));
        assert!(!is_bulletin("N0CALL"));
        assert!(!is_bulletin("XBLN1"));
    }

    #[test]
    fn pressure_rounds_to_two_decimals() {
        assert_eq!(parse_pressure(Some("1013.256")), Some(1013.26));
        assert_eq!(parse_pressure(Some("bogus")), None);
        assert_eq!(parse_pressure(None), None);
    }
}
