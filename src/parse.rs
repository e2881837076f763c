//! Adapter between the upstream APRS parser and the pipeline's typed
//! packet model.
//!
//! `ogn-parser` handles the AX.25 header and the position/message/status
//! bodies. Telemetry frames and telemetry control messages arrive as plain
//! text and are split here; richer sub-formats (PHG, direction finding,
//! AFRS, weather, objects) surface as optional payload fields that stay
//! unset on this path.

use anyhow::{Result, anyhow};
use ogn_parser::{AprsData, AprsPacket as OgnPacket};
use std::str::FromStr;

use crate::packet::{
    AprsPacket, MessageReport, PacketData, PositionReport, ResolvedIds, TelemetryControl,
    TelemetryReport,
};

pub fn parse_packet(raw: &str, timestamp: i64) -> Result<AprsPacket> {
    let parsed = OgnPacket::from_str(raw).map_err(|e| anyhow!("{e}"))?;

    let body = raw
        .split_once(':')
        .map(|(_, rest)| rest.to_string())
        .unwrap_or_default();

    let source = parsed.from.to_string();
    let destination = parsed.to.to_string();
    let digis: Vec<String> = parsed.via.iter().map(|v| String::from(v.clone())).collect();

    let data = match parsed.data {
        AprsData::Position(position) => {
            let latitude = *position.latitude;
            let longitude = *position.longitude;
            PacketData::Position(PositionReport {
                latitude,
                longitude,
                maidenhead: maidenhead_locator(latitude, longitude),
                symbol_table: Some(position.symbol_table.to_string()),
                symbol_code: Some(position.symbol_code.to_string()),
                course: position.comment.course.map(|c| c.to_string()),
                speed: position.comment.speed.map(|s| s.to_string()),
                altitude: position.comment.altitude.map(|a| a.to_string()),
                comment: position.comment.unparsed.clone().unwrap_or_default(),
                ..PositionReport::default()
            })
        }
        AprsData::Message(message) => {
            let text = message.text.to_string();
            let (ack, ack_only) = parse_ack(&text);
            PacketData::Message(MessageReport {
                target: message.addressee.to_string(),
                telemetry: parse_telemetry_control(&text),
                msgid: message.id.map(|id| id.to_string()),
                ack,
                ack_only,
                reply_id: None,
                text,
            })
        }
        AprsData::Status(_) => PacketData::Status,
        AprsData::Unknown => classify_unparsed(&destination, &body),
    };

    Ok(AprsPacket {
        source,
        destination,
        digis,
        raw: raw.to_string(),
        body,
        timestamp,
        data,
        ids: ResolvedIds::default(),
    })
}

/// Classify information fields the upstream parser leaves opaque.
fn classify_unparsed(destination: &str, body: &str) -> PacketData {
    if body.starts_with("T#") {
        return PacketData::Telemetry(parse_telemetry_body(body));
    }
    match body.chars().next() {
        Some('<') => PacketData::Capabilities,
        Some('_') => PacketData::Weather,
        Some('{') => PacketData::Experimental,
        Some('#') | Some('*') => PacketData::PeetLogging,
        _ if destination == "BEACON" => PacketData::Beacon,
        _ if body.starts_with("DX de ") => PacketData::Dx,
        _ => PacketData::Unknown,
    }
}

/// Split a `T#seq,a1,a2,a3,a4,a5,dddddddd` telemetry frame.
fn parse_telemetry_body(body: &str) -> TelemetryReport {
    let mut report = TelemetryReport::default();
    let mut fields = body[2..].split(',');
    report.sequence = fields.next().map(|s| s.trim().to_string());
    for slot in report.analog.iter_mut() {
        *slot = fields.next().map(|s| s.trim().to_string());
    }
    report.digital = fields.next().map(|s| s.trim().to_string());
    report
}

/// Recognize `EQNS.`/`UNIT.`/`PARM.`/`BITS.` telemetry control messages.
fn parse_telemetry_control(text: &str) -> Option<TelemetryControl> {
    let (kind, rest) = text.split_once('.')?;
    let fields: Vec<&str> = rest.split(',').collect();
    match kind {
        "EQNS" => {
            let mut coefficients: [[Option<String>; 3]; 5] = Default::default();
            for (i, channel) in coefficients.iter_mut().enumerate() {
                for (j, slot) in channel.iter_mut().enumerate() {
                    *slot = fields
                        .get(i * 3 + j)
                        .filter(|f| !f.is_empty())
                        .map(|f| f.to_string());
                }
            }
            Some(TelemetryControl::Eqns { coefficients })
        }
        "UNIT" | "PARM" => {
            let mut analog: [Option<String>; 5] = Default::default();
            let mut digital: [Option<String>; 8] = Default::default();
            for (i, slot) in analog.iter_mut().enumerate() {
                *slot = fields
                    .get(i)
                    .filter(|f| !f.is_empty())
                    .map(|f| f.to_string());
            }
            for (i, slot) in digital.iter_mut().enumerate() {
                *slot = fields
                    .get(5 + i)
                    .filter(|f| !f.is_empty())
                    .map(|f| f.to_string());
            }
            if kind == "UNIT" {
                Some(TelemetryControl::Unit { analog, digital })
            } else {
                Some(TelemetryControl::Parm { analog, digital })
            }
        }
        "BITS" => {
            let bitsense = fields.first()?.to_string();
            let project = fields.get(1..).map(|f| f.join(",")).unwrap_or_default();
            Some(TelemetryControl::Bits { bitsense, project })
        }
        _ => None,
    }
}

/// `ackNNNNN` message bodies acknowledge a previously sent message.
fn parse_ack(text: &str) -> (Option<String>, Option<String>) {
    if let Some(rest) = text.strip_prefix("ack")
        && !rest.is_empty()
        && rest.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return (Some(rest.to_string()), Some("1".to_string()));
    }
    (None, None)
}

/// Six-character maidenhead locator for a fix.
pub fn maidenhead_locator(latitude: f64, longitude: f64) -> String {
    let lon = (longitude + 180.0).clamp(0.0, 359.999_999);
    let lat = (latitude + 90.0).clamp(0.0, 179.999_999);

    let field_lon = (lon / 20.0) as u8;
    let field_lat = (lat / 10.0) as u8;
    let square_lon = ((lon % 20.0) / 2.0) as u8;
    let square_lat = (lat % 10.0) as u8;
    let sub_lon = ((lon % 2.0) * 12.0) as u8;
    let sub_lat = ((lat % 1.0) * 24.0) as u8;

    let mut locator = String::with_capacity(6);
    locator.push((b'A' + field_lon) as char);
    locator.push((b'A' + field_lat) as char);
    locator.push((b'0' + square_lon) as char);
    locator.push((b'0' + square_lat) as char);
    locator.push((b'a' + sub_lon) as char);
    locator.push((b'a' + sub_lat) as char);
    locator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    #[test]
    fn parses_position_packet() {
        let packet =
            parse_packet("N0CALL>APRS,TCPIP*:=3407.00N/11812.00W>Test", 1_700_000_000).unwrap();
        assert_eq!(packet.source, "N0CALL");
        assert_eq!(packet.destination, "APRS");
        assert_eq!(packet.digis, vec!["TCPIP*".to_string()]);
        assert_eq!(packet.packet_type(), PacketType::Position);
        let position = packet.position().unwrap();
        assert!((position.latitude - 34.116_666).abs() < 0.001);
        assert!((position.longitude + 118.2).abs() < 0.001);
        assert_eq!(position.maidenhead, "DM04vc");
    }

    #[test]
    fn parse_failure_is_an_error() {
        assert!(parse_packet("not a packet", 0).is_err());
    }

    #[test]
    fn classifies_telemetry_frames() {
        let packet = parse_packet(
            "N0CALL>APRS,WIDE1-1:T#005,199,123,045,001,000,00000000",
            0,
        )
        .unwrap();
        assert_eq!(packet.packet_type(), PacketType::Telemetry);
        let telemetry = packet.telemetry().unwrap();
        assert_eq!(telemetry.sequence.as_deref(), Some("005"));
        assert_eq!(telemetry.analog[0].as_deref(), Some("199"));
        assert_eq!(telemetry.analog[4].as_deref(), Some("000"));
        assert_eq!(telemetry.digital.as_deref(), Some("00000000"));
    }

    #[test]
    fn classifies_capabilities_and_weather() {
        let caps = parse_packet("N0CALL>APRS:<IGATE,MSG_CNT=30", 0).unwrap();
        assert_eq!(caps.packet_type(), PacketType::Capabilities);
        let wx = parse_packet("N0CALL>APRS:_10090556c220s004g005t077", 0).unwrap();
        assert_eq!(wx.packet_type(), PacketType::Weather);
    }

    #[test]
    fn telemetry_control_messages() {
        let eqns = parse_telemetry_control("EQNS.0,5.2,0,0,.53,-32,3,4.39,49,-32,3,18,1,2,3");
        match eqns {
            Some(TelemetryControl::Eqns { coefficients }) => {
                assert_eq!(coefficients[0][1].as_deref(), Some("5.2"));
                assert_eq!(coefficients[4][2].as_deref(), Some("3"));
            }
            other => panic!("unexpected control: {other:?}"),
        }

        let bits = parse_telemetry_control("BITS.10110000,Big Station, West");
        match bits {
            Some(TelemetryControl::Bits { bitsense, project }) => {
                assert_eq!(bitsense, "10110000");
                assert_eq!(project, "Big Station, West");
            }
            other => panic!("unexpected control: {other:?}"),
        }

        assert!(parse_telemetry_control("hello there").is_none());
    }

    #[test]
    fn ack_only_messages() {
        let (ack, ack_only) = parse_ack("ack003");
        assert_eq!(ack.as_deref(), Some("003"));
        assert_eq!(ack_only.as_deref(), Some("1"));
        assert_eq!(parse_ack("ack"), (None, None));
        assert_eq!(parse_ack("hello"), (None, None));
    }

    #[test]
    fn maidenhead_known_grids() {
        assert_eq!(maidenhead_locator(34.116_666, -118.2), "DM04vc");
        assert_eq!(maidenhead_locator(48.146_666, 11.608_333), "JN58td");
        assert_eq!(&maidenhead_locator(-34.91, -56.211_666)[..4], "GF15");
    }
}
