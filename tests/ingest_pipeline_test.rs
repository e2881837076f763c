// Integration tests for the ingest pipeline.
//
// The full scenarios need live Postgres, Redis, and NATS instances plus
// the injection schema loaded; those are marked #[ignore] and run against
// a staging stack. The parse-level checks run standalone.

use aprs_inject::packet::PacketType;
use aprs_inject::parse::parse_packet;

#[test]
fn happy_path_frame_parses_into_a_position() {
    // One line of a broker frame body, timestamp prefix already split off.
    let packet = parse_packet("N0CALL>APRS,TCPIP*:=3407.00N/11812.00W>Test", 1_700_000_000)
        .expect("frame should parse");

    assert_eq!(packet.source, "N0CALL");
    assert_eq!(packet.destination, "APRS");
    assert_eq!(packet.packet_type(), PacketType::Position);
    assert_eq!(packet.path_string(), "APRS,TCPIP*");

    let report = packet.position().expect("position payload");
    assert!((report.latitude - 34.116_666).abs() < 0.001);
    assert!((report.longitude + 118.2).abs() < 0.001);
    assert!(!report.maidenhead.is_empty());
}

#[test]
fn identical_packets_share_a_duplicate_key() {
    let a = parse_packet("N0CALL>APRS,TCPIP*:=3407.00N/11812.00W>Test", 1_700_000_000).unwrap();
    let b = parse_packet("N0CALL>APRS,TCPIP*:=3407.00N/11812.00W>Test", 1_700_000_002).unwrap();
    assert_eq!(a.dup_key(), b.dup_key());

    let c = parse_packet("N0CALL>APRS,TCPIP*:=3407.00N/11812.00W>Other", 1_700_000_000).unwrap();
    assert_ne!(a.dup_key(), c.dup_key());
}

#[test]
#[ignore] // Requires Postgres with the injection schema, Redis, and NATS
fn happy_path_position_populates_all_tables() {
    // TODO: drive a worker with the frame
    //   "1700000000 N0CALL>APRS,TCPIP*:=3407.00N/11812.00W>Test"
    // and assert one row each in packet, callsign (N0CALL), destination
    // (APRS), path, last_position, last_position_meta, position, and
    // position_meta, with no feed publish.
    todo!("full-stack scenario runs against the staging stack");
}

#[test]
#[ignore] // Requires Postgres, Redis, and NATS
fn immediate_duplicate_is_suppressed() {
    // TODO: send the same frame twice within two seconds; the second must
    // publish to feeds.aprs.is.duplicates and write nothing past the
    // dedup check.
    todo!("full-stack scenario runs against the staging stack");
}

#[test]
#[ignore] // Requires Postgres, Redis, and NATS
fn impossible_movement_is_rejected() {
    // TODO: a fix from (34.12,-118.20) followed 30s later by one from
    // (40.00,-74.00) with the same comment must be rejected to
    // feeds.aprs.is.rejects with "position: gps glitch speed > 500" and
    // must not be injected.
    todo!("full-stack scenario runs against the staging stack");
}

#[test]
#[ignore] // Requires Redis
fn cache_outage_degrades_to_sql_only() {
    // TODO: kill Redis mid-run; the next cache op must trip the breaker
    // and resolution must continue from Postgres alone for 60 seconds.
    todo!("full-stack scenario runs against the staging stack");
}

#[test]
#[ignore] // Requires Postgres, Redis, and NATS
fn bulletin_messages_hit_both_tables() {
    // TODO: a MESSAGE addressed to BLN1ABC must append to message AND
    // upsert last_bulletin, then publish to notify.aprs.messages.
    todo!("full-stack scenario runs against the staging stack");
}
