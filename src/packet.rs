//! Typed model for a parsed APRS packet.
//!
//! The upstream parser hands us a structured packet; this module is the
//! shape the rest of the pipeline works with. `ResolvedIds` collects the
//! database identities assigned during preprocessing so injection never has
//! to re-resolve anything.

use uuid::Uuid;

/// Classification used for routing and per-type counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Position,
    Message,
    Telemetry,
    Status,
    Capabilities,
    PeetLogging,
    Weather,
    Dx,
    Experimental,
    Beacon,
    Unknown,
}

impl PacketType {
    pub fn label(&self) -> &'static str {
        match self {
            PacketType::Position => "position",
            PacketType::Message => "message",
            PacketType::Telemetry => "telemetry",
            PacketType::Status => "status",
            PacketType::Capabilities => "capabilities",
            PacketType::PeetLogging => "peet_logging",
            PacketType::Weather => "weather",
            PacketType::Dx => "dx",
            PacketType::Experimental => "experimental",
            PacketType::Beacon => "beacon",
            PacketType::Unknown => "unknown",
        }
    }
}

/// Power-height-gain report attached to a position.
#[derive(Debug, Clone, Default)]
pub struct Phg {
    pub power: Option<String>,
    pub haat: Option<String>,
    pub gain: Option<String>,
    pub range: Option<String>,
    pub directivity: Option<String>,
    pub beacon: Option<String>,
}

/// Direction-finding report.
#[derive(Debug, Clone, Default)]
pub struct DfReport {
    pub bearing: Option<String>,
    pub hits: Option<String>,
    pub range: Option<String>,
    pub quality: Option<String>,
}

/// Direction-finding signal strength.
#[derive(Debug, Clone, Default)]
pub struct DfSignal {
    pub power: Option<String>,
    pub haat: Option<String>,
    pub gain: Option<String>,
    pub range: Option<String>,
    pub directivity: Option<String>,
}

/// AFRS frequency announcement.
#[derive(Debug, Clone, Default)]
pub struct Afrs {
    pub frequency: String,
    pub range: Option<String>,
    pub range_east: Option<String>,
    pub tone: Option<String>,
    pub afrs_type: Option<String>,
    pub receive: Option<String>,
    pub alternate: Option<String>,
}

/// Weather fields carried inside a position report. Values stay as wire
/// strings; validation happens at the SQL bind sites.
#[derive(Debug, Clone, Default)]
pub struct WeatherReport {
    pub wind_direction: Option<String>,
    pub wind_speed: Option<String>,
    pub wind_gust: Option<String>,
    pub temperature: Option<String>,
    pub rain_hour: Option<String>,
    pub rain_midnight: Option<String>,
    pub rain_24h: Option<String>,
    pub humidity: Option<String>,
    pub pressure: Option<String>,
    pub luminosity: Option<String>,
}

/// A named point distinct from the transmitting station.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub name: String,
    /// "O" for objects, "I" for items.
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct PositionReport {
    pub latitude: f64,
    pub longitude: f64,
    /// Grid locator derived from the fix.
    pub maidenhead: String,
    pub symbol_table: Option<String>,
    pub symbol_code: Option<String>,
    pub overlay: Option<String>,
    pub course: Option<String>,
    pub speed: Option<String>,
    pub altitude: Option<String>,
    pub range: Option<String>,
    pub comment: String,
    /// Encoding the position arrived in (uncompressed, compressed, mic-e).
    pub position_type: i16,
    pub mbits: Option<String>,
    pub object: Option<ObjectInfo>,
    pub phg: Option<Phg>,
    pub dfr: Option<DfReport>,
    pub dfs: Option<DfSignal>,
    pub afrs: Option<Afrs>,
    pub weather: Option<WeatherReport>,
    /// Redundant with a very recent fix from the same source; suppresses
    /// history-table writes while the last-known state still updates.
    pub posdup: bool,
}

impl Default for PositionReport {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            maidenhead: String::new(),
            symbol_table: None,
            symbol_code: None,
            overlay: None,
            course: None,
            speed: None,
            altitude: None,
            range: None,
            comment: String::new(),
            position_type: 0,
            mbits: None,
            object: None,
            phg: None,
            dfr: None,
            dfs: None,
            afrs: None,
            weather: None,
            posdup: false,
        }
    }
}

/// Telemetry control announcements sent as messages to the station itself.
#[derive(Debug, Clone)]
pub enum TelemetryControl {
    /// Scaling coefficients, three per analog channel.
    Eqns { coefficients: [[Option<String>; 3]; 5] },
    Unit {
        analog: [Option<String>; 5],
        digital: [Option<String>; 8],
    },
    Parm {
        analog: [Option<String>; 5],
        digital: [Option<String>; 8],
    },
    Bits { bitsense: String, project: String },
}

#[derive(Debug, Clone, Default)]
pub struct MessageReport {
    pub target: String,
    pub text: String,
    pub msgid: Option<String>,
    pub ack: Option<String>,
    pub reply_id: Option<String>,
    pub ack_only: Option<String>,
    pub telemetry: Option<TelemetryControl>,
}

#[derive(Debug, Clone, Default)]
pub struct TelemetryReport {
    pub sequence: Option<String>,
    pub analog: [Option<String>; 5],
    pub digital: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PacketData {
    Position(PositionReport),
    Message(MessageReport),
    Telemetry(TelemetryReport),
    Status,
    Capabilities,
    PeetLogging,
    Weather,
    Dx,
    Experimental,
    Beacon,
    Unknown,
}

/// Icon descriptor resolved from the symbol table/code pair.
#[derive(Debug, Clone)]
pub struct IconDescriptor {
    pub id: i64,
    pub path: String,
    pub image: String,
    /// Final image path, compass variant already applied for rotating icons.
    pub icon: String,
    /// "Y" when the icon rotates with course.
    pub direction: String,
}

/// Database identities assigned by preprocessing. A digi slot of 0 means
/// "no digipeater at that hop".
#[derive(Debug, Clone, Default)]
pub struct ResolvedIds {
    pub callsign_id: Option<i64>,
    pub packet_id: Option<Uuid>,
    pub destination_id: Option<i64>,
    pub object_name_id: Option<i64>,
    pub maidenhead_id: Option<i64>,
    pub message_target_id: Option<i64>,
    pub icon: Option<IconDescriptor>,
    pub digi_ids: [i64; 8],
}

#[derive(Debug, Clone)]
pub struct AprsPacket {
    pub source: String,
    pub destination: String,
    /// Digipeater hops, at most eight are persisted.
    pub digis: Vec<String>,
    /// Complete packet text as received.
    pub raw: String,
    /// Information field (everything after the header colon).
    pub body: String,
    /// Creation time stamped by the upstream feed, UNIX seconds.
    pub timestamp: i64,
    pub data: PacketData,
    pub ids: ResolvedIds,
}

impl AprsPacket {
    pub fn packet_type(&self) -> PacketType {
        match self.data {
            PacketData::Position(_) => PacketType::Position,
            PacketData::Message(_) => PacketType::Message,
            PacketData::Telemetry(_) => PacketType::Telemetry,
            PacketData::Status => PacketType::Status,
            PacketData::Capabilities => PacketType::Capabilities,
            PacketData::PeetLogging => PacketType::PeetLogging,
            PacketData::Weather => PacketType::Weather,
            PacketData::Dx => PacketType::Dx,
            PacketData::Experimental => PacketType::Experimental,
            PacketData::Beacon => PacketType::Beacon,
            PacketData::Unknown => PacketType::Unknown,
        }
    }

    pub fn position(&self) -> Option<&PositionReport> {
        match &self.data {
            PacketData::Position(p) => Some(p),
            _ => None,
        }
    }

    pub fn position_mut(&mut self) -> Option<&mut PositionReport> {
        match &mut self.data {
            PacketData::Position(p) => Some(p),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&MessageReport> {
        match &self.data {
            PacketData::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn telemetry(&self) -> Option<&TelemetryReport> {
        match &self.data {
            PacketData::Telemetry(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        self.position().is_some_and(|p| p.object.is_some())
    }

    pub fn is_posdup(&self) -> bool {
        self.position().is_some_and(|p| p.posdup)
    }

    /// Header path as transmitted: destination plus digipeater hops.
    pub fn path_string(&self) -> String {
        let mut path = self.destination.clone();
        for digi in &self.digis {
            path.push(',');
            path.push_str(digi);
        }
        path
    }

    /// Deduplication key: MD5 over the lower-cased `source:body`.
    pub fn dup_key(&self) -> String {
        let keyed = format!("{}:{}", self.source, self.body).to_lowercase();
        format!("{:x}", md5::compute(keyed.as_bytes()))
    }

    /// MD5 of the position comment, used to tell a digi rebroadcasting
    /// distinct frames apart from a glitching tracker.
    pub fn comment_hash(&self) -> String {
        let comment = self.position().map(|p| p.comment.as_str()).unwrap_or("");
        format!("{:x}", md5::compute(comment.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_packet() -> AprsPacket {
        AprsPacket {
            source: "N0CALL".to_string(),
            destination: "APRS".to_string(),
            digis: vec!["TCPIP*".to_string()],
            raw: "N0CALL>APRS,TCPIP*:=3407.00N/11812.00W>Test".to_string(),
            body: "=3407.00N/11812.00W>Test".to_string(),
            timestamp: 1_700_000_000,
            data: PacketData::Position(PositionReport {
                latitude: 34.116_666,
                longitude: -118.2,
                maidenhead: "DM04VC".to_string(),
                comment: "Test".to_string(),
                ..PositionReport::default()
            }),
            ids: ResolvedIds::default(),
        }
    }

    #[test]
    fn path_string_joins_destination_and_digis() {
        let packet = position_packet();
        assert_eq!(packet.path_string(), "APRS,TCPIP*");
    }

    #[test]
    fn dup_key_is_case_insensitive() {
        let mut a = position_packet();
        let mut b = position_packet();
        a.source = "n0call".to_string();
        b.body.push('X');
        assert_eq!(a.dup_key(), position_packet().dup_key());
        assert_ne!(b.dup_key(), position_packet().dup_key());
    }

    #[test]
    fn object_detection_follows_payload() {
        let mut packet = position_packet();
        assert!(!packet.is_object());
        packet.position_mut().unwrap().object = Some(ObjectInfo {
            name: "WX-STN".to_string(),
            kind: "O".to_string(),
        });
        assert!(packet.is_object());
    }
}
