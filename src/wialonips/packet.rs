// ABOUTME: Parses one `#TYPE#PAYLOAD\r\n` WialonIPS record into a typed packet
// ABOUTME: Login carries IMEI/password; ShortenedData/Data/BlackBox carry one or more fixed-field position records

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

use super::version::Version;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WialonError {
    #[error("frame is not delimiter-framed")]
    NotDelimited,
    #[error("missing field in payload")]
    MissingField,
    #[error("malformed field: {0}")]
    MalformedField(String),
    #[error("unknown packet type {0}")]
    UnknownType(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub device_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub course: f64,
    pub altitude: f64,
    pub satellites: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    Login { imei: String, password: String, version: Version },
    Position(PositionRecord),
    Batch(Vec<PositionRecord>),
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub type_tag: String,
    pub body: PacketBody,
}

impl Packet {
    /// `raw` is the whole delimiter-framed record, including the leading
    /// `#TYPE#`, the trailing `\r\n`, and everything in between.
    pub fn decode(raw: &[u8]) -> Result<Packet, WialonError> {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim_end_matches(['\r', '\n']);
        if !trimmed.starts_with('#') {
            return Err(WialonError::NotDelimited);
        }
        let mut parts = trimmed.splitn(3, '#');
        parts.next(); // leading empty segment before the first '#'
        let type_tag = parts.next().ok_or(WialonError::NotDelimited)?.to_owned();
        let payload = parts.next().unwrap_or("");

        let body = match type_tag.as_str() {
            "L" => decode_login(payload)?,
            "SD" | "D" => PacketBody::Position(decode_position_fields(payload)?),
            "B" => {
                let records = payload
                    .split('|')
                    .filter(|segment| !segment.is_empty())
                    .map(decode_position_fields)
                    .collect::<Result<Vec<_>, _>>()?;
                PacketBody::Batch(records)
            }
            _ => PacketBody::Unknown,
        };

        Ok(Packet { type_tag, body })
    }

    /// The acknowledgement this packet implies, following the `#A<TYPE>#body\r\n` convention.
    pub fn response(&self) -> Vec<u8> {
        match &self.body {
            PacketBody::Login { .. } => b"#AL#1\r\n".to_vec(),
            PacketBody::Position(_) => format!("#A{}#1\r\n", self.type_tag).into_bytes(),
            PacketBody::Batch(records) => format!("#AB#{}\r\n", records.len()).into_bytes(),
            PacketBody::Unknown => Vec::new(),
        }
    }
}

fn decode_login(payload: &str) -> Result<PacketBody, WialonError> {
    let fields: Vec<&str> = payload.split(';').collect();
    if fields.len() < 2 {
        return Err(WialonError::MissingField);
    }
    let imei = fields[0].to_owned();
    let password = fields[1].to_owned();
    if imei.is_empty() {
        return Err(WialonError::MalformedField("imei".to_owned()));
    }
    Ok(PacketBody::Login { imei, password, version: Version::from_login_fields(fields.len()) })
}

fn decode_position_fields(payload: &str) -> Result<PositionRecord, WialonError> {
    let fields: Vec<&str> = payload.split(';').collect();
    if fields.len() < 10 {
        return Err(WialonError::MissingField);
    }
    let date = NaiveDate::parse_from_str(fields[0], "%d%m%y")
        .map_err(|_| WialonError::MalformedField("date".to_owned()))?;
    let time = NaiveTime::parse_from_str(fields[1], "%H%M%S")
        .map_err(|_| WialonError::MalformedField("time".to_owned()))?;
    let device_time = DateTime::<Utc>::from_naive_utc_and_offset(NaiveDateTime::new(date, time), Utc);

    let lat_mag: f64 = fields[2].parse().map_err(|_| WialonError::MalformedField("lat".to_owned()))?;
    let lat_sign = match fields[3] {
        "N" | "n" => 1.0,
        "S" | "s" => -1.0,
        other => return Err(WialonError::MalformedField(format!("ns={other}"))),
    };
    let lon_mag: f64 = fields[4].parse().map_err(|_| WialonError::MalformedField("lon".to_owned()))?;
    let lon_sign = match fields[5] {
        "E" | "e" => 1.0,
        "W" | "w" => -1.0,
        other => return Err(WialonError::MalformedField(format!("ew={other}"))),
    };
    let speed: f64 = fields[6].parse().map_err(|_| WialonError::MalformedField("speed".to_owned()))?;
    let course: f64 = fields[7].parse().map_err(|_| WialonError::MalformedField("course".to_owned()))?;
    let altitude: f64 = fields[8].parse().map_err(|_| WialonError::MalformedField("altitude".to_owned()))?;
    let satellites: u32 = fields[9].parse().map_err(|_| WialonError::MalformedField("satellites".to_owned()))?;

    Ok(PositionRecord {
        device_time,
        latitude: lat_mag.copysign(lat_sign),
        longitude: lon_mag.copysign(lon_sign),
        speed,
        course,
        altitude,
        satellites,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_login() {
        let packet = Packet::decode(b"#L#123456789012345;secret\r\n").unwrap();
        assert_eq!(packet.type_tag, "L");
        assert!(matches!(packet.body, PacketBody::Login { ref imei, .. } if imei == "123456789012345"));
    }

    #[test]
    fn decodes_shortened_data() {
        let packet = Packet::decode(b"#SD#010124;120000;55.7;N;37.6;E;60;90;100;8\r\n").unwrap();
        match packet.body {
            PacketBody::Position(pos) => {
                assert!((pos.latitude - 55.7).abs() < 1e-6);
                assert!((pos.longitude - 37.6).abs() < 1e-6);
                assert_eq!(pos.satellites, 8);
            }
            _ => panic!("expected position"),
        }
    }

    #[test]
    fn unknown_type_has_no_response() {
        let packet = Packet::decode(b"#XX#garbage\r\n").unwrap();
        assert_eq!(packet.body, PacketBody::Unknown);
        assert!(packet.response().is_empty());
    }

    #[test]
    fn batch_splits_on_pipe() {
        let packet =
            Packet::decode(b"#B#010124;120000;55.7;N;37.6;E;60;90;100;8|010124;120001;55.8;N;37.7;E;61;91;101;9\r\n").unwrap();
        match packet.body {
            PacketBody::Batch(records) => assert_eq!(records.len(), 2),
            _ => panic!("expected batch"),
        }
    }
}
