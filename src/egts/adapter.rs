// ABOUTME: Converts a decoded EGTS packet into normalized Positions, one per Service Data Record
// ABOUTME: Hemisphere/altitude sign and XY-vs-XYZ dimension selection follow the wire's is-present bits

use crate::position::{attr, Adapter, AttrValue, Location, Position};

use super::packet::Packet;
use super::records::{AltitudeSign, Hemisphere, ServiceDataRecord, Subrecord};

pub const PROTO: &str = "egts";

pub struct EgtsAdapter {
    pub packet: Packet,
    pub valid: bool,
}

impl EgtsAdapter {
    pub fn new(packet: Packet, valid: bool) -> Self {
        EgtsAdapter { packet, valid }
    }

    fn convert(&self, record: &ServiceDataRecord) -> Option<Position> {
        let mut device_id = record.object_identifier.map(|id| id.to_string());
        let mut position = None;

        for subrecord in &record.subrecords {
            match subrecord {
                Subrecord::TermIdentity(term) => {
                    device_id = Some(term.terminal_identifier.to_string());
                }
                Subrecord::PosData(pos) => {
                    let lat_sign = if pos.lahs == Hemisphere::North { 1.0 } else { -1.0 };
                    let lon_sign = if pos.lohs == Hemisphere::East { 1.0 } else { -1.0 };
                    let location = match pos.altitude {
                        Some(altitude) => {
                            let alt_sign = if pos.altitude_sign == AltitudeSign::AboveSea { 1.0 } else { -1.0 };
                            Location::xyz(
                                pos.longitude.copysign(lon_sign),
                                pos.latitude.copysign(lat_sign),
                                altitude.copysign(alt_sign),
                                self.valid && pos.valid,
                            )
                        }
                        None => Location::xy(
                            pos.longitude.copysign(lon_sign),
                            pos.latitude.copysign(lat_sign),
                            self.valid && pos.valid,
                        ),
                    };
                    let mut p = Position::new(PROTO, device_id.clone().unwrap_or_default(), location);
                    p.device_time = Some(egts_epoch_to_utc(pos.navigation_time));
                    p.speed = Some(pos.speed);
                    p.course = Some(pos.direction as f64);
                    p.attributes.insert(attr::ODOMETER.to_owned(), AttrValue::Int(pos.odometer as i64));
                    p.attributes.insert(attr::MOVE.to_owned(), AttrValue::Int(pos.movement as i64));
                    position = Some(p);
                }
                Subrecord::ExtPosData(ext) => {
                    if let Some(ref mut p) = position {
                        if let Some(sat) = ext.satellites {
                            p.attributes.insert(attr::SATELLITES.to_owned(), AttrValue::Int(sat as i64));
                        }
                        if let Some(pdop) = ext.pdop {
                            p.attributes.insert(attr::PDOP.to_owned(), AttrValue::Int(pdop as i64));
                        }
                        if let Some(hdop) = ext.hdop {
                            p.attributes.insert(attr::HDOP.to_owned(), AttrValue::Int(hdop as i64));
                        }
                        if let Some(vdop) = ext.vdop {
                            p.attributes.insert(attr::VDOP.to_owned(), AttrValue::Int(vdop as i64));
                        }
                        if let Some(nav) = ext.navigation_system {
                            p.attributes.insert(attr::NAV_SYSTEM.to_owned(), AttrValue::Int(nav as i64));
                        }
                    }
                }
                Subrecord::AdSensorsData(ad) => {
                    if let Some(ref mut p) = position {
                        for (index, value) in &ad.digital_inputs {
                            p.attributes.insert(format!("{}_{}", attr::DIGITAL_INPUT, index), AttrValue::Int(*value as i64));
                        }
                        p.attributes.insert(attr::DIGITAL_OUTPUT.to_owned(), AttrValue::Int(ad.digital_outputs as i64));
                        for (index, value) in &ad.analog_sensors {
                            p.attributes.insert(format!("{}_{}", attr::ANALOG_INPUT, index), AttrValue::Int(*value as i64));
                        }
                    }
                }
                Subrecord::Unknown { .. } => {}
            }
        }

        let mut p = position.unwrap_or_else(|| Position::new(PROTO, device_id.clone().unwrap_or_default(), Location::xy(0.0, 0.0, false)));
        if p.device_id.is_empty() {
            if let Some(id) = device_id {
                p.device_id = id;
            }
        }
        if p.device_id.is_empty() {
            None
        } else {
            Some(p)
        }
    }
}

impl Adapter for EgtsAdapter {
    fn generic_positions(&self) -> Vec<Position> {
        self.packet.records.iter().filter_map(|record| self.convert(record)).collect()
    }
}

/// EGTS navigation time is seconds since 2010-01-01T00:00:00Z.
fn egts_epoch_to_utc(seconds: u32) -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    let epoch = chrono::Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
    epoch + chrono::Duration::seconds(seconds as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egts::header::{Header, PacketType};
    use crate::egts::records::{AltitudeSign, Hemisphere, SrPosData};

    fn sample_packet(object_id: u32) -> Packet {
        let pos = SrPosData {
            navigation_time: 100,
            latitude: 55.7,
            lahs: Hemisphere::North,
            longitude: 37.6,
            lohs: Hemisphere::East,
            valid: true,
            altitude: None,
            altitude_sign: AltitudeSign::AboveSea,
            speed: 60.0,
            direction: 90,
            odometer: 1000,
            digital_inputs: 0,
            source: 0,
            movement: true,
        };
        let record_bytes = ServiceDataRecord::encode_position(1, object_id, &pos);
        let records = ServiceDataRecord::decode_all(&record_bytes);
        Packet {
            header: Header { protocol_version: 1, security_key_id: 0, frame_data_len: 0, packet_id: 1, packet_type: PacketType::AppData },
            records,
        }
    }

    #[test]
    fn converts_position_with_sign_from_hemisphere() {
        let packet = sample_packet(42);
        let adapter = EgtsAdapter::new(packet, true);
        let positions = adapter.generic_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].device_id, "42");
        assert!((positions[0].location.x - 37.6).abs() < 1e-6);
        assert!((positions[0].location.y - 55.7).abs() < 1e-6);
        assert!(positions[0].valid());
    }

    #[test]
    fn drops_records_without_device_identity() {
        let packet = sample_packet(0);
        let mut packet = packet;
        for record in &mut packet.records {
            record.object_identifier = None;
            record.subrecords.retain(|s| !matches!(s, Subrecord::TermIdentity(_)));
        }
        let adapter = EgtsAdapter::new(packet, true);
        assert!(adapter.generic_positions().is_empty());
    }
}
