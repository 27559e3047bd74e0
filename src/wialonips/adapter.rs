// ABOUTME: Converts a decoded WialonIPS packet into normalized Positions, stamping every record with the session's IMEI

use crate::position::{attr, Adapter, AttrValue, Location, Position};

use super::packet::{PacketBody, Packet, PositionRecord};

pub const PROTO: &str = "wialonips";

pub struct WialonIpsAdapter {
    pub device_id: String,
    pub packet: Packet,
}

impl WialonIpsAdapter {
    pub fn new(device_id: impl Into<String>, packet: Packet) -> Self {
        WialonIpsAdapter { device_id: device_id.into(), packet }
    }
}

impl Adapter for WialonIpsAdapter {
    fn generic_positions(&self) -> Vec<Position> {
        if self.device_id.is_empty() {
            return Vec::new();
        }
        match &self.packet.body {
            PacketBody::Position(record) => vec![to_position(&self.device_id, record)],
            PacketBody::Batch(records) => records.iter().map(|record| to_position(&self.device_id, record)).collect(),
            PacketBody::Login { .. } | PacketBody::Unknown => Vec::new(),
        }
    }
}

fn to_position(device_id: &str, record: &PositionRecord) -> Position {
    let mut position = Position::new(PROTO, device_id.to_owned(), Location::xy(record.longitude, record.latitude, true));
    position.device_time = Some(record.device_time);
    position.speed = Some(record.speed);
    position.course = Some(record.course);
    position.attributes.insert(attr::SATELLITES.to_owned(), AttrValue::Int(record.satellites as i64));
    position.attributes.insert(attr::ALTITUDE.to_owned(), AttrValue::Float(record.altitude));
    position
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_yields_one_position_per_record_stamped_with_imei() {
        let packet = Packet::decode(
            b"#B#010124;120000;55.7;N;37.6;E;60;90;100;8|010124;120001;55.8;N;37.7;E;61;91;101;9\r\n",
        )
        .unwrap();
        let adapter = WialonIpsAdapter::new("123456789012345", packet);
        let positions = adapter.generic_positions();
        assert_eq!(positions.len(), 2);
        assert!(positions.iter().all(|p| p.device_id == "123456789012345"));
    }

    #[test]
    fn empty_device_id_yields_no_positions() {
        let packet = Packet::decode(b"#SD#010124;120000;55.7;N;37.6;E;60;90;100;8\r\n").unwrap();
        let adapter = WialonIpsAdapter::new("", packet);
        assert!(adapter.generic_positions().is_empty());
    }
}
