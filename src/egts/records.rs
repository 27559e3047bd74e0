// ABOUTME: Service Data Records and their subrecords -- the per-position payload inside an EGTS appdata packet
// ABOUTME: Field layout follows the public EGTS standard closely enough for our own encoder/decoder pair to round-trip

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const SRT_TERM_IDENTITY: u8 = 3;
pub const SRT_POS_DATA: u8 = 16;
pub const SRT_EXT_POS_DATA: u8 = 17;
pub const SRT_AD_SENSORS_DATA: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltitudeSign {
    AboveSea,
    BelowSea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SrTermIdentity {
    pub terminal_identifier: u32,
}

impl SrTermIdentity {
    fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < 4 {
            return None;
        }
        Some(SrTermIdentity { terminal_identifier: buf.get_u32_le() })
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u32_le(self.terminal_identifier);
    }
}

/// Navigation position subrecord. Coordinates are carried as unsigned
/// magnitude plus a hemisphere bit, matching the wire convention the
/// adapter's sign-folding logic expects.
#[derive(Debug, Clone, PartialEq)]
pub struct SrPosData {
    pub navigation_time: u32,
    pub latitude: f64,
    pub lahs: Hemisphere,
    pub longitude: f64,
    pub lohs: Hemisphere,
    pub valid: bool,
    pub altitude: Option<f64>,
    pub altitude_sign: AltitudeSign,
    pub speed: f64,
    pub direction: u16,
    pub odometer: u32,
    pub digital_inputs: u8,
    pub source: u8,
    pub movement: bool,
}

impl SrPosData {
    fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < 21 {
            return None;
        }
        let navigation_time = buf.get_u32_le();
        let lat_raw = buf.get_u32_le();
        let lon_raw = buf.get_u32_le();
        let flags = buf.get_u8();
        let valid = flags & 0x01 != 0;
        let movement = flags & 0x20 != 0;
        let lahs = if flags & 0x80 != 0 { Hemisphere::North } else { Hemisphere::South };
        let lohs = if flags & 0x40 != 0 { Hemisphere::East } else { Hemisphere::West };
        let spd_raw = buf.get_u16_le();
        let alte = spd_raw & 0x4000 != 0;
        let dirh = (spd_raw & 0x8000 != 0) as u16;
        let speed = (spd_raw & 0x3FFF) as f64 / 10.0;
        let dir_low = buf.get_u8() as u16;
        let direction = dir_low | (dirh << 8);
        let odm_bytes = [buf.get_u8(), buf.get_u8(), buf.get_u8(), 0];
        let odometer = u32::from_le_bytes(odm_bytes);
        let digital_inputs = buf.get_u8();
        let source = buf.get_u8();
        let (altitude, altitude_sign) = if alte && buf.len() >= 4 {
            let alt_bytes = [buf.get_u8(), buf.get_u8(), buf.get_u8(), 0];
            let magnitude = u32::from_le_bytes(alt_bytes);
            let sign_byte = buf.get_u8();
            let sign = if sign_byte & 0x80 != 0 { AltitudeSign::BelowSea } else { AltitudeSign::AboveSea };
            (Some(magnitude as f64), sign)
        } else {
            (None, AltitudeSign::AboveSea)
        };

        Some(SrPosData {
            navigation_time,
            latitude: lat_raw as f64 / 10_000_000.0,
            lahs,
            longitude: lon_raw as f64 / 10_000_000.0,
            lohs,
            valid,
            altitude,
            altitude_sign,
            speed,
            direction,
            odometer,
            digital_inputs,
            source,
            movement,
        })
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u32_le(self.navigation_time);
        out.put_u32_le((self.latitude * 10_000_000.0).round() as u32);
        out.put_u32_le((self.longitude * 10_000_000.0).round() as u32);
        let mut flags = 0u8;
        if self.valid {
            flags |= 0x01;
        }
        if self.movement {
            flags |= 0x20;
        }
        if self.lahs == Hemisphere::North {
            flags |= 0x80;
        }
        if self.lohs == Hemisphere::East {
            flags |= 0x40;
        }
        out.put_u8(flags);
        let mut spd_raw = ((self.speed * 10.0).round() as u16) & 0x3FFF;
        if self.altitude.is_some() {
            spd_raw |= 0x4000;
        }
        if self.direction & 0x100 != 0 {
            spd_raw |= 0x8000;
        }
        out.put_u16_le(spd_raw);
        out.put_u8((self.direction & 0xFF) as u8);
        let odm = self.odometer.to_le_bytes();
        out.put_slice(&odm[0..3]);
        out.put_u8(self.digital_inputs);
        out.put_u8(self.source);
        if let Some(altitude) = self.altitude {
            let alt = (altitude.abs().round() as u32).to_le_bytes();
            out.put_slice(&alt[0..3]);
            out.put_u8(if self.altitude_sign == AltitudeSign::BelowSea { 0x80 } else { 0x00 });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SrExtPosData {
    pub satellites: Option<u8>,
    pub pdop: Option<u16>,
    pub hdop: Option<u16>,
    pub vdop: Option<u16>,
    pub navigation_system: Option<u16>,
}

impl SrExtPosData {
    fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.is_empty() {
            return None;
        }
        let flags = buf.get_u8();
        let mut ext = SrExtPosData::default();
        if flags & 0x01 != 0 && buf.remaining() >= 1 {
            ext.satellites = Some(buf.get_u8());
        }
        if flags & 0x02 != 0 && buf.remaining() >= 2 {
            ext.pdop = Some(buf.get_u16_le());
        }
        if flags & 0x04 != 0 && buf.remaining() >= 2 {
            ext.hdop = Some(buf.get_u16_le());
        }
        if flags & 0x08 != 0 && buf.remaining() >= 2 {
            ext.vdop = Some(buf.get_u16_le());
        }
        if flags & 0x10 != 0 && buf.remaining() >= 2 {
            ext.navigation_system = Some(buf.get_u16_le());
        }
        Some(ext)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SrAdSensorsData {
    pub digital_inputs: Vec<(u8, u8)>,
    pub digital_outputs: u8,
    pub analog_sensors: Vec<(u8, u32)>,
}

impl SrAdSensorsData {
    fn decode(mut buf: &[u8]) -> Option<Self> {
        if buf.len() < 2 {
            return None;
        }
        let din_flags = buf.get_u8();
        let mut digital_inputs = Vec::new();
        for i in 0..8u8 {
            if din_flags & (1 << i) != 0 && buf.remaining() >= 1 {
                digital_inputs.push((i + 1, buf.get_u8()));
            }
        }
        let digital_outputs = buf.get_u8();
        let ans_flags = if buf.remaining() >= 1 { buf.get_u8() } else { 0 };
        let mut analog_sensors = Vec::new();
        for i in 0..8u8 {
            if ans_flags & (1 << i) != 0 && buf.remaining() >= 3 {
                let bytes = [buf.get_u8(), buf.get_u8(), buf.get_u8(), 0];
                analog_sensors.push((i + 1, u32::from_le_bytes(bytes)));
            }
        }
        Some(SrAdSensorsData { digital_inputs, digital_outputs, analog_sensors })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Subrecord {
    TermIdentity(SrTermIdentity),
    PosData(SrPosData),
    ExtPosData(SrExtPosData),
    AdSensorsData(SrAdSensorsData),
    Unknown { subrecord_type: u8, data: Bytes },
}

impl Subrecord {
    pub fn decode_all(mut buf: &[u8]) -> Vec<Subrecord> {
        let mut out = Vec::new();
        while buf.remaining() >= 3 {
            let subrecord_type = buf.get_u8();
            let len = buf.get_u16_le() as usize;
            if buf.remaining() < len {
                break;
            }
            let data = buf.copy_to_bytes(len);
            let record = match subrecord_type {
                SRT_TERM_IDENTITY => SrTermIdentity::decode(&data).map(Subrecord::TermIdentity),
                SRT_POS_DATA => SrPosData::decode(&data).map(Subrecord::PosData),
                SRT_EXT_POS_DATA => SrExtPosData::decode(&data).map(Subrecord::ExtPosData),
                SRT_AD_SENSORS_DATA => SrAdSensorsData::decode(&data).map(Subrecord::AdSensorsData),
                _ => None,
            }
            .unwrap_or(Subrecord::Unknown { subrecord_type, data: data.clone() });
            out.push(record);
        }
        out
    }
}

/// One Service Data Record: an optional object identifier plus a list of
/// subrecords (position, extended position, sensors, identity...).
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDataRecord {
    pub object_identifier: Option<u32>,
    pub subrecords: Vec<Subrecord>,
}

impl ServiceDataRecord {
    pub fn decode_all(mut buf: &[u8]) -> Vec<ServiceDataRecord> {
        let mut records = Vec::new();
        while buf.remaining() >= 7 {
            let record_len = buf.get_u16_le() as usize;
            let _record_number = buf.get_u16_le();
            let flags = buf.get_u8();
            let object_id_present = flags & 0x01 != 0;
            if buf.remaining() < record_len {
                break;
            }
            let mut record_buf = buf.copy_to_bytes(record_len);
            let object_identifier = if object_id_present && record_buf.remaining() >= 4 {
                Some(record_buf.get_u32_le())
            } else {
                None
            };
            // source/recipient service type bytes, not consulted by the adapter
            if record_buf.remaining() >= 2 {
                record_buf.advance(2);
            }
            let subrecords = Subrecord::decode_all(&record_buf);
            records.push(ServiceDataRecord { object_identifier, subrecords });
        }
        records
    }

    /// Encodes a single-subrecord position record, used by tests and the
    /// replayer's fixture generator.
    pub fn encode_position(record_number: u16, object_identifier: u32, pos: &SrPosData) -> Bytes {
        let mut body = BytesMut::new();
        body.put_u32_le(object_identifier);
        body.put_u8(0); // SST
        body.put_u8(0); // RST
        body.put_u8(SRT_POS_DATA);
        let mut pos_bytes = BytesMut::new();
        pos.encode(&mut pos_bytes);
        body.put_u16_le(pos_bytes.len() as u16);
        body.extend_from_slice(&pos_bytes);

        let mut record = BytesMut::new();
        record.put_u16_le(body.len() as u16);
        record.put_u16_le(record_number);
        record.put_u8(0x01); // OBFE flag bit
        record.extend_from_slice(&body);
        record.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pos() -> SrPosData {
        SrPosData {
            navigation_time: 500_000,
            latitude: 55.7,
            lahs: Hemisphere::North,
            longitude: 37.6,
            lohs: Hemisphere::East,
            valid: true,
            altitude: None,
            altitude_sign: AltitudeSign::AboveSea,
            speed: 60.0,
            direction: 90,
            odometer: 12345,
            digital_inputs: 0,
            source: 0,
            movement: true,
        }
    }

    #[test]
    fn pos_data_round_trips() {
        let pos = sample_pos();
        let mut buf = BytesMut::new();
        pos.encode(&mut buf);
        let decoded = SrPosData::decode(&buf).unwrap();
        assert_eq!(decoded.navigation_time, pos.navigation_time);
        assert!((decoded.latitude - pos.latitude).abs() < 1e-6);
        assert!((decoded.longitude - pos.longitude).abs() < 1e-6);
        assert_eq!(decoded.lahs, pos.lahs);
        assert_eq!(decoded.lohs, pos.lohs);
        assert_eq!(decoded.direction, pos.direction);
        assert!((decoded.speed - pos.speed).abs() < 1e-6);
    }

    #[test]
    fn record_round_trips_object_identifier() {
        let record_bytes = ServiceDataRecord::encode_position(1, 42, &sample_pos());
        let records = ServiceDataRecord::decode_all(&record_bytes);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].object_identifier, Some(42));
        assert!(matches!(records[0].subrecords[0], Subrecord::PosData(_)));
    }
}
