// ABOUTME: Normalized geolocation record produced by protocol adapters and fanned out by the event bus
// ABOUTME: Mirrors the generic.Position row from the original gotrackery project's protocol/generic package

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Whether a [`Location`] carries a Z (altitude) component. EGTS sets this
/// from its `ALTE` flag; WialonIPS locations are always `Xy` (altitude is
/// carried separately as an attribute by that protocol's wire format).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Xy,
    Xyz,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dimension: Dimension,
    pub valid: bool,
}

impl Location {
    pub fn xy(x: f64, y: f64, valid: bool) -> Self {
        Location { x, y, z: 0.0, dimension: Dimension::Xy, valid }
    }

    pub fn xyz(x: f64, y: f64, z: f64, valid: bool) -> Self {
        Location { x, y, z, dimension: Dimension::Xyz, valid }
    }
}

/// A scalar attribute value. Adapters only emit attributes actually carried
/// by the wire packet — there is no "is-present" sentinel beyond simply
/// omitting the key from the map.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    Floats(Vec<f64>),
}

pub type Attributes = BTreeMap<String, AttrValue>;

pub mod attr {
    pub const ODOMETER: &str = "odometer";
    pub const MOVE: &str = "move";
    pub const SATELLITES: &str = "sat";
    pub const PDOP: &str = "pdop";
    pub const HDOP: &str = "hdop";
    pub const VDOP: &str = "vdop";
    pub const NAV_SYSTEM: &str = "nav_system";
    pub const DIGITAL_INPUT: &str = "din";
    pub const DIGITAL_OUTPUT: &str = "dout";
    pub const ANALOG_INPUT: &str = "ain";
    pub const IBUTTON: &str = "ibutton";
    pub const INPUTS: &str = "inputs";
    pub const OUTPUTS: &str = "outputs";
    pub const ADC: &str = "adc";
    pub const ALTITUDE: &str = "altitude";
}

/// A normalized position record. Immutable once constructed; `server_time`
/// is filled in by the event bus at publish time, not by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub protocol: &'static str,
    pub device_id: String,
    pub device_time: Option<DateTime<Utc>>,
    pub server_time: Option<DateTime<Utc>>,
    pub location: Location,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    pub attributes: Attributes,
    pub network: Option<String>,
    pub address: Option<String>,
    pub accuracy: Option<f64>,
}

impl Position {
    pub fn new(protocol: &'static str, device_id: impl Into<String>, location: Location) -> Self {
        Position {
            protocol,
            device_id: device_id.into(),
            device_time: None,
            server_time: None,
            location,
            speed: None,
            course: None,
            attributes: Attributes::new(),
            network: None,
            address: None,
            accuracy: None,
        }
    }

    pub fn valid(&self) -> bool {
        self.location.valid
    }
}

/// Capability a [`crate::protocol::Protocol`] attaches to a `RespondResult`
/// when normalized positions can be extracted from the decoded packet.
pub trait Adapter: Send {
    fn generic_positions(&self) -> Vec<Position>;
}
