// ABOUTME: Per-connection key/value context shared across the frames of one session
// ABOUTME: Not thread-safe by design; the connection handler serializes all access

use std::collections::HashMap;

const DEVICE_KEY: &str = "device";

/// A closed tagged union standing in for the dynamic values a `Session`
/// carries across frames (device id, protocol version, and similar small
/// bits of per-connection state). Every concrete use in this crate fits one
/// of these variants, so there is no `Any`-typed escape hatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Floats(Vec<f64>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

/// Per-connection context storage. A session is accessed from exactly one
/// task — the connection's reader path — for its whole lifetime, so no
/// internal locking is needed.
#[derive(Debug, Default, Clone)]
pub struct Session {
    ctx: HashMap<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.ctx.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.ctx.get(key)
    }

    /// Sets the distinguished `device` slot. Once set by a login frame this
    /// persists for the connection's lifetime.
    pub fn set_device(&mut self, device: impl Into<String>) {
        self.ctx.insert(DEVICE_KEY.to_owned(), Value::Str(device.into()));
    }

    pub fn device(&self) -> Option<&str> {
        self.ctx.get(DEVICE_KEY).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_round_trips() {
        let mut s = Session::new();
        assert_eq!(s.device(), None);
        s.set_device("123456789012345");
        assert_eq!(s.device(), Some("123456789012345"));
    }

    #[test]
    fn arbitrary_keys_round_trip() {
        let mut s = Session::new();
        s.set("version", 4i64);
        assert_eq!(s.get("version"), Some(&Value::Int(4)));
        assert_eq!(s.get("missing"), None);
    }
}
