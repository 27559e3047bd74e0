// ABOUTME: WialonIPS login payloads vary in field count across protocol versions; this tags which shape was seen

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// `imei;password`
    V1,
    /// `imei;password;lang;addons`
    V2,
    Unknown,
}

impl Version {
    pub fn from_login_fields(field_count: usize) -> Version {
        match field_count {
            2 => Version::V1,
            n if n >= 4 => Version::V2,
            _ => Version::Unknown,
        }
    }
}
