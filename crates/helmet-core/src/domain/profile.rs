//! Wi-Fi connection profiles.
//!
//! A profile couples an SSID and passphrase with the server URI reachable on
//! that network. Profiles arrive from provisioning scans or from a
//! server-pushed Wi-Fi list, and are persisted as a JSON array which is
//! rewritten wholesale on every update.

use serde::{Deserialize, Serialize};

/// A single known network and the server host behind it.
///
/// Immutable once created; connection attempts walk a `Vec<ConnectionProfile>`
/// in order until one succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub ssid: String,
    pub password: String,
    /// Server host (or URI) to use while associated with `ssid`.
    pub uri: String,
}

impl ConnectionProfile {
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
            uri: uri.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_list_serializes_with_wire_field_names() {
        let profiles = vec![ConnectionProfile::new("SH_01", "secret", "10.0.0.2")];
        let json = serde_json::to_string(&profiles).unwrap();
        assert!(json.contains("\"ssid\":\"SH_01\""));
        assert!(json.contains("\"password\":\"secret\""));
        assert!(json.contains("\"uri\":\"10.0.0.2\""));
    }

    #[test]
    fn test_profile_list_round_trip() {
        let json = r#"[{"ssid":"a","password":"b","uri":"c"},{"ssid":"d","password":"e","uri":"f"}]"#;
        let profiles: Vec<ConnectionProfile> = serde_json::from_str(json).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[1].ssid, "d");
    }
}
