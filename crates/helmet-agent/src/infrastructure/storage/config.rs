//! TOML-based agent configuration.
//!
//! Read once at startup from `/etc/helmet-agent/config.toml` (overridable via
//! the `HELMET_AGENT_CONFIG` environment variable). Every field carries a
//! `#[serde(default = "...")]` so the agent works on first boot with a
//! missing or partial file, and older files keep working when new fields
//! are added.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level agent configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub vpn: VpnConfig,
    #[serde(default)]
    pub standalone: StandaloneConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Hardware-facing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// Wireless interface the agent manages.
    #[serde(default = "default_interface")]
    pub wireless_interface: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Server session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Static API key sent as `X-Api-Key` on every request.
    #[serde(default)]
    pub api_key: String,
    /// Server host used before any profile resolves one.
    #[serde(default)]
    pub server_host: String,
    /// Status exchange period in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// File-backed GPS source; first line is `lat,lng`.
    #[serde(default = "default_gps_file")]
    pub gps_file: PathBuf,
    /// Thermal zone file holding millidegrees Celsius.
    #[serde(default = "default_temperature_file")]
    pub temperature_file: PathBuf,
}

/// Tunnel supervision settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VpnConfig {
    /// Tunnel binary name, used both to spawn and to enumerate PIDs.
    #[serde(default = "default_vpn_binary")]
    pub binary: String,
    /// Client certificate bundle / tunnel config downloaded from the server.
    #[serde(default = "default_certificate_file")]
    pub certificate_file: PathBuf,
}

/// Standalone content settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandaloneConfig {
    /// Directory the content bundle is unpacked into.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
}

/// Persisted file locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// JSON array of Wi-Fi connection profiles.
    #[serde(default = "default_wifi_file")]
    pub wifi_profiles_file: PathBuf,
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_gps_file() -> PathBuf {
    PathBuf::from("/run/helmet/gps")
}

fn default_temperature_file() -> PathBuf {
    PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
}

fn default_vpn_binary() -> String {
    "openvpn".to_string()
}

fn default_certificate_file() -> PathBuf {
    PathBuf::from("/etc/helmet-agent/client.ovpn")
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("/var/lib/helmet-agent/todo")
}

fn default_wifi_file() -> PathBuf {
    PathBuf::from("/etc/helmet-agent/wifi.json")
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            wireless_interface: default_interface(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            server_host: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            gps_file: default_gps_file(),
            temperature_file: default_temperature_file(),
        }
    }
}

impl Default for VpnConfig {
    fn default() -> Self {
        Self {
            binary: default_vpn_binary(),
            certificate_file: default_certificate_file(),
        }
    }
}

impl Default for StandaloneConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            wifi_profiles_file: default_wifi_file(),
        }
    }
}

impl AgentConfig {
    /// Loads from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<AgentConfig, ConfigError> {
        if !path.exists() {
            return Ok(AgentConfig::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Writes the configuration back to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AgentConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.device.wireless_interface, "wlan0");
        assert_eq!(config.session.poll_interval_ms, 5000);
        assert_eq!(config.vpn.binary, "openvpn");
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        let config: AgentConfig = toml::from_str(
            r#"
            [session]
            api_key = "k-123"
            "#,
        )
        .unwrap();
        assert_eq!(config.session.api_key, "k-123");
        assert_eq!(config.session.poll_interval_ms, 5000);
        assert_eq!(config.device.wireless_interface, "wlan0");
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AgentConfig::default();
        config.session.server_host = "srv.example".into();
        config.save(&path).unwrap();
        let loaded = AgentConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
