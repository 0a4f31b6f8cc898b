//! System-control port.
//!
//! The agent never builds shell command strings inside its core logic.
//! Every privileged operation — radio control, NetworkManager profile
//! manipulation, process enumeration and termination, setting the system
//! clock — goes through the [`SystemControl`] trait. The production
//! implementation ([`shell::ShellControl`]) runs the real tooling via
//! `tokio::process`; tests use the in-memory [`mock::RecordingControl`].

pub mod mock;
pub mod shell;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for system-control operations.
#[derive(Debug, Error)]
pub enum SystemError {
    /// The underlying command could not be spawned.
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// The command ran but exited non-zero.
    #[error("{command} exited with status {status}")]
    Failed { command: String, status: i32 },
}

/// Abstraction over the privileged system operations the agent needs.
///
/// All methods are fallible and must never panic; callers treat failures as
/// transient and fall back to safe defaults.
#[async_trait]
pub trait SystemControl: Send + Sync {
    /// Raw link-layer scan output for `interface` (the `iw ... scan` dump).
    async fn wifi_scan_dump(&self, interface: &str) -> Result<String, SystemError>;

    /// Raw link status output for `interface` (the `iw dev ... link` dump).
    async fn wifi_link_dump(&self, interface: &str) -> Result<String, SystemError>;

    /// Turns the Wi-Fi radio on.
    async fn radio_enable(&self) -> Result<(), SystemError>;

    /// Turns the Wi-Fi radio off.
    async fn radio_disable(&self) -> Result<(), SystemError>;

    /// Removes every stored Wi-Fi connection profile and reloads the
    /// connection manager.
    async fn delete_all_wifi_profiles(&self) -> Result<(), SystemError>;

    /// Creates a new connection profile scoped to `ssid` on `interface`.
    async fn create_wifi_profile(&self, interface: &str, ssid: &str) -> Result<(), SystemError>;

    /// Sets WPA-PSK security parameters on the profile named `ssid`.
    async fn set_wifi_security(&self, ssid: &str, psk: &str) -> Result<(), SystemError>;

    /// Marks the profile autoconnect with high priority and forces
    /// reassociation (down, then up).
    async fn activate_wifi_profile(&self, ssid: &str) -> Result<(), SystemError>;

    /// PIDs of all running processes whose name matches `process`.
    async fn pids_of(&self, process: &str) -> Result<Vec<u32>, SystemError>;

    /// Whether a PID still exists at the time of the call.
    fn process_exists(&self, pid: u32) -> bool;

    /// Sends SIGTERM to `pid`.
    async fn terminate(&self, pid: u32) -> Result<(), SystemError>;

    /// Forces the system clock to `epoch` seconds.
    async fn set_clock(&self, epoch: i64) -> Result<(), SystemError>;

    /// Current system clock in epoch seconds.
    fn current_epoch(&self) -> i64;

    /// MAC address of `interface`; the all-zero address on failure.
    fn mac_address(&self, interface: &str) -> String;
}

/// Fallback MAC when the interface address cannot be read.
pub const NULL_MAC: &str = "00:00:00:00:00:00";
