//! Shell-backed [`SystemControl`] implementation.
//!
//! Wraps the standard Linux tooling the device image ships with:
//! `iw` for link-layer queries, `nmcli` for profile management and radio
//! control, `pgrep`/`kill` for process supervision, and `date` for forcing
//! the clock before certificate validation. Each operation is logged and
//! failures are returned, never propagated as panics.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{SystemControl, SystemError, NULL_MAC};

/// Production system control over the device's shell tooling.
pub struct ShellControl;

impl ShellControl {
    pub fn new() -> Self {
        Self
    }

    /// Runs a command, returning captured stdout on exit status 0.
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, SystemError> {
        let rendered = format!("{program} {}", args.join(" "));
        debug!(command = %rendered, "exec");
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| SystemError::Spawn {
                command: rendered.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(SystemError::Failed {
                command: rendered,
                status: output.status.code().unwrap_or(-1),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Like [`run`], but tolerates a non-zero exit (e.g. `pgrep` with no
    /// matches) and still returns stdout.
    async fn run_lenient(&self, program: &str, args: &[&str]) -> Result<String, SystemError> {
        let rendered = format!("{program} {}", args.join(" "));
        debug!(command = %rendered, "exec");
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| SystemError::Spawn {
                command: rendered,
                source,
            })?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for ShellControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemControl for ShellControl {
    async fn wifi_scan_dump(&self, interface: &str) -> Result<String, SystemError> {
        self.run("iw", &[interface, "scan"]).await
    }

    async fn wifi_link_dump(&self, interface: &str) -> Result<String, SystemError> {
        self.run("iw", &["dev", interface, "link"]).await
    }

    async fn radio_enable(&self) -> Result<(), SystemError> {
        self.run("nmcli", &["radio", "wifi", "on"]).await.map(|_| ())
    }

    async fn radio_disable(&self) -> Result<(), SystemError> {
        self.run("nmcli", &["radio", "wifi", "off"]).await.map(|_| ())
    }

    async fn delete_all_wifi_profiles(&self) -> Result<(), SystemError> {
        // NetworkManager keeps one file per profile; removing them all and
        // reloading is the only way to guarantee no stale profile outranks
        // the one about to be created.
        self.run(
            "sh",
            &[
                "-c",
                "rm -f /etc/NetworkManager/system-connections/*.nmconnection",
            ],
        )
        .await?;
        self.run("nmcli", &["connection", "reload"]).await.map(|_| ())
    }

    async fn create_wifi_profile(&self, interface: &str, ssid: &str) -> Result<(), SystemError> {
        self.run(
            "nmcli",
            &[
                "con", "add", "type", "wifi", "con-name", ssid, "ifname", interface, "ssid", ssid,
            ],
        )
        .await
        .map(|_| ())
    }

    async fn set_wifi_security(&self, ssid: &str, psk: &str) -> Result<(), SystemError> {
        self.run(
            "nmcli",
            &[
                "con",
                "modify",
                ssid,
                "wifi-sec.key-mgmt",
                "wpa-psk",
                "wifi-sec.psk",
                psk,
            ],
        )
        .await
        .map(|_| ())
    }

    async fn activate_wifi_profile(&self, ssid: &str) -> Result<(), SystemError> {
        self.run(
            "nmcli",
            &["con", "modify", ssid, "connection.autoconnect-priority", "100"],
        )
        .await?;
        self.run("nmcli", &["con", "modify", ssid, "connection.autoconnect", "yes"])
            .await?;
        // A failing `down` just means the profile was not active yet.
        let _ = self.run("nmcli", &["con", "down", ssid]).await;
        self.run("nmcli", &["con", "up", ssid]).await.map(|_| ())
    }

    async fn pids_of(&self, process: &str) -> Result<Vec<u32>, SystemError> {
        let out = self.run_lenient("pgrep", &[process]).await?;
        Ok(out.lines().filter_map(|l| l.trim().parse().ok()).collect())
    }

    fn process_exists(&self, pid: u32) -> bool {
        Path::new(&format!("/proc/{pid}")).exists()
    }

    async fn terminate(&self, pid: u32) -> Result<(), SystemError> {
        self.run("kill", &["-TERM", &pid.to_string()]).await.map(|_| ())
    }

    async fn set_clock(&self, epoch: i64) -> Result<(), SystemError> {
        self.run("date", &["-s", &format!("@{epoch}")]).await.map(|_| ())
    }

    fn current_epoch(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn mac_address(&self, interface: &str) -> String {
        match std::fs::read_to_string(format!("/sys/class/net/{interface}/address")) {
            Ok(addr) => addr.trim().to_string(),
            Err(e) => {
                warn!("failed to read MAC for {interface}: {e}");
                NULL_MAC.to_string()
            }
        }
    }
}
