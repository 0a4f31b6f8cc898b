//! Recording system control for unit and integration tests.
//!
//! The real [`super::shell::ShellControl`] shells out to `nmcli`, `iw`,
//! `pgrep`, and `date`, none of which can run (or be observed) inside a test.
//! `RecordingControl` replaces every operation with in-memory recording:
//! each call is pushed onto a `Mutex<Vec<String>>` journal so tests can
//! assert exactly which system operations ran and in what order, and canned
//! outputs configure what the fake system "observes".

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{SystemControl, SystemError, NULL_MAC};

/// A system control that records calls and serves canned outputs.
#[derive(Default)]
pub struct RecordingControl {
    /// Ordered journal of every operation performed.
    pub calls: Mutex<Vec<String>>,
    /// Scan dump returned by `wifi_scan_dump`.
    pub scan_dump: Mutex<String>,
    /// Link dump returned by `wifi_link_dump`.
    pub link_dump: Mutex<String>,
    /// PIDs returned by `pids_of`, keyed by process name.
    pub pids: Mutex<HashMap<String, Vec<u32>>>,
    /// PIDs for which `process_exists` answers true.
    pub live_pids: Mutex<Vec<u32>>,
    /// Every epoch passed to `set_clock`, in order.
    pub clock_sets: Mutex<Vec<i64>>,
    /// Value returned by `current_epoch`.
    pub epoch: Mutex<i64>,
    /// SSIDs for which `activate_wifi_profile` fails.
    pub failing_ssids: Mutex<Vec<String>>,
}

impl RecordingControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// Replaces the canned link dump, simulating the association the fake
    /// system would report after a successful connect.
    pub fn set_link_dump(&self, dump: impl Into<String>) {
        *self.link_dump.lock().unwrap() = dump.into();
    }

    pub fn set_scan_dump(&self, dump: impl Into<String>) {
        *self.scan_dump.lock().unwrap() = dump.into();
    }

    /// Marks `ssid` so that activating it fails, simulating a bad profile.
    pub fn fail_ssid(&self, ssid: impl Into<String>) {
        self.failing_ssids.lock().unwrap().push(ssid.into());
    }

    pub fn journal(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_epoch(&self, epoch: i64) {
        *self.epoch.lock().unwrap() = epoch;
    }

    /// Every epoch that was written to the clock, in order.
    pub fn clock_sets(&self) -> Vec<i64> {
        self.clock_sets.lock().unwrap().clone()
    }
}

#[async_trait]
impl SystemControl for RecordingControl {
    async fn wifi_scan_dump(&self, interface: &str) -> Result<String, SystemError> {
        self.record(format!("scan {interface}"));
        Ok(self.scan_dump.lock().unwrap().clone())
    }

    async fn wifi_link_dump(&self, interface: &str) -> Result<String, SystemError> {
        self.record(format!("link {interface}"));
        Ok(self.link_dump.lock().unwrap().clone())
    }

    async fn radio_enable(&self) -> Result<(), SystemError> {
        self.record("radio on");
        Ok(())
    }

    async fn radio_disable(&self) -> Result<(), SystemError> {
        self.record("radio off");
        Ok(())
    }

    async fn delete_all_wifi_profiles(&self) -> Result<(), SystemError> {
        self.record("delete-all-profiles");
        Ok(())
    }

    async fn create_wifi_profile(&self, interface: &str, ssid: &str) -> Result<(), SystemError> {
        self.record(format!("create {interface} {ssid}"));
        Ok(())
    }

    async fn set_wifi_security(&self, ssid: &str, _psk: &str) -> Result<(), SystemError> {
        self.record(format!("security {ssid}"));
        Ok(())
    }

    async fn activate_wifi_profile(&self, ssid: &str) -> Result<(), SystemError> {
        self.record(format!("activate {ssid}"));
        if self.failing_ssids.lock().unwrap().iter().any(|s| s == ssid) {
            return Err(SystemError::Failed {
                command: format!("nmcli con up {ssid}"),
                status: 4,
            });
        }
        Ok(())
    }

    async fn pids_of(&self, process: &str) -> Result<Vec<u32>, SystemError> {
        self.record(format!("pids {process}"));
        Ok(self
            .pids
            .lock()
            .unwrap()
            .get(process)
            .cloned()
            .unwrap_or_default())
    }

    fn process_exists(&self, pid: u32) -> bool {
        self.live_pids.lock().unwrap().contains(&pid)
    }

    async fn terminate(&self, pid: u32) -> Result<(), SystemError> {
        self.record(format!("terminate {pid}"));
        self.live_pids.lock().unwrap().retain(|p| *p != pid);
        Ok(())
    }

    async fn set_clock(&self, epoch: i64) -> Result<(), SystemError> {
        self.record(format!("set-clock {epoch}"));
        self.clock_sets.lock().unwrap().push(epoch);
        *self.epoch.lock().unwrap() = epoch;
        Ok(())
    }

    fn current_epoch(&self) -> i64 {
        *self.epoch.lock().unwrap()
    }

    fn mac_address(&self, _interface: &str) -> String {
        NULL_MAC.to_string()
    }
}
