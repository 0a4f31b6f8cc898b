//! Wi-Fi association and end-to-end link supervision.
//!
//! The manager runs a repeating supervision pass: it watches for the edge
//! where the device becomes associated with a provisioned network, and on
//! that edge runs the full bring-up sequence (clear stale tunnels,
//! authenticate, fetch the certificate, rewrite the tunnel config, start
//! the tunnel) followed by reachability verification over both the public
//! and the tunnel path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use regex::Regex;
use tracing::{error, info, warn};

use helmet_core::ConnectionProfile;

use crate::infrastructure::session::SessionClient;
use crate::infrastructure::storage::profiles::ProfileStore;
use crate::infrastructure::system::SystemControl;

use super::vpn::VpnSupervisor;

/// Networks named with this prefix are site low-power installations; the
/// state machine surfaces them differently.
const LOW_POWER_PREFIX: &str = "SH_LP_";

/// Reachability probe through the tunnel; the server is always the first
/// address of the tunnel subnet.
const VPN_PROBE_URL: &str = "https://10.8.0.1/api/helmets/link";

/// How many sequential probes a reachability check makes before giving up.
const PROBE_ATTEMPTS: u32 = 10;

/// Settle time after activating a Wi-Fi profile before re-checking
/// association.
const CONNECT_SETTLE: Duration = Duration::from_secs(5);

/// Where the supervised link currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Associated and reachable over both paths.
    Connected,
    /// Associated and the public API answers, but the tunnel path does not.
    VpnUnreachable,
    /// Associated but the public API does not answer.
    HttpUnreachable,
    /// No association with a provisioned network.
    NotAssociated,
}

/// Outcome of a supervision pass, reported to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkReport {
    pub state: LinkState,
    /// True when the associated network is a low-power installation.
    pub low_power: bool,
}

/// Snapshot of the link as last observed.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityState {
    pub current_ssid: Option<String>,
    pub current_server_host: Option<String>,
    pub associated: bool,
    pub http_reachable: bool,
    pub vpn_reachable: bool,
}

pub struct ConnectivityManager {
    interface: String,
    certificate_file: PathBuf,
    system: Arc<dyn SystemControl>,
    session: Arc<SessionClient>,
    profiles: Arc<ProfileStore>,
    vpn: VpnSupervisor,
    state: Mutex<ConnectivityState>,
    force_connect: AtomicBool,
    ssid_scan_regex: Regex,
    ssid_link_regex: Regex,
}

impl ConnectivityManager {
    pub fn new(
        interface: impl Into<String>,
        certificate_file: PathBuf,
        system: Arc<dyn SystemControl>,
        session: Arc<SessionClient>,
        profiles: Arc<ProfileStore>,
        vpn: VpnSupervisor,
    ) -> Self {
        Self {
            interface: interface.into(),
            certificate_file,
            system,
            session,
            profiles,
            vpn,
            state: Mutex::new(ConnectivityState::default()),
            force_connect: AtomicBool::new(false),
            ssid_scan_regex: Regex::new(r"\tSSID: (.*)").unwrap(),
            ssid_link_regex: Regex::new(r"SSID: (.+)").unwrap(),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state.lock().unwrap().clone()
    }

    /// Requests a connection attempt on the next supervision pass even if
    /// the association did not change.
    pub fn force_connect(&self) {
        self.force_connect.store(true, Ordering::SeqCst);
    }

    /// Lists SSIDs currently visible to the radio. Best effort: scan
    /// failures yield an empty list.
    pub async fn scan(&self) -> Vec<String> {
        let dump = match self.system.wifi_scan_dump(&self.interface).await {
            Ok(dump) => dump,
            Err(error) => {
                warn!(%error, "wifi scan failed");
                return Vec::new();
            }
        };
        self.ssid_scan_regex
            .captures_iter(&dump)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// Brings the radio up.
    pub async fn enable_radio(&self) {
        if let Err(error) = self.system.radio_enable().await {
            error!(%error, "failed to enable radio");
        }
    }

    /// One supervision pass. Returns a report only when something worth
    /// acting on happened: an association edge that finished bring-up, or a
    /// bring-up that failed.
    pub async fn run(&self) -> Option<LinkReport> {
        let associated = self.refresh_association().await;
        let edge = {
            let mut state = self.state.lock().unwrap();
            let edge = associated != state.associated;
            state.associated = associated;
            edge
        };

        if edge {
            if !associated {
                info!("association lost");
                return Some(self.report(LinkState::NotAssociated));
            }
            if self.establish().await {
                return Some(self.verify().await);
            }
            return None;
        }

        if self.force_connect.swap(false, Ordering::SeqCst) {
            info!("forced connection attempt");
            self.try_connect_all().await;
        }
        None
    }

    /// Checks whether the radio is associated with a provisioned network.
    /// On a match the profile's server host becomes the session's API base.
    pub async fn refresh_association(&self) -> bool {
        let dump = match self.system.wifi_link_dump(&self.interface).await {
            Ok(dump) => dump,
            Err(error) => {
                warn!(%error, "wifi link query failed");
                return false;
            }
        };
        let Some(ssid) = self
            .ssid_link_regex
            .captures(&dump)
            .map(|c| c[1].trim().to_string())
        else {
            let mut state = self.state.lock().unwrap();
            state.current_ssid = None;
            state.current_server_host = None;
            return false;
        };

        let profile = self.profiles.cached().into_iter().find(|p| p.ssid == ssid);
        let mut state = self.state.lock().unwrap();
        state.current_ssid = Some(ssid.clone());
        match profile {
            Some(profile) => {
                info!(%ssid, host = %profile.uri, "associated with provisioned network");
                state.current_server_host = Some(profile.uri.clone());
                drop(state);
                self.session.set_api_base(format!("https://{}", profile.uri));
                true
            }
            None => {
                info!(%ssid, "associated with unknown network");
                state.current_server_host = None;
                false
            }
        }
    }

    /// Applies one profile to the system: wipe every stored profile, create
    /// a fresh one scoped to the interface, set WPA-PSK security, activate.
    pub async fn connect(&self, profile: &ConnectionProfile) -> bool {
        let sequence = async {
            self.system.delete_all_wifi_profiles().await?;
            self.system
                .create_wifi_profile(&self.interface, &profile.ssid)
                .await?;
            self.system
                .set_wifi_security(&profile.ssid, &profile.password)
                .await?;
            self.system.activate_wifi_profile(&profile.ssid).await
        };
        match sequence.await {
            Ok(()) => true,
            Err(error) => {
                error!(ssid = %profile.ssid, %error, "failed to apply wifi profile");
                false
            }
        }
    }

    /// Walks the stored profiles in order and stops at the first one that
    /// results in a verified association.
    pub async fn try_connect_all(&self) -> bool {
        for profile in self.profiles.cached() {
            if !self.connect(&profile).await {
                continue;
            }
            tokio::time::sleep(CONNECT_SETTLE).await;
            if self.refresh_association().await
                && self.state.lock().unwrap().current_ssid.as_deref() == Some(&profile.ssid)
            {
                info!(ssid = %profile.ssid, "connected");
                return true;
            }
        }
        error!("no provisioned network could be joined");
        false
    }

    /// Probes `url` up to ten times in a row; true on the first 200.
    pub async fn check_reachability(&self, url: &str) -> bool {
        for attempt in 1..=PROBE_ATTEMPTS {
            if self.session.probe(url).await {
                info!(%url, attempt, "reachable");
                return true;
            }
        }
        warn!(%url, "unreachable after {PROBE_ATTEMPTS} probes");
        false
    }

    /// Bring-up sequence after a fresh association: clear stale tunnels,
    /// authenticate, pull the certificate bundle, rewrite it, start the
    /// tunnel, and report the assigned address upstream.
    async fn establish(&self) -> bool {
        self.vpn.stop(self.system.as_ref()).await;

        if !self.session.authenticate(self.system.as_ref()).await {
            error!("authentication failed");
            return false;
        }
        if let Err(error) = self.session.fetch_certificate(&self.certificate_file).await {
            error!(%error, "certificate download failed");
            return false;
        }

        let host = self.state.lock().unwrap().current_server_host.clone();
        let Some(host) = host else {
            return false;
        };
        if let Err(error) = self.vpn.prepare_config(&self.certificate_file, &host).await {
            error!(%error, "tunnel config rewrite failed");
            return false;
        }

        match self.vpn.start(&self.certificate_file).await {
            Ok(outcome) if outcome.success => {
                if let Some(address) = outcome.tunnel_address {
                    if let Err(error) = self.session.record_ip(&address).await {
                        warn!(%error, "failed to report tunnel address");
                    }
                }
                true
            }
            Ok(_) => false,
            Err(error) => {
                error!(%error, "tunnel start failed");
                false
            }
        }
    }

    /// Verifies the public path first, then the tunnel path. A failed probe
    /// degrades the report but never tears down the association.
    async fn verify(&self) -> LinkReport {
        let host = self.state.lock().unwrap().current_server_host.clone();
        let Some(host) = host else {
            return self.report(LinkState::NotAssociated);
        };

        let http_url = format!("https://{host}/api/helmets/link");
        let http_ok = self.check_reachability(&http_url).await;
        let vpn_ok = if http_ok {
            self.check_reachability(VPN_PROBE_URL).await
        } else {
            false
        };

        {
            let mut state = self.state.lock().unwrap();
            state.http_reachable = http_ok;
            state.vpn_reachable = vpn_ok;
        }

        let link = match (http_ok, vpn_ok) {
            (true, true) => LinkState::Connected,
            (true, false) => LinkState::VpnUnreachable,
            (false, _) => LinkState::HttpUnreachable,
        };
        self.report(link)
    }

    fn report(&self, state: LinkState) -> LinkReport {
        let low_power = self
            .state
            .lock()
            .unwrap()
            .current_ssid
            .as_deref()
            .is_some_and(|ssid| ssid.starts_with(LOW_POWER_PREFIX));
        LinkReport { state, low_power }
    }
}
