//! HTTPS client for the coordination server API.
//!
//! Every call is JSON over HTTPS authenticated by a static `X-Api-Key`
//! header. The server presents a self-signed certificate, so verification
//! is disabled on the client. A random cache-buster query parameter is
//! appended to every API URL because intermediate proxies on some sites
//! cache POST responses.

use std::path::Path;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use helmet_core::{ConnectionProfile, OperatorStatus};

use crate::infrastructure::storage::profiles::ProfileStore;
use crate::infrastructure::system::SystemControl;

/// Epoch the device clock is pinned to while the TLS session is first
/// established. The server certificate predates factory provisioning, so a
/// device whose RTC lost power would otherwise reject it as not-yet-valid.
pub(crate) const HANDSHAKE_EPOCH: i64 = 1_603_984_187;

/// How many ping attempts are made during authentication before giving up.
const AUTH_ATTEMPTS: u32 = 5;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const CERTIFICATE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {0} to {1}")]
    Rejected(StatusCode, String),

    #[error("malformed response body: {0}")]
    Malformed(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client for the helmet coordination API.
///
/// The API base is swapped at runtime: first the public hostname from the
/// connection profile, then the VPN-internal address once the tunnel is up.
pub struct SessionClient {
    http: reqwest::Client,
    api_base: RwLock<String>,
    mac: String,
    helmet_status: Mutex<String>,
    operator_status: Mutex<OperatorStatus>,
}

impl SessionClient {
    pub fn new(api_key: &str, mac: String) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(api_key) {
            headers.insert("X-Api-Key", value);
        }
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            api_base: RwLock::new(String::new()),
            mac,
            helmet_status: Mutex::new(String::from("Work_standby")),
            operator_status: Mutex::new(OperatorStatus::Work),
        })
    }

    /// Points the client at a new server, e.g. `https://10.8.0.1` once the
    /// VPN tunnel is up.
    pub fn set_api_base(&self, base: impl Into<String>) {
        let base = base.into();
        debug!(%base, "api base changed");
        *self.api_base.write().unwrap() = base;
    }

    pub fn api_base(&self) -> String {
        self.api_base.read().unwrap().clone()
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn helmet_status(&self) -> String {
        self.helmet_status.lock().unwrap().clone()
    }

    pub fn set_helmet_status(&self, status: impl Into<String>) {
        *self.helmet_status.lock().unwrap() = status.into();
    }

    pub fn operator_status(&self) -> OperatorStatus {
        *self.operator_status.lock().unwrap()
    }

    pub fn set_operator_status(&self, status: OperatorStatus) {
        *self.operator_status.lock().unwrap() = status;
    }

    fn url(&self, path: &str) -> String {
        let cache_buster: u32 = rand::thread_rng().gen();
        format!("{}/api/{}?{}", self.api_base(), path, cache_buster)
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<(StatusCode, Value), SessionError> {
        let url = self.url(path);
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let data = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, data))
    }

    /// Establishes the session with the server.
    ///
    /// The device clock is pinned to [`HANDSHAKE_EPOCH`] for the duration of
    /// the handshake so the TLS certificate validates even when the RTC is
    /// wrong. On success the clock is set to the epoch the server reports;
    /// after the last failed attempt the previous clock value is restored.
    pub async fn authenticate(&self, system: &dyn SystemControl) -> bool {
        let saved_epoch = system.current_epoch();
        if let Err(error) = system.set_clock(HANDSHAKE_EPOCH).await {
            warn!(%error, "failed to pin clock for handshake");
        }

        let body = json!({ "reset": true, "mac": self.mac });
        for attempt in 1..=AUTH_ATTEMPTS {
            // The pause separates attempts; the last failure returns at once.
            if attempt > 1 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            match self.post("helmet-ping", &body, DEFAULT_TIMEOUT).await {
                Ok((StatusCode::OK, data)) => {
                    if let Some(epoch) = data.get("epoch").and_then(Value::as_i64) {
                        if let Err(error) = system.set_clock(epoch).await {
                            warn!(%error, "failed to adopt server epoch");
                        }
                    }
                    info!(attempt, "authenticated with server");
                    return true;
                }
                Ok((status, _)) => {
                    warn!(attempt, %status, "server rejected ping");
                }
                Err(error) => {
                    warn!(attempt, %error, "ping failed");
                }
            }
        }

        if let Err(error) = system.set_clock(saved_epoch).await {
            warn!(%error, "failed to restore clock after handshake");
        }
        false
    }

    /// Downloads the VPN client certificate bundle to `path`.
    pub async fn fetch_certificate(&self, path: &Path) -> Result<(), SessionError> {
        let url = self.url("helmets/certificate");
        let response = self
            .http
            .post(&url)
            .timeout(CERTIFICATE_TIMEOUT)
            .json(&json!({ "mac": self.mac }))
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "helmets/certificate".into()));
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "certificate stored");
        Ok(())
    }

    /// Reports the tunnel-side address the VPN assigned to this device.
    pub async fn record_ip(&self, address: &str) -> Result<(), SessionError> {
        let body = json!({ "mac": self.mac, "ipv4": address });
        let (status, _) = self.post("helmets/record-ip", &body, DEFAULT_TIMEOUT).await?;
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "helmets/record-ip".into()));
        }
        Ok(())
    }

    /// Acknowledges receipt of a server event.
    pub async fn record_event(&self, command: &str, data: &Value) -> Result<(), SessionError> {
        let body = json!({ "mac": self.mac, "event": command, "data": data });
        let (status, _) = self
            .post("helmets/record-event", &body, DEFAULT_TIMEOUT)
            .await?;
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "helmets/record-event".into()));
        }
        Ok(())
    }

    /// Pushes a progress update for a long-running event, e.g. a screen
    /// capture request that was received but not yet served.
    pub async fn update_event(
        &self,
        event_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), SessionError> {
        let body = json!({ "mac": self.mac, "id": event_id, key: value });
        let (status, _) = self
            .post("helmets/update-event", &body, DEFAULT_TIMEOUT)
            .await?;
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "helmets/update-event".into()));
        }
        Ok(())
    }

    /// Fetches the list of provisioned Wi-Fi profiles for this device and
    /// replaces the on-disk store with it.
    pub async fn request_wifi(&self, store: &ProfileStore) -> Result<usize, SessionError> {
        let body = json!({ "mac": self.mac });
        let (status, data) = self.post("helmets/wifi-list", &body, DEFAULT_TIMEOUT).await?;
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "helmets/wifi-list".into()));
        }
        let profiles: Vec<ConnectionProfile> = match data.get("wifi") {
            Some(list) => serde_json::from_value(list.clone())
                .map_err(|e| SessionError::Malformed(e.to_string()))?,
            None => return Err(SessionError::Malformed("missing wifi field".into())),
        };
        let count = profiles.len();
        store
            .save(&profiles)
            .map_err(|e| SessionError::Malformed(e.to_string()))?;
        Ok(count)
    }

    /// Asks the server to page a remote expert.
    pub async fn request_support(&self) -> Result<(), SessionError> {
        let body = json!({ "mac": self.mac });
        let (status, _) = self
            .post("helmet-request-support", &body, DEFAULT_TIMEOUT)
            .await?;
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "helmet-request-support".into()));
        }
        Ok(())
    }

    /// Tells the server the operator hung up the current session.
    pub async fn terminate_support(&self) -> Result<(), SessionError> {
        let body = json!({ "mac": self.mac });
        let (status, _) = self
            .post("helmet-terminate-support", &body, DEFAULT_TIMEOUT)
            .await?;
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "helmet-terminate-support".into()));
        }
        Ok(())
    }

    /// Announces entry into standalone operation.
    ///
    /// On acknowledgement the server hands back the status string the rest
    /// of the fleet will see, which becomes the local status verbatim.
    pub async fn standalone_request(&self) -> Result<(), SessionError> {
        let body = json!({
            "reset": false,
            "mac": self.mac,
            "status": helmet_core::domain::mode::STANDALONE_REQUEST_CODE,
        });
        let (status, data) = self.post("helmets/status", &body, DEFAULT_TIMEOUT).await?;
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "helmets/status".into()));
        }
        if let Some(new_status) = data.get("helmet_status").and_then(Value::as_str) {
            self.set_helmet_status(new_status);
        }
        Ok(())
    }

    /// Moves the shared task list forward one step.
    pub async fn tasks_next(&self) -> Result<(), SessionError> {
        self.tasks("helmets/tasks/next").await
    }

    /// Moves the shared task list back one step.
    pub async fn tasks_back(&self) -> Result<(), SessionError> {
        self.tasks("helmets/tasks/back").await
    }

    /// Rewinds the shared task list to its first step.
    pub async fn tasks_reset(&self) -> Result<(), SessionError> {
        self.tasks("helmets/tasks/reset").await
    }

    async fn tasks(&self, path: &str) -> Result<(), SessionError> {
        let body = json!({ "mac": self.mac });
        let (status, _) = self.post(path, &body, DEFAULT_TIMEOUT).await?;
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, path.into()));
        }
        Ok(())
    }

    /// Single reachability probe against an absolute URL. True only on a
    /// clean 200.
    pub async fn probe(&self, url: &str) -> bool {
        match self
            .http
            .post(url)
            .timeout(DEFAULT_TIMEOUT)
            .json(&json!({ "mac": self.mac }))
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(error) => {
                debug!(%url, %error, "probe failed");
                false
            }
        }
    }

    /// One status exchange. Used by the poller; returns the parsed response
    /// body on a 200 and an error otherwise.
    pub(crate) async fn post_status(&self, body: &Value) -> Result<Value, SessionError> {
        let (status, data) = self
            .post("helmets/status", body, Duration::from_secs(10))
            .await?;
        if status != StatusCode::OK {
            return Err(SessionError::Rejected(status, "helmets/status".into()));
        }
        Ok(data)
    }

    /// Raw GET against a server path outside the `/api` prefix, used by the
    /// standalone content endpoints.
    pub(crate) async fn get_raw(&self, path: &str) -> Result<reqwest::Response, SessionError> {
        let url = format!("{}/{}", self.api_base(), path);
        Ok(self
            .http
            .get(&url)
            .timeout(Duration::from_secs(30))
            .send()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::system::mock::RecordingControl;

    fn client_for(server: &mockito::ServerGuard) -> SessionClient {
        let client = SessionClient::new("test-key", "aa:bb:cc:dd:ee:ff".into()).unwrap();
        client.set_api_base(server.url());
        client
    }

    #[tokio::test]
    async fn test_authenticate_adopts_server_epoch() {
        let mut server = mockito::Server::new_async().await;
        let ping = server
            .mock("POST", mockito::Matcher::Regex("/api/helmet-ping.*".into()))
            .with_status(200)
            .with_body(r#"{"epoch": 1700000000}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let system = RecordingControl::new();
        system.set_epoch(1_000);

        assert!(client.authenticate(&system).await);
        ping.assert_async().await;
        // Pinned for the handshake, then moved to the server's epoch.
        assert_eq!(system.clock_sets(), vec![HANDSHAKE_EPOCH, 1_700_000_000]);
    }

    #[tokio::test]
    async fn test_authenticate_bounded_retries_and_clock_restore() {
        let mut server = mockito::Server::new_async().await;
        let ping = server
            .mock("POST", mockito::Matcher::Regex("/api/helmet-ping.*".into()))
            .with_status(503)
            .expect(5)
            .create_async()
            .await;

        let client = client_for(&server);
        let system = RecordingControl::new();
        system.set_epoch(1_234);

        let started = std::time::Instant::now();
        assert!(!client.authenticate(&system).await);
        let elapsed = started.elapsed();
        ping.assert_async().await;
        // Exactly five attempts, then the saved clock comes back.
        assert_eq!(system.clock_sets(), vec![HANDSHAKE_EPOCH, 1_234]);
        // Four pauses between five attempts and none after the last.
        assert!(elapsed >= Duration::from_secs(4), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_standalone_request_adopts_returned_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Regex("/api/helmets/status.*".into()))
            .with_status(200)
            .with_body(r#"{"helmet_status": "Work_standalone"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        client.standalone_request().await.unwrap();
        assert_eq!(client.helmet_status(), "Work_standalone");
    }

    #[tokio::test]
    async fn test_request_wifi_replaces_store() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Regex("/api/helmets/wifi-list.*".into()))
            .with_status(200)
            .with_body(
                r#"{"wifi": [{"ssid": "site-a", "password": "secret", "uri": "srv.example.com"}]}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("wifi.json"));
        let client = client_for(&server);

        assert_eq!(client.request_wifi(&store).await.unwrap(), 1);
        let cached = store.cached();
        assert_eq!(cached[0].ssid, "site-a");
        assert_eq!(cached[0].uri, "srv.example.com");
    }

    #[tokio::test]
    async fn test_probe_is_false_on_non_200() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/helmets/link")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server);
        let url = format!("{}/api/helmets/link", server.url());
        assert!(!client.probe(&url).await);
    }
}
