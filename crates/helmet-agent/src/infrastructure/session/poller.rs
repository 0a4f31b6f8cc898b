//! Repeating status exchange with the coordination server.
//!
//! Every tick the poller reads the GPS fix and board temperature, posts the
//! device status, and folds the server's answer back into the session: the
//! remote peer address is cached, the fleet-visible status string is
//! adopted, and a signal is delivered to the state machine when the session
//! phase changes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use helmet_core::domain::mode::activity_code;

use super::client::SessionClient;

/// Fallback fix reported while the GPS feed has produced nothing yet.
const DEFAULT_LATITUDE: f64 = 55.75222;
const DEFAULT_LONGITUDE: f64 = 37.61556;

/// What kind of session signal a status response produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTag {
    /// The server attached call details: a session is live.
    Active,
    /// The server answered with a bare status: no session in progress.
    Standby,
}

/// Signal handed to the state machine after a status exchange.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub tag: StatusTag,
    pub data: Value,
}

/// Periodic status reporter.
///
/// `start` and `stop` are safe to call in any order and any number of
/// times; `start` replaces a previous run, and `stop` returns only after
/// the polling task has finished its current tick.
pub struct StatusPoller {
    session: Arc<SessionClient>,
    gps_file: PathBuf,
    temperature_file: PathBuf,
    interval: Duration,
    signals: mpsc::Sender<StatusEvent>,
    running: Arc<AtomicBool>,
    wakeup: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
    remote_peer: std::sync::Mutex<Option<String>>,
    last_code: std::sync::Mutex<String>,
}

impl StatusPoller {
    pub fn new(
        session: Arc<SessionClient>,
        gps_file: PathBuf,
        temperature_file: PathBuf,
        interval: Duration,
        signals: mpsc::Sender<StatusEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            gps_file,
            temperature_file,
            interval,
            signals,
            running: Arc::new(AtomicBool::new(false)),
            wakeup: Arc::new(Notify::new()),
            task: Mutex::new(None),
            remote_peer: std::sync::Mutex::new(None),
            last_code: std::sync::Mutex::new(String::new()),
        })
    }

    /// Address of the current remote peer, if a session reported one.
    pub fn remote_peer(&self) -> Option<String> {
        self.remote_peer.lock().unwrap().clone()
    }

    /// Begins polling. A previous run is stopped first so at most one
    /// polling task exists.
    pub async fn start(self: &Arc<Self>) {
        self.stop().await;
        self.running.store(true, Ordering::SeqCst);
        let poller = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!("status polling started");
            while poller.running.load(Ordering::SeqCst) {
                poller.tick().await;
                tokio::select! {
                    _ = tokio::time::sleep(poller.interval) => {}
                    _ = poller.wakeup.notified() => {}
                }
            }
            info!("status polling stopped");
        });
        *self.task.lock().await = Some(handle);
    }

    /// Stops polling and waits for the task to wind down. No signal is
    /// delivered after this returns.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wakeup.notify_waiters();
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(error) = handle.await {
                warn!(%error, "polling task panicked");
            }
        }
    }

    async fn tick(&self) {
        let body = self.build_status_body().await;
        match self.session.post_status(&body).await {
            Ok(data) => self.apply_response(data).await,
            Err(error) => debug!(%error, "status exchange failed"),
        }
    }

    /// Assembles the status report. The activity code is only attached when
    /// it differs from the last one sent, so an unchanged device stays
    /// silent about its state.
    async fn build_status_body(&self) -> Value {
        let (latitude, longitude) = read_gps(&self.gps_file).await;
        let temperature = read_temperature(&self.temperature_file).await;

        let helmet_status = self.session.helmet_status();
        let operator = self.session.operator_status();
        let code = activity_code(&helmet_status, operator).to_string();

        let mut body = json!({
            "reset": false,
            "mac": self.session.mac(),
            "gps": { "lat": latitude, "lng": longitude },
            "temperature": temperature,
        });

        let mut last = self.last_code.lock().unwrap();
        if code != *last {
            *last = code.clone();
            body["status"] = Value::String(code);
        } else if helmet_status.contains("Standalone") {
            // A standalone device keeps announcing itself so the server can
            // tell it apart from one that silently dropped off.
            body["status"] = Value::String("2".into());
        }
        body
    }

    async fn apply_response(&self, data: Value) {
        let Some(status) = data.get("helmet_status").and_then(Value::as_str) else {
            debug!("status response carried no helmet_status");
            return;
        };

        if let Some(details) = data.get("call_details") {
            // A live or ringing session. While it is being set up the
            // details carry the peer's tunnel address.
            if status.contains("standby") || status.contains("request") {
                if let Some(peer) = details.get("ipv4").and_then(Value::as_str) {
                    let mut cached = self.remote_peer.lock().unwrap();
                    if cached.as_deref() != Some(peer) {
                        info!(%peer, "remote peer address");
                        *cached = Some(peer.to_string());
                    }
                }
            }
            let operator = self.session.operator_status();
            self.session
                .set_helmet_status(format!("{}_active", operator.as_str()));
            self.deliver(StatusTag::Active, details.clone()).await;
        } else {
            self.session.set_helmet_status(status);
            self.deliver(StatusTag::Standby, data).await;
        }
    }

    async fn deliver(&self, tag: StatusTag, data: Value) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if self.signals.send(StatusEvent { tag, data }).await.is_err() {
            warn!("signal receiver dropped");
        }
    }
}

/// Reads a `lat,lng` pair from the GPS feed file, falling back to the
/// default fix when the file is absent or malformed.
async fn read_gps(path: &Path) -> (f64, f64) {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(_) => return (DEFAULT_LATITUDE, DEFAULT_LONGITUDE),
    };
    let mut parts = text.trim().split(',');
    match (
        parts.next().and_then(|p| p.trim().parse::<f64>().ok()),
        parts.next().and_then(|p| p.trim().parse::<f64>().ok()),
    ) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => (DEFAULT_LATITUDE, DEFAULT_LONGITUDE),
    }
}

/// Reads the board temperature in degrees from a sysfs thermal zone, which
/// reports millidegrees.
async fn read_temperature(path: &Path) -> f64 {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text.trim().parse::<f64>().map(|t| t / 1000.0).unwrap_or(0.0),
        Err(_) => 0.0,
    }
}
