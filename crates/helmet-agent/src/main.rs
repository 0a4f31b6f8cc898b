//! Helmet agent entry point.
//!
//! Wires the connectivity supervisor, the server session, and the state
//! machine together, then runs the Tokio event loop until a shutdown
//! signal.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ AgentConfig::load()        -- TOML configuration
//!  └─ ConnectivityManager        -- Wi-Fi association + VPN tunnel
//!       └─ supervision loop task -- association edge -> bring-up -> report
//!  └─ SessionClient + StatusPoller
//!       └─ status loop task      -- poll server, emit session signals
//!  └─ HelmetStateMachine.run()   -- consumes the trigger channel
//!       ├─ Trigger::Clicks        <- ClickAccumulator (button GPIO)
//!       ├─ Trigger::Voice         <- voice listener port
//!       ├─ Trigger::Session       <- status poller signals
//!       ├─ Trigger::Operator      <- IMU activity classifier
//!       └─ Trigger::BatteryLow    <- battery monitor
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use helmet_agent::application::collaborators::mock::RecordingRig;
use helmet_agent::application::collaborators::{
    AudioControl, CameraControl, StreamControl, UiEvents, VoiceControl,
};
use helmet_agent::application::{
    ClickAccumulator, HelmetStateMachine, ProcessEventsUseCase, Trigger,
};
use helmet_agent::infrastructure::connectivity::{ConnectivityManager, VpnSupervisor};
use helmet_agent::infrastructure::session::{SessionClient, StatusEvent, StatusPoller, StatusTag};
use helmet_agent::infrastructure::storage::config::AgentConfig;
use helmet_agent::infrastructure::storage::profiles::ProfileStore;
use helmet_agent::infrastructure::system::shell::ShellControl;
use helmet_agent::infrastructure::system::SystemControl;

fn session_tag(tag: StatusTag) -> helmet_agent::application::SessionTag {
    match tag {
        StatusTag::Active => helmet_agent::application::SessionTag::Active,
        StatusTag::Standby => helmet_agent::application::SessionTag::Standby,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration first, so the log level can come from it.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/helmet-agent/config.toml".to_string());
    let config = AgentConfig::load(std::path::Path::new(&config_path))?;

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.device.log_level.clone())),
        )
        .init();

    info!(config = %config_path, "helmet agent starting");

    // Shutdown flag.
    let running = Arc::new(AtomicBool::new(true));

    // ── System and storage ────────────────────────────────────────────────────
    let system: Arc<dyn SystemControl> = Arc::new(ShellControl::new());
    let mac = system.mac_address(&config.device.wireless_interface);
    let profiles = Arc::new(ProfileStore::new(&config.storage.wifi_profiles_file));
    if let Err(error) = profiles.load() {
        warn!(%error, "wifi profile store unreadable, starting empty");
    }

    // ── Server session ────────────────────────────────────────────────────────
    let session = Arc::new(SessionClient::new(&config.session.api_key, mac)?);
    if !config.session.server_host.is_empty() {
        session.set_api_base(format!("https://{}", config.session.server_host));
    }

    // ── Collaborator ports ────────────────────────────────────────────────────
    // In production: replace the recording rig with the GStreamer-backed
    // pipeline implementations and the display process bridge.
    let rig = Arc::new(RecordingRig::new());
    let audio: Arc<dyn AudioControl> = Arc::clone(&rig) as _;
    let camera: Arc<dyn CameraControl> = Arc::clone(&rig) as _;
    let stream: Arc<dyn StreamControl> = Arc::clone(&rig) as _;
    let voice: Arc<dyn VoiceControl> = Arc::clone(&rig) as _;
    let ui: Arc<dyn UiEvents> = Arc::clone(&rig) as _;

    // ── Trigger channel and status poller ─────────────────────────────────────
    let (trigger_tx, trigger_rx) = mpsc::channel::<Trigger>(32);
    let (status_tx, mut status_rx) = mpsc::channel::<StatusEvent>(32);

    let poller = StatusPoller::new(
        Arc::clone(&session),
        config.session.gps_file.clone(),
        config.session.temperature_file.clone(),
        Duration::from_millis(config.session.poll_interval_ms),
        status_tx,
    );

    // Pump poller signals into the trigger channel.
    {
        let trigger_tx = trigger_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = status_rx.recv().await {
                let trigger = Trigger::Session {
                    tag: session_tag(event.tag),
                    data: event.data,
                };
                if trigger_tx.send(trigger).await.is_err() {
                    break;
                }
            }
        });
    }

    // ── Connectivity supervision ──────────────────────────────────────────────
    let connectivity = Arc::new(ConnectivityManager::new(
        config.device.wireless_interface.clone(),
        config.vpn.certificate_file.clone(),
        Arc::clone(&system),
        Arc::clone(&session),
        Arc::clone(&profiles),
        VpnSupervisor::new(config.vpn.binary.clone()),
    ));
    {
        let connectivity = Arc::clone(&connectivity);
        let poller = Arc::clone(&poller);
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            while running.load(Ordering::Relaxed) {
                if let Some(report) = connectivity.run().await {
                    info!(?report, "link report");
                    if report.state
                        == helmet_agent::infrastructure::connectivity::LinkState::Connected
                    {
                        poller.start().await;
                    }
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        });
    }

    // ── Button debouncing ─────────────────────────────────────────────────────
    // In production the press channel is fed by the GPIO interrupt handler.
    let (_press_tx, press_rx) = mpsc::channel::<()>(32);
    tokio::spawn(ClickAccumulator::default().run(press_rx, trigger_tx.clone()));

    // ── Wearer sensors ────────────────────────────────────────────────────────
    // In production the IMU classifier sends Trigger::Operator and the
    // battery monitor sends Trigger::BatteryLow on this sender.
    let _sensor_tx = trigger_tx.clone();

    // ── State machine ─────────────────────────────────────────────────────────
    let events = Arc::new(ProcessEventsUseCase::new(
        Arc::clone(&session),
        Arc::clone(&audio),
        Arc::clone(&camera),
        Arc::clone(&stream),
    ));
    let machine = Arc::new(HelmetStateMachine::new(
        Arc::clone(&session),
        Arc::clone(&poller),
        Arc::clone(&connectivity),
        Arc::clone(&profiles),
        events,
        audio,
        camera,
        stream,
        voice,
        ui,
        config.standalone.content_dir.clone(),
    ));
    let machine_task = tokio::spawn(Arc::clone(&machine).run(trigger_rx));

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    {
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                running.store(false, Ordering::Relaxed);
            }
        });
    }

    while running.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    poller.stop().await;
    // Background tasks still hold trigger senders, so cancel the state
    // machine instead of waiting for the channel to close.
    machine_task.abort();
    if let Err(join_error) = machine_task.await {
        if !join_error.is_cancelled() {
            error!(%join_error, "state machine task failed");
        }
    }

    info!("helmet agent stopped");
    Ok(())
}
