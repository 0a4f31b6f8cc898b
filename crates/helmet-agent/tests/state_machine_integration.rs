//! Integration tests for the device state machine.
//!
//! These exercise the application layer end-to-end: `HelmetStateMachine` +
//! `ProcessEventsUseCase` against a mock HTTP server, the recording system
//! control, and the recording collaborator rig.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use helmet_agent::application::collaborators::mock::RecordingRig;
use helmet_agent::application::collaborators::{
    AudioControl, CameraControl, StreamControl, UiEvents, VoiceControl,
};
use helmet_agent::application::{
    HelmetStateMachine, ProcessEventsUseCase, SessionTag, Trigger,
};
use helmet_agent::infrastructure::connectivity::{ConnectivityManager, VpnSupervisor};
use helmet_agent::infrastructure::session::{SessionClient, StatusPoller};
use helmet_agent::infrastructure::storage::profiles::ProfileStore;
use helmet_agent::infrastructure::system::mock::RecordingControl;

struct Rig {
    machine: Arc<HelmetStateMachine>,
    session: Arc<SessionClient>,
    collaborators: Arc<RecordingRig>,
    profiles: Arc<ProfileStore>,
    _content: tempfile::TempDir,
}

fn build_rig(server: &mockito::ServerGuard, content_files: &[&str]) -> Rig {
    let content = tempfile::tempdir().unwrap();
    for name in content_files {
        std::fs::write(content.path().join(name), "task content").unwrap();
    }

    let session = Arc::new(SessionClient::new("test-key", "aa:bb:cc:dd:ee:ff".into()).unwrap());
    session.set_api_base(server.url());

    let (status_tx, _status_rx) = tokio::sync::mpsc::channel(8);
    let poller = StatusPoller::new(
        Arc::clone(&session),
        content.path().join("gps"),
        content.path().join("temp"),
        Duration::from_secs(3600),
        status_tx,
    );

    let system = Arc::new(RecordingControl::new());
    let profiles = Arc::new(ProfileStore::new(content.path().join("wifi.json")));
    let connectivity = Arc::new(ConnectivityManager::new(
        "wlan0",
        content.path().join("client.ovpn"),
        system,
        Arc::clone(&session),
        Arc::clone(&profiles),
        VpnSupervisor::new("openvpn"),
    ));

    let collaborators = Arc::new(RecordingRig::new());
    let audio: Arc<dyn AudioControl> = Arc::clone(&collaborators) as _;
    let camera: Arc<dyn CameraControl> = Arc::clone(&collaborators) as _;
    let stream: Arc<dyn StreamControl> = Arc::clone(&collaborators) as _;
    let voice: Arc<dyn VoiceControl> = Arc::clone(&collaborators) as _;
    let ui: Arc<dyn UiEvents> = Arc::clone(&collaborators) as _;

    let events = Arc::new(ProcessEventsUseCase::new(
        Arc::clone(&session),
        Arc::clone(&audio),
        Arc::clone(&camera),
        Arc::clone(&stream),
    ));

    let machine = Arc::new(HelmetStateMachine::new(
        Arc::clone(&session),
        poller,
        connectivity,
        Arc::clone(&profiles),
        events,
        audio,
        camera,
        stream,
        voice,
        ui,
        content.path().to_path_buf(),
    ));

    Rig {
        machine,
        session,
        collaborators,
        profiles,
        _content: content,
    }
}

fn session_trigger(tag: SessionTag, data: Value) -> Trigger {
    Trigger::Session { tag, data }
}

#[tokio::test]
async fn test_standby_double_click_enters_standalone() {
    let mut server = mockito::Server::new_async().await;
    let status = server
        .mock("POST", mockito::Matcher::Regex("/api/helmets/status.*".into()))
        .with_status(200)
        .with_body(r#"{"helmet_status": "Work_Standalone"}"#)
        .create_async()
        .await;

    let rig = build_rig(&server, &["step-1.md"]);
    rig.machine.handle(Trigger::Clicks(2)).await;

    status.assert_async().await;
    assert_eq!(rig.session.helmet_status(), "Work_Standalone");
    assert_eq!(
        rig.machine.mode(),
        helmet_core::HelmetMode::Standalone
    );
    // The camera pauses when the device goes standalone.
    assert!(rig
        .collaborators
        .journal()
        .contains(&"camera pause".to_string()));
}

#[tokio::test]
async fn test_standalone_without_content_is_empty_standalone() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", mockito::Matcher::Regex("/api/helmets/status.*".into()))
        .with_status(200)
        .with_body(r#"{"helmet_status": "Work_Standalone"}"#)
        .create_async()
        .await;

    let rig = build_rig(&server, &[]);
    rig.machine.handle(Trigger::Clicks(2)).await;

    assert_eq!(
        rig.machine.mode(),
        helmet_core::HelmetMode::EmptyStandalone
    );
}

#[tokio::test]
async fn test_active_triple_click_hangs_up() {
    let mut server = mockito::Server::new_async().await;
    let terminate = server
        .mock(
            "POST",
            mockito::Matcher::Regex("/api/helmet-terminate-support.*".into()),
        )
        .with_status(200)
        .create_async()
        .await;

    let rig = build_rig(&server, &[]);
    rig.machine.set_mode(helmet_core::HelmetMode::Active);
    rig.session.set_helmet_status("Work_active");

    rig.machine.handle(Trigger::Clicks(3)).await;

    terminate.assert_async().await;
    // Optimistic status flip, then the mode follows it.
    assert_eq!(rig.session.helmet_status(), "Work_standby");
    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::Standby);
    // Media teardown order: remote view, outgoing stream, audio channel.
    let journal = rig.collaborators.journal();
    let teardown: Vec<&String> = journal
        .iter()
        .filter(|e| {
            e.as_str() == "remote stop"
                || e.as_str() == "stream stop"
                || e.as_str() == "audio channel close"
        })
        .collect();
    assert_eq!(teardown, ["remote stop", "stream stop", "audio channel close"]);
}

#[tokio::test]
async fn test_triple_click_means_nothing_while_standalone() {
    let server = mockito::Server::new_async().await;
    let rig = build_rig(&server, &[]);
    rig.machine.set_mode(helmet_core::HelmetMode::Standalone);

    rig.machine.handle(Trigger::Clicks(3)).await;

    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::Standalone);
    assert!(rig.collaborators.journal().is_empty());
}

#[tokio::test]
async fn test_call_start_wires_media_to_peer() {
    let mut server = mockito::Server::new_async().await;
    // Audio settings are announced when the call opens.
    let record = server
        .mock(
            "POST",
            mockito::Matcher::Regex("/api/helmets/record-event.*".into()),
        )
        .with_status(200)
        .expect(3)
        .create_async()
        .await;

    let rig = build_rig(&server, &[]);
    rig.session.set_helmet_status("Work_active");
    let details = json!({ "id_call": 77, "ipv4": "10.8.0.6", "username": "expert" });
    rig.machine
        .handle(session_trigger(SessionTag::Active, details))
        .await;

    record.assert_async().await;
    assert_eq!(rig.machine.call_id(), Some(77));
    let journal = rig.collaborators.journal();
    assert!(journal.contains(&"camera init".to_string()));
    assert!(journal.contains(&"voice stop".to_string()));
    assert!(journal.contains(&"stream start 10.8.0.6".to_string()));
    assert!(journal.contains(&"audio channel open".to_string()));
    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::Active);
}

#[tokio::test]
async fn test_call_refused_without_camera() {
    let server = mockito::Server::new_async().await;
    let rig = build_rig(&server, &[]);
    rig.collaborators.camera_present.store(false, Ordering::SeqCst);

    let details = json!({ "id_call": 5, "ipv4": "10.8.0.6" });
    rig.machine
        .handle(session_trigger(SessionTag::Active, details))
        .await;

    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::NoCamera);
    assert_eq!(rig.session.helmet_status(), "nocamera");
    // No media was wired up.
    let journal = rig.collaborators.journal();
    assert!(!journal.contains(&"stream start 10.8.0.6".to_string()));
}

#[tokio::test]
async fn test_call_update_toggles_task_sharing_and_processes_events() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", mockito::Matcher::Regex("/api/.*".into()))
        .with_status(200)
        .create_async()
        .await;

    let rig = build_rig(&server, &[]);
    rig.machine.set_mode(helmet_core::HelmetMode::Active);

    let update = json!({
        "id_call": 3,
        "procedure": { "name": "inspection", "tasks": [{ "order": 1, "text": "check", "completed": false }] },
        "events": [
            { "idCallEvent": 1, "event": { "cmd": "playbackVolume", "data": 100 } },
        ],
    });
    rig.machine
        .handle(session_trigger(SessionTag::Active, update.clone()))
        .await;

    assert!(rig.machine.task_sharing());
    assert_eq!(
        rig.collaborators.journal(),
        vec!["playback 63".to_string()]
    );

    // Redelivery of the same event batch is a no-op.
    rig.machine
        .handle(session_trigger(SessionTag::Active, update))
        .await;
    assert_eq!(rig.collaborators.journal().len(), 1);
}

#[tokio::test]
async fn test_scan_payload_provisions_profile() {
    use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
    use base64::Engine;

    let server = mockito::Server::new_async().await;
    let rig = build_rig(&server, &[]);

    // A payload the provisioning decoder accepts: AES-ECB blocks of the
    // profile JSON, padded with trailing 'A'.
    let mut plain = br#"{"s":"site-a","p":"secret","i":"srv.example.com"}"#.to_vec();
    while plain.len() % 16 != 0 {
        plain.push(b'A');
    }
    let cipher = aes::Aes128::new(GenericArray::from_slice(b"mZq4t7w!z%C*F-Ja"));
    for block in plain.chunks_exact_mut(16) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    let payload = base64::engine::general_purpose::STANDARD.encode(&plain);

    assert_eq!(
        rig.machine.handle_scan_payload(&payload),
        SessionTag::StopScanPositive
    );
    let stored = rig.profiles.cached();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].ssid, "site-a");
    assert_eq!(stored[0].uri, "srv.example.com");

    assert_eq!(
        rig.machine.handle_scan_payload("not base64!!"),
        SessionTag::StopScanNegative
    );
}

#[tokio::test]
async fn test_standalone_exit_burst_returns_to_standby() {
    let mut server = mockito::Server::new_async().await;
    // StartPolling fires a status exchange right away; answer it cleanly.
    server
        .mock("POST", mockito::Matcher::Regex("/api/helmets/status.*".into()))
        .with_status(200)
        .with_body(r#"{"helmet_status": "Work_standby"}"#)
        .create_async()
        .await;

    let rig = build_rig(&server, &["step-1.md"]);
    rig.machine.set_mode(helmet_core::HelmetMode::Standalone);
    rig.session.set_helmet_status("Work_Standalone");

    rig.machine.handle(Trigger::Clicks(6)).await;

    assert_eq!(rig.session.helmet_status(), "Work_standby");
    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::Standby);
    // The camera paused on standalone entry comes back.
    assert!(rig
        .collaborators
        .journal()
        .contains(&"camera resume".to_string()));
}

#[tokio::test]
async fn test_standalone_four_clicks_cycles_language() {
    let server = mockito::Server::new_async().await;
    let rig = build_rig(&server, &[]);
    rig.machine.set_mode(helmet_core::HelmetMode::EmptyStandalone);

    rig.machine.handle(Trigger::Clicks(4)).await;

    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::EmptyStandalone);
    assert_eq!(rig.collaborators.journal(), vec!["ui language".to_string()]);
}

#[tokio::test]
async fn test_unmapped_status_keeps_current_mode() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", mockito::Matcher::Regex("/api/.*".into()))
        .with_status(200)
        .create_async()
        .await;

    let rig = build_rig(&server, &[]);
    rig.machine.set_mode(helmet_core::HelmetMode::Request);
    rig.session.set_helmet_status("maintenance");

    let details = json!({ "id_call": 9, "ipv4": "10.8.0.9" });
    rig.machine
        .handle(session_trigger(SessionTag::Active, details))
        .await;

    // The media path is wired up, but a status string that classifies as no
    // mode cannot move the machine.
    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::Request);
    assert!(rig
        .collaborators
        .journal()
        .contains(&"stream start 10.8.0.9".to_string()));
}

#[tokio::test]
async fn test_fall_classification_changes_posted_activity_code() {
    use helmet_core::domain::mode::activity_code;

    let server = mockito::Server::new_async().await;
    let rig = build_rig(&server, &[]);
    rig.machine.set_mode(helmet_core::HelmetMode::Active);
    rig.session.set_helmet_status("Work_active");

    rig.machine
        .handle(Trigger::Operator(helmet_core::OperatorStatus::Fall))
        .await;

    // The call phase survives, the activity prefix changes, and the next
    // poll would post the fall-while-active code.
    assert_eq!(rig.session.helmet_status(), "Fall_active");
    assert_eq!(
        activity_code(&rig.session.helmet_status(), rig.session.operator_status()),
        "9"
    );
}

#[tokio::test]
async fn test_battery_low_powers_down_and_clicks_wake() {
    let server = mockito::Server::new_async().await;
    let rig = build_rig(&server, &[]);

    rig.machine.handle(Trigger::BatteryLow).await;

    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::LowPower);
    assert_eq!(rig.session.helmet_status(), "Low_power");
    assert!(rig
        .collaborators
        .journal()
        .contains(&"camera pause".to_string()));

    rig.machine.handle(Trigger::Clicks(1)).await;

    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::Standby);
    assert_eq!(rig.session.helmet_status(), "Work_standby");
}

#[tokio::test]
async fn test_low_power_wakes_on_clicks() {
    let server = mockito::Server::new_async().await;
    let rig = build_rig(&server, &[]);
    rig.machine.set_mode(helmet_core::HelmetMode::LowPower);
    rig.session.set_helmet_status("Low_power");

    rig.machine.handle(Trigger::Clicks(1)).await;

    assert_eq!(rig.session.helmet_status(), "Work_standby");
    assert_eq!(rig.machine.mode(), helmet_core::HelmetMode::Standby);
    assert!(rig
        .collaborators
        .journal()
        .contains(&"camera resume".to_string()));
}
