//! The device state machine.
//!
//! One logical task owns the mode and consumes triggers from a single
//! channel: debounced button clicks, recognized voice commands, and session
//! signals from the status poller. Each (mode, trigger) pair resolves
//! through a data-driven transition table to a plan of effects plus the
//! next mode; the executor then runs the effects against the session, the
//! connectivity manager, and the collaborator ports.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use helmet_core::{decode_payload, HelmetMode, ModePhase, OperatorStatus};

use crate::application::collaborators::{
    AudioControl, CameraControl, StreamControl, UiEvents, VoiceControl,
};
use crate::application::process_events::ProcessEventsUseCase;
use crate::infrastructure::connectivity::ConnectivityManager;
use crate::infrastructure::session::{SessionClient, StatusPoller};
use crate::infrastructure::storage::profiles::ProfileStore;

/// Session signals the poller and the provisioning scanner can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTag {
    /// A call is live; trigger data carries the call details.
    Active,
    /// No call; trigger data carries the bare status response.
    Standby,
    /// A provisioning code was decoded and the profile stored.
    StopScanPositive,
    /// The provisioning scan ended without a usable code.
    StopScanNegative,
}

/// Spoken commands, already recognized and de-localized by the voice port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    Langs,
    Standalone,
    Call,
    Close,
    TaskForward,
    TaskBackward,
}

/// Everything that can drive the state machine.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Debounced click count from the hardware button.
    Clicks(u32),
    Voice(VoiceCommand),
    Session { tag: SessionTag, data: Value },
    /// New wearer activity classification from the IMU pipeline.
    Operator(OperatorStatus),
    /// The battery monitor reported a critically low charge.
    BatteryLow,
}

/// Side effects a transition can demand, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    CycleLanguage,
    StopPolling,
    StartPolling,
    /// Two-phase standalone entry: announce, then wait for the server to
    /// confirm through the next status response.
    StandaloneRequest,
    /// Set the fleet status optimistically to `<operator>_<phase>` before
    /// the server confirms.
    OptimisticStatus(ModePhase),
    RequestSupport,
    TerminateSupport,
    /// Task list navigation; only runs while the expert shares tasks.
    TaskForward,
    TaskBackward,
    /// Stop remote view, outgoing stream, and the audio channel.
    StopStreams,
    ResetAudio,
    ResumeCamera,
    StartScan,
    StopScan,
    /// Bring the radio up, reload profiles, reconnect.
    WifiUp,
    /// Enter standalone with local content only, no server round-trip.
    EnterStandaloneLocal,
    /// Wake the voice listener.
    StartVoice,
    /// A call begins: wire streams to the peer from the trigger data.
    StartCall,
    /// A live call's periodic update: tasks, messages, embedded events.
    CallUpdate,
    ExitLowPower,
}

/// Where a transition leaves the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextMode {
    Unchanged,
    Fixed(HelmetMode),
    /// Re-derive the mode from the session's current status string.
    FromStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionPlan {
    pub effects: &'static [Effect],
    pub next: NextMode,
}

/// Trigger pattern a table row matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Clicks(u32),
    AnyClicks,
    Session(SessionTag),
}

const NO_PLAN: TransitionPlan = TransitionPlan {
    effects: &[],
    next: NextMode::Unchanged,
};

/// The complete transition table. Behavior lives here as data; the
/// executor below only interprets it.
#[rustfmt::skip]
static TRANSITIONS: &[(HelmetMode, Pattern, &[Effect], NextMode)] = &[
    // Low power wakes on any interaction.
    (HelmetMode::LowPower, Pattern::AnyClicks,
        &[Effect::ExitLowPower], NextMode::FromStatus),
    (HelmetMode::LowPower, Pattern::Session(SessionTag::Active),
        &[Effect::ExitLowPower], NextMode::FromStatus),

    // Standby: language, standalone, call request, provisioning scan.
    (HelmetMode::Standby, Pattern::Clicks(1),
        &[Effect::CycleLanguage], NextMode::Unchanged),
    (HelmetMode::Standby, Pattern::Clicks(2),
        &[Effect::StopPolling, Effect::StandaloneRequest], NextMode::FromStatus),
    (HelmetMode::Standby, Pattern::Clicks(3),
        &[Effect::OptimisticStatus(ModePhase::Request), Effect::RequestSupport],
        NextMode::FromStatus),
    (HelmetMode::Standby, Pattern::Clicks(4),
        &[Effect::StopPolling, Effect::StartScan], NextMode::Fixed(HelmetMode::Qrcode)),
    (HelmetMode::Standby, Pattern::Session(SessionTag::Active),
        &[Effect::StartCall], NextMode::FromStatus),

    // Request: hang up before the expert answers, or the call connects.
    (HelmetMode::Request, Pattern::Clicks(3),
        &[Effect::OptimisticStatus(ModePhase::Standby), Effect::TerminateSupport],
        NextMode::FromStatus),
    (HelmetMode::Request, Pattern::Session(SessionTag::Active),
        &[Effect::StartCall], NextMode::FromStatus),

    // Active call: task navigation and hang-up.
    (HelmetMode::Active, Pattern::Clicks(1),
        &[Effect::TaskForward], NextMode::Unchanged),
    (HelmetMode::Active, Pattern::Clicks(2),
        &[Effect::TaskBackward], NextMode::Unchanged),
    (HelmetMode::Active, Pattern::Clicks(3),
        &[Effect::OptimisticStatus(ModePhase::Standby), Effect::TerminateSupport,
          Effect::StopStreams],
        NextMode::FromStatus),
    (HelmetMode::Active, Pattern::Session(SessionTag::Active),
        &[Effect::CallUpdate], NextMode::Unchanged),
    (HelmetMode::Active, Pattern::Session(SessionTag::Standby),
        &[Effect::ResetAudio, Effect::TerminateSupport, Effect::StopStreams,
          Effect::StartVoice],
        NextMode::FromStatus),

    // Provisioning scan.
    (HelmetMode::Qrcode, Pattern::Clicks(1),
        &[Effect::StopScan, Effect::StartPolling], NextMode::FromStatus),
    (HelmetMode::Qrcode, Pattern::Session(SessionTag::StopScanPositive),
        &[Effect::WifiUp, Effect::StopScan, Effect::StartPolling], NextMode::FromStatus),
    (HelmetMode::Qrcode, Pattern::Session(SessionTag::StopScanNegative),
        &[Effect::StopScan], NextMode::Unchanged),

    // Offline: retry the network or fall back to local content.
    (HelmetMode::Offline, Pattern::Clicks(1),
        &[Effect::WifiUp], NextMode::FromStatus),
    (HelmetMode::Offline, Pattern::Clicks(2),
        &[Effect::EnterStandaloneLocal], NextMode::Unchanged),

    // Standalone: language cycling, and a long burst rejoins the network.
    (HelmetMode::Standalone, Pattern::Clicks(4),
        &[Effect::CycleLanguage], NextMode::Unchanged),
    (HelmetMode::Standalone, Pattern::Clicks(6),
        &[Effect::OptimisticStatus(ModePhase::Standby), Effect::ResumeCamera,
          Effect::WifiUp, Effect::StartPolling],
        NextMode::FromStatus),
    (HelmetMode::EmptyStandalone, Pattern::Clicks(4),
        &[Effect::CycleLanguage], NextMode::Unchanged),
    (HelmetMode::EmptyStandalone, Pattern::Clicks(6),
        &[Effect::OptimisticStatus(ModePhase::Standby), Effect::ResumeCamera,
          Effect::WifiUp, Effect::StartPolling],
        NextMode::FromStatus),

    // Camera fault: follow the server back to standby once it clears.
    (HelmetMode::NoCamera, Pattern::Session(SessionTag::Standby),
        &[Effect::OptimisticStatus(ModePhase::Standby)], NextMode::FromStatus),
];

/// Resolves a (mode, trigger) pair to its plan. Unlisted pairs are no-ops.
pub fn plan(mode: HelmetMode, trigger: &Trigger) -> TransitionPlan {
    for (row_mode, pattern, effects, next) in TRANSITIONS {
        if *row_mode != mode {
            continue;
        }
        let matched = match (pattern, trigger) {
            (Pattern::Clicks(n), Trigger::Clicks(clicks)) => n == clicks,
            (Pattern::AnyClicks, Trigger::Clicks(clicks)) => *clicks > 0,
            (Pattern::Session(tag), Trigger::Session { tag: got, .. }) => tag == got,
            _ => false,
        };
        if matched {
            return TransitionPlan {
                effects: *effects,
                next: *next,
            };
        }
    }
    NO_PLAN
}

/// Maps a recognized voice command onto the click count with the same
/// meaning in the given mode, so voice and button share one table.
pub fn voice_clicks(mode: HelmetMode, command: VoiceCommand) -> Option<u32> {
    match (mode, command) {
        (HelmetMode::Standby, VoiceCommand::Langs) => Some(1),
        (HelmetMode::Standby, VoiceCommand::Standalone) => Some(2),
        (HelmetMode::Standby, VoiceCommand::Call) => Some(3),
        (HelmetMode::Request, VoiceCommand::Close) => Some(3),
        (HelmetMode::Active, VoiceCommand::TaskForward) => Some(1),
        (HelmetMode::Active, VoiceCommand::TaskBackward) => Some(2),
        (HelmetMode::Active, VoiceCommand::Close) => Some(3),
        (HelmetMode::Offline, VoiceCommand::Standalone) => Some(2),
        (HelmetMode::Standalone, VoiceCommand::Langs) => Some(4),
        (HelmetMode::Standalone, VoiceCommand::Close) => Some(6),
        (HelmetMode::EmptyStandalone, VoiceCommand::Langs) => Some(4),
        (HelmetMode::EmptyStandalone, VoiceCommand::Close) => Some(6),
        _ => None,
    }
}

pub struct HelmetStateMachine {
    session: Arc<SessionClient>,
    poller: Arc<StatusPoller>,
    connectivity: Arc<ConnectivityManager>,
    profiles: Arc<ProfileStore>,
    events: Arc<ProcessEventsUseCase>,
    audio: Arc<dyn AudioControl>,
    camera: Arc<dyn CameraControl>,
    stream: Arc<dyn StreamControl>,
    voice: Arc<dyn VoiceControl>,
    ui: Arc<dyn UiEvents>,
    content_dir: PathBuf,
    mode: Mutex<HelmetMode>,
    entering_standalone: AtomicBool,
    task_sharing: AtomicBool,
    call_id: Mutex<Option<i64>>,
}

impl HelmetStateMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Arc<SessionClient>,
        poller: Arc<StatusPoller>,
        connectivity: Arc<ConnectivityManager>,
        profiles: Arc<ProfileStore>,
        events: Arc<ProcessEventsUseCase>,
        audio: Arc<dyn AudioControl>,
        camera: Arc<dyn CameraControl>,
        stream: Arc<dyn StreamControl>,
        voice: Arc<dyn VoiceControl>,
        ui: Arc<dyn UiEvents>,
        content_dir: PathBuf,
    ) -> Self {
        Self {
            session,
            poller,
            connectivity,
            profiles,
            events,
            audio,
            camera,
            stream,
            voice,
            ui,
            content_dir,
            mode: Mutex::new(HelmetMode::Standby),
            entering_standalone: AtomicBool::new(false),
            task_sharing: AtomicBool::new(false),
            call_id: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> HelmetMode {
        *self.mode.lock().unwrap()
    }

    pub fn set_mode(&self, mode: HelmetMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn call_id(&self) -> Option<i64> {
        *self.call_id.lock().unwrap()
    }

    pub fn task_sharing(&self) -> bool {
        self.task_sharing.load(Ordering::SeqCst)
    }

    /// Consumes triggers until the channel closes.
    pub async fn run(self: Arc<Self>, mut triggers: mpsc::Receiver<Trigger>) {
        while let Some(trigger) = triggers.recv().await {
            self.handle(trigger).await;
        }
        info!("trigger channel closed, state machine done");
    }

    /// Decodes a scanned provisioning payload. On success the decoded
    /// profile replaces the store and a positive scan signal comes back.
    pub fn handle_scan_payload(&self, payload: &str) -> SessionTag {
        match decode_payload(payload) {
            Ok(profile) => {
                info!(ssid = %profile.ssid, "provisioning code accepted");
                if let Err(error) = self.profiles.save(&[profile]) {
                    warn!(%error, "failed to store provisioned profile");
                    return SessionTag::StopScanNegative;
                }
                SessionTag::StopScanPositive
            }
            Err(error) => {
                warn!(%error, "provisioning code rejected");
                SessionTag::StopScanNegative
            }
        }
    }

    pub async fn handle(&self, trigger: Trigger) {
        // Second phase of standalone entry: the server's status response
        // confirmed the switch.
        if self.entering_standalone.load(Ordering::SeqCst)
            && self.session.helmet_status().contains("Standalone")
        {
            self.entering_standalone.store(false, Ordering::SeqCst);
            self.complete_standalone().await;
        }

        let mode = self.mode();
        let trigger = match trigger {
            // Sensor triggers bypass the table: they apply in every mode.
            Trigger::Operator(status) => {
                self.apply_operator_status(status);
                return;
            }
            Trigger::BatteryLow => {
                self.enter_low_power();
                return;
            }
            Trigger::Voice(command) => match voice_clicks(mode, command) {
                Some(clicks) => Trigger::Clicks(clicks),
                None => {
                    info!(?command, ?mode, "voice command has no meaning here");
                    return;
                }
            },
            other => other,
        };

        let plan = plan(mode, &trigger);
        let data = match &trigger {
            Trigger::Session { data, .. } => data.clone(),
            _ => Value::Null,
        };
        info!(?mode, ?trigger, effects = plan.effects.len(), "transition");

        for effect in plan.effects {
            self.execute(*effect, &data).await;
        }

        // Some effects commit a mode themselves: standalone entry keeps the
        // empty-content distinction, a refused call lands in NoCamera. The
        // table's next mode only applies when none did.
        if self.mode() != mode {
            return;
        }

        match plan.next {
            NextMode::Unchanged => {}
            NextMode::Fixed(next) => self.enter_mode(next),
            NextMode::FromStatus => {
                let status = self.session.helmet_status();
                match HelmetMode::from_status(&status) {
                    Some(next) => self.enter_mode(next),
                    None => warn!(%status, "status maps to no mode, staying put"),
                }
            }
        }
    }

    /// Adopts a new wearer activity classification. The fleet status keeps
    /// its call phase but takes the new activity prefix, so the next poll
    /// posts the matching activity code.
    fn apply_operator_status(&self, status: OperatorStatus) {
        if self.session.operator_status() == status {
            return;
        }
        info!(?status, "wearer activity changed");
        self.session.set_operator_status(status);
        let current = self.session.helmet_status();
        if let Some(phase) = ModePhase::from_status(&current) {
            self.session.set_helmet_status(status.status_tag(phase));
        }
    }

    /// Powers the device down to low-power operation. Polling keeps running
    /// so the fleet still sees the device; any click wakes it back up.
    fn enter_low_power(&self) {
        if self.mode() == HelmetMode::LowPower {
            return;
        }
        self.camera.pause();
        self.session.set_helmet_status("Low_power");
        self.enter_mode(HelmetMode::LowPower);
    }

    fn enter_mode(&self, next: HelmetMode) {
        let mut mode = self.mode.lock().unwrap();
        if *mode != next {
            info!(from = ?*mode, to = ?next, "mode change");
            *mode = next;
            drop(mode);
            self.ui.status_changed(&self.session.helmet_status());
        }
    }

    async fn execute(&self, effect: Effect, data: &Value) {
        match effect {
            Effect::CycleLanguage => self.ui.cycle_language(),
            Effect::StopPolling => self.poller.stop().await,
            Effect::StartPolling => self.poller.start().await,
            Effect::StandaloneRequest => {
                if let Err(error) = self.session.standalone_request().await {
                    warn!(%error, "standalone request failed");
                    self.poller.start().await;
                    return;
                }
                self.entering_standalone.store(true, Ordering::SeqCst);
                if self.session.helmet_status().contains("Standalone") {
                    self.entering_standalone.store(false, Ordering::SeqCst);
                    self.complete_standalone().await;
                }
            }
            Effect::OptimisticStatus(phase) => {
                let operator = self.session.operator_status();
                self.session.set_helmet_status(operator.status_tag(phase));
            }
            Effect::RequestSupport => {
                if let Err(error) = self.session.request_support().await {
                    warn!(%error, "support request failed");
                }
            }
            Effect::TerminateSupport => {
                if let Err(error) = self.session.terminate_support().await {
                    warn!(%error, "terminate request failed");
                }
            }
            Effect::TaskForward => {
                if self.task_sharing() {
                    if let Err(error) = self.session.tasks_next().await {
                        warn!(%error, "task forward failed");
                    }
                }
            }
            Effect::TaskBackward => {
                if self.task_sharing() {
                    if let Err(error) = self.session.tasks_back().await {
                        warn!(%error, "task backward failed");
                    }
                }
            }
            Effect::StopStreams => {
                self.stream.stop_remote();
                self.stream.stop_stream();
                self.stream.close_audio_channel();
            }
            Effect::ResetAudio => self.audio.reset(),
            Effect::ResumeCamera => self.camera.resume(),
            Effect::StartScan => self.camera.start_scan(),
            Effect::StopScan => self.camera.stop_scan(),
            Effect::WifiUp => {
                self.connectivity.enable_radio().await;
                if let Err(error) = self.profiles.load() {
                    warn!(%error, "profile reload failed");
                }
                self.connectivity.try_connect_all().await;
                self.connectivity.force_connect();
                if let Some(report) = self.connectivity.run().await {
                    info!(?report, "link after reconnect");
                }
            }
            Effect::EnterStandaloneLocal => self.complete_standalone().await,
            Effect::StartVoice => self.voice.start(),
            Effect::StartCall => self.start_call(data).await,
            Effect::CallUpdate => self.call_update(data).await,
            Effect::ExitLowPower => {
                self.camera.resume();
                self.session
                    .set_helmet_status(self.session.operator_status().status_tag(ModePhase::Standby));
            }
        }
    }

    /// Enters standalone (or empty-standalone when no content is on disk)
    /// without waiting for anything further from the server.
    async fn complete_standalone(&self) {
        let has_content = std::fs::read_dir(&self.content_dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        let next = if has_content {
            HelmetMode::Standalone
        } else {
            HelmetMode::EmptyStandalone
        };
        info!(?next, "entering standalone operation");
        self.camera.pause();
        self.enter_mode(next);
    }

    /// The session went live: wire up the media path to the peer.
    async fn start_call(&self, data: &Value) {
        if !self.camera.init() {
            warn!("no camera, refusing the call");
            self.session.set_helmet_status("nocamera");
            self.enter_mode(HelmetMode::NoCamera);
            return;
        }

        self.voice.stop();
        let peer = data.get("ipv4").and_then(Value::as_str).map(String::from);
        self.events.reset(peer.clone());
        *self.call_id.lock().unwrap() = data.get("id_call").and_then(Value::as_i64);

        if let Some(peer) = peer {
            self.stream.start_stream(&peer);
        } else {
            warn!("call details carried no peer address");
        }
        self.stream.open_audio_channel();
        self.events.announce_audio_settings().await;
    }

    /// Periodic update while a call is live: task sharing and embedded
    /// events.
    async fn call_update(&self, data: &Value) {
        let sharing = data
            .get("procedure")
            .and_then(|p| p.get("tasks"))
            .is_some_and(Value::is_array);
        self.task_sharing.store(sharing, Ordering::SeqCst);

        if let Some(id) = data.get("id_call").and_then(Value::as_i64) {
            *self.call_id.lock().unwrap() = Some(id);
        }

        if let Some(events) = data.get("events").and_then(Value::as_array) {
            match serde_json::from_value::<Vec<helmet_core::ServerEvent>>(Value::Array(
                events.clone(),
            )) {
                Ok(events) => self.events.handle_batch(&events).await,
                Err(error) => warn!(%error, "malformed event list"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clicks(n: u32) -> Trigger {
        Trigger::Clicks(n)
    }

    fn session(tag: SessionTag) -> Trigger {
        Trigger::Session {
            tag,
            data: Value::Null,
        }
    }

    #[test]
    fn test_standby_two_clicks_is_standalone_entry() {
        let plan = plan(HelmetMode::Standby, &clicks(2));
        assert_eq!(
            plan.effects,
            &[Effect::StopPolling, Effect::StandaloneRequest]
        );
        assert_eq!(plan.next, NextMode::FromStatus);
    }

    #[test]
    fn test_two_clicks_mean_different_things_per_mode() {
        assert_eq!(
            plan(HelmetMode::Standby, &clicks(2)).effects,
            &[Effect::StopPolling, Effect::StandaloneRequest]
        );
        assert_eq!(
            plan(HelmetMode::Active, &clicks(2)).effects,
            &[Effect::TaskBackward]
        );
        assert_eq!(
            plan(HelmetMode::Offline, &clicks(2)).effects,
            &[Effect::EnterStandaloneLocal]
        );
    }

    #[test]
    fn test_active_hangup_stops_streams() {
        let plan = plan(HelmetMode::Active, &clicks(3));
        assert_eq!(
            plan.effects,
            &[
                Effect::OptimisticStatus(ModePhase::Standby),
                Effect::TerminateSupport,
                Effect::StopStreams,
            ]
        );
    }

    #[test]
    fn test_unlisted_pairs_are_noops() {
        assert!(plan(HelmetMode::Standby, &clicks(5)).effects.is_empty());
        assert!(plan(HelmetMode::Request, &clicks(1)).effects.is_empty());
        assert!(plan(HelmetMode::Standalone, &clicks(3)).effects.is_empty());
        assert!(plan(HelmetMode::Qrcode, &session(SessionTag::Active))
            .effects
            .is_empty());
    }

    #[test]
    fn test_low_power_wakes_on_any_click_count() {
        for n in 1..=6 {
            assert_eq!(
                plan(HelmetMode::LowPower, &clicks(n)).effects,
                &[Effect::ExitLowPower]
            );
        }
        assert_eq!(
            plan(HelmetMode::LowPower, &session(SessionTag::Active)).effects,
            &[Effect::ExitLowPower]
        );
    }

    #[test]
    fn test_scan_outcomes() {
        let positive = plan(HelmetMode::Qrcode, &session(SessionTag::StopScanPositive));
        assert_eq!(
            positive.effects,
            &[Effect::WifiUp, Effect::StopScan, Effect::StartPolling]
        );
        let negative = plan(HelmetMode::Qrcode, &session(SessionTag::StopScanNegative));
        assert_eq!(negative.effects, &[Effect::StopScan]);
        assert_eq!(negative.next, NextMode::Unchanged);
    }

    #[test]
    fn test_call_lifecycle_plans() {
        assert_eq!(
            plan(HelmetMode::Standby, &session(SessionTag::Active)).effects,
            &[Effect::StartCall]
        );
        assert_eq!(
            plan(HelmetMode::Request, &session(SessionTag::Active)).effects,
            &[Effect::StartCall]
        );
        assert_eq!(
            plan(HelmetMode::Active, &session(SessionTag::Active)).effects,
            &[Effect::CallUpdate]
        );
        assert_eq!(
            plan(HelmetMode::Active, &session(SessionTag::Standby)).effects,
            &[
                Effect::ResetAudio,
                Effect::TerminateSupport,
                Effect::StopStreams,
                Effect::StartVoice,
            ]
        );
    }

    #[test]
    fn test_voice_commands_share_the_click_table() {
        assert_eq!(voice_clicks(HelmetMode::Standby, VoiceCommand::Call), Some(3));
        assert_eq!(voice_clicks(HelmetMode::Active, VoiceCommand::Close), Some(3));
        assert_eq!(voice_clicks(HelmetMode::Active, VoiceCommand::Call), None);
        assert_eq!(voice_clicks(HelmetMode::Qrcode, VoiceCommand::Langs), None);
    }

    #[test]
    fn test_standalone_has_language_and_exit_rows() {
        for mode in [HelmetMode::Standalone, HelmetMode::EmptyStandalone] {
            assert_eq!(plan(mode, &clicks(4)).effects, &[Effect::CycleLanguage]);

            let exit = plan(mode, &clicks(6));
            assert_eq!(
                exit.effects,
                &[
                    Effect::OptimisticStatus(ModePhase::Standby),
                    Effect::ResumeCamera,
                    Effect::WifiUp,
                    Effect::StartPolling,
                ]
            );
            assert_eq!(exit.next, NextMode::FromStatus);

            assert_eq!(voice_clicks(mode, VoiceCommand::Langs), Some(4));
            assert_eq!(voice_clicks(mode, VoiceCommand::Close), Some(6));
        }
    }
}
