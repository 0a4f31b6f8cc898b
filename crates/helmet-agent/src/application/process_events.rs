//! Ordered processing of server events delivered with a live session.
//!
//! Events arrive embedded in status responses, possibly redelivered; the
//! watermark in [`EventTracker`] makes processing idempotent. Events are
//! handled in list order and each one is marked processed only after its
//! side effect ran.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use helmet_core::{
    events::settings::{microphone_volume_to_gain, playback_volume_to_mixer, ScreenTarget},
    EventCommand, EventTracker, MicrophoneSource, ServerEvent, VideoSettings,
};

use crate::application::collaborators::{AudioControl, CameraControl, StreamControl};
use crate::infrastructure::session::SessionClient;

pub struct ProcessEventsUseCase {
    session: Arc<SessionClient>,
    audio: Arc<dyn AudioControl>,
    camera: Arc<dyn CameraControl>,
    stream: Arc<dyn StreamControl>,
    tracker: Mutex<EventTracker>,
    applied_video: Mutex<Option<VideoSettings>>,
    peer: Mutex<Option<String>>,
}

impl ProcessEventsUseCase {
    pub fn new(
        session: Arc<SessionClient>,
        audio: Arc<dyn AudioControl>,
        camera: Arc<dyn CameraControl>,
        stream: Arc<dyn StreamControl>,
    ) -> Self {
        Self {
            session,
            audio,
            camera,
            stream,
            tracker: Mutex::new(EventTracker::new()),
            applied_video: Mutex::new(None),
            peer: Mutex::new(None),
        }
    }

    /// Forgets the watermark and the peer. Called when a new call starts so
    /// the new session's event ids start fresh.
    pub fn reset(&self, peer: Option<String>) {
        self.tracker.lock().unwrap().reset();
        *self.peer.lock().unwrap() = peer;
    }

    pub fn peer(&self) -> Option<String> {
        self.peer.lock().unwrap().clone()
    }

    /// Reports the current audio chain state to the server, so the expert
    /// console shows real values when the call opens.
    pub async fn announce_audio_settings(&self) {
        let volume = self.audio.playback_volume().to_string();
        let _ = self
            .session
            .record_event("playbackVolume", &Value::String(volume))
            .await;

        let dmic = match self.audio.capture_source() {
            MicrophoneSource::Dmic => "1",
            MicrophoneSource::Adc => "0",
        };
        let _ = self
            .session
            .record_event("digitalMicrophone", &Value::String(dmic.into()))
            .await;

        let gain = self.audio.capture_gain().to_string();
        let _ = self
            .session
            .record_event("microphoneVolume", &Value::String(gain))
            .await;
    }

    /// Processes every not-yet-seen event of a batch in list order.
    pub async fn handle_batch(&self, events: &[ServerEvent]) {
        for event in events {
            let id = event.id_call_event;
            if !self.tracker.lock().unwrap().is_new(id) {
                continue;
            }
            self.dispatch(event).await;
            self.tracker.lock().unwrap().mark_processed(id);
            info!(id, "event processed");
        }
    }

    async fn dispatch(&self, event: &ServerEvent) {
        let data = event.data();
        match event.command() {
            EventCommand::Screen => {
                let _ = self
                    .session
                    .update_event(event.id_call_event, "progress", "received")
                    .await;
                match data.as_str().and_then(ScreenTarget::parse) {
                    Some(ScreenTarget::Local) => self.stream.stop_remote(),
                    Some(ScreenTarget::Remote) => {
                        if self.stream.start_remote() {
                            let _ = self
                                .session
                                .update_event(event.id_call_event, "progress", "completed")
                                .await;
                        }
                    }
                    None => warn!(id = event.id_call_event, "screen event without target"),
                }
            }
            EventCommand::PlaybackVolume => match data.as_i64() {
                Some(volume) => self
                    .audio
                    .set_playback_volume(playback_volume_to_mixer(volume)),
                None => warn!(id = event.id_call_event, "unreadable playback volume"),
            },
            EventCommand::DigitalMicrophone => {
                let flag = data.as_i64().unwrap_or(0);
                self.audio
                    .set_capture_source(MicrophoneSource::from_flag(flag));
            }
            EventCommand::MicrophoneVolume => match data.as_i64() {
                Some(volume) => self
                    .audio
                    .set_capture_gain(microphone_volume_to_gain(volume)),
                None => warn!(id = event.id_call_event, "unreadable microphone volume"),
            },
            EventCommand::Camera => match data.as_str() {
                Some("on") => self.camera.resume(),
                _ => self.camera.pause(),
            },
            EventCommand::VideoSettings => {
                let Some(text) = data.as_str() else {
                    warn!(id = event.id_call_event, "video settings without payload");
                    return;
                };
                match VideoSettings::parse(text) {
                    Ok(settings) => self.apply_video_settings(settings).await,
                    Err(error) => {
                        warn!(id = event.id_call_event, %error, "bad video settings")
                    }
                }
            }
            EventCommand::Unknown => {
                debug!(id = event.id_call_event, "ignoring unknown event command");
            }
        }
    }

    /// Restarts the outgoing stream with new settings, but only when they
    /// differ from what is already applied.
    async fn apply_video_settings(&self, settings: VideoSettings) {
        let changed = {
            let mut applied = self.applied_video.lock().unwrap();
            let changed = *applied != Some(settings);
            *applied = Some(settings);
            changed
        };
        if !changed {
            return;
        }
        info!(?settings, "video settings changed, restarting stream");
        self.stream.apply_video_settings(&settings);
        self.stream.stop_stream();
        tokio::time::sleep(Duration::from_secs(1)).await;
        if let Some(peer) = self.peer() {
            self.stream.start_stream(&peer);
        }
    }
}
