//! Recording collaborator rig for tests.
//!
//! One struct implements every collaborator port against a shared ordered
//! journal, so a test can assert not only which hardware operations ran
//! but the order they ran in across ports (e.g. streams stop before the
//! audio channel closes).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use helmet_core::{MicrophoneSource, VideoSettings};

use super::{AudioControl, CameraControl, StreamControl, UiEvents, VoiceControl};

#[derive(Default)]
pub struct RecordingRig {
    journal: Mutex<Vec<String>>,
    playback: Mutex<i64>,
    gain: Mutex<i64>,
    source: Mutex<Option<MicrophoneSource>>,
    /// When false, `CameraControl::init` reports no camera.
    pub camera_present: AtomicBool,
    /// When false, `StreamControl::start_remote` fails.
    pub remote_ok: AtomicBool,
}

impl RecordingRig {
    pub fn new() -> Self {
        Self {
            camera_present: AtomicBool::new(true),
            remote_ok: AtomicBool::new(true),
            ..Self::default()
        }
    }

    fn record(&self, entry: impl Into<String>) {
        self.journal.lock().unwrap().push(entry.into());
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

impl AudioControl for RecordingRig {
    fn set_playback_volume(&self, level: i64) {
        self.record(format!("playback {level}"));
        *self.playback.lock().unwrap() = level;
    }

    fn playback_volume(&self) -> i64 {
        *self.playback.lock().unwrap()
    }

    fn set_capture_gain(&self, gain: i64) {
        self.record(format!("gain {gain}"));
        *self.gain.lock().unwrap() = gain;
    }

    fn capture_gain(&self) -> i64 {
        *self.gain.lock().unwrap()
    }

    fn set_capture_source(&self, source: MicrophoneSource) {
        self.record(format!("source {source}"));
        *self.source.lock().unwrap() = Some(source);
    }

    fn capture_source(&self) -> MicrophoneSource {
        self.source.lock().unwrap().unwrap_or(MicrophoneSource::Adc)
    }

    fn reset(&self) {
        self.record("audio reset");
    }
}

impl CameraControl for RecordingRig {
    fn init(&self) -> bool {
        self.record("camera init");
        self.camera_present.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        self.record("camera pause");
    }

    fn resume(&self) {
        self.record("camera resume");
    }

    fn start_scan(&self) {
        self.record("scan start");
    }

    fn stop_scan(&self) {
        self.record("scan stop");
    }
}

impl StreamControl for RecordingRig {
    fn start_stream(&self, peer: &str) -> bool {
        self.record(format!("stream start {peer}"));
        true
    }

    fn stop_stream(&self) {
        self.record("stream stop");
    }

    fn start_remote(&self) -> bool {
        self.record("remote start");
        self.remote_ok.load(Ordering::SeqCst)
    }

    fn stop_remote(&self) {
        self.record("remote stop");
    }

    fn open_audio_channel(&self) {
        self.record("audio channel open");
    }

    fn close_audio_channel(&self) {
        self.record("audio channel close");
    }

    fn apply_video_settings(&self, settings: &VideoSettings) {
        self.record(format!(
            "video {}x{}@{} {}kbit",
            settings.width, settings.height, settings.fps, settings.bitrate
        ));
    }
}

impl VoiceControl for RecordingRig {
    fn start(&self) {
        self.record("voice start");
    }

    fn stop(&self) {
        self.record("voice stop");
    }
}

impl UiEvents for RecordingRig {
    fn status_changed(&self, status: &str) {
        self.record(format!("ui status {status}"));
    }

    fn cycle_language(&self) {
        self.record("ui language");
    }
}
