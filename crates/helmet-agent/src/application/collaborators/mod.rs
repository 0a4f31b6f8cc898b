//! Ports to the media and UI hardware the agent drives.
//!
//! Rendering, codecs, and speech recognition live behind these traits; the
//! application layer only decides when they run. Production implementations
//! wrap the GStreamer pipelines and the display process and are wired in at
//! startup.

use helmet_core::{MicrophoneSource, VideoSettings};

pub mod mock;

/// Mixer and capture chain of the headset.
pub trait AudioControl: Send + Sync {
    fn set_playback_volume(&self, level: i64);
    fn playback_volume(&self) -> i64;
    fn set_capture_gain(&self, gain: i64);
    fn capture_gain(&self) -> i64;
    fn set_capture_source(&self, source: MicrophoneSource);
    fn capture_source(&self) -> MicrophoneSource;
    /// Restores the whole audio chain to its default state.
    fn reset(&self);
}

/// The helmet camera.
pub trait CameraControl: Send + Sync {
    /// Brings the capture pipeline up. False means no camera is present.
    fn init(&self) -> bool;
    fn pause(&self);
    fn resume(&self);
    /// Points the pipeline at the provisioning-code detector.
    fn start_scan(&self);
    fn stop_scan(&self);
}

/// Outgoing and incoming media streams of a support session.
pub trait StreamControl: Send + Sync {
    /// Starts streaming camera video to the peer. False on pipeline failure.
    fn start_stream(&self, peer: &str) -> bool;
    fn stop_stream(&self);
    /// Starts showing the remote expert's screen. False on pipeline failure.
    fn start_remote(&self) -> bool;
    fn stop_remote(&self);
    fn open_audio_channel(&self);
    fn close_audio_channel(&self);
    fn apply_video_settings(&self, settings: &VideoSettings);
}

/// The wake-word/speech command listener.
pub trait VoiceControl: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

/// Display-side notifications. What the wearer actually sees is out of
/// scope; the agent only reports.
pub trait UiEvents: Send + Sync {
    fn status_changed(&self, status: &str);
    fn cycle_language(&self);
}
