//! Clamp and scale rules for media-settings events.
//!
//! The server expresses volumes on operator-facing scales; the device mixer
//! uses its own ranges. All scaling uses integer truncation — the hardware
//! mixer only takes integer steps, and truncation matches the device's
//! historical behaviour at the boundary values (0 and the range maximum map
//! exactly onto the mixer range ends).

use std::fmt;

use thiserror::Error;

/// Routing target for the `screen` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenTarget {
    Local,
    Remote,
}

impl ScreenTarget {
    pub fn parse(s: &str) -> Option<ScreenTarget> {
        match s {
            "local" => Some(ScreenTarget::Local),
            "remote" => Some(ScreenTarget::Remote),
            _ => None,
        }
    }
}

/// Capture source selected by the `digitalMicrophone` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicrophoneSource {
    /// Analog front-end.
    Adc,
    /// Digital MEMS microphone.
    Dmic,
}

impl MicrophoneSource {
    /// Payload `1` selects the digital microphone, anything else the ADC.
    pub fn from_flag(flag: i64) -> MicrophoneSource {
        if flag == 1 {
            MicrophoneSource::Dmic
        } else {
            MicrophoneSource::Adc
        }
    }

    /// Mixer control tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            MicrophoneSource::Adc => "ADC",
            MicrophoneSource::Dmic => "DMIC",
        }
    }
}

impl fmt::Display for MicrophoneSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an operator playback volume (0–100) onto the mixer scale.
///
/// Out-of-range input is clamped first; the 0.63 attenuation factor is
/// applied in integer arithmetic (`v * 63 / 100`).
pub fn playback_volume_to_mixer(volume: i64) -> i64 {
    let clamped = volume.clamp(0, 100);
    clamped * 63 / 100
}

/// Maps an operator microphone volume (0–200) onto the capture gain (0–31).
///
/// Truncating: 100 → 15, 0 → 0, 200 → 31.
pub fn microphone_volume_to_gain(volume: i64) -> i64 {
    let clamped = volume.clamp(0, 200);
    clamped * 31 / 200
}

/// Failure parsing a `videoSettings` payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VideoSettingsError {
    #[error("expected 4 comma-separated integers, got {0}")]
    WrongFieldCount(usize),
    #[error("non-numeric field: {0:?}")]
    NotANumber(String),
}

/// Stream geometry pushed with a `videoSettings` event.
///
/// Width 1280 and height 720 are requested by the desktop client but the
/// panel pipeline only supports 1024x768; those two values are normalised
/// at parse time so change detection compares what will actually be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    pub bitrate: i64,
    pub fps: i64,
    pub width: i64,
    pub height: i64,
}

impl VideoSettings {
    /// Parses `"bitrate,fps,width,height"` and normalises the geometry.
    pub fn parse(payload: &str) -> Result<VideoSettings, VideoSettingsError> {
        let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(VideoSettingsError::WrongFieldCount(fields.len()));
        }
        let mut values = [0i64; 4];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field
                .parse()
                .map_err(|_| VideoSettingsError::NotANumber(field.to_string()))?;
        }
        let mut settings = VideoSettings {
            bitrate: values[0],
            fps: values[1],
            width: values[2],
            height: values[3],
        };
        if settings.width == 1280 {
            settings.width = 1024;
        }
        if settings.height == 720 {
            settings.height = 768;
        }
        Ok(settings)
    }
}
