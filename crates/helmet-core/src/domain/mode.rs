//! Helmet operating modes and the wearer activity classification.
//!
//! The server and the device exchange the helmet status as a free-form string
//! tag such as `"Work_standby"` or `"Relax_active"`: the prefix is the
//! operator's current activity classification, the suffix the call phase.
//! A handful of statuses are bare words (`"Standalone"`, `"offline"`,
//! `"nocamera"`, `"Low_power"`, `"qrcode"`, `"emptyStandalone"`).
//!
//! Status strings are matched by *substring*, never by equality — a tag of
//! `"Fall_standby"` must be recognised as standby. [`HelmetMode::from_status`]
//! encodes the matching precedence the device relies on.

use serde::{Deserialize, Serialize};

/// Top-level operating mode of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HelmetMode {
    /// No network association; local operation only.
    Offline,
    /// Connected and idle, waiting for a call or local input.
    Standby,
    /// The wearer has requested support and is waiting for an operator.
    Request,
    /// A live call with a remote operator is in progress.
    Active,
    /// Scanning a provisioning code with the camera.
    Qrcode,
    /// Offline content-delivery mode serving cached documents and video.
    Standalone,
    /// Standalone entered with no content bundle present.
    EmptyStandalone,
    /// The camera failed to initialise; degraded mode instead of a crash.
    NoCamera,
    /// Display and radios powered down to conserve battery.
    LowPower,
}

impl HelmetMode {
    /// Classifies a wire status string into a mode.
    ///
    /// Matching is substring-based with a fixed precedence. `emptyStandalone`
    /// is tested before `Standalone` because the former contains the latter.
    pub fn from_status(status: &str) -> Option<HelmetMode> {
        if status == "Low_power" {
            Some(HelmetMode::LowPower)
        } else if status.contains("standby") {
            Some(HelmetMode::Standby)
        } else if status.contains("request") {
            Some(HelmetMode::Request)
        } else if status.contains("active") {
            Some(HelmetMode::Active)
        } else if status.contains("qrcode") {
            Some(HelmetMode::Qrcode)
        } else if status.contains("offline") {
            Some(HelmetMode::Offline)
        } else if status.contains("nocamera") {
            Some(HelmetMode::NoCamera)
        } else if status.contains("emptyStandalone") {
            Some(HelmetMode::EmptyStandalone)
        } else if status.contains("Standalone") {
            Some(HelmetMode::Standalone)
        } else {
            None
        }
    }

    /// The bare wire tag for modes that are not operator-qualified.
    ///
    /// Operator-qualified phases (`standby`, `request`, `active`) are built
    /// with [`OperatorStatus::status_tag`] instead.
    pub fn bare_tag(&self) -> Option<&'static str> {
        match self {
            HelmetMode::Offline => Some("offline"),
            HelmetMode::Qrcode => Some("qrcode"),
            HelmetMode::Standalone => Some("Standalone"),
            HelmetMode::EmptyStandalone => Some("emptyStandalone"),
            HelmetMode::NoCamera => Some("nocamera"),
            HelmetMode::LowPower => Some("Low_power"),
            _ => None,
        }
    }
}

/// Call phase carried in an operator-qualified status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModePhase {
    Standby,
    Request,
    Active,
}

impl ModePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModePhase::Standby => "standby",
            ModePhase::Request => "request",
            ModePhase::Active => "active",
        }
    }

    /// Extracts the phase from a status string by substring match.
    pub fn from_status(status: &str) -> Option<ModePhase> {
        if status.contains("active") {
            Some(ModePhase::Active)
        } else if status.contains("standby") {
            Some(ModePhase::Standby)
        } else if status.contains("request") {
            Some(ModePhase::Request)
        } else {
            None
        }
    }
}

/// The wearer activity classification produced by the IMU pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorStatus {
    Work,
    Relax,
    Fall,
}

impl OperatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorStatus::Work => "Work",
            OperatorStatus::Relax => "Relax",
            OperatorStatus::Fall => "Fall",
        }
    }

    pub fn parse(s: &str) -> Option<OperatorStatus> {
        match s {
            "Work" => Some(OperatorStatus::Work),
            "Relax" => Some(OperatorStatus::Relax),
            "Fall" => Some(OperatorStatus::Fall),
            _ => None,
        }
    }

    /// Builds the operator-qualified status tag, e.g. `"Work_standby"`.
    pub fn status_tag(&self, phase: ModePhase) -> String {
        format!("{}_{}", self.as_str(), phase.as_str())
    }
}

/// Numeric activity code posted with every status exchange.
///
/// The server interprets the code as (call phase × operator activity); the
/// table is fixed and must match the server side exactly.
///
/// | phase    | Fall | Work | Relax |
/// |----------|------|------|-------|
/// | active   |  9   |  4   |  10   |
/// | standby  |  5   |  2   |   6   |
/// | request  |  7   |  3   |   8   |
///
/// Any unqualified status falls back to `"2"`.
pub fn activity_code(helmet_status: &str, operator: OperatorStatus) -> &'static str {
    match ModePhase::from_status(helmet_status) {
        Some(ModePhase::Active) => match operator {
            OperatorStatus::Fall => "9",
            OperatorStatus::Work => "4",
            OperatorStatus::Relax => "10",
        },
        Some(ModePhase::Standby) => match operator {
            OperatorStatus::Fall => "5",
            OperatorStatus::Work => "2",
            OperatorStatus::Relax => "6",
        },
        Some(ModePhase::Request) => match operator {
            OperatorStatus::Fall => "7",
            OperatorStatus::Work => "3",
            OperatorStatus::Relax => "8",
        },
        None => "2",
    }
}

/// Activity code posted when the wearer manually requests standalone mode.
pub const STANDALONE_REQUEST_CODE: &str = "11";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_qualified_statuses_classify_by_phase() {
        assert_eq!(
            HelmetMode::from_status("Work_standby"),
            Some(HelmetMode::Standby)
        );
        assert_eq!(
            HelmetMode::from_status("Fall_request"),
            Some(HelmetMode::Request)
        );
        assert_eq!(
            HelmetMode::from_status("Relax_active"),
            Some(HelmetMode::Active)
        );
    }

    #[test]
    fn test_empty_standalone_wins_over_standalone() {
        assert_eq!(
            HelmetMode::from_status("emptyStandalone"),
            Some(HelmetMode::EmptyStandalone)
        );
        assert_eq!(
            HelmetMode::from_status("Standalone"),
            Some(HelmetMode::Standalone)
        );
    }

    #[test]
    fn test_low_power_is_exact_match() {
        assert_eq!(HelmetMode::from_status("Low_power"), Some(HelmetMode::LowPower));
        assert_eq!(HelmetMode::from_status("Low_power_x"), None);
    }

    #[test]
    fn test_unknown_status_is_none() {
        assert_eq!(HelmetMode::from_status("garbage"), None);
    }

    #[test]
    fn test_status_tag_round_trips_through_from_status() {
        let tag = OperatorStatus::Work.status_tag(ModePhase::Request);
        assert_eq!(tag, "Work_request");
        assert_eq!(HelmetMode::from_status(&tag), Some(HelmetMode::Request));
    }

    #[test]
    fn test_activity_code_table_is_exhaustive() {
        let cases = [
            ("Work_active", OperatorStatus::Fall, "9"),
            ("Work_active", OperatorStatus::Work, "4"),
            ("Work_active", OperatorStatus::Relax, "10"),
            ("Work_standby", OperatorStatus::Fall, "5"),
            ("Work_standby", OperatorStatus::Work, "2"),
            ("Work_standby", OperatorStatus::Relax, "6"),
            ("Work_request", OperatorStatus::Fall, "7"),
            ("Work_request", OperatorStatus::Work, "3"),
            ("Work_request", OperatorStatus::Relax, "8"),
        ];
        for (status, operator, expected) in cases {
            assert_eq!(activity_code(status, operator), expected);
        }
    }

    #[test]
    fn test_activity_code_defaults_when_phase_unknown() {
        assert_eq!(activity_code("Standalone", OperatorStatus::Fall), "2");
        assert_eq!(activity_code("offline", OperatorStatus::Work), "2");
    }
}
