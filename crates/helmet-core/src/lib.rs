//! # helmet-core
//!
//! Shared library for the helmet agent containing the device's domain model:
//! operating modes, operator status, connection profiles, the server event
//! stream with its ordering guarantees, and the provisioning payload decoder.
//!
//! This crate is used by the agent application and its test suites.
//! It has zero dependencies on OS APIs, network sockets, or async runtimes.
//!
//! - **`domain`** – Pure entities: the helmet's operating mode, the wearer's
//!   activity classification, the activity code table sent with every status
//!   exchange, and Wi-Fi connection profiles.
//!
//! - **`events`** – Server-pushed instruction events carried inside status
//!   responses, the monotonic tracker that guarantees at-most-once in-order
//!   processing, and the clamp/scale rules for media settings.
//!
//! - **`provisioning`** – Decoding of scanned provisioning payloads
//!   (base64 + AES-128-ECB) into connection profiles.

pub mod domain;
pub mod events;
pub mod provisioning;

pub use domain::mode::{HelmetMode, ModePhase, OperatorStatus};
pub use domain::profile::ConnectionProfile;
pub use events::settings::{MicrophoneSource, ScreenTarget, VideoSettings};
pub use events::tracker::EventTracker;
pub use events::{EventCommand, EventData, ServerEvent};
pub use provisioning::{decode_payload, ProvisioningError};
