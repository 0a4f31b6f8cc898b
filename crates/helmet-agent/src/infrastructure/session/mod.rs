//! The HTTPS session with the coordination server.
//!
//! - `client` – authentication, status/support endpoints, event receipts,
//!   certificate download. All JSON over HTTPS with a static API key.
//! - `poller` – the repeating status exchange and the ordered delivery of
//!   session signals to the state machine.
//! - `standalone` – availability check and download of the offline content
//!   bundle.

pub mod client;
pub mod poller;
pub mod standalone;

pub use client::{SessionClient, SessionError};
pub use poller::{StatusEvent, StatusPoller, StatusTag};
pub use standalone::StandaloneAvailability;
