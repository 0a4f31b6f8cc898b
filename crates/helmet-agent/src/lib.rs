//! helmet-agent library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The agent is the always-on control core of the helmet. It keeps the
//! device associated with a known Wi-Fi network, supervises the VPN tunnel
//! to the coordination server, exchanges status with the server on a timer,
//! and drives the top-level device state machine that reacts to button
//! clicks, recognised voice commands, and server-pushed session events.
//! Cameras, audio pipelines, displays, and sensors are reached only through
//! the collaborator ports in `application::collaborators`.

/// Application layer: the device state machine and its use cases.
pub mod application;

/// Infrastructure layer: OS adapters, connectivity, session client, storage.
pub mod infrastructure;
