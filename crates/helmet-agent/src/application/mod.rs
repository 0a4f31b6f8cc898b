//! Application layer: device behavior on top of the infrastructure ports.
//!
//! The state machine is the single authority for what the device does in
//! response to button clicks, voice commands, and session signals. Media,
//! audio, and UI hardware sit behind the collaborator ports.

pub mod buttons;
pub mod collaborators;
pub mod process_events;
pub mod state_machine;

pub use buttons::ClickAccumulator;
pub use process_events::ProcessEventsUseCase;
pub use state_machine::{HelmetStateMachine, SessionTag, Trigger, VoiceCommand};
