//! Domain entities for the helmet agent.
//!
//! Pure business rules with no infrastructure dependencies: the agent's
//! operating modes and the wearer activity classification live here, together
//! with the Wi-Fi connection profile type persisted by provisioning.

pub mod mode;
pub mod profile;
