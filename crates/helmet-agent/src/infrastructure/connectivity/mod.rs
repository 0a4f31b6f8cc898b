//! Wi-Fi association and VPN tunnel supervision.
//!
//! - `manager` – keeps the device associated with a provisioned network,
//!   runs the authentication/certificate/tunnel bring-up sequence on an
//!   association edge, and verifies reachability through both paths.
//! - `vpn` – supervises the tunnel subprocess and rewrites its config.

pub mod manager;
pub mod vpn;

pub use manager::{ConnectivityManager, ConnectivityState, LinkReport, LinkState};
pub use vpn::VpnSupervisor;
