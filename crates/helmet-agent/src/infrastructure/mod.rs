//! Infrastructure layer: everything that touches the OS or the network.
//!
//! - `system` – the system-control port over shell tooling (nmcli, iw,
//!   pgrep, kill, date) and its recording test double.
//! - `connectivity` – Wi-Fi association, VPN supervision, reachability.
//! - `session` – the HTTPS session with the coordination server.
//! - `storage` – TOML agent configuration and the persisted profile store.

pub mod connectivity;
pub mod session;
pub mod storage;
pub mod system;
