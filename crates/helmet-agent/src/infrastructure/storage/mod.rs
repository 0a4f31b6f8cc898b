//! Persistence: the TOML agent configuration and the Wi-Fi profile store.

pub mod config;
pub mod profiles;
