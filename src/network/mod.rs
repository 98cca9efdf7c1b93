//! Network connectivity module.
//!
//! This module chooses among the configured WiFi networks, keeps the
//! radio associated, and reports connectivity to the rest of the crate.

pub mod candidate;
pub mod connection;
pub mod radio;
pub mod selector;

pub use candidate::NetworkCandidate;
pub use connection::{ConnectionEvent, ConnectionState, ConnectionStatus, Reachability};
pub use radio::WifiRadio;
pub use selector::NetworkSelector;
