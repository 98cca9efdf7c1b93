//! Connection state types.
//!
//! There is exactly one radio, so there is exactly one [`ConnectionState`],
//! owned by the [`NetworkSelector`](crate::network::NetworkSelector).

use std::fmt;

/// Association status of the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    /// Not associated and not trying.
    #[default]
    Disconnected,
    /// A sweep through the candidate table is in progress.
    Connecting,
    /// Associated with a candidate.
    Connected,
    /// The last sweep failed on every candidate. Retried after backoff.
    Failed,
}

impl ConnectionStatus {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a sweep is running.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Snapshot of the radio's association state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    /// Candidate currently associated or being tried.
    pub current_candidate_index: Option<usize>,
    /// Association attempts since the last success.
    pub attempt_count: u32,
    /// Association status.
    pub status: ConnectionStatus,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.current_candidate_index {
            Some(index) => write!(f, "{} (candidate #{})", self.status, index),
            None => write!(f, "{}", self.status),
        }
    }
}

/// Event for connection state changes.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    /// SSID of the candidate involved, if any.
    pub ssid: Option<String>,
    /// The new connection state.
    pub state: ConnectionState,
}

/// Result of waiting for connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// Connected before the deadline, to the candidate at this index.
    Reachable(usize),
    /// Still not connected when the deadline elapsed.
    Unreachable,
}

impl Reachability {
    /// Check if reachable.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable(_))
    }
}
