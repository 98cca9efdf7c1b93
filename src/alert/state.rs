//! Per-probe alert state.

use std::fmt;
use std::time::Instant;

use crate::data::{BreachDirection, TemperatureSample};

/// Where a probe's alert stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlertStatus {
    /// Within limits, or not yet debounced.
    #[default]
    Normal,
    /// Alert raised, delivery pending.
    Warning,
    /// Alert delivered.
    Sent,
    /// Delivery retries exhausted. Nothing more is sent until recovery.
    Suppressed,
}

impl AlertStatus {
    /// Check if an alert episode is open.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Warning => write!(f, "Warning"),
            Self::Sent => write!(f, "Sent"),
            Self::Suppressed => write!(f, "Suppressed"),
        }
    }
}

/// Alert bookkeeping for one probe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlertState {
    /// Current status.
    pub status: AlertStatus,
    /// Valid breaching reads in a row.
    pub consecutive_breach_count: u32,
    /// Valid recovered reads in a row.
    pub consecutive_recovery_count: u32,
    /// When the last alert for this probe was delivered.
    pub last_notified_at: Option<Instant>,
    /// Failed deliveries in the current episode.
    pub delivery_failures: u32,
    /// Incremented each time an alert is raised.
    pub episode: u64,
    /// A delivery for this episode is with the notifier.
    pub in_flight: bool,
    /// Side of the band the current episode breached.
    pub direction: Option<BreachDirection>,
    /// Most recent breaching sample of the current episode.
    pub last_breach: Option<TemperatureSample>,
}

impl AlertState {
    /// Open a new episode.
    pub(crate) fn raise(&mut self, direction: BreachDirection, sample: &TemperatureSample) {
        self.status = AlertStatus::Warning;
        self.episode += 1;
        self.delivery_failures = 0;
        self.in_flight = false;
        self.direction = Some(direction);
        self.last_breach = Some(sample.clone());
    }

    /// Close the current episode.
    pub(crate) fn clear(&mut self) {
        self.status = AlertStatus::Normal;
        self.consecutive_breach_count = 0;
        self.consecutive_recovery_count = 0;
        self.delivery_failures = 0;
        self.in_flight = false;
        self.direction = None;
        self.last_breach = None;
    }
}
