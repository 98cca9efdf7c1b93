//! Alert delivery.
//!
//! The monitor loop never sends mail itself. It hands [`AlertJob`]s to a
//! [`Notifier`] worker and later folds the returned [`DeliveryReport`]s
//! back into its alert state.

pub mod message;
pub mod notifier;
pub mod transport;

pub use message::AlertMessage;
pub use notifier::Notifier;
pub use transport::{MailTransport, SmtpMailer};

use std::fmt;
use std::time::Instant;

use crate::alert::Decision;
use crate::data::{ProbeRole, TemperatureSample};

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryResult {
    /// The transport accepted the message.
    Sent,
    /// Not connected; nothing was attempted.
    DeferredNoNetwork,
    /// The transport failed or timed out.
    DeferredSmtpFailure,
    /// The decision carried nothing to send.
    Skipped,
}

impl DeliveryResult {
    /// Check if the message went out.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// Check if the message should be tried again later.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::DeferredNoNetwork | Self::DeferredSmtpFailure)
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "Sent"),
            Self::DeferredNoNetwork => write!(f, "Deferred (no network)"),
            Self::DeferredSmtpFailure => write!(f, "Deferred (SMTP failure)"),
            Self::Skipped => write!(f, "Skipped"),
        }
    }
}

/// A message the loop wants sent.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertJob {
    /// Raise or clear.
    pub decision: Decision,
    /// Sample the message describes.
    pub sample: TemperatureSample,
    /// Alert episode the job belongs to.
    pub episode: u64,
}

impl AlertJob {
    /// Probe role the job is about.
    pub fn role(&self) -> ProbeRole {
        self.sample.probe.role
    }
}

/// What became of an [`AlertJob`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    /// The job that was attempted.
    pub job: AlertJob,
    /// How it went.
    pub result: DeliveryResult,
    /// When the attempt finished.
    pub completed_at: Instant,
}

impl DeliveryReport {
    /// Probe role the report is about.
    pub fn role(&self) -> ProbeRole {
        self.job.role()
    }
}
