//! Error types for the hottub-probes crate.

use thiserror::Error;

/// Coarse classification of failures, used to decide how each one is absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// A probe could not be read. The sample is skipped.
    SensorRead,
    /// No configured network accepted the association. Retried with backoff.
    NetworkAssociation,
    /// The mail transport failed. Retried up to a cap, then suppressed.
    SmtpTransport,
    /// The configuration is unusable. Fatal at startup.
    ConfigurationInvalid,
    /// Anything else.
    Internal,
}

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// The one-wire driver failed to read a probe.
    #[error("Sensor read failed for {address}: {reason}")]
    SensorRead {
        /// ROM code of the probe, as hex.
        address: String,
        /// Description of the bus failure.
        reason: String,
    },

    /// The probe did not answer within the read timeout.
    #[error("Sensor read timed out for {address}")]
    SensorTimeout {
        /// ROM code of the probe, as hex.
        address: String,
    },

    /// CRC-8 check failed for a ROM code or scratchpad.
    #[error("CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CrcMismatch {
        /// The CRC computed over the payload.
        expected: u8,
        /// The CRC byte that was received.
        actual: u8,
    },

    /// Invalid data was received from the bus.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// Association with a network was rejected.
    #[error("Association with '{ssid}' failed: {reason}")]
    AssociationRejected {
        /// SSID that rejected the association.
        ssid: String,
        /// Reason reported by the radio.
        reason: String,
    },

    /// Association with a network did not complete in time.
    #[error("Association with '{ssid}' timed out")]
    AssociationTimeout {
        /// SSID of the candidate that timed out.
        ssid: String,
    },

    /// Every configured network failed during a sweep.
    #[error("No network reachable after {attempts} association attempts")]
    NetworkUnreachable {
        /// Attempts made since the last successful association.
        attempts: u32,
    },

    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// An email address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    EmailBuild(String),

    /// The mail transport did not finish within the delivery timeout.
    #[error("Email delivery timed out")]
    DeliveryTimeout,

    /// The configuration is unusable.
    #[error("Invalid configuration: {reason}")]
    ConfigurationInvalid {
        /// What is wrong with it.
        reason: String,
    },

    /// The configuration file is not valid TOML or does not match the schema.
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error.
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::ConfigurationInvalid {
            reason: reason.into(),
        }
    }

    /// Map this error onto the failure taxonomy.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::SensorRead { .. }
            | Self::SensorTimeout { .. }
            | Self::CrcMismatch { .. }
            | Self::InvalidData { .. } => FailureClass::SensorRead,
            Self::AssociationRejected { .. }
            | Self::AssociationTimeout { .. }
            | Self::NetworkUnreachable { .. } => FailureClass::NetworkAssociation,
            Self::Smtp(_) | Self::Address(_) | Self::EmailBuild(_) | Self::DeliveryTimeout => {
                FailureClass::SmtpTransport
            }
            Self::ConfigurationInvalid { .. } | Self::ConfigParse(_) | Self::Io(_) => {
                FailureClass::ConfigurationInvalid
            }
            Self::InvalidParameter { .. } | Self::Internal(_) => FailureClass::Internal,
        }
    }

    /// Whether the monitor keeps running after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.class(), FailureClass::ConfigurationInvalid)
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
