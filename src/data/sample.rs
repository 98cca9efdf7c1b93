//! Temperature sample data structures.

use chrono::{DateTime, Utc};
use std::time::Instant;

use crate::data::channel::ProbeChannel;
use crate::utils::celsius_to_fahrenheit;

/// One poll result for one probe.
///
/// Failed reads still produce a sample, flagged invalid, so that every
/// poll cycle yields exactly one sample per configured channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSample {
    /// The probe that was read.
    pub probe: ProbeChannel,
    /// Temperature in Celsius. Meaningless when `valid` is false.
    pub value: f64,
    /// Monotonic time of the read.
    pub timestamp: Instant,
    /// Wall-clock time of the read, for messages.
    pub recorded_at: DateTime<Utc>,
    /// Whether the read succeeded.
    pub valid: bool,
}

impl TemperatureSample {
    /// A successful read taken now.
    pub fn new(probe: ProbeChannel, celsius: f64) -> Self {
        Self::at(probe, celsius, Instant::now())
    }

    /// A successful read with an explicit monotonic timestamp.
    pub fn at(probe: ProbeChannel, celsius: f64, timestamp: Instant) -> Self {
        Self {
            probe,
            value: celsius,
            timestamp,
            recorded_at: Utc::now(),
            valid: true,
        }
    }

    /// A failed read taken now.
    pub fn invalid(probe: ProbeChannel) -> Self {
        Self::invalid_at(probe, Instant::now())
    }

    /// A failed read with an explicit monotonic timestamp.
    pub fn invalid_at(probe: ProbeChannel, timestamp: Instant) -> Self {
        Self {
            probe,
            value: f64::NAN,
            timestamp,
            recorded_at: Utc::now(),
            valid: false,
        }
    }

    /// The temperature in Celsius, if the read succeeded.
    pub fn celsius(&self) -> Option<f64> {
        if self.valid && self.value.is_finite() {
            Some(self.value)
        } else {
            None
        }
    }

    /// The temperature in Fahrenheit, if the read succeeded.
    pub fn fahrenheit(&self) -> Option<f64> {
        self.celsius().map(celsius_to_fahrenheit)
    }

    /// Whether the read succeeded.
    pub fn is_valid(&self) -> bool {
        self.celsius().is_some()
    }
}
