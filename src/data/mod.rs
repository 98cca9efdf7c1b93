//! Data structures for probe data.
//!
//! This module contains the core data types used to identify probes,
//! carry their readings and describe their alert limits.

pub mod channel;
pub mod sample;
pub mod thresholds;

pub use channel::{ProbeAddress, ProbeChannel, ProbeRole};
pub use sample::TemperatureSample;
pub use thresholds::{BreachDirection, ThresholdBand, ThresholdTable, Zone};
