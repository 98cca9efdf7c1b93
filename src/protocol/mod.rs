//! One-wire protocol helpers.
//!
//! This module contains the implementations for:
//! - Dallas/Maxim CRC-8 calculation
//! - DS18B20 scratchpad parsing

pub mod crc;
pub mod scratchpad;

pub use crc::{calculate_crc8, verify_crc8};
pub use scratchpad::{Resolution, Scratchpad};
