//! DS18B20 scratchpad parsing.
//!
//! Decodes the 9-byte scratchpad returned by a READ SCRATCHPAD (0xBE)
//! command into a temperature.

use crate::error::{Error, Result};
use crate::protocol::crc::calculate_crc8;

/// Conversion resolution, from bits 5-6 of the configuration register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// 0.5°C steps, 93.75 ms conversion.
    Bits9,
    /// 0.25°C steps, 187.5 ms conversion.
    Bits10,
    /// 0.125°C steps, 375 ms conversion.
    Bits11,
    /// 0.0625°C steps, 750 ms conversion.
    #[default]
    Bits12,
}

impl Resolution {
    /// Decode from the configuration register byte.
    pub fn from_config(config: u8) -> Self {
        match (config >> 5) & 0x03 {
            0 => Self::Bits9,
            1 => Self::Bits10,
            2 => Self::Bits11,
            _ => Self::Bits12,
        }
    }

    /// Mask clearing the undefined low bits of the raw reading.
    fn mask(&self) -> i16 {
        match self {
            Self::Bits9 => !0x07,
            Self::Bits10 => !0x03,
            Self::Bits11 => !0x01,
            Self::Bits12 => !0x00,
        }
    }
}

/// Parsed DS18B20 scratchpad.
///
/// Layout:
/// - Bytes 0-1: Temperature (int16 little-endian, 1/16°C units)
/// - Byte 2: TH register / user byte 1
/// - Byte 3: TL register / user byte 2
/// - Byte 4: Configuration register
/// - Bytes 5-7: Reserved
/// - Byte 8: CRC-8 of bytes 0-7
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scratchpad {
    /// Raw temperature register, low bits masked per resolution.
    pub raw_temperature: i16,
    /// Alarm high register.
    pub alarm_high: i8,
    /// Alarm low register.
    pub alarm_low: i8,
    /// Conversion resolution.
    pub resolution: Resolution,
}

impl Scratchpad {
    /// Size of the scratchpad in bytes.
    pub const SIZE: usize = 9;

    /// Raw register value after power-on reset (85°C).
    pub const POWER_ON_RESET: i16 = 0x0550;

    /// Parse and CRC-check a scratchpad.
    ///
    /// An all-zero buffer passes the CRC but means nothing answered on the
    /// bus, so it is rejected.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::InvalidData {
                context: format!(
                    "Scratchpad too short: {} bytes (need {})",
                    data.len(),
                    Self::SIZE
                ),
            });
        }

        let data = &data[..Self::SIZE];
        if data.iter().all(|&b| b == 0) {
            return Err(Error::InvalidData {
                context: "Scratchpad is all zeros (no device responded)".to_string(),
            });
        }

        let expected = calculate_crc8(&data[..8]);
        if expected != data[8] {
            return Err(Error::CrcMismatch {
                expected,
                actual: data[8],
            });
        }

        let resolution = Resolution::from_config(data[4]);
        let raw_temperature = i16::from_le_bytes([data[0], data[1]]) & resolution.mask();

        Ok(Self {
            raw_temperature,
            alarm_high: data[2] as i8,
            alarm_low: data[3] as i8,
            resolution,
        })
    }

    /// Temperature in Celsius.
    pub fn celsius(&self) -> f64 {
        self.raw_temperature as f64 / 16.0
    }

    /// Whether the register still holds the power-on reset value,
    /// meaning no conversion has completed since power-up.
    pub fn is_power_on_reset(&self) -> bool {
        self.raw_temperature == Self::POWER_ON_RESET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive() {
        let data = [0x90, 0x01, 0x4B, 0x46, 0x7F, 0xFF, 0x10, 0x10, 0x92];
        let scratchpad = Scratchpad::parse(&data).unwrap();
        assert_eq!(scratchpad.resolution, Resolution::Bits12);
        assert!((scratchpad.celsius() - 25.0).abs() < 0.001);
        assert_eq!(scratchpad.alarm_high, 75);
        assert_eq!(scratchpad.alarm_low, 70);
        assert!(!scratchpad.is_power_on_reset());
    }

    #[test]
    fn test_parse_negative() {
        let data = [0x5E, 0xFF, 0x4B, 0x46, 0x7F, 0xFF, 0x02, 0x10, 0xB6];
        let scratchpad = Scratchpad::parse(&data).unwrap();
        assert!((scratchpad.celsius() - (-10.125)).abs() < 0.001);
    }

    #[test]
    fn test_power_on_reset() {
        let data = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x1C];
        let scratchpad = Scratchpad::parse(&data).unwrap();
        assert!(scratchpad.is_power_on_reset());
        assert!((scratchpad.celsius() - 85.0).abs() < 0.001);
    }

    #[test]
    fn test_crc_mismatch() {
        let data = [0x90, 0x01, 0x4B, 0x46, 0x7F, 0xFF, 0x10, 0x10, 0x93];
        assert!(matches!(
            Scratchpad::parse(&data),
            Err(Error::CrcMismatch {
                expected: 0x92,
                actual: 0x93
            })
        ));
    }

    #[test]
    fn test_all_zeros_rejected() {
        assert!(matches!(
            Scratchpad::parse(&[0u8; 9]),
            Err(Error::InvalidData { .. })
        ));
    }

    #[test]
    fn test_too_short() {
        assert!(Scratchpad::parse(&[0x90, 0x01]).is_err());
    }

    #[test]
    fn test_resolution_masking() {
        assert_eq!(Resolution::from_config(0x1F), Resolution::Bits9);
        assert_eq!(Resolution::from_config(0x3F), Resolution::Bits10);
        assert_eq!(Resolution::from_config(0x5F), Resolution::Bits11);
        assert_eq!(Resolution::from_config(0x7F), Resolution::Bits12);
        assert_eq!(0x0197 & Resolution::Bits9.mask(), 0x0190);
    }
}
