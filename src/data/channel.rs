//! Probe identity types.
//!
//! A probe is addressed on the one-wire bus by its 64-bit ROM code and is
//! given one semantic role on the device.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::protocol::crc::{calculate_crc8, verify_crc8};

/// The semantic role a probe plays on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeRole {
    /// Ambient air next to the tub.
    Air,
    /// Tub water.
    Water,
    /// Equipment enclosure.
    Enclosure,
}

impl ProbeRole {
    /// Every role, in polling order.
    pub const ALL: [ProbeRole; 3] = [Self::Air, Self::Water, Self::Enclosure];

    /// Dense index used by per-role tables.
    pub fn index(&self) -> usize {
        match self {
            Self::Air => 0,
            Self::Water => 1,
            Self::Enclosure => 2,
        }
    }

    /// Human readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Air => "Air",
            Self::Water => "Water",
            Self::Enclosure => "Enclosure",
        }
    }
}

impl fmt::Display for ProbeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 64-bit one-wire ROM code.
///
/// Layout (as printed by most Arduino sketches, first byte first):
/// - Byte 0: family code (0x28 for DS18B20)
/// - Bytes 1-6: 48-bit serial number
/// - Byte 7: CRC-8 of bytes 0-6
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProbeAddress([u8; 8]);

impl ProbeAddress {
    /// Family code of the DS18B20.
    pub const FAMILY_DS18B20: u8 = 0x28;
    /// Family code of the DS18S20.
    pub const FAMILY_DS18S20: u8 = 0x10;
    /// Family code of the DS1822.
    pub const FAMILY_DS1822: u8 = 0x22;

    /// Wrap raw ROM bytes without validation.
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Build an address from family code and serial, computing the CRC.
    pub fn with_crc(family: u8, serial: [u8; 6]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = family;
        bytes[1..7].copy_from_slice(&serial);
        bytes[7] = calculate_crc8(&bytes[..7]);
        Self(bytes)
    }

    /// Raw ROM bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Family code (byte 0).
    pub fn family_code(&self) -> u8 {
        self.0[0]
    }

    /// Whether the family code names a known temperature sensor.
    pub fn is_temperature_sensor(&self) -> bool {
        matches!(
            self.family_code(),
            Self::FAMILY_DS18B20 | Self::FAMILY_DS18S20 | Self::FAMILY_DS1822
        )
    }

    /// Check the trailing CRC byte.
    pub fn validate(&self) -> Result<()> {
        if verify_crc8(&self.0) {
            Ok(())
        } else {
            Err(Error::CrcMismatch {
                expected: calculate_crc8(&self.0[..7]),
                actual: self.0[7],
            })
        }
    }
}

impl FromStr for ProbeAddress {
    type Err = Error;

    /// Parse 16 hex digits, case-insensitive. Separators are not accepted.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidParameter {
            name: "probe address".to_string(),
            value: s.to_string(),
        };

        let s = s.trim();
        if s.len() != 16 || !s.is_ascii() {
            return Err(invalid());
        }

        let mut bytes = [0u8; 8];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for ProbeAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ProbeAddress> for String {
    fn from(address: ProbeAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for ProbeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ProbeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProbeAddress({})", self)
    }
}

/// A configured probe: where it is on the bus and what it measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeChannel {
    /// ROM code on the one-wire bus.
    pub address: ProbeAddress,
    /// Semantic role.
    pub role: ProbeRole,
}

impl ProbeChannel {
    /// Create a new channel.
    pub fn new(role: ProbeRole, address: ProbeAddress) -> Self {
        Self { address, role }
    }
}

impl fmt::Display for ProbeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.role, self.address)
    }
}
