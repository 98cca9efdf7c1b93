//! CRC calculation for one-wire ROM codes and scratchpads.
//!
//! Uses the Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1,
//! reflected form 0x8C, initial value 0x00) as specified for the
//! DS18B20 family of temperature sensors.

/// Reflected Dallas/Maxim polynomial.
const CRC_POLYNOMIAL: u8 = 0x8C;

/// Initial CRC value
const CRC_INITIAL: u8 = 0x00;

/// Calculate the Dallas/Maxim CRC-8 over `data`.
///
/// # Example
///
/// ```
/// use hottub_probes::protocol::calculate_crc8;
///
/// // ROM code from Maxim application note 27 (family 0x02).
/// let rom = [0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00];
/// assert_eq!(calculate_crc8(&rom), 0xA2);
/// ```
pub fn calculate_crc8(data: &[u8]) -> u8 {
    let mut crc = CRC_INITIAL;

    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x01 != 0 {
                crc = (crc >> 1) ^ CRC_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Verify that data whose last byte is its CRC-8 is intact.
///
/// # Returns
///
/// `true` if the CRC is valid, `false` otherwise (including for inputs
/// shorter than two bytes).
pub fn verify_crc8(data: &[u8]) -> bool {
    match data.split_last() {
        Some((&actual, payload)) if !payload.is_empty() => calculate_crc8(payload) == actual,
        _ => false,
    }
}
