//! Utility functions for the hottub-probes crate.

use std::time::Duration;

/// Convert Celsius to Fahrenheit.
///
/// # Example
///
/// ```
/// use hottub_probes::celsius_to_fahrenheit;
///
/// let fahrenheit = celsius_to_fahrenheit(40.0);
/// assert!((fahrenheit - 104.0).abs() < 0.001);
/// ```
#[inline]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert Fahrenheit to Celsius.
#[inline]
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Delay before sweep number `sweep` (0-based) when every earlier sweep failed.
///
/// Doubles from `initial` and saturates at `cap`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hottub_probes::utils::backoff_delay;
///
/// let initial = Duration::from_secs(1);
/// let cap = Duration::from_secs(30);
/// assert_eq!(backoff_delay(0, initial, cap), Duration::from_secs(1));
/// assert_eq!(backoff_delay(3, initial, cap), Duration::from_secs(8));
/// assert_eq!(backoff_delay(10, initial, cap), cap);
/// ```
pub fn backoff_delay(sweep: u32, initial: Duration, cap: Duration) -> Duration {
    let factor = 1u32.checked_shl(sweep.min(31)).unwrap_or(u32::MAX);
    initial.saturating_mul(factor).min(cap)
}

/// Format a temperature as `"40.0°C (104.0°F)"`.
pub fn format_temperature(celsius: f64) -> String {
    format!("{:.1}°C ({:.1}°F)", celsius, celsius_to_fahrenheit(celsius))
}
