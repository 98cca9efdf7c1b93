//! Temperature threshold data structures.
//!
//! Each probe role has its own band. A band may have a high limit, a low
//! limit, or both. Leaving the band is a breach; coming back requires
//! clearing the limit by the hysteresis margin.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::channel::ProbeRole;
use crate::error::{Error, Result};

/// Which side of the band a breach is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreachDirection {
    /// Above the high limit.
    Above,
    /// Below the low limit.
    Below,
}

impl fmt::Display for BreachDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => write!(f, "above"),
            Self::Below => write!(f, "below"),
        }
    }
}

/// Where a value falls relative to a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Outside the band.
    Breach(BreachDirection),
    /// Inside the band but within the hysteresis margin of a limit.
    DeadBand,
    /// Inside the band by at least the hysteresis margin.
    Within,
}

/// Alert limits for one probe role, in Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdBand {
    /// Alert when the value exceeds this.
    #[serde(default)]
    pub high: Option<f64>,
    /// Alert when the value drops under this.
    #[serde(default)]
    pub low: Option<f64>,
    /// Margin a value must clear the limit by to count as recovered.
    #[serde(default)]
    pub hysteresis: f64,
}

impl ThresholdBand {
    /// Band with only a high limit.
    pub fn above(high: f64, hysteresis: f64) -> Self {
        Self {
            high: Some(high),
            low: None,
            hysteresis,
        }
    }

    /// Band with only a low limit.
    pub fn below(low: f64, hysteresis: f64) -> Self {
        Self {
            high: None,
            low: Some(low),
            hysteresis,
        }
    }

    /// Band with both limits.
    pub fn between(low: f64, high: f64, hysteresis: f64) -> Self {
        Self {
            high: Some(high),
            low: Some(low),
            hysteresis,
        }
    }

    /// Classify a value against this band.
    ///
    /// Comparisons are strict at the limit: a value equal to `high`
    /// is not a breach.
    pub fn zone(&self, celsius: f64) -> Zone {
        if let Some(direction) = self.breach_direction(celsius) {
            return Zone::Breach(direction);
        }

        let clear_of_high = self.high.map_or(true, |h| celsius <= h - self.hysteresis);
        let clear_of_low = self.low.map_or(true, |l| celsius >= l + self.hysteresis);

        if clear_of_high && clear_of_low {
            Zone::Within
        } else {
            Zone::DeadBand
        }
    }

    /// Direction of the breach, if `celsius` is outside the band.
    pub fn breach_direction(&self, celsius: f64) -> Option<BreachDirection> {
        if self.high.is_some_and(|h| celsius > h) {
            Some(BreachDirection::Above)
        } else if self.low.is_some_and(|l| celsius < l) {
            Some(BreachDirection::Below)
        } else {
            None
        }
    }

    /// The limit crossed in `direction`.
    pub fn limit(&self, direction: BreachDirection) -> Option<f64> {
        match direction {
            BreachDirection::Above => self.high,
            BreachDirection::Below => self.low,
        }
    }

    /// Check that the band is usable.
    pub fn validate(&self, role: ProbeRole) -> Result<()> {
        let finite = |v: Option<f64>| v.map_or(true, f64::is_finite);
        if !finite(self.high) || !finite(self.low) || !self.hysteresis.is_finite() {
            return Err(Error::config(format!("{} threshold is not a number", role)));
        }
        if self.high.is_none() && self.low.is_none() {
            return Err(Error::config(format!(
                "{} threshold needs a high or low limit",
                role
            )));
        }
        if self.hysteresis < 0.0 {
            return Err(Error::config(format!(
                "{} hysteresis must not be negative",
                role
            )));
        }
        if let (Some(low), Some(high)) = (self.low, self.high) {
            if low >= high {
                return Err(Error::config(format!(
                    "{} low limit {} is not below high limit {}",
                    role, low, high
                )));
            }
            if low + self.hysteresis > high - self.hysteresis {
                return Err(Error::config(format!(
                    "{} hysteresis {} leaves no recovery zone",
                    role, self.hysteresis
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ThresholdBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.low, self.high) {
            (Some(low), Some(high)) => write!(f, "{:.1}°C to {:.1}°C", low, high)?,
            (None, Some(high)) => write!(f, "at most {:.1}°C", high)?,
            (Some(low), None) => write!(f, "at least {:.1}°C", low)?,
            (None, None) => write!(f, "unbounded")?,
        }
        write!(f, " (hysteresis {:.1}°C)", self.hysteresis)
    }
}

/// Threshold band for every probe role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdTable {
    /// Air probe band.
    pub air: ThresholdBand,
    /// Water probe band.
    pub water: ThresholdBand,
    /// Enclosure probe band.
    pub enclosure: ThresholdBand,
}

impl ThresholdTable {
    /// Band for a role.
    pub fn band(&self, role: ProbeRole) -> &ThresholdBand {
        match role {
            ProbeRole::Air => &self.air,
            ProbeRole::Water => &self.water,
            ProbeRole::Enclosure => &self.enclosure,
        }
    }

    /// Validate every band.
    pub fn validate(&self) -> Result<()> {
        for role in ProbeRole::ALL {
            self.band(role).validate(role)?;
        }
        Ok(())
    }
}

impl Default for ThresholdTable {
    /// Freeze protection for air, scald protection for water, and an
    /// operating window for the equipment enclosure.
    fn default() -> Self {
        Self {
            air: ThresholdBand::below(0.0, 0.5),
            water: ThresholdBand::between(10.0, 40.0, 0.5),
            enclosure: ThresholdBand::between(2.0, 50.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_high_only() {
        let band = ThresholdBand::above(40.0, 0.5);
        assert_eq!(band.zone(41.0), Zone::Breach(BreachDirection::Above));
        assert_eq!(band.zone(40.0), Zone::DeadBand);
        assert_eq!(band.zone(39.6), Zone::DeadBand);
        assert_eq!(band.zone(39.5), Zone::Within);
        assert_eq!(band.zone(-50.0), Zone::Within);
    }

    #[test]
    fn test_zone_band() {
        let band = ThresholdBand::between(2.0, 50.0, 1.0);
        assert_eq!(band.zone(1.9), Zone::Breach(BreachDirection::Below));
        assert_eq!(band.zone(2.5), Zone::DeadBand);
        assert_eq!(band.zone(25.0), Zone::Within);
        assert_eq!(band.zone(49.5), Zone::DeadBand);
        assert_eq!(band.zone(50.1), Zone::Breach(BreachDirection::Above));
    }

    #[test]
    fn test_limit_lookup() {
        let band = ThresholdBand::between(2.0, 50.0, 1.0);
        assert_eq!(band.limit(BreachDirection::Above), Some(50.0));
        assert_eq!(band.limit(BreachDirection::Below), Some(2.0));
        assert_eq!(ThresholdBand::above(40.0, 0.0).limit(BreachDirection::Below), None);
    }

    #[test]
    fn test_validate() {
        assert!(ThresholdBand::above(40.0, 0.5).validate(ProbeRole::Water).is_ok());
        assert!(ThresholdBand::default().validate(ProbeRole::Air).is_err());
        assert!(ThresholdBand::between(50.0, 2.0, 0.0)
            .validate(ProbeRole::Enclosure)
            .is_err());
        assert!(ThresholdBand::between(2.0, 4.0, 1.5)
            .validate(ProbeRole::Enclosure)
            .is_err());
        assert!(ThresholdBand::above(40.0, -0.5).validate(ProbeRole::Water).is_err());
        assert!(ThresholdBand::above(f64::NAN, 0.5).validate(ProbeRole::Water).is_err());
    }

    #[test]
    fn test_default_table_is_valid() {
        assert!(ThresholdTable::default().validate().is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ThresholdBand::above(40.0, 0.5).to_string(),
            "at most 40.0°C (hysteresis 0.5°C)"
        );
        assert_eq!(
            ThresholdBand::between(2.0, 50.0, 1.0).to_string(),
            "2.0°C to 50.0°C (hysteresis 1.0°C)"
        );
    }
}
