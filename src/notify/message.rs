//! Alert email composition.

use crate::alert::Decision;
use crate::data::{TemperatureSample, ThresholdBand};
use crate::utils::format_temperature;

/// Subject and plain-text body of one alert email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl AlertMessage {
    /// Compose the message for `decision` about `sample`.
    ///
    /// Returns `None` when there is nothing to say: a `None` decision or an
    /// invalid sample.
    pub fn compose(
        device_name: &str,
        decision: Decision,
        sample: &TemperatureSample,
        band: &ThresholdBand,
    ) -> Option<Self> {
        let celsius = sample.celsius()?;
        let role = sample.probe.role;
        let reading = format_temperature(celsius);
        let recorded = sample.recorded_at.format("%Y-%m-%d %H:%M:%S UTC");

        let (subject, summary) = match decision {
            Decision::None => return None,
            Decision::RaiseAlert => {
                let direction = band.breach_direction(celsius)?;
                let limit = band.limit(direction)?;
                (
                    format!(
                        "[{}] {} temperature {} limit: {}",
                        device_name,
                        role.name(),
                        direction,
                        reading
                    ),
                    format!(
                        "The {} probe read {}, {} the {} limit.",
                        role.name().to_lowercase(),
                        reading,
                        direction,
                        format_temperature(limit)
                    ),
                )
            }
            Decision::ClearAlert => (
                format!(
                    "[{}] {} temperature back to normal: {}",
                    device_name,
                    role.name(),
                    reading
                ),
                format!(
                    "The {} probe read {} and is back within limits.",
                    role.name().to_lowercase(),
                    reading
                ),
            ),
        };

        let body = format!(
            "{}\n\nAllowed range: {}\nRecorded: {}\nProbe: {}\n",
            summary, band, recorded, sample.probe.address
        );

        Some(Self { subject, body })
    }
}
