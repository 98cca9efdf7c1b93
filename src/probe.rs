//! Probe reading.
//!
//! [`ProbeReader`] wraps whatever one-wire driver the board provides and
//! turns every read, successful or not, into a [`TemperatureSample`].

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::data::{ProbeAddress, ProbeChannel, TemperatureSample};
use crate::error::{Error, Result};
use crate::protocol::Scratchpad;

/// Value the common Arduino driver reports for a probe that did not answer.
pub const DEVICE_DISCONNECTED_C: f64 = -127.0;

/// A driver that can read a temperature from a probe by address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProbeDriver: Send + Sync {
    /// Read the probe at `address`, in Celsius.
    async fn read_celsius(&self, address: &ProbeAddress) -> Result<f64>;
}

/// Raw one-wire bus access, for boards that expose the bus rather than a
/// finished temperature driver.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OneWireBus: Send + Sync {
    /// Select `address` and issue CONVERT T, returning once conversion is done.
    async fn convert(&self, address: &ProbeAddress) -> Result<()>;

    /// Select `address` and issue READ SCRATCHPAD.
    async fn read_scratchpad(&self, address: &ProbeAddress) -> Result<[u8; 9]>;
}

/// [`ProbeDriver`] for DS18B20 probes on a [`OneWireBus`].
pub struct Ds18b20Driver<B> {
    bus: B,
}

impl<B: OneWireBus> Ds18b20Driver<B> {
    /// Create a driver over `bus`.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl<B: OneWireBus> ProbeDriver for Ds18b20Driver<B> {
    async fn read_celsius(&self, address: &ProbeAddress) -> Result<f64> {
        self.bus.convert(address).await?;
        let data = self.bus.read_scratchpad(address).await?;
        let scratchpad = Scratchpad::parse(&data)?;

        // 85°C straight after power-up means the conversion never ran.
        if scratchpad.is_power_on_reset() {
            return Err(Error::InvalidData {
                context: format!("{} still holds the power-on reset value", address),
            });
        }

        Ok(scratchpad.celsius())
    }
}

/// Reads configured probes with a bounded timeout per read.
#[derive(Clone)]
pub struct ProbeReader {
    /// Board driver.
    driver: Arc<dyn ProbeDriver>,
    /// Upper bound on one read.
    read_timeout: Duration,
}

impl ProbeReader {
    /// Create a reader over `driver`.
    pub fn new(driver: Arc<dyn ProbeDriver>, read_timeout: Duration) -> Self {
        Self {
            driver,
            read_timeout,
        }
    }

    /// Read one probe. Failures produce an invalid sample.
    pub async fn read(&self, channel: &ProbeChannel) -> TemperatureSample {
        let result = self.try_read(channel).await;
        let now = tokio::time::Instant::now().into_std();

        match result {
            Ok(celsius) => {
                debug!("{} probe read {:.2}°C", channel.role, celsius);
                TemperatureSample::at(*channel, celsius, now)
            }
            Err(e) => {
                warn!("{} probe read failed: {}", channel.role, e);
                TemperatureSample::invalid_at(*channel, now)
            }
        }
    }

    /// Read one probe, surfacing the failure.
    pub async fn try_read(&self, channel: &ProbeChannel) -> Result<f64> {
        let celsius = tokio::time::timeout(
            self.read_timeout,
            self.driver.read_celsius(&channel.address),
        )
        .await
        .map_err(|_| Error::SensorTimeout {
            address: channel.address.to_string(),
        })??;

        if !celsius.is_finite() || celsius <= DEVICE_DISCONNECTED_C {
            return Err(Error::SensorRead {
                address: channel.address.to_string(),
                reason: format!("driver reported {}", celsius),
            });
        }

        Ok(celsius)
    }

    /// Read every channel, one after another or all at once.
    ///
    /// Samples come back in the order of `channels` either way.
    pub async fn read_all(
        &self,
        channels: &[ProbeChannel],
        concurrent: bool,
    ) -> Vec<TemperatureSample> {
        if concurrent {
            join_all(channels.iter().map(|channel| self.read(channel))).await
        } else {
            let mut samples = Vec::with_capacity(channels.len());
            for channel in channels {
                samples.push(self.read(channel).await);
            }
            samples
        }
    }
}

impl std::fmt::Debug for ProbeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeReader")
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
