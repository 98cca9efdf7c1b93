// Allow derivable impls for clarity
#![allow(clippy::derivable_impls)]

//! # hottub-probes
//!
//! Temperature monitoring and email alerting for a hot tub fitted with
//! three one-wire probes (air, water and equipment enclosure) on a WiFi
//! connected controller.
//!
//! ## Features
//!
//! - **Network Failover**: Cycle through configured WiFi networks with
//!   bounded per-network timeouts and capped exponential backoff
//! - **Debounced Alerts**: Alert only after several consecutive out-of-range
//!   reads, clear only after several in-range reads past a hysteresis margin
//! - **Duplicate Suppression**: One email per episode, with a cooldown before
//!   a persistent breach alerts again
//! - **Bounded Retries**: Failed deliveries retry each cycle up to a cap,
//!   then the alert is suppressed until the probe recovers
//! - **DS18B20 Support**: ROM code and scratchpad CRC checking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hottub_probes::{Monitor, MonitorConfig, ProbeDriver, Result, SmtpMailer, WifiRadio};
//!
//! async fn run(driver: Arc<dyn ProbeDriver>, radio: Arc<dyn WifiRadio>) -> Result<()> {
//!     let config = MonitorConfig::load("monitor.toml")?;
//!     let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);
//!
//!     let monitor = Monitor::new(config, driver, radio, mailer)?;
//!     monitor.start();
//!
//!     tokio::signal::ctrl_c().await?;
//!     monitor.shutdown().await
//! }
//! ```
//!
//! The board supplies two drivers: a [`ProbeDriver`] that reads a probe by
//! ROM code (or a [`OneWireBus`] wrapped in [`Ds18b20Driver`]) and a
//! [`WifiRadio`] that associates with a network.
//!
//! ## Configuration
//!
//! See [`config`] for the file layout and the `SMTP_*` environment
//! variables that override it.

// Public modules
pub mod alert;
pub mod config;
pub mod data;
pub mod error;
pub mod monitor;
pub mod network;
pub mod notify;
pub mod probe;
pub mod protocol;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use alert::{AlertPolicy, AlertState, AlertStatus, Decision};
pub use config::MonitorConfig;
pub use error::{Error, FailureClass, Result};
pub use monitor::{LoopPhase, Monitor, MonitorLoop, MonitorStatus};
pub use network::{ConnectionState, ConnectionStatus, NetworkCandidate, NetworkSelector, WifiRadio};
pub use notify::{AlertMessage, DeliveryResult, MailTransport, Notifier, SmtpMailer};
pub use probe::{Ds18b20Driver, OneWireBus, ProbeDriver, ProbeReader};
pub use utils::{celsius_to_fahrenheit, fahrenheit_to_celsius};

// Re-export commonly used types from submodules
pub use data::{
    BreachDirection, ProbeAddress, ProbeChannel, ProbeRole, TemperatureSample, ThresholdBand,
    ThresholdTable,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<Monitor>();
        let _ = std::any::TypeId::of::<MonitorConfig>();
        let _ = std::any::TypeId::of::<NetworkSelector>();
        let _ = std::any::TypeId::of::<AlertPolicy>();
        let _ = std::any::TypeId::of::<Notifier>();
        let _ = std::any::TypeId::of::<SmtpMailer>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<TemperatureSample>();
    }

    #[test]
    fn test_temperature_conversion() {
        assert!((celsius_to_fahrenheit(40.0) - 104.0).abs() < 0.001);
        assert!((fahrenheit_to_celsius(104.0) - 40.0).abs() < 0.001);
    }
}
