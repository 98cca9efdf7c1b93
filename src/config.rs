//! Monitor configuration.
//!
//! Configuration is read from a TOML file and then overlaid with
//! environment variables for the SMTP identity and secrets, so that
//! credentials never need to live in the file.
//!
//! | Variable               | Overrides                |
//! |------------------------|--------------------------|
//! | `SMTP_HOST`            | `smtp.host`              |
//! | `SMTP_PORT`            | `smtp.port`              |
//! | `SMTP_AUTH_EMAIL`      | `smtp.auth_email`        |
//! | `SMTP_AUTH_CREDENTIAL` | `smtp.auth_credential`   |
//! | `SMTP_RECIPIENT_EMAIL` | `smtp.recipient_email`   |

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::data::{ProbeAddress, ProbeChannel, ProbeRole, ThresholdTable};
use crate::error::{Error, Result};
use crate::network::NetworkCandidate;

/// Default SMTP port (implicit TLS).
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Default SMTP host.
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Complete monitor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Device identity.
    #[serde(default)]
    pub device: DeviceSettings,
    /// WiFi candidates in priority order.
    pub networks: Vec<NetworkCandidate>,
    /// Probe ROM codes by role.
    pub probes: ProbeTable,
    /// Alert limits by role.
    #[serde(default)]
    pub thresholds: ThresholdTable,
    /// Debounce, cooldown and retry tuning.
    #[serde(default)]
    pub alerting: AlertSettings,
    /// Association timing.
    #[serde(rename = "network", default)]
    pub network_settings: NetworkSettings,
    /// Poll loop timing.
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Mail server and addresses.
    pub smtp: SmtpConfig,
}

impl MonitorConfig {
    /// Read, parse, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without validating it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay SMTP settings from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay SMTP settings from an arbitrary lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SMTP_HOST") {
            debug!("SMTP host overridden from environment");
            self.smtp.host = host;
        }
        if let Some(port) = lookup("SMTP_PORT") {
            self.smtp.port = port
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("SMTP_PORT '{}' is not a port", port)))?;
        }
        if let Some(email) = lookup("SMTP_AUTH_EMAIL") {
            self.smtp.auth_email = email;
        }
        if let Some(credential) = lookup("SMTP_AUTH_CREDENTIAL") {
            debug!("SMTP credential taken from environment");
            self.smtp.auth_credential = credential;
        }
        if let Some(recipient) = lookup("SMTP_RECIPIENT_EMAIL") {
            self.smtp.recipient_email = recipient;
        }
        Ok(())
    }

    /// Reject configurations the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            return Err(Error::config("at least one network candidate is required"));
        }
        for (i, candidate) in self.networks.iter().enumerate() {
            if candidate.ssid.trim().is_empty() {
                return Err(Error::config(format!("network #{} has an empty ssid", i + 1)));
            }
        }

        self.probes.validate()?;
        self.thresholds.validate()?;
        self.alerting.validate()?;
        self.network_settings.validate()?;
        self.monitor.validate()?;
        self.smtp.validate()?;

        Ok(())
    }

    /// Configured probes in polling order.
    pub fn channels(&self) -> Vec<ProbeChannel> {
        self.probes.channels()
    }
}

/// Device identity used in messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSettings {
    /// Name shown in email subjects.
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Hot Tub".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: default_device_name(),
        }
    }
}

/// One-wire ROM code for each probe role.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeTable {
    /// Air probe.
    pub air: ProbeAddress,
    /// Water probe.
    pub water: ProbeAddress,
    /// Enclosure probe.
    pub enclosure: ProbeAddress,
}

impl ProbeTable {
    /// Address for a role.
    pub fn address(&self, role: ProbeRole) -> ProbeAddress {
        match role {
            ProbeRole::Air => self.air,
            ProbeRole::Water => self.water,
            ProbeRole::Enclosure => self.enclosure,
        }
    }

    /// All channels in polling order.
    pub fn channels(&self) -> Vec<ProbeChannel> {
        ProbeRole::ALL
            .iter()
            .map(|&role| ProbeChannel::new(role, self.address(role)))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for channel in self.channels() {
            channel.address.validate().map_err(|e| {
                Error::config(format!("{} probe address {}: {}", channel.role, channel.address, e))
            })?;
            if !channel.address.is_temperature_sensor() {
                warn!(
                    "{} probe {} has unknown family code {:#04x}",
                    channel.role,
                    channel.address,
                    channel.address.family_code()
                );
            }
            if !seen.insert(channel.address) {
                return Err(Error::config(format!(
                    "probe address {} is assigned to more than one role",
                    channel.address
                )));
            }
        }
        Ok(())
    }
}

/// Alert decision tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AlertSettings {
    /// Consecutive breaching reads before an alert is raised.
    pub debounce_count: u32,
    /// Consecutive in-band reads before an alert is cleared.
    pub recovery_count: u32,
    /// Seconds after a delivered alert before a still-breaching probe re-alerts.
    pub cooldown_secs: u64,
    /// Failed deliveries tolerated before an alert is suppressed.
    pub max_delivery_retries: u32,
    /// Mail a notice when a delivered alert clears. Sent once, never
    /// retried.
    pub recovery_notice: bool,
}

impl AlertSettings {
    /// Cooldown as a duration.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.debounce_count == 0 {
            return Err(Error::config("alerting.debounce_count must be at least 1"));
        }
        if self.recovery_count == 0 {
            return Err(Error::config("alerting.recovery_count must be at least 1"));
        }
        if self.max_delivery_retries == 0 {
            return Err(Error::config(
                "alerting.max_delivery_retries must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            debounce_count: 3,
            recovery_count: 2,
            cooldown_secs: 3600,
            max_delivery_retries: 3,
            recovery_notice: true,
        }
    }
}

/// Association timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NetworkSettings {
    /// Upper bound on a single association attempt, in seconds.
    pub candidate_timeout_secs: u64,
    /// Delay after the first failed sweep, in seconds.
    pub backoff_initial_secs: u64,
    /// Ceiling for the sweep backoff, in seconds.
    pub backoff_max_secs: u64,
    /// How often a connected link is checked, in seconds.
    pub link_check_secs: u64,
}

impl NetworkSettings {
    /// Per-candidate timeout.
    pub fn candidate_timeout(&self) -> Duration {
        Duration::from_secs(self.candidate_timeout_secs)
    }

    /// Initial sweep backoff.
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_secs(self.backoff_initial_secs)
    }

    /// Backoff ceiling.
    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    /// Link check period.
    pub fn link_check(&self) -> Duration {
        Duration::from_secs(self.link_check_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.candidate_timeout_secs == 0 {
            return Err(Error::config("network.candidate_timeout_secs must be positive"));
        }
        if self.backoff_initial_secs == 0 {
            return Err(Error::config("network.backoff_initial_secs must be positive"));
        }
        if self.backoff_max_secs < self.backoff_initial_secs {
            return Err(Error::config(
                "network.backoff_max_secs is below network.backoff_initial_secs",
            ));
        }
        if self.link_check_secs == 0 {
            return Err(Error::config("network.link_check_secs must be positive"));
        }
        Ok(())
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            candidate_timeout_secs: 10,
            backoff_initial_secs: 1,
            backoff_max_secs: 30,
            link_check_secs: 15,
        }
    }
}

/// Poll loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MonitorSettings {
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Upper bound on a single probe read, in milliseconds.
    pub read_timeout_ms: u64,
    /// Read all probes at once instead of one after another.
    pub concurrent_reads: bool,
    /// Alerts that may wait for the notifier before new ones are held back.
    pub queue_capacity: usize,
}

impl MonitorSettings {
    /// Poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Probe read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::config("monitor.poll_interval_secs must be positive"));
        }
        if self.read_timeout_ms == 0 {
            return Err(Error::config("monitor.read_timeout_ms must be positive"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config("monitor.queue_capacity must be positive"));
        }
        Ok(())
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            read_timeout_ms: 2000,
            concurrent_reads: false,
            queue_capacity: 16,
        }
    }
}

/// Mail server and addresses.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    #[serde(default = "default_smtp_host")]
    pub host: String,
    /// SMTP server port. 465 uses implicit TLS, anything else STARTTLS.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Account the alerts are sent from.
    #[serde(default)]
    pub auth_email: String,
    /// Application key or password for `auth_email`.
    #[serde(default)]
    pub auth_credential: String,
    /// Single address alerts are sent to.
    #[serde(default)]
    pub recipient_email: String,
    /// Upper bound on one delivery, in seconds.
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

fn default_smtp_host() -> String {
    DEFAULT_SMTP_HOST.to_string()
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_smtp_timeout() -> u64 {
    30
}

impl SmtpConfig {
    /// Delivery timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether the port uses TLS from the first byte.
    pub fn implicit_tls(&self) -> bool {
        self.port == DEFAULT_SMTP_PORT
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("smtp.host is empty"));
        }
        if self.port == 0 {
            return Err(Error::config("smtp.port must be positive"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("smtp.timeout_secs must be positive"));
        }
        for (field, value) in [
            ("smtp.auth_email", &self.auth_email),
            ("smtp.recipient_email", &self.recipient_email),
        ] {
            value
                .parse::<lettre::Address>()
                .map_err(|e| Error::config(format!("{} '{}': {}", field, value, e)))?;
        }
        if self.auth_credential.is_empty() {
            warn!("smtp.auth_credential is empty; the server will likely reject the login");
        }
        Ok(())
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth_email", &self.auth_email)
            .field("auth_credential", &"<redacted>")
            .field("recipient_email", &self.recipient_email)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
