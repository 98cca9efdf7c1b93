//! Network candidate definition.

use serde::Deserialize;
use std::fmt;

/// One configured WiFi network.
///
/// Candidates are loaded once at startup and never mutated. Their order
/// in the configuration is their association priority.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkCandidate {
    /// Network name.
    pub ssid: String,
    /// WPA passphrase. Empty for open networks.
    #[serde(default)]
    pub passphrase: String,
}

impl NetworkCandidate {
    /// Create a new candidate.
    pub fn new(ssid: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Whether the network needs no passphrase.
    pub fn is_open(&self) -> bool {
        self.passphrase.is_empty()
    }
}

impl fmt::Debug for NetworkCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCandidate")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
