//! Scripted collaborators shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::data::ProbeAddress;
use crate::error::{Error, Result};
use crate::network::{NetworkCandidate, WifiRadio};
use crate::notify::{AlertMessage, MailTransport};
use crate::probe::ProbeDriver;

/// How a scripted network answers an association attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Accept,
    Reject,
    /// Never answers.
    Hang,
    /// Rejects the first `n` attempts, then accepts.
    AcceptAfter(u32),
}

/// Radio whose networks answer according to a script.
#[derive(Default)]
pub struct ScriptedRadio {
    script: Mutex<HashMap<String, Behaviour>>,
    tries: Mutex<HashMap<String, u32>>,
    attempts: Mutex<Vec<String>>,
    link_up: Mutex<bool>,
    disassociate_hangs: Mutex<bool>,
}

impl ScriptedRadio {
    pub fn new<'a>(script: impl IntoIterator<Item = (&'a str, Behaviour)>) -> Self {
        let radio = Self::default();
        for (ssid, behaviour) in script {
            radio.set(ssid, behaviour);
        }
        radio
    }

    /// Change how `ssid` answers from now on.
    pub fn set(&self, ssid: &str, behaviour: Behaviour) {
        self.script.lock().insert(ssid.to_string(), behaviour);
    }

    /// Simulate the access point going away or coming back.
    pub fn set_link_up(&self, up: bool) {
        *self.link_up.lock() = up;
    }

    /// Make disassociation never answer.
    pub fn set_disassociate_hangs(&self, hangs: bool) {
        *self.disassociate_hangs.lock() = hangs;
    }

    /// SSIDs in the order they were tried.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl WifiRadio for ScriptedRadio {
    async fn associate(&self, candidate: &NetworkCandidate) -> Result<()> {
        self.attempts.lock().push(candidate.ssid.clone());
        let behaviour = self
            .script
            .lock()
            .get(&candidate.ssid)
            .copied()
            .unwrap_or(Behaviour::Reject);

        let tries = {
            let mut tries = self.tries.lock();
            let count = tries.entry(candidate.ssid.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let accept = match behaviour {
            Behaviour::Accept => true,
            Behaviour::Reject => false,
            Behaviour::Hang => std::future::pending().await,
            Behaviour::AcceptAfter(n) => tries > n,
        };

        if accept {
            *self.link_up.lock() = true;
            Ok(())
        } else {
            Err(Error::AssociationRejected {
                ssid: candidate.ssid.clone(),
                reason: "authentication failed".to_string(),
            })
        }
    }

    async fn disassociate(&self) -> Result<()> {
        let hangs = *self.disassociate_hangs.lock();
        if hangs {
            std::future::pending::<()>().await;
        }
        *self.link_up.lock() = false;
        Ok(())
    }

    async fn is_link_up(&self) -> bool {
        *self.link_up.lock()
    }
}

#[derive(Debug, Clone, Copy)]
enum TransportMode {
    Deliver,
    Fail,
    Hang,
    Delay(Duration),
}

/// Transport that records what it delivers.
pub struct RecordingTransport {
    mode: Mutex<TransportMode>,
    messages: Mutex<Vec<AlertMessage>>,
    calls: Mutex<u32>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::with_mode(TransportMode::Deliver)
    }
}

impl RecordingTransport {
    fn with_mode(mode: TransportMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            messages: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        }
    }

    /// Every delivery fails.
    pub fn failing() -> Self {
        Self::with_mode(TransportMode::Fail)
    }

    /// Every delivery blocks forever.
    pub fn hanging() -> Self {
        Self::with_mode(TransportMode::Hang)
    }

    /// Every delivery succeeds after `delay`.
    pub fn delayed(delay: Duration) -> Self {
        Self::with_mode(TransportMode::Delay(delay))
    }

    /// Switch between failing and delivering.
    pub fn set_failing(&self, failing: bool) {
        *self.mode.lock() = if failing {
            TransportMode::Fail
        } else {
            TransportMode::Deliver
        };
    }

    /// Messages delivered so far.
    pub fn messages(&self) -> Vec<AlertMessage> {
        self.messages.lock().clone()
    }

    /// Delivery attempts so far, successful or not.
    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn deliver(&self, message: &AlertMessage) -> Result<()> {
        *self.calls.lock() += 1;
        let mode = *self.mode.lock();
        match mode {
            TransportMode::Deliver => {}
            TransportMode::Fail => {
                return Err(Error::Internal("connection reset by server".to_string()))
            }
            TransportMode::Hang => std::future::pending::<()>().await,
            TransportMode::Delay(delay) => tokio::time::sleep(delay).await,
        }
        self.messages.lock().push(message.clone());
        Ok(())
    }
}

/// Probe driver returning fixed readings per address. Unknown addresses
/// and addresses set to `None` fail to read.
#[derive(Default)]
pub struct ScriptedDriver {
    readings: Mutex<HashMap<ProbeAddress, Option<f64>>>,
}

impl ScriptedDriver {
    pub fn set(&self, address: ProbeAddress, reading: Option<f64>) {
        self.readings.lock().insert(address, reading);
    }
}

#[async_trait]
impl ProbeDriver for ScriptedDriver {
    async fn read_celsius(&self, address: &ProbeAddress) -> Result<f64> {
        let reading = self.readings.lock().get(address).copied().flatten();
        reading.ok_or_else(|| Error::SensorRead {
            address: address.to_string(),
            reason: "no presence pulse".to_string(),
        })
    }
}
