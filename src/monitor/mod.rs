//! Monitor wiring and lifecycle.
//!
//! [`Monitor`] builds every component from a [`MonitorConfig`] and runs
//! them as three tasks: the network supervisor, the notifier worker and
//! the [`MonitorLoop`].

pub mod cycle;

pub use cycle::{CycleReport, LoopPhase, MonitorLoop, MonitorStatus};

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert::{AlertPolicy, AlertState};
use crate::config::MonitorConfig;
use crate::data::ProbeRole;
use crate::error::Result;
use crate::network::{ConnectionEvent, ConnectionState, NetworkSelector, WifiRadio};
use crate::notify::{AlertJob, DeliveryReport, MailTransport, Notifier};
use crate::probe::{ProbeDriver, ProbeReader};

/// Parts that are moved into tasks on start.
struct Pending {
    monitor_loop: MonitorLoop,
    jobs: mpsc::Receiver<AlertJob>,
    reports: mpsc::Sender<DeliveryReport>,
}

/// A fully wired hot tub monitor.
pub struct Monitor {
    /// Validated configuration.
    config: MonitorConfig,
    /// Owner of the connection state.
    selector: Arc<NetworkSelector>,
    /// Mail sender.
    notifier: Arc<Notifier>,
    /// Status snapshots from the loop.
    status_rx: watch::Receiver<MonitorStatus>,
    /// Loop and channel ends, until started.
    pending: Mutex<Option<Pending>>,
    /// Running task handles.
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Stops every task.
    cancel: CancellationToken,
}

impl Monitor {
    /// Validate `config` and wire the monitor around the given drivers.
    ///
    /// Nothing runs until [`Monitor::start`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConfigurationInvalid`] if the configuration
    /// is unusable.
    pub fn new(
        config: MonitorConfig,
        driver: Arc<dyn ProbeDriver>,
        radio: Arc<dyn WifiRadio>,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let selector = Arc::new(NetworkSelector::new(
            config.networks.clone(),
            radio,
            config.network_settings,
        )?);

        let notifier = Arc::new(Notifier::new(
            selector.clone(),
            transport,
            config.device.name.clone(),
            config.thresholds,
            config.smtp.timeout(),
        ));

        let (job_tx, job_rx) = mpsc::channel(config.monitor.queue_capacity);
        let (report_tx, report_rx) = mpsc::channel(config.monitor.queue_capacity);

        let monitor_loop = MonitorLoop::new(
            ProbeReader::new(driver, config.monitor.read_timeout()),
            config.channels(),
            AlertPolicy::new(config.thresholds, config.alerting),
            config.monitor,
            job_tx,
            report_rx,
        );
        let status_rx = monitor_loop.subscribe();

        Ok(Self {
            config,
            selector,
            notifier,
            status_rx,
            pending: Mutex::new(Some(Pending {
                monitor_loop,
                jobs: job_rx,
                reports: report_tx,
            })),
            tasks: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Spawn the supervisor, notifier and loop tasks.
    ///
    /// Calling this again is a no-op.
    pub fn start(&self) {
        let Some(Pending {
            monitor_loop,
            jobs,
            reports,
        }) = self.pending.lock().take()
        else {
            debug!("Monitor already started");
            return;
        };

        info!(
            "Starting monitor '{}' with {} networks",
            self.config.device.name,
            self.config.networks.len()
        );

        let supervisor = {
            let selector = self.selector.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move { selector.maintain(cancel).await })
        };

        let worker = {
            let notifier = self.notifier.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move { notifier.run(jobs, reports, cancel).await })
        };

        let control = tokio::spawn(monitor_loop.run(self.cancel.clone()));

        self.tasks.lock().extend([supervisor, worker, control]);
    }

    /// Stop polling, let any in-flight delivery finish, then drop the
    /// network.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down monitor");
        self.cancel.cancel();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Monitor task ended abnormally: {}", e);
            }
        }

        self.selector.disconnect().await
    }

    /// Check if the tasks have been started and not shut down.
    pub fn is_running(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    /// The validated configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// The network selector.
    pub fn selector(&self) -> &Arc<NetworkSelector> {
        &self.selector
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.selector.status()
    }

    /// Alert state for a role as of the last completed cycle.
    pub fn alert_state(&self, role: ProbeRole) -> AlertState {
        self.status_rx.borrow().alert(role).clone()
    }

    /// Current loop phase.
    pub fn phase(&self) -> LoopPhase {
        self.status_rx.borrow().phase
    }

    /// Latest status snapshot.
    pub fn status(&self) -> MonitorStatus {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to status snapshots.
    pub fn subscribe_status(&self) -> watch::Receiver<MonitorStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to connection events.
    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.selector.subscribe()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertStatus;
    use crate::config::tests::sample_config;
    use crate::error::Error;
    use crate::network::ConnectionStatus;
    use crate::test_support::{Behaviour, RecordingTransport, ScriptedDriver, ScriptedRadio};
    use std::time::Duration;

    fn monitor(
        driver: Arc<ScriptedDriver>,
        radio: Arc<ScriptedRadio>,
        transport: Arc<RecordingTransport>,
    ) -> Monitor {
        Monitor::new(sample_config(), driver, radio, transport).unwrap()
    }

    fn quiet_driver() -> Arc<ScriptedDriver> {
        let driver = Arc::new(ScriptedDriver::default());
        for (channel, celsius) in sample_config().channels().iter().zip([10.0, 38.0, 20.0]) {
            driver.set(channel.address, Some(celsius));
        }
        driver
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = sample_config();
        config.networks.clear();

        let result = Monitor::new(
            config,
            Arc::new(ScriptedDriver::default()),
            Arc::new(ScriptedRadio::default()),
            Arc::new(RecordingTransport::default()),
        );
        assert!(matches!(result, Err(Error::ConfigurationInvalid { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_alert() {
        let driver = quiet_driver();
        let radio = Arc::new(ScriptedRadio::new([
            ("SSID1", Behaviour::Hang),
            ("SSID2", Behaviour::Accept),
        ]));
        let transport = Arc::new(RecordingTransport::default());
        let monitor = monitor(driver.clone(), radio, transport.clone());
        assert_eq!(monitor.phase(), LoopPhase::Idle);
        assert!(!monitor.is_running());

        monitor.start();
        monitor.start();
        assert!(monitor.is_running());

        tokio::time::sleep(Duration::from_secs(30)).await;
        let state = monitor.connection_state();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.current_candidate_index, Some(1));
        assert_eq!(monitor.status().cycles, 1);

        let water = monitor.config().probes.water;
        driver.set(water, Some(41.5));

        // Breaching reads at 60, 120 and 180 seconds; delivery right after.
        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(monitor.alert_state(ProbeRole::Water).status, AlertStatus::Warning);
        assert_eq!(transport.messages().len(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(monitor.alert_state(ProbeRole::Water).status, AlertStatus::Sent);
        assert_eq!(monitor.alert_state(ProbeRole::Air).status, AlertStatus::Normal);

        monitor.shutdown().await.unwrap();
        assert!(!monitor.is_running());
        assert_eq!(
            monitor.connection_state().status,
            ConnectionStatus::Disconnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling() {
        let monitor = monitor(
            quiet_driver(),
            Arc::new(ScriptedRadio::new([("SSID1", Behaviour::Accept)])),
            Arc::new(RecordingTransport::default()),
        );
        let mut events = monitor.subscribe_connection();

        monitor.start();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(monitor.status().cycles, 2);
        assert!(events.try_recv().is_ok());

        monitor.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(monitor.status().cycles, 2);
    }
}
