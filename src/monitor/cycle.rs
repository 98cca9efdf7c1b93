//! The poll, evaluate, notify cycle.

use std::fmt;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert::{AlertPolicy, AlertState, AlertStatus, Decision};
use crate::config::MonitorSettings;
use crate::data::{ProbeChannel, ProbeRole, TemperatureSample};
use crate::notify::{AlertJob, DeliveryReport};
use crate::probe::ProbeReader;

/// Where the loop is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoopPhase {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// Reading probes.
    Polling,
    /// Running samples through the alert policy.
    Evaluating,
    /// Handing messages to the notifier.
    Notifying,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Polling => write!(f, "Polling"),
            Self::Evaluating => write!(f, "Evaluating"),
            Self::Notifying => write!(f, "Notifying"),
        }
    }
}

/// Snapshot the loop publishes for observers.
#[derive(Debug, Clone, Default)]
pub struct MonitorStatus {
    /// Current phase.
    pub phase: LoopPhase,
    /// Cycles completed.
    pub cycles: u64,
    /// Alert state by role index, as of the last completed cycle.
    pub alerts: [AlertState; 3],
    /// Samples from the last completed cycle.
    pub samples: Vec<TemperatureSample>,
}

impl MonitorStatus {
    /// Alert state for a role.
    pub fn alert(&self, role: ProbeRole) -> &AlertState {
        &self.alerts[role.index()]
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// One sample per configured channel, in channel order.
    pub samples: Vec<TemperatureSample>,
    /// Non-`None` decisions, in channel order.
    pub decisions: Vec<(ProbeRole, Decision)>,
    /// Delivery reports folded in before polling.
    pub reports_applied: usize,
    /// Jobs handed to the notifier.
    pub jobs_dispatched: usize,
}

/// The monitor's control loop.
///
/// Owns the [`AlertPolicy`]. Deliveries happen on the notifier task; the
/// loop only queues jobs and reads back reports, so a slow mail server
/// never delays a poll.
pub struct MonitorLoop {
    reader: ProbeReader,
    channels: Vec<ProbeChannel>,
    policy: AlertPolicy,
    settings: MonitorSettings,
    jobs: mpsc::Sender<AlertJob>,
    reports: mpsc::Receiver<DeliveryReport>,
    status_tx: watch::Sender<MonitorStatus>,
}

impl MonitorLoop {
    /// Create a loop over `channels`.
    pub fn new(
        reader: ProbeReader,
        channels: Vec<ProbeChannel>,
        policy: AlertPolicy,
        settings: MonitorSettings,
        jobs: mpsc::Sender<AlertJob>,
        reports: mpsc::Receiver<DeliveryReport>,
    ) -> Self {
        let (status_tx, _) = watch::channel(MonitorStatus::default());
        Self {
            reader,
            channels,
            policy,
            settings,
            jobs,
            reports,
            status_tx,
        }
    }

    /// Receive status snapshots.
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// The alert policy.
    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Run cycles on the poll period until cancelled.
    ///
    /// A cycle that overruns the period skips the missed ticks instead of
    /// running them back to back. Cancellation is observed between cycles.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Monitor loop started: {} probes every {:?}",
            self.channels.len(),
            self.settings.poll_interval()
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.run_cycle().await;
        }

        self.set_phase(LoopPhase::Idle);
        info!("Monitor loop stopped");
    }

    /// Run one complete cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport {
            reports_applied: self.apply_reports(),
            ..Default::default()
        };

        self.set_phase(LoopPhase::Polling);
        report.samples = self
            .reader
            .read_all(&self.channels, self.settings.concurrent_reads)
            .await;

        self.set_phase(LoopPhase::Evaluating);
        let mut clear_notices = Vec::new();
        for sample in &report.samples {
            let role = sample.probe.role;
            let previous = self.policy.state(role).clone();

            let decision = self.policy.classify(sample);
            if decision == Decision::None {
                continue;
            }
            report.decisions.push((role, decision));

            if decision == Decision::ClearAlert
                && previous.status == AlertStatus::Sent
                && self.policy.settings().recovery_notice
            {
                clear_notices.push(AlertJob {
                    decision,
                    sample: sample.clone(),
                    episode: previous.episode,
                });
            }
        }

        self.set_phase(LoopPhase::Notifying);
        for job in clear_notices {
            if self.dispatch(job) {
                report.jobs_dispatched += 1;
            }
        }
        for role in ProbeRole::ALL {
            if let Some(job) = self.policy.pending_alert(role) {
                let episode = job.episode;
                if self.dispatch(job) {
                    self.policy.mark_dispatched(role, episode);
                    report.jobs_dispatched += 1;
                }
            }
        }

        let samples = report.samples.clone();
        let alerts = self.policy.states().clone();
        self.status_tx.send_modify(|status| {
            status.phase = LoopPhase::Idle;
            status.cycles += 1;
            status.alerts = alerts;
            status.samples = samples;
        });

        debug!(
            "Cycle done: {} samples, {} decisions, {} jobs",
            report.samples.len(),
            report.decisions.len(),
            report.jobs_dispatched
        );
        report
    }

    /// Fold every delivery report received so far into the policy.
    fn apply_reports(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(report) = self.reports.try_recv() {
            self.policy.apply_delivery(&report);
            applied += 1;
        }
        applied
    }

    /// Queue `job` without waiting. Returns whether it was accepted.
    fn dispatch(&self, job: AlertJob) -> bool {
        let role = job.role();
        let decision = job.decision;
        match self.jobs.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("{} {} held back: notifier queue full", role, decision);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("{} {} dropped: notifier has stopped", role, decision);
                false
            }
        }
    }

    fn set_phase(&self, phase: LoopPhase) {
        self.status_tx.send_modify(|status| status.phase = phase);
    }
}

impl fmt::Debug for MonitorLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorLoop")
            .field("channels", &self.channels)
            .field("settings", &self.settings)
            .finish()
    }
}
