//! Alert decision logic.
//!
//! [`AlertPolicy`] turns each probe's stream of samples into raise and
//! clear decisions. It debounces breaches, applies hysteresis on the way
//! back, holds off repeat alerts for a cooldown, and gives up on an alert
//! whose delivery keeps failing.

use std::fmt;
use tracing::{debug, error, info, warn};

use crate::alert::state::{AlertState, AlertStatus};
use crate::config::AlertSettings;
use crate::data::{ProbeRole, TemperatureSample, ThresholdBand, ThresholdTable, Zone};
use crate::notify::{AlertJob, DeliveryReport, DeliveryResult};

/// What a sample means for its probe's alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    /// Nothing changed.
    #[default]
    None,
    /// The probe has been out of limits long enough to alert.
    RaiseAlert,
    /// The probe is back within limits.
    ClearAlert,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::RaiseAlert => write!(f, "RaiseAlert"),
            Self::ClearAlert => write!(f, "ClearAlert"),
        }
    }
}

/// Alert state machine for every probe role.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    /// Limits by role.
    thresholds: ThresholdTable,
    /// Debounce, cooldown and retry tuning.
    settings: AlertSettings,
    /// State by role index.
    states: [AlertState; 3],
}

impl AlertPolicy {
    /// Create a policy with every probe Normal.
    pub fn new(thresholds: ThresholdTable, settings: AlertSettings) -> Self {
        Self {
            thresholds,
            settings,
            states: Default::default(),
        }
    }

    /// Current state for a role.
    pub fn state(&self, role: ProbeRole) -> &AlertState {
        &self.states[role.index()]
    }

    /// Current state for every role, by role index.
    pub fn states(&self) -> &[AlertState; 3] {
        &self.states
    }

    /// Limits for a role.
    pub fn band(&self, role: ProbeRole) -> &ThresholdBand {
        self.thresholds.band(role)
    }

    /// Tuning in use.
    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    /// Feed one sample and decide what it means.
    ///
    /// Invalid samples are ignored outright: they neither extend nor break
    /// a streak.
    pub fn classify(&mut self, sample: &TemperatureSample) -> Decision {
        let role = sample.probe.role;

        let Some(celsius) = sample.celsius() else {
            debug!("{} sample invalid, skipped", role);
            return Decision::None;
        };

        let zone = self.thresholds.band(role).zone(celsius);
        let settings = self.settings;
        let state = &mut self.states[role.index()];

        match zone {
            Zone::Breach(direction) => {
                state.consecutive_recovery_count = 0;
                state.consecutive_breach_count = state.consecutive_breach_count.saturating_add(1);

                match state.status {
                    AlertStatus::Normal => {
                        if state.consecutive_breach_count < settings.debounce_count {
                            debug!(
                                "{} breach {} of {} ({:.2}°C)",
                                role,
                                state.consecutive_breach_count,
                                settings.debounce_count,
                                celsius
                            );
                            return Decision::None;
                        }

                        state.raise(direction, sample);
                        info!(
                            "{} alert raised: {:.2}°C is {} the limit (episode {})",
                            role, celsius, direction, state.episode
                        );
                        Decision::RaiseAlert
                    }
                    AlertStatus::Warning => {
                        state.last_breach = Some(sample.clone());
                        Decision::None
                    }
                    AlertStatus::Sent => {
                        let cooled_down = state.last_notified_at.map_or(true, |at| {
                            sample.timestamp.saturating_duration_since(at) >= settings.cooldown()
                        });
                        if !cooled_down {
                            return Decision::None;
                        }

                        state.raise(direction, sample);
                        info!(
                            "{} still out of limits after cooldown, alert re-raised (episode {})",
                            role, state.episode
                        );
                        Decision::RaiseAlert
                    }
                    AlertStatus::Suppressed => Decision::None,
                }
            }
            Zone::Within => {
                state.consecutive_breach_count = 0;

                if !state.status.is_active() {
                    return Decision::None;
                }

                state.consecutive_recovery_count += 1;
                if state.consecutive_recovery_count < settings.recovery_count {
                    debug!(
                        "{} recovery {} of {}",
                        role, state.consecutive_recovery_count, settings.recovery_count
                    );
                    return Decision::None;
                }

                info!("{} back within limits ({:.2}°C), alert cleared", role, celsius);
                state.clear();
                Decision::ClearAlert
            }
            Zone::DeadBand => {
                state.consecutive_breach_count = 0;
                state.consecutive_recovery_count = 0;
                Decision::None
            }
        }
    }

    /// The raise alert awaiting delivery for `role`, if one should be sent now.
    ///
    /// Returns `None` while a delivery is already in flight. Once the
    /// failure count reaches the retry cap the alert is dropped and the
    /// probe moves to [`AlertStatus::Suppressed`].
    pub fn pending_alert(&mut self, role: ProbeRole) -> Option<AlertJob> {
        let max_retries = self.settings.max_delivery_retries;
        let state = &mut self.states[role.index()];

        if state.status != AlertStatus::Warning || state.in_flight {
            return None;
        }

        if state.delivery_failures >= max_retries {
            error!(
                "{} alert dropped after {} failed deliveries; suppressed until recovery",
                role, state.delivery_failures
            );
            state.status = AlertStatus::Suppressed;
            return None;
        }

        let sample = state.last_breach.clone()?;
        Some(AlertJob {
            decision: Decision::RaiseAlert,
            sample,
            episode: state.episode,
        })
    }

    /// Note that the alert for `episode` was handed to the notifier.
    pub fn mark_dispatched(&mut self, role: ProbeRole, episode: u64) {
        let state = &mut self.states[role.index()];
        if state.episode == episode && state.status == AlertStatus::Warning {
            state.in_flight = true;
        }
    }

    /// Fold a delivery outcome back into the probe's state.
    ///
    /// Reports for an earlier episode, and for recovery notices, change
    /// nothing. Recovery notices are best-effort: one that is not delivered
    /// is logged and never retried.
    pub fn apply_delivery(&mut self, report: &DeliveryReport) {
        let role = report.role();
        let max_retries = self.settings.max_delivery_retries;
        let state = &mut self.states[role.index()];

        if report.job.decision == Decision::ClearAlert && report.result.is_deferred() {
            warn!(
                "{} recovery notice for episode {} not delivered ({}); not retried",
                role, report.job.episode, report.result
            );
            return;
        }

        if report.job.decision != Decision::RaiseAlert || report.job.episode != state.episode {
            debug!(
                "{} {} report for episode {} ignored: {}",
                role, report.job.decision, report.job.episode, report.result
            );
            return;
        }

        state.in_flight = false;
        if state.status != AlertStatus::Warning {
            return;
        }

        match report.result {
            DeliveryResult::Sent => {
                info!("{} alert delivered", role);
                state.status = AlertStatus::Sent;
                state.last_notified_at = Some(report.completed_at);
                state.delivery_failures = 0;
            }
            DeliveryResult::DeferredSmtpFailure => {
                state.delivery_failures += 1;
                warn!(
                    "{} alert delivery failed ({} of {})",
                    role, state.delivery_failures, max_retries
                );
            }
            DeliveryResult::DeferredNoNetwork | DeliveryResult::Skipped => {
                debug!("{} alert deferred: {}", role, report.result);
            }
        }
    }

    /// Close any open episode for `role` without waiting for recovery.
    ///
    /// Returns whether there was one.
    pub fn acknowledge(&mut self, role: ProbeRole) -> bool {
        let state = &mut self.states[role.index()];
        if !state.status.is_active() {
            return false;
        }

        info!("{} alert acknowledged", role);
        state.clear();
        true
    }
}
