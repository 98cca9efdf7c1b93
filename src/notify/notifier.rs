//! Connectivity-gated alert delivery.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert::Decision;
use crate::data::{ProbeChannel, TemperatureSample, ThresholdTable};
use crate::error::Error;
use crate::network::NetworkSelector;
use crate::notify::{AlertJob, AlertMessage, DeliveryReport, DeliveryResult, MailTransport};

/// Sends alert emails when, and only when, the network is up.
pub struct Notifier {
    /// Connectivity gate.
    selector: Arc<NetworkSelector>,
    /// Mail transport.
    transport: Arc<dyn MailTransport>,
    /// Name used in subjects.
    device_name: String,
    /// Limits quoted in message bodies.
    thresholds: ThresholdTable,
    /// Upper bound on one delivery.
    timeout: Duration,
}

impl Notifier {
    /// Create a notifier.
    pub fn new(
        selector: Arc<NetworkSelector>,
        transport: Arc<dyn MailTransport>,
        device_name: impl Into<String>,
        thresholds: ThresholdTable,
        timeout: Duration,
    ) -> Self {
        Self {
            selector,
            transport,
            device_name: device_name.into(),
            thresholds,
            timeout,
        }
    }

    /// Send the message for `decision` about `probe`.
    ///
    /// Returns [`DeliveryResult::DeferredNoNetwork`] without touching the
    /// transport whenever the selector is not connected, whatever the
    /// decision. Once connected, a decision with nothing to send is
    /// [`DeliveryResult::Skipped`].
    pub async fn send(
        &self,
        probe: &ProbeChannel,
        decision: Decision,
        sample: &TemperatureSample,
    ) -> DeliveryResult {
        if !self.selector.is_connected() {
            info!("{} {} deferred: no network", probe.role, decision);
            return DeliveryResult::DeferredNoNetwork;
        }

        let band = self.thresholds.band(probe.role);
        let Some(message) = AlertMessage::compose(&self.device_name, decision, sample, band) else {
            return DeliveryResult::Skipped;
        };

        match tokio::time::timeout(self.timeout, self.transport.deliver(&message)).await {
            Ok(Ok(())) => {
                info!("{} {} email sent: {}", probe.role, decision, message.subject);
                DeliveryResult::Sent
            }
            Ok(Err(e)) => {
                warn!("{} {} email failed: {}", probe.role, decision, e);
                DeliveryResult::DeferredSmtpFailure
            }
            Err(_) => {
                warn!(
                    "{} {} email failed: {} after {:?}",
                    probe.role,
                    decision,
                    Error::DeliveryTimeout,
                    self.timeout
                );
                DeliveryResult::DeferredSmtpFailure
            }
        }
    }

    /// Attempt one job and report how it went.
    pub async fn deliver(&self, job: AlertJob) -> DeliveryReport {
        let result = self.send(&job.sample.probe, job.decision, &job.sample).await;
        DeliveryReport {
            job,
            result,
            completed_at: tokio::time::Instant::now().into_std(),
        }
    }

    /// Worker loop: deliver jobs until cancelled or the job queue closes.
    ///
    /// Cancellation is only observed between jobs, so a delivery that has
    /// started always runs to completion or to its timeout.
    pub async fn run(
        &self,
        mut jobs: mpsc::Receiver<AlertJob>,
        reports: mpsc::Sender<DeliveryReport>,
        cancel: CancellationToken,
    ) {
        debug!("Notifier started");

        loop {
            let job = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let report = self.deliver(job).await;
            if reports.send(report).await.is_err() {
                debug!("Delivery report dropped: monitor loop has stopped");
                break;
            }
        }

        debug!("Notifier stopped");
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("device_name", &self.device_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}
