//! Multi-candidate network association.
//!
//! The selector owns the radio's [`ConnectionState`]. Every mutation goes
//! through its methods; other components only read snapshots.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::NetworkSettings;
use crate::error::{Error, Result};
use crate::network::connection::{
    ConnectionEvent, ConnectionState, ConnectionStatus, Reachability,
};
use crate::network::radio::WifiRadio;
use crate::network::NetworkCandidate;
use crate::utils::backoff_delay;

/// Chooses among configured networks and keeps the radio associated.
pub struct NetworkSelector {
    /// Radio driver.
    radio: Arc<dyn WifiRadio>,
    /// Candidates in priority order. Never empty.
    candidates: Vec<NetworkCandidate>,
    /// Timing.
    settings: NetworkSettings,
    /// Current connection state.
    state: RwLock<ConnectionState>,
    /// Index of the last candidate that accepted us.
    last_success: RwLock<Option<usize>>,
    /// Consecutive sweeps that failed on every candidate.
    failed_sweeps: AtomicU32,
    /// Serializes sweeps.
    sweep_lock: Mutex<()>,
    /// Wakes the supervisor when a driver reports link loss.
    link_lost: Notify,
    /// Channel for connection events.
    event_tx: broadcast::Sender<ConnectionEvent>,
}

impl NetworkSelector {
    /// Create a selector over `candidates`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationInvalid`] if `candidates` is empty.
    pub fn new(
        candidates: Vec<NetworkCandidate>,
        radio: Arc<dyn WifiRadio>,
        settings: NetworkSettings,
    ) -> Result<Self> {
        if candidates.is_empty() {
            return Err(Error::config("at least one network candidate is required"));
        }

        let (event_tx, _) = broadcast::channel(16);

        Ok(Self {
            radio,
            candidates,
            settings,
            state: RwLock::new(ConnectionState::default()),
            last_success: RwLock::new(None),
            failed_sweeps: AtomicU32::new(0),
            sweep_lock: Mutex::new(()),
            link_lost: Notify::new(),
            event_tx,
        })
    }

    /// Get the current connection state.
    pub fn status(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Configured candidates in priority order.
    pub fn candidates(&self) -> &[NetworkCandidate] {
        &self.candidates
    }

    /// Subscribe to connection events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_tx.subscribe()
    }

    /// Delay before the next sweep, given the sweeps that have failed so far.
    pub fn next_backoff(&self) -> Duration {
        let failed = self.failed_sweeps.load(Ordering::SeqCst);
        backoff_delay(
            failed.saturating_sub(1),
            self.settings.backoff_initial(),
            self.settings.backoff_max(),
        )
    }

    /// Sweep the candidate table once.
    ///
    /// Starts at the last candidate that worked and moves forward,
    /// wrapping around, so every candidate is tried once before any is
    /// tried again. Each attempt is bounded by the per-candidate timeout.
    ///
    /// # Returns
    ///
    /// The index of the candidate now associated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NetworkUnreachable`] if every candidate failed.
    pub async fn connect(&self) -> Result<usize> {
        self.sweep(None).await
    }

    /// Sweep until connected or `deadline` elapses, backing off between
    /// failed sweeps.
    pub async fn ensure_connected(&self, deadline: Duration) -> Reachability {
        let deadline_at = Instant::now() + deadline;

        loop {
            if let Some(index) = self.connected_index() {
                return Reachability::Reachable(index);
            }

            match self.sweep(Some(deadline_at)).await {
                Ok(index) => return Reachability::Reachable(index),
                Err(e) => debug!("Sweep failed: {}", e),
            }

            let delay = self.next_backoff();
            if Instant::now() + delay >= deadline_at {
                tokio::time::sleep_until(deadline_at).await;
                return Reachability::Unreachable;
            }

            debug!("Next sweep in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Drop the current association.
    pub async fn disconnect(&self) -> Result<()> {
        let _sweep = self.sweep_lock.lock().await;

        if matches!(self.status().status, ConnectionStatus::Disconnected) {
            return Ok(());
        }

        info!("Disconnecting from network");

        let result = match tokio::time::timeout(
            self.settings.candidate_timeout(),
            self.radio.disassociate(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Internal("disassociation timed out".to_string())),
        };

        self.set_state(None, |state| {
            state.status = ConnectionStatus::Disconnected;
            state.current_candidate_index = None;
        });

        result
    }

    /// Record that the link dropped. The supervisor reconnects.
    pub fn handle_link_lost(&self) {
        if !self.is_connected() {
            return;
        }

        warn!("Network link lost");

        self.set_state(None, |state| {
            state.status = ConnectionStatus::Disconnected;
            state.current_candidate_index = None;
        });
        self.link_lost.notify_one();
    }

    /// Keep the radio associated until `cancel` fires.
    ///
    /// Retries indefinitely: failed sweeps back off exponentially, a
    /// successful association resets the backoff, and a connected link is
    /// checked every `link_check` period.
    pub async fn maintain(&self, cancel: CancellationToken) {
        info!(
            "Network supervisor started with {} candidates",
            self.candidates.len()
        );

        loop {
            if self.is_connected() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.link_lost.notified() => continue,
                    _ = tokio::time::sleep(self.settings.link_check()) => {}
                }

                if self.is_connected() && !self.link_up().await {
                    self.handle_link_lost();
                }
                continue;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.connect() => result,
            };

            if let Err(e) = result {
                let delay = self.next_backoff();
                info!("{}; retrying in {:?}", e, delay);

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        // A cancelled sweep leaves Connecting behind.
        if self.status().status.is_transitioning() {
            self.set_state(None, |state| {
                state.status = ConnectionStatus::Disconnected;
                state.current_candidate_index = None;
            });
        }

        debug!("Network supervisor stopped");
    }

    /// Index of the associated candidate, if connected.
    fn connected_index(&self) -> Option<usize> {
        let state = self.status();
        if state.is_connected() {
            state.current_candidate_index
        } else {
            None
        }
    }

    /// One pass over the candidate table, optionally cut short by `deadline`.
    async fn sweep(&self, deadline: Option<Instant>) -> Result<usize> {
        let _sweep = self.sweep_lock.lock().await;

        if let Some(index) = self.connected_index() {
            return Ok(index);
        }

        let count = self.candidates.len();
        let start = self.last_success.read().unwrap_or(0) % count;

        for offset in 0..count {
            let mut attempt_timeout = self.settings.candidate_timeout();
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    debug!("Sweep deadline reached");
                    break;
                }
                attempt_timeout = attempt_timeout.min(remaining);
            }

            let index = (start + offset) % count;
            let candidate = &self.candidates[index];

            self.set_state(Some(&candidate.ssid), |state| {
                state.status = ConnectionStatus::Connecting;
                state.current_candidate_index = Some(index);
                state.attempt_count = state.attempt_count.saturating_add(1);
            });

            debug!(
                "Associating with '{}' (candidate {} of {})",
                candidate.ssid,
                index + 1,
                count
            );

            match tokio::time::timeout(attempt_timeout, self.radio.associate(candidate)).await {
                Ok(Ok(())) => {
                    info!("Associated with '{}'", candidate.ssid);

                    *self.last_success.write() = Some(index);
                    self.failed_sweeps.store(0, Ordering::SeqCst);

                    self.set_state(Some(&candidate.ssid), |state| {
                        state.status = ConnectionStatus::Connected;
                        state.current_candidate_index = Some(index);
                        state.attempt_count = 0;
                    });
                    return Ok(index);
                }
                Ok(Err(e)) => {
                    warn!("Association with '{}' rejected: {}", candidate.ssid, e);
                }
                Err(_) => {
                    let e = Error::AssociationTimeout {
                        ssid: candidate.ssid.clone(),
                    };
                    warn!("{} after {:?}", e, attempt_timeout);
                    self.abandon_attempt(deadline).await;
                }
            }
        }

        self.failed_sweeps.fetch_add(1, Ordering::SeqCst);

        let attempts = {
            let mut attempts = 0;
            self.set_state(None, |state| {
                state.status = ConnectionStatus::Failed;
                state.current_candidate_index = None;
                attempts = state.attempt_count;
            });
            attempts
        };

        Err(Error::NetworkUnreachable { attempts })
    }

    /// Reset the radio after an attempt timed out, without running past
    /// `deadline`.
    async fn abandon_attempt(&self, deadline: Option<Instant>) {
        let mut bound = self.settings.candidate_timeout();
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("Skipping disassociation: sweep deadline reached");
                return;
            }
            bound = bound.min(remaining);
        }

        match tokio::time::timeout(bound, self.radio.disassociate()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Disassociation after timeout failed: {}", e),
            Err(_) => debug!("Disassociation after timeout timed out"),
        }
    }

    /// Ask the radio whether the link is up, treating no answer as down.
    async fn link_up(&self) -> bool {
        tokio::time::timeout(self.settings.candidate_timeout(), self.radio.is_link_up())
            .await
            .unwrap_or(false)
    }

    /// Update the connection state and emit an event.
    fn set_state<F>(&self, ssid: Option<&str>, update: F)
    where
        F: FnOnce(&mut ConnectionState),
    {
        let (old_state, new_state) = {
            let mut state = self.state.write();
            let old = *state;
            update(&mut *state);
            (old, *state)
        };

        if old_state != new_state {
            debug!("Connection state changed: {} -> {}", old_state, new_state);

            let _ = self.event_tx.send(ConnectionEvent {
                ssid: ssid.map(str::to_string),
                state: new_state,
            });
        }
    }
}

impl std::fmt::Debug for NetworkSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSelector")
            .field("candidates", &self.candidates)
            .field("state", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::radio::MockWifiRadio;
    use crate::test_support::{Behaviour, ScriptedRadio};

    fn candidates() -> Vec<NetworkCandidate> {
        vec![
            NetworkCandidate::new("A", "pa"),
            NetworkCandidate::new("B", "pb"),
            NetworkCandidate::new("C", "pc"),
        ]
    }

    fn selector(radio: Arc<dyn WifiRadio>) -> NetworkSelector {
        NetworkSelector::new(candidates(), radio, NetworkSettings::default()).unwrap()
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let radio = Arc::new(MockWifiRadio::new());
        let result = NetworkSelector::new(Vec::new(), radio, NetworkSettings::default());
        assert!(matches!(result, Err(Error::ConfigurationInvalid { .. })));
    }

    #[tokio::test]
    async fn test_first_candidate_accepts() {
        let mut radio = MockWifiRadio::new();
        radio
            .expect_associate()
            .withf(|c: &NetworkCandidate| c.ssid == "A")
            .times(1)
            .returning(|_| Ok(()));

        let selector = selector(Arc::new(radio));
        assert_eq!(selector.connect().await.unwrap(), 0);

        let state = selector.status();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.current_candidate_index, Some(0));
        assert_eq!(state.attempt_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_to_third_candidate() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Hang),
            ("B", Behaviour::Hang),
            ("C", Behaviour::Accept),
        ]));
        let selector = selector(radio.clone());

        let started = Instant::now();
        assert_eq!(selector.connect().await.unwrap(), 2);

        let state = selector.status();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.current_candidate_index, Some(2));
        assert_eq!(radio.attempts(), vec!["A", "B", "C"]);

        // Two timed-out attempts, each bounded by the candidate timeout.
        let elapsed = Instant::now() - started;
        assert!(elapsed >= Duration::from_secs(20));
        assert!(elapsed < Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_candidates_tried_once_per_sweep() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Reject),
            ("B", Behaviour::Hang),
            ("C", Behaviour::Reject),
        ]));
        let selector = selector(radio.clone());

        let err = selector.connect().await.unwrap_err();
        assert!(matches!(err, Error::NetworkUnreachable { attempts: 3 }));
        assert_eq!(radio.attempts(), vec!["A", "B", "C"]);

        let state = selector.status();
        assert_eq!(state.status, ConnectionStatus::Failed);
        assert_eq!(state.current_candidate_index, None);

        selector.connect().await.unwrap_err();
        assert_eq!(radio.attempts(), vec!["A", "B", "C", "A", "B", "C"]);
        assert_eq!(selector.status().attempt_count, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_starts_at_last_success() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Reject),
            ("B", Behaviour::Accept),
            ("C", Behaviour::Accept),
        ]));
        let selector = selector(radio.clone());

        assert_eq!(selector.connect().await.unwrap(), 1);
        selector.disconnect().await.unwrap();
        assert_eq!(selector.status().status, ConnectionStatus::Disconnected);

        assert_eq!(selector.connect().await.unwrap(), 1);
        assert_eq!(radio.attempts(), vec!["A", "B", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_and_resets() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Reject),
            ("B", Behaviour::Reject),
            ("C", Behaviour::Reject),
        ]));
        let selector = selector(radio.clone());

        let mut delays = Vec::new();
        for _ in 0..7 {
            selector.connect().await.unwrap_err();
            delays.push(selector.next_backoff().as_secs());
        }
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);

        radio.set("C", Behaviour::Accept);
        assert_eq!(selector.connect().await.unwrap(), 2);
        assert_eq!(selector.next_backoff(), Duration::from_secs(1));
        assert_eq!(selector.status().attempt_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_connected_unreachable() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Hang),
            ("B", Behaviour::Hang),
            ("C", Behaviour::Hang),
        ]));
        let selector = selector(radio.clone());

        let started = Instant::now();
        let reachability = selector.ensure_connected(Duration::from_secs(45)).await;
        assert_eq!(reachability, Reachability::Unreachable);
        let elapsed = Instant::now() - started;
        assert!(elapsed >= Duration::from_secs(45));
        assert!(elapsed < Duration::from_secs(46));
        assert!(!selector.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_connected_keeps_deadline_when_disassociate_hangs() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Hang),
            ("B", Behaviour::Hang),
            ("C", Behaviour::Hang),
        ]));
        radio.set_disassociate_hangs(true);
        let selector = selector(radio.clone());

        let started = Instant::now();
        let reachability = selector.ensure_connected(Duration::from_secs(35)).await;
        assert_eq!(reachability, Reachability::Unreachable);
        assert_eq!(Instant::now() - started, Duration::from_secs(35));
        assert_eq!(radio.attempts(), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_connected_after_retry() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Reject),
            ("B", Behaviour::Reject),
            ("C", Behaviour::AcceptAfter(2)),
        ]));
        let selector = selector(radio.clone());

        let reachability = selector.ensure_connected(Duration::from_secs(60)).await;
        assert_eq!(reachability, Reachability::Reachable(2));
        assert_eq!(radio.attempts().len(), 9);
    }

    #[tokio::test]
    async fn test_ensure_connected_when_already_connected() {
        let radio = Arc::new(ScriptedRadio::new([("A", Behaviour::Accept)]));
        let selector = selector(radio.clone());
        selector.connect().await.unwrap();

        let reachability = selector.ensure_connected(Duration::from_secs(1)).await;
        assert_eq!(reachability, Reachability::Reachable(0));
        assert_eq!(radio.attempts(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_state_events() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Reject),
            ("B", Behaviour::Accept),
        ]));
        let selector = selector(radio);
        let mut rx = selector.subscribe();

        selector.connect().await.unwrap();

        let mut statuses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            statuses.push((event.ssid, event.state.status));
        }
        assert_eq!(
            statuses,
            vec![
                (Some("A".to_string()), ConnectionStatus::Connecting),
                (Some("B".to_string()), ConnectionStatus::Connecting),
                (Some("B".to_string()), ConnectionStatus::Connected),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_reconnects_after_link_loss() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Accept),
            ("B", Behaviour::Accept),
        ]));
        let selector = Arc::new(selector(radio.clone()));
        let cancel = CancellationToken::new();

        let supervisor = {
            let selector = selector.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { selector.maintain(cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(selector.is_connected());

        radio.set_link_up(false);
        tokio::time::sleep(NetworkSettings::default().link_check() + Duration::from_secs(1)).await;
        assert!(selector.is_connected());
        assert_eq!(radio.attempts(), vec!["A", "A"]);

        cancel.cancel();
        supervisor.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_keeps_retrying() {
        let radio = Arc::new(ScriptedRadio::new([
            ("A", Behaviour::Reject),
            ("B", Behaviour::Reject),
            ("C", Behaviour::Reject),
        ]));
        let selector = Arc::new(selector(radio.clone()));
        let cancel = CancellationToken::new();

        let supervisor = {
            let selector = selector.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { selector.maintain(cancel).await })
        };

        // Sweeps at t=0, 1, 3, 7, 15.
        tokio::time::sleep(Duration::from_millis(15_500)).await;
        assert_eq!(radio.attempts().len(), 15);
        assert_eq!(selector.status().status, ConnectionStatus::Failed);

        cancel.cancel();
        supervisor.await.unwrap();
    }
}
