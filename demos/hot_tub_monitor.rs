//! Hot tub monitor with simulated probes and radio
//!
//! Alerts go out through the real SMTP server named in the configuration,
//! so set `SMTP_AUTH_CREDENTIAL` (or put it in `.env`) before running.
//!
//! Run with: cargo run --example hot_tub_monitor -- monitor.toml

use async_trait::async_trait;
use hottub_probes::{
    Error, Monitor, MonitorConfig, NetworkCandidate, ProbeAddress, ProbeDriver, ProbeRole,
    Result, SmtpMailer, WifiRadio,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Probes that drift a little on every read. The water creeps upward so
/// an alert fires after a few minutes.
struct SimulatedProbes {
    temperatures: Mutex<HashMap<ProbeAddress, (f64, f64)>>,
}

impl SimulatedProbes {
    fn new(config: &MonitorConfig) -> Self {
        let start = |role| match role {
            ProbeRole::Air => (8.0, -0.2),
            ProbeRole::Water => (38.5, 0.4),
            ProbeRole::Enclosure => (18.0, 0.05),
        };

        let temperatures = config
            .channels()
            .into_iter()
            .map(|channel| (channel.address, start(channel.role)))
            .collect();

        Self {
            temperatures: Mutex::new(temperatures),
        }
    }
}

#[async_trait]
impl ProbeDriver for SimulatedProbes {
    async fn read_celsius(&self, address: &ProbeAddress) -> Result<f64> {
        tokio::time::sleep(Duration::from_millis(750)).await;

        let mut temperatures = self.temperatures.lock();
        let (celsius, drift) = temperatures.get_mut(address).ok_or_else(|| Error::SensorRead {
            address: address.to_string(),
            reason: "no presence pulse".to_string(),
        })?;
        *celsius += *drift;
        Ok(*celsius)
    }
}

/// A radio that cannot reach the first configured network.
struct SimulatedRadio {
    unreachable: String,
    link_up: AtomicBool,
}

#[async_trait]
impl WifiRadio for SimulatedRadio {
    async fn associate(&self, candidate: &NetworkCandidate) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        if candidate.ssid == self.unreachable {
            return Err(Error::AssociationRejected {
                ssid: candidate.ssid.clone(),
                reason: "no beacon".to_string(),
            });
        }
        self.link_up.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disassociate(&self) -> Result<()> {
        self.link_up.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_link_up(&self) -> bool {
        self.link_up.load(Ordering::SeqCst)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hottub_probes=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "monitor.toml".to_string());
    let config = MonitorConfig::load(&path)?;

    println!("Hot Tub Monitor");
    println!("===============\n");
    println!("Device:    {}", config.device.name);
    println!("Networks:  {}", config.networks.len());
    for channel in config.channels() {
        println!(
            "  {:<10} {}  {}",
            channel.role,
            channel.address,
            config.thresholds.band(channel.role)
        );
    }
    println!("\nPress Ctrl+C to exit.\n");

    let driver = Arc::new(SimulatedProbes::new(&config));
    let radio = Arc::new(SimulatedRadio {
        unreachable: config.networks[0].ssid.clone(),
        link_up: AtomicBool::new(false),
    });
    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);

    let monitor = Monitor::new(config, driver, radio, mailer)?;
    let mut status = monitor.subscribe_status();
    monitor.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nExiting...");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                if snapshot.phase != hottub_probes::LoopPhase::Idle {
                    continue;
                }

                println!("Cycle {} ({})", snapshot.cycles, monitor.connection_state());
                for sample in &snapshot.samples {
                    let reading = sample
                        .celsius()
                        .map(hottub_probes::utils::format_temperature)
                        .unwrap_or_else(|| "--".to_string());
                    println!(
                        "  {:<10} {:<20} {}",
                        sample.probe.role,
                        reading,
                        snapshot.alert(sample.probe.role).status
                    );
                }
            }
        }
    }

    monitor.shutdown().await
}
