//! System Statistics Source
//!
//! One line per metric, in display order:
//!
//! ```text
//! 14.03 07:15 21°C/45%
//! Uptime: 3d 04:05
//! Free: 512/924MB
//! CPU: 48.3°C 1500MHz
//! Load: 0.12/0.30
//! wlan0: 12.3/4.5MB
//! eth0:  0.0/0.0MB
//! 14.03 06:58 GPIO17
//! ```
//!
//! Memory, load, uptime and interface counters come from `sysinfo`. CPU
//! temperature and clock are read with `vcgencmd`, falling back to the kernel
//! thermal zones and cpufreq when it is unavailable. Every metric degrades to
//! zero on its own; the fetch as a whole never fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use sysinfo::{Components, Networks, System};
use tokio::process::Command;

use super::LineSource;
use crate::error::PollError;
use crate::paginate::DisplayLine;
use crate::state::{SensorSample, SharedState};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Runs an external utility and returns its stdout
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, PollError>;
}

/// [`CommandRunner`] backed by `tokio::process` with a timeout
#[derive(Clone, Debug)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    /// Create a runner that abandons commands after `timeout`
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, PollError> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(program).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| PollError::Subprocess(format!("{program} timed out")))?
        .map_err(|e| PollError::Subprocess(format!("{program}: {e}")))?;

        if !output.status.success() {
            return Err(PollError::Subprocess(format!(
                "{program} exited with {}",
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Byte counters of one network interface, in MB
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InterfaceTraffic {
    /// Interface name
    pub name: String,
    /// Received MB
    pub rx_mb: f64,
    /// Transmitted MB
    pub tx_mb: f64,
}

/// Host metrics gathered in one blocking pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HostSnapshot {
    /// Total RAM in MB
    pub total_mb: u64,
    /// Available RAM in MB
    pub available_mb: u64,
    /// 1-minute load average
    pub load_one: f64,
    /// 5-minute load average
    pub load_five: f64,
    /// Seconds since boot
    pub uptime_secs: u64,
    /// Traffic for the configured interfaces, in configured order
    pub interfaces: Vec<InterfaceTraffic>,
    /// CPU temperature from the thermal zones, if any
    pub cpu_temp: Option<f32>,
    /// CPU clock from cpufreq, if any
    pub cpu_mhz: Option<u64>,
}

impl HostSnapshot {
    /// Read the host metrics. Blocking; run off the async workers.
    #[must_use]
    pub fn collect(interfaces: &[String]) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_frequency();

        let load = System::load_average();
        let networks = Networks::new_with_refreshed_list();
        let components = Components::new_with_refreshed_list();

        let interfaces = interfaces
            .iter()
            .map(|name| {
                networks.list().get(name).map_or_else(
                    || InterfaceTraffic {
                        name: name.clone(),
                        ..InterfaceTraffic::default()
                    },
                    |data| InterfaceTraffic {
                        name: name.clone(),
                        rx_mb: bytes_to_mb(data.total_received()),
                        tx_mb: bytes_to_mb(data.total_transmitted()),
                    },
                )
            })
            .collect();

        let cpu_temp = components
            .list()
            .iter()
            .find(|c| c.label().to_lowercase().contains("cpu"))
            .or_else(|| components.list().first())
            .map(sysinfo::Component::temperature)
            .filter(|t| t.is_finite());

        let cpu_mhz = sys
            .cpus()
            .first()
            .map(sysinfo::Cpu::frequency)
            .filter(|&mhz| mhz > 0);

        Self {
            total_mb: sys.total_memory() / (1024 * 1024),
            available_mb: sys.available_memory() / (1024 * 1024),
            load_one: load.one,
            load_five: load.five,
            uptime_secs: System::uptime(),
            interfaces,
            cpu_temp,
            cpu_mhz,
        }
    }
}

/// CPU temperature and clock as shown on the display
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CpuReading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Clock in MHz
    pub mhz: u64,
}

/// Host statistics page source
pub struct StatsSource {
    state: Arc<SharedState>,
    interfaces: Vec<String>,
    vcgencmd: String,
    runner: Arc<dyn CommandRunner>,
}

impl StatsSource {
    /// Create a stats source reporting the given network interfaces
    pub fn new(
        state: Arc<SharedState>,
        interfaces: Vec<String>,
        vcgencmd: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            state,
            interfaces,
            vcgencmd: vcgencmd.into(),
            runner,
        }
    }

    async fn snapshot(&self) -> HostSnapshot {
        let interfaces = self.interfaces.clone();
        match tokio::task::spawn_blocking(move || HostSnapshot::collect(&interfaces)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Host statistics collection failed");
                HostSnapshot {
                    interfaces: self
                        .interfaces
                        .iter()
                        .map(|name| InterfaceTraffic {
                            name: name.clone(),
                            ..InterfaceTraffic::default()
                        })
                        .collect(),
                    ..HostSnapshot::default()
                }
            }
        }
    }

    async fn cpu(&self, snapshot: &HostSnapshot) -> CpuReading {
        let temperature = match self.runner.run(&self.vcgencmd, &["measure_temp"]).await {
            Ok(out) => parse_vcgencmd_temp(&out),
            Err(e) => {
                tracing::debug!(error = %e, "vcgencmd measure_temp unavailable");
                None
            }
        }
        .or(snapshot.cpu_temp)
        .unwrap_or(0.0);

        let mhz = match self.runner.run(&self.vcgencmd, &["measure_clock", "arm"]).await {
            Ok(out) => parse_vcgencmd_clock(&out),
            Err(e) => {
                tracing::debug!(error = %e, "vcgencmd measure_clock unavailable");
                None
            }
        }
        .or(snapshot.cpu_mhz)
        .unwrap_or(0);

        CpuReading { temperature, mhz }
    }
}

#[async_trait]
impl LineSource for StatsSource {
    fn name(&self) -> &str {
        "stats"
    }

    async fn fetch(&self) -> Result<Vec<DisplayLine>, PollError> {
        let snapshot = self.snapshot().await;
        let cpu = self.cpu(&snapshot).await;
        Ok(format_stats(
            &snapshot,
            cpu,
            &self.state.sensor(),
            &self.state.last_motion(),
            Local::now(),
        ))
    }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 10.0).round() / 10.0
}

/// Parse `temp=48.3'C`
fn parse_vcgencmd_temp(output: &str) -> Option<f32> {
    let (_, value) = output.trim().split_once('=')?;
    value.trim_end_matches("'C").trim().parse().ok()
}

/// Parse `frequency(48)=1500398464` into MHz
fn parse_vcgencmd_clock(output: &str) -> Option<u64> {
    let (_, value) = output.trim().split_once('=')?;
    value.trim().parse::<u64>().ok().map(|hz| hz / 1_000_000)
}

/// Format seconds since boot as `3d 04:05` or `04:05`
#[must_use]
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}")
    } else {
        format!("{hours:02}:{minutes:02}")
    }
}

/// Assemble the statistics lines
#[must_use]
pub fn format_stats(
    host: &HostSnapshot,
    cpu: CpuReading,
    sample: &SensorSample,
    last_motion: &str,
    now: DateTime<Local>,
) -> Vec<DisplayLine> {
    let mut lines = vec![
        sample.status_line(now),
        format!("Uptime: {}", format_uptime(host.uptime_secs)),
        format!("Free: {}/{}MB", host.available_mb, host.total_mb),
        format!("CPU: {:.1}°C {}MHz", cpu.temperature, cpu.mhz),
        format!("Load: {:.2}/{:.2}", host.load_one, host.load_five),
    ];
    lines.extend(host.interfaces.iter().map(|iface| {
        format!(
            "{:<7}{:.1}/{:.1}MB",
            format!("{}:", iface.name),
            iface.rx_mb,
            iface.tx_mb
        )
    }));
    lines.push(last_motion.to_string());
    lines
}
