//! Host readings used for the system context, the `sysinfo` command and the
//! temperature tool.

use serde::Serialize;
use sysinfo::{CpuRefreshKind, Components, Disks, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HostReport {
    pub timestamp: String,
    pub os: String,
    pub os_version: String,
    pub architecture: String,
    pub processor: String,
    pub cpu_cores: usize,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    pub disk_usage_percent: Option<f64>,
}

impl HostReport {
    pub fn collect() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        let processor = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .unwrap_or_default();
        let disks = Disks::new_with_refreshed_list();
        let disk_usage_percent = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .and_then(|d| usage_percent(d.total_space(), d.available_space()));

        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::long_os_version()
                .or_else(System::os_version)
                .unwrap_or_default(),
            architecture: std::env::consts::ARCH.to_string(),
            processor,
            cpu_cores: system.cpus().len(),
            total_memory_bytes: system.total_memory(),
            available_memory_bytes: system.available_memory(),
            disk_usage_percent,
        }
    }

    /// Ordered key/value view, as shown to both the user and the model.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let used = self
            .total_memory_bytes
            .saturating_sub(self.available_memory_bytes);
        vec![
            ("timestamp", self.timestamp.clone()),
            ("os", self.os.clone()),
            ("os_version", self.os_version.clone()),
            ("architecture", self.architecture.clone()),
            ("processor", self.processor.clone()),
            ("cpu_cores", self.cpu_cores.to_string()),
            ("total_memory", gib(self.total_memory_bytes)),
            ("available_memory", gib(self.available_memory_bytes)),
            ("used_memory", gib(used)),
            (
                "disk_usage",
                self.disk_usage_percent
                    .map(|p| format!("{p:.1}%"))
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
        ]
    }
}

fn gib(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB)
}

fn usage_percent(total: u64, available: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(total.saturating_sub(available) as f64 * 100.0 / total as f64)
}

/// One temperature sensor reading, in degrees Celsius.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub chip: String,
    pub label: String,
    pub current: f32,
    pub high: Option<f32>,
    pub critical: Option<f32>,
}

/// Read every sensor that currently reports a temperature.
pub fn read_sensors() -> Vec<SensorReading> {
    let components = Components::new_with_refreshed_list();
    let readings: Vec<SensorReading> = components
        .list()
        .iter()
        .filter_map(|c| {
            let current = c.temperature()?;
            let (chip, label) = split_label(c.label());
            Some(SensorReading {
                chip,
                label,
                current,
                high: c.max().filter(|v| *v > 0.0),
                critical: c.critical().filter(|v| *v > 0.0),
            })
        })
        .collect();
    debug!(count = readings.len(), "read temperature sensors");
    readings
}

// sysinfo labels on Linux read "<chip> <sensor>", e.g. "coretemp Core 0"
fn split_label(label: &str) -> (String, String) {
    match label.split_once(' ') {
        Some((chip, rest)) if !rest.trim().is_empty() => (chip.to_string(), rest.trim().to_string()),
        _ => (label.to_string(), label.to_string()),
    }
}
