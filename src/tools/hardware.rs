use std::fmt::Write as _;

use crate::metrics::{SensorReading, read_sensors};
use crate::tools::ToolError;

/// Current sensor temperatures as a report grouped by chip.
pub fn hardware_temperatures() -> Result<String, ToolError> {
    format_temperatures(&read_sensors())
}

pub fn format_temperatures(readings: &[SensorReading]) -> Result<String, ToolError> {
    if readings.is_empty() {
        return Err(ToolError::SensorsUnavailable);
    }

    let mut out = String::from("System temperatures:\n");
    let mut current_chip: Option<&str> = None;
    for r in readings {
        if current_chip != Some(r.chip.as_str()) {
            let _ = writeln!(out, "{}:", r.chip);
            current_chip = Some(r.chip.as_str());
        }
        let _ = write!(out, "  - {}: {:.1}°C", r.label, r.current);
        if let Some(high) = r.high {
            let _ = write!(out, " (Max: {high:.1}°C)");
        }
        if let Some(critical) = r.critical {
            let _ = write!(out, " (Critical: {critical:.1}°C)");
        }
        out.push('\n');
    }
    Ok(out)
}
