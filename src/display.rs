//! ==============================================================================
//! display.rs - display sink for readings
//! ==============================================================================
//!
//! purpose:
//!     renders every reading published on the reading channel. there is no
//!     filtering: readings with a nonzero status are rendered as they are.
//!     output goes through tracing, which acts as the "screen" here.
//!
//! relationships:
//!     - subscribed to: ws_sensor_data (first observer)
//!     - render_lines() is shared with console.rs for `show`
//!
//! ==============================================================================

use crate::bus::{Dispatch, Observer};
use crate::messages::Reading;

use std::sync::atomic::{AtomicU64, Ordering};

/// fixed labelled lines for one reading; NaN fields render as "invalid"
pub fn render_lines(reading: &Reading) -> Vec<String> {
    vec![
        format!("Timestamp: {} ms", reading.timestamp),
        format!("Temperature: {}", measurement(reading.temperature(), "°C")),
        format!("Humidity: {}", measurement(reading.humidity(), "%")),
        format!("Pressure: {}", measurement(reading.pressure(), " Pa")),
        format!("Source: {}", reading.source_flags),
        format!("Sequence: {}", reading.sequence),
        format!("Status: {}", reading.status),
    ]
}

fn measurement(value: Option<f32>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1}{unit}"),
        None => "invalid".to_string(),
    }
}

pub struct DisplaySink {
    show: bool,
    rendered: AtomicU64,
}

impl DisplaySink {
    pub const NAME: &'static str = "display_mgr";

    pub fn new(show: bool) -> Self {
        tracing::info!("Display manager initialized");
        Self {
            show,
            rendered: AtomicU64::new(0),
        }
    }

    /// readings received so far
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }
}

impl Observer<Reading> for DisplaySink {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_publish(&self, _ctx: &Dispatch<'_>, reading: &Reading) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
        if !self.show {
            return;
        }
        tracing::info!("Sensor Data Received:");
        for line in render_lines(reading) {
            tracing::info!("  {}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{SourceFlags, STATUS_SENSOR_FAILURE};
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_every_field() {
        let reading = Reading {
            timestamp: 1234,
            temperature: 22.5,
            humidity: 45.0,
            pressure: 101_325.0,
            source_flags: SourceFlags::INTERNAL,
            sequence: 1,
            status: 0,
        };
        assert_eq!(
            render_lines(&reading),
            vec![
                "Timestamp: 1234 ms",
                "Temperature: 22.5°C",
                "Humidity: 45.0%",
                "Pressure: 101325.0 Pa",
                "Source: INTERNAL",
                "Sequence: 1",
                "Status: 0",
            ]
        );
    }

    #[test]
    fn renders_invalid_reading_as_is() {
        let reading = Reading::invalid(4, 10, STATUS_SENSOR_FAILURE);
        let lines = render_lines(&reading);
        assert_eq!(lines[1], "Temperature: invalid");
        assert_eq!(lines[3], "Pressure: invalid");
        assert_eq!(lines[6], "Status: -5");
    }
}
