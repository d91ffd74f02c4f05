//! ==============================================================================
//! sensor_mgr.rs - turns triggers into readings
//! ==============================================================================
//!
//! purpose:
//!     observes the trigger channel. for every trigger it samples the sensor
//!     source and publishes a Reading on the reading channel, from inside the
//!     trigger dispatch (so the reading observers run before the trigger
//!     publish returns).
//!
//! rules:
//!     - reading.sequence echoes trigger.sequence (request id = reading id)
//!     - source_flags = INTERNAL
//!     - a failed sample still produces a reading: NaN fields, nonzero status
//!     - a reading publish that times out is logged and counted, never retried
//!
//! relationships:
//!     - subscribed to: ws_trigger (station.rs)
//!     - publishes to: ws_sensor_data
//!     - uses: sensor.rs (SensorSource), clock.rs (timestamps)
//!
//! ==============================================================================

use crate::bus::{ChannelHandle, Dispatch, Observer};
use crate::clock::Uptime;
use crate::messages::{Reading, SourceFlags, Trigger, STATUS_OK, STATUS_SENSOR_FAILURE};
use crate::sensor::SensorSource;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct SensorManager {
    readings: ChannelHandle<Reading>,
    source: Mutex<Box<dyn SensorSource>>,
    uptime: Uptime,
    publish_timeout: Duration,
    triggers_handled: AtomicU64,
    failed_publishes: AtomicU64,
}

impl SensorManager {
    pub const NAME: &'static str = "sensor_mgr";

    pub fn new(
        readings: ChannelHandle<Reading>,
        source: Box<dyn SensorSource>,
        uptime: Uptime,
        publish_timeout: Duration,
    ) -> Self {
        tracing::info!(source = source.name(), "Sensor manager initialized");
        Self {
            readings,
            source: Mutex::new(source),
            uptime,
            publish_timeout,
            triggers_handled: AtomicU64::new(0),
            failed_publishes: AtomicU64::new(0),
        }
    }

    /// sample the source and build the reading answering `trigger`
    pub fn reading_for(&self, trigger: &Trigger) -> Reading {
        let timestamp = self.uptime.millis();
        match self.source.lock().sample() {
            Ok(sample) => Reading {
                timestamp,
                temperature: sample.temperature,
                humidity: sample.humidity,
                pressure: sample.pressure,
                source_flags: SourceFlags::INTERNAL,
                sequence: trigger.sequence,
                status: STATUS_OK,
            },
            Err(e) => {
                tracing::warn!(seq = trigger.sequence, "Sensor sample failed: {:#}", e);
                Reading::invalid(trigger.sequence, timestamp, STATUS_SENSOR_FAILURE)
            }
        }
    }

    pub fn triggers_handled(&self) -> u64 {
        self.triggers_handled.load(Ordering::Relaxed)
    }

    /// reading publishes that timed out or were rejected
    pub fn failed_publishes(&self) -> u64 {
        self.failed_publishes.load(Ordering::Relaxed)
    }
}

impl Observer<Trigger> for SensorManager {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_publish(&self, ctx: &Dispatch<'_>, trigger: &Trigger) {
        self.triggers_handled.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Trigger received (source: {}, seq: {})", trigger.source, trigger.sequence);

        let reading = self.reading_for(trigger);
        if let Err(e) = ctx.bus().publish(self.readings, reading, self.publish_timeout) {
            self.failed_publishes.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Failed to publish sensor data: {}", e);
        }
    }
}
