//! ==============================================================================
//! station.rs - start-up wiring
//! ==============================================================================
//!
//! purpose:
//!     the single initialization phase of the process. declares the channels,
//!     registers every observer in a fixed order, then starts the bus so no
//!     further registration is possible.
//!
//! wiring:
//!
//! ```text
//!     console ──┐
//!               ├──> ws_trigger ──> sensor_mgr ──> ws_sensor_data ──┬──> display_mgr
//!     timer ────┘                                                   └──> shell_iface (StatusCache)
//! ```
//!
//! ==============================================================================

use crate::bus::{ChannelHandle, MessageBus};
use crate::clock::Uptime;
use crate::config::StationConfig;
use crate::console::{Console, SequenceCounter};
use crate::display::DisplaySink;
use crate::error::BusResult;
use crate::messages::{Reading, Trigger};
use crate::sensor::{self, SensorSource};
use crate::sensor_mgr::SensorManager;
use crate::status::StatusCache;
use crate::timer::TimerTrigger;

use std::sync::Arc;

pub const TRIGGER_CHANNEL: &str = "ws_trigger";
pub const READING_CHANNEL: &str = "ws_sensor_data";

pub struct Station {
    pub bus: Arc<MessageBus>,
    pub triggers: ChannelHandle<Trigger>,
    pub readings: ChannelHandle<Reading>,
    pub sensor_mgr: Arc<SensorManager>,
    pub display: Arc<DisplaySink>,
    pub status: Arc<StatusCache>,
    pub uptime: Uptime,
    manual_sequence: SequenceCounter,
    config: StationConfig,
}

impl Station {
    /// wire the station with the sensor source named in config
    pub fn build(config: &StationConfig) -> BusResult<Self> {
        Self::with_source(config, sensor::from_config(&config.sensor))
    }

    pub fn with_source(config: &StationConfig, source: Box<dyn SensorSource>) -> BusResult<Self> {
        let uptime = Uptime::start();
        let bus = Arc::new(MessageBus::new());

        let triggers = bus.declare_channel::<Trigger>(TRIGGER_CHANNEL)?;
        let readings = bus.declare_channel::<Reading>(READING_CHANNEL)?;

        let sensor_mgr = Arc::new(SensorManager::new(
            readings,
            source,
            uptime,
            config.bus.reading_timeout(),
        ));
        let display = Arc::new(DisplaySink::new(config.logging.show_sensor_data));
        let status = Arc::new(StatusCache::new());

        bus.subscribe(triggers, sensor_mgr.clone())?;
        bus.subscribe(readings, display.clone())?;
        bus.subscribe(readings, status.clone())?;
        bus.start();

        Ok(Self {
            bus,
            triggers,
            readings,
            sensor_mgr,
            display,
            status,
            uptime,
            manual_sequence: SequenceCounter::default(),
            config: config.clone(),
        })
    }

    /// a console handle; every console of this station draws manual
    /// sequence numbers from the same counter
    pub fn console(&self) -> Console {
        Console::new(
            self.bus.clone(),
            self.triggers,
            self.status.clone(),
            self.uptime,
            self.config.bus.trigger_timeout(),
            self.manual_sequence.clone(),
        )
    }

    /// periodic trigger producer, if an interval is configured
    pub fn timer(&self) -> Option<TimerTrigger> {
        self.config.trigger.interval().map(|interval| {
            TimerTrigger::new(
                self.bus.clone(),
                self.triggers,
                interval,
                self.config.bus.trigger_timeout(),
            )
        })
    }
}
