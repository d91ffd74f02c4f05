//! ==============================================================================
//! sensor.rs - sensor sources
//! ==============================================================================
//!
//! purpose:
//!     provides the values the sensor manager turns into readings. the
//!     SensorSource trait is the seam where real hardware would plug in; this
//!     crate ships two software sources:
//!     - FixedSensor: the reference values 22.5°C / 45.0% / 101325 Pa
//!     - SimulatedSensor: starts at the reference values and drifts a little on
//!       every sample, within realistic bounds
//!
//! relationships:
//!     - used by: sensor_mgr.rs (samples on every trigger)
//!     - configured by: config.rs ([sensor] mode / seed)
//!
//! ==============================================================================

use crate::config::{SensorConfig, SensorMode};

use anyhow::Result;

pub const REFERENCE_TEMPERATURE_C: f32 = 22.5;
pub const REFERENCE_HUMIDITY_PERCENT: f32 = 45.0;
pub const REFERENCE_PRESSURE_PA: f32 = 101_325.0;

/// one raw sample: temperature (°C), humidity (%), pressure (Pa)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub temperature: f32,
    pub humidity: f32,
    pub pressure: f32,
}

impl Sample {
    pub const REFERENCE: Sample = Sample {
        temperature: REFERENCE_TEMPERATURE_C,
        humidity: REFERENCE_HUMIDITY_PERCENT,
        pressure: REFERENCE_PRESSURE_PA,
    };
}

pub trait SensorSource: Send {
    fn name(&self) -> &str;
    fn sample(&mut self) -> Result<Sample>;
}

/// build the source selected in config
pub fn from_config(config: &SensorConfig) -> Box<dyn SensorSource> {
    match config.mode {
        SensorMode::Fixed => {
            tracing::info!("Using FIXED sensor (reference values)");
            Box::new(FixedSensor)
        }
        SensorMode::Simulated => {
            tracing::info!(seed = config.seed, "Using SIMULATED sensor");
            Box::new(SimulatedSensor::new(config.seed))
        }
    }
}

// ==============================================================================
// fixed source
// ==============================================================================

#[derive(Debug, Default)]
pub struct FixedSensor;

impl SensorSource for FixedSensor {
    fn name(&self) -> &str {
        "fixed"
    }

    fn sample(&mut self) -> Result<Sample> {
        Ok(Sample::REFERENCE)
    }
}

// ==============================================================================
// simulated source
// ==============================================================================

const TEMPERATURE_RANGE: (f32, f32) = (15.0, 30.0);
const HUMIDITY_RANGE: (f32, f32) = (20.0, 80.0);
const PRESSURE_RANGE: (f32, f32) = (95_000.0, 105_000.0);

#[derive(Debug)]
pub struct SimulatedSensor {
    current: Sample,
    prng_state: u32,
    samples: u32,
}

impl SimulatedSensor {
    pub fn new(seed: u32) -> Self {
        Self {
            current: Sample::REFERENCE,
            prng_state: seed,
            samples: 0,
        }
    }

    /// linear congruential step, mapped to [0, 1]
    fn next_unit(&mut self) -> f32 {
        self.prng_state = self.prng_state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        self.prng_state as f32 / u32::MAX as f32
    }

    pub fn samples_taken(&self) -> u32 {
        self.samples
    }
}

impl SensorSource for SimulatedSensor {
    fn name(&self) -> &str {
        "simulated"
    }

    fn sample(&mut self) -> Result<Sample> {
        let temp_variation = self.next_unit() * 2.0 - 1.0;
        let humidity_variation = self.next_unit() * 5.0 - 2.5;
        let pressure_variation = self.next_unit() * 200.0 - 100.0;

        let (lo, hi) = TEMPERATURE_RANGE;
        self.current.temperature = (self.current.temperature + temp_variation * 0.1).clamp(lo, hi);
        let (lo, hi) = HUMIDITY_RANGE;
        self.current.humidity = (self.current.humidity + humidity_variation * 0.1).clamp(lo, hi);
        let (lo, hi) = PRESSURE_RANGE;
        self.current.pressure = (self.current.pressure + pressure_variation).clamp(lo, hi);

        self.samples = self.samples.wrapping_add(1);
        tracing::debug!(
            "[SIM] T={:.1}°C H={:.1}% P={:.1} Pa (n={})",
            self.current.temperature,
            self.current.humidity,
            self.current.pressure,
            self.samples
        );
        Ok(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_sensor_returns_reference_values() {
        let mut sensor = FixedSensor;
        assert_eq!(sensor.sample().unwrap(), Sample::REFERENCE);
        assert_eq!(sensor.sample().unwrap(), Sample::REFERENCE);
    }

    #[test]
    fn simulated_sensor_drifts_within_bounds() {
        let mut sensor = SimulatedSensor::new(42);
        let mut previous = Sample::REFERENCE;
        for _ in 0..5_000 {
            let s = sensor.sample().unwrap();
            assert!((15.0..=30.0).contains(&s.temperature));
            assert!((20.0..=80.0).contains(&s.humidity));
            assert!((95_000.0..=105_000.0).contains(&s.pressure));
            assert!((s.temperature - previous.temperature).abs() <= 0.1 + f32::EPSILON * 64.0);
            assert!((s.pressure - previous.pressure).abs() <= 100.5);
            previous = s;
        }
        assert_eq!(sensor.samples_taken(), 5_000);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SimulatedSensor::new(7);
        let mut b = SimulatedSensor::new(7);
        for _ in 0..10 {
            assert_eq!(a.sample().unwrap(), b.sample().unwrap());
        }
    }

    #[test]
    fn from_config_picks_the_mode() {
        let fixed = from_config(&SensorConfig { mode: SensorMode::Fixed, seed: 1 });
        assert_eq!(fixed.name(), "fixed");
        let sim = from_config(&SensorConfig { mode: SensorMode::Simulated, seed: 1 });
        assert_eq!(sim.name(), "simulated");
    }
}
