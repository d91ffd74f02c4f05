//! ==============================================================================
//! messages.rs - payload types carried on the bus
//! ==============================================================================
//!
//! purpose:
//!     the two channel payloads of the station:
//!     - Trigger: a request for a fresh reading
//!     - Reading: the measured (or simulated) values plus a status code
//!
//! invalid measurements:
//!     each of temperature / humidity / pressure is NaN when that field is
//!     invalid or unavailable. fields are independent: a reading can carry a
//!     valid temperature and a NaN pressure. use the Option accessors
//!     (temperature(), humidity(), pressure()) instead of comparing floats.
//!
//! ==============================================================================

use std::fmt;
use std::ops::BitOr;

/// status value for a successful reading
pub const STATUS_OK: i32 = 0;

/// status value when the sensor could not be sampled (EIO)
pub const STATUS_SENSOR_FAILURE: i32 = -5;

/// who asked for a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    /// console command
    Manual,
    /// periodic update
    Timer,
    /// external request
    External,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerSource::Manual => "manual",
            TriggerSource::Timer => "timer",
            TriggerSource::External => "external",
        };
        f.write_str(name)
    }
}

/// request for a new reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub source: TriggerSource,
    /// per-producer request counter
    pub sequence: u32,
}

impl Trigger {
    pub fn new(source: TriggerSource, sequence: u32) -> Self {
        Self { source, sequence }
    }
}

/// provenance bits of a reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SourceFlags(u32);

impl SourceFlags {
    pub const NONE: SourceFlags = SourceFlags(0);
    pub const INTERNAL: SourceFlags = SourceFlags(1 << 0);
    pub const EXTERNAL: SourceFlags = SourceFlags(1 << 1);

    pub const fn from_bits(bits: u32) -> Self {
        SourceFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: SourceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SourceFlags {
    type Output = SourceFlags;

    fn bitor(self, rhs: SourceFlags) -> SourceFlags {
        SourceFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for SourceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.contains(Self::INTERNAL), self.contains(Self::EXTERNAL)) {
            (true, true) => f.write_str("INTERNAL|EXTERNAL"),
            (true, false) => f.write_str("INTERNAL"),
            (false, true) => f.write_str("EXTERNAL"),
            (false, false) => write!(f, "0x{:X}", self.0),
        }
    }
}

/// one environmental reading
#[derive(Debug, Clone, Copy)]
pub struct Reading {
    /// milliseconds of process uptime at capture
    pub timestamp: u64,
    /// celsius, NaN if invalid
    pub temperature: f32,
    /// relative humidity 0-100, NaN if invalid
    pub humidity: f32,
    /// pascals, NaN if invalid
    pub pressure: f32,
    pub source_flags: SourceFlags,
    /// echoes the sequence of the trigger that caused it
    pub sequence: u32,
    /// 0 on success, error code otherwise
    pub status: i32,
}

impl Reading {
    /// a reading with every measurement marked invalid
    pub fn invalid(sequence: u32, timestamp: u64, status: i32) -> Self {
        Self {
            timestamp,
            temperature: f32::NAN,
            humidity: f32::NAN,
            pressure: f32::NAN,
            source_flags: SourceFlags::INTERNAL,
            sequence,
            status,
        }
    }

    pub fn temperature(&self) -> Option<f32> {
        valid(self.temperature)
    }

    pub fn humidity(&self) -> Option<f32> {
        valid(self.humidity)
    }

    pub fn pressure(&self) -> Option<f32> {
        valid(self.pressure)
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// field-for-field identity, treating NaN as equal to NaN
    pub fn same_as(&self, other: &Reading) -> bool {
        self.timestamp == other.timestamp
            && self.temperature.to_bits() == other.temperature.to_bits()
            && self.humidity.to_bits() == other.humidity.to_bits()
            && self.pressure.to_bits() == other.pressure.to_bits()
            && self.source_flags == other.source_flags
            && self.sequence == other.sequence
            && self.status == other.status
    }
}

fn valid(value: f32) -> Option<f32> {
    (!value.is_nan()).then_some(value)
}
