//! weather-station: a trigger -> reading telemetry chain over a typed,
//! synchronous publish/subscribe bus.
//!
//! see `bus` for the dispatch model and `station` for how the pieces are wired.

pub mod bus;
pub mod clock;
pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod messages;
pub mod sensor;
pub mod sensor_mgr;
pub mod station;
pub mod status;
pub mod timer;

pub use bus::{ChannelHandle, Dispatch, MessageBus, Observer};
pub use error::{BusError, BusResult};
pub use messages::{Reading, SourceFlags, Trigger, TriggerSource};
pub use station::Station;
