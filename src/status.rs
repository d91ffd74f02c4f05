//! ==============================================================================
//! status.rs - latest-reading cache behind the console
//! ==============================================================================
//!
//! purpose:
//!     keeps the most recent reading and a trigger-request counter for the
//!     console's `show` and `status` commands.
//!
//! state machine:
//!
//! ```text
//!     Empty ──first reading──> HasData ──every reading (overwrite)──┐
//!                                 ^─────────────────────────────────┘
//! ```
//! there is no way back to Empty.
//!
//! ==============================================================================

use crate::bus::{Dispatch, Observer};
use crate::messages::Reading;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    HasData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub requests_sent: u32,
    pub data_available: bool,
}

#[derive(Debug, Default)]
pub struct StatusCache {
    latest: Mutex<Option<Reading>>,
    requests_sent: AtomicU32,
}

impl StatusCache {
    pub const NAME: &'static str = "shell_iface";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Reading> {
        *self.latest.lock()
    }

    pub fn state(&self) -> CacheState {
        match self.latest.lock().is_some() {
            true => CacheState::HasData,
            false => CacheState::Empty,
        }
    }

    /// count one trigger request that reached the bus
    pub fn record_request(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> Stats {
        Stats {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            data_available: self.state() == CacheState::HasData,
        }
    }
}

impl Observer<Reading> for StatusCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_publish(&self, _ctx: &Dispatch<'_>, reading: &Reading) {
        *self.latest.lock() = Some(*reading);
    }
}
