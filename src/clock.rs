//! monotonic process uptime

use std::time::{Duration, Instant};

/// a fixed start instant shared by everything that stamps or reports time
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    started: Instant,
}

impl Uptime {
    pub fn start() -> Self {
        Self { started: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn millis(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for Uptime {
    fn default() -> Self {
        Self::start()
    }
}
