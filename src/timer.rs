//! periodic trigger producer (`source = timer`)
//!
//! keeps its own sequence counter, independent of the console's. a publish
//! that times out is logged and the loop keeps its schedule.

use crate::bus::{ChannelHandle, MessageBus};
use crate::messages::{Trigger, TriggerSource};

use std::sync::Arc;
use std::time::Duration;

pub struct TimerTrigger {
    bus: Arc<MessageBus>,
    triggers: ChannelHandle<Trigger>,
    interval: Duration,
    publish_timeout: Duration,
    next_sequence: u32,
}

impl TimerTrigger {
    pub fn new(
        bus: Arc<MessageBus>,
        triggers: ChannelHandle<Trigger>,
        interval: Duration,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            bus,
            triggers,
            interval,
            publish_timeout,
            next_sequence: 1,
        }
    }

    fn next_trigger(&mut self) -> Trigger {
        let trigger = Trigger::new(TriggerSource::Timer, self.next_sequence);
        self.next_sequence = self.next_sequence.wrapping_add(1);
        trigger
    }

    /// publish one timer trigger on the blocking pool
    pub async fn fire(&mut self) -> anyhow::Result<Trigger> {
        let trigger = self.next_trigger();
        let bus = self.bus.clone();
        let (handle, timeout) = (self.triggers, self.publish_timeout);
        tokio::task::spawn_blocking(move || bus.publish(handle, trigger, timeout)).await??;
        Ok(trigger)
    }

    /// fire every `interval` until the task is dropped or aborted
    pub async fn run(mut self) {
        tracing::info!("[TIMER] Periodic trigger every {:?}", self.interval);
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.fire().await {
                Ok(trigger) => tracing::debug!(seq = trigger.sequence, "[TIMER] trigger published"),
                Err(e) => tracing::warn!("[TIMER] trigger dropped: {:#}", e),
            }
        }
    }
}
