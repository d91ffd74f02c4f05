//! ==============================================================================
//! console.rs - line-oriented command surface
//! ==============================================================================
//!
//! commands (an optional `ws` prefix is accepted, e.g. `ws trigger`):
//!     trigger   publish Trigger { source: manual, sequence: next }
//!     show      print the cached latest reading, or "no data"
//!     status    data availability, triggers sent, uptime
//!     help      list commands
//!     quit      leave the console (alias: exit)
//!
//! every command blocks for at most the trigger publish timeout, so main.rs
//! runs them on the blocking pool.
//!
//! ==============================================================================

use crate::bus::{ChannelHandle, MessageBus};
use crate::clock::Uptime;
use crate::display::render_lines;
use crate::error::BusError;
use crate::messages::{Reading, Trigger, TriggerSource};
use crate::status::{Stats, StatusCache};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const HELP: &str = "\
Weather Station commands:
  ws trigger   Request immediate sensor reading
  ws show      Display latest sensor data
  ws status    Show subsystem health and statistics
  help         This text
  quit         Leave the console";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Trigger,
    Show,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Unknown command '{0}' (type 'help')")]
    UnknownCommand(String),
    #[error("Usage: ws {0}")]
    Usage(&'static str),
    #[error("No sensor data available")]
    NoData,
    #[error("Failed to publish trigger: {0}")]
    Publish(#[from] BusError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    Silent,
    Quit,
}

impl Command {
    /// parse one input line; Ok(None) for a blank line
    pub fn parse(line: &str) -> Result<Option<Command>, ConsoleError> {
        let mut words = line.split_whitespace().peekable();
        if words.peek() == Some(&"ws") {
            words.next();
        }
        let Some(word) = words.next() else {
            return Ok(None);
        };

        let (command, usage) = match word {
            "trigger" => (Command::Trigger, "trigger"),
            "show" => (Command::Show, "show"),
            "status" => (Command::Status, "status"),
            "help" => (Command::Help, "help"),
            "quit" | "exit" => (Command::Quit, "quit"),
            other => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };
        if words.next().is_some() {
            return Err(ConsoleError::Usage(usage));
        }
        Ok(Some(command))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub stats: Stats,
    pub uptime_ms: u64,
}

impl StatusReport {
    pub fn render(&self) -> String {
        format!(
            "Weather Station Status:\n  \
             Sensor Data Available: {}\n  \
             Triggers Sent: {}\n  \
             System Uptime: {} ms",
            if self.stats.data_available { "YES" } else { "NO" },
            self.stats.requests_sent,
            self.uptime_ms
        )
    }
}

/// manual trigger counter, shared by every console of one station
#[derive(Debug, Clone)]
pub struct SequenceCounter(Arc<AtomicU32>);

impl SequenceCounter {
    pub fn starting_at(first: u32) -> Self {
        Self(Arc::new(AtomicU32::new(first)))
    }

    /// take the next sequence number
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

pub struct Console {
    bus: Arc<MessageBus>,
    triggers: ChannelHandle<Trigger>,
    cache: Arc<StatusCache>,
    uptime: Uptime,
    publish_timeout: Duration,
    sequence: SequenceCounter,
}

impl Console {
    pub fn new(
        bus: Arc<MessageBus>,
        triggers: ChannelHandle<Trigger>,
        cache: Arc<StatusCache>,
        uptime: Uptime,
        publish_timeout: Duration,
        sequence: SequenceCounter,
    ) -> Self {
        Self {
            bus,
            triggers,
            cache,
            uptime,
            publish_timeout,
            sequence,
        }
    }

    /// parse and execute one input line
    pub fn run_line(&self, line: &str) -> Result<Outcome, ConsoleError> {
        match Command::parse(line)? {
            Some(command) => self.execute(command),
            None => Ok(Outcome::Silent),
        }
    }

    pub fn execute(&self, command: Command) -> Result<Outcome, ConsoleError> {
        match command {
            Command::Trigger => {
                let trigger = self.trigger()?;
                Ok(Outcome::Reply(format!(
                    "Trigger sent (source: {}, seq: {})",
                    trigger.source, trigger.sequence
                )))
            }
            Command::Show => {
                let reading = self.show()?;
                let mut text = String::from("Latest Sensor Data:");
                for line in render_lines(&reading) {
                    text.push_str("\n  ");
                    text.push_str(&line);
                }
                Ok(Outcome::Reply(text))
            }
            Command::Status => Ok(Outcome::Reply(self.status().render())),
            Command::Help => Ok(Outcome::Reply(HELP.to_string())),
            Command::Quit => Ok(Outcome::Quit),
        }
    }

    /// publish a manual trigger; the reading chain completes before this returns
    pub fn trigger(&self) -> Result<Trigger, ConsoleError> {
        let sequence = self.sequence.next();
        let trigger = Trigger::new(TriggerSource::Manual, sequence);
        self.bus.publish(self.triggers, trigger, self.publish_timeout)?;
        self.cache.record_request();
        Ok(trigger)
    }

    pub fn show(&self) -> Result<Reading, ConsoleError> {
        self.cache.latest().ok_or(ConsoleError::NoData)
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            stats: self.cache.stats(),
            uptime_ms: self.uptime.millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("trigger", Some(Command::Trigger))]
    #[case("ws trigger", Some(Command::Trigger))]
    #[case("  show  ", Some(Command::Show))]
    #[case("ws status", Some(Command::Status))]
    #[case("help", Some(Command::Help))]
    #[case("exit", Some(Command::Quit))]
    #[case("", None)]
    #[case("ws", None)]
    fn parses_commands(#[case] line: &str, #[case] expected: Option<Command>) {
        assert_eq!(Command::parse(line).unwrap(), expected);
    }

    #[test]
    fn extra_arguments_are_a_usage_error() {
        let err = Command::parse("ws show now").unwrap_err();
        assert!(matches!(err, ConsoleError::Usage("show")));
        assert_eq!(err.to_string(), "Usage: ws show");
    }

    #[test]
    fn unknown_command_is_reported() {
        let err = Command::parse("reboot").unwrap_err();
        assert!(matches!(err, ConsoleError::UnknownCommand(ref c) if c == "reboot"));
    }

    #[test]
    fn shared_counter_never_repeats() {
        let counter = SequenceCounter::default();
        let other = counter.clone();
        assert_eq!(counter.next(), 1);
        assert_eq!(other.next(), 2);
        assert_eq!(counter.next(), 3);
    }

    #[test]
    fn status_report_renders() {
        let report = StatusReport {
            stats: Stats {
                requests_sent: 3,
                data_available: true,
            },
            uptime_ms: 1500,
        };
        assert_eq!(
            report.render(),
            "Weather Station Status:\n  \
             Sensor Data Available: YES\n  \
             Triggers Sent: 3\n  \
             System Uptime: 1500 ms"
        );
    }
}
