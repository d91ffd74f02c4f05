//! ==============================================================================
//! error.rs - bus error taxonomy
//! ==============================================================================
//!
//! purpose:
//!     the errors the message bus returns to the immediate caller of
//!     declare_channel / subscribe / publish. nothing here is swallowed by the
//!     bus: every variant reaches the caller synchronously.
//!
//! classes:
//!     - programmer errors: DuplicateChannel, UnknownChannel,
//!       SubscriptionAfterStart, DeclarationAfterStart
//!     - transient: Timeout (caller logs and continues, bus never retries)
//!
//! the `status` field inside a Reading is data, not a bus error, and never
//! shows up here.
//!
//! ==============================================================================

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// a channel with this name was already declared on this bus
    #[error("channel '{0}' is already declared")]
    DuplicateChannel(String),

    /// the handle was never declared on this bus
    #[error("unknown channel handle #{index}")]
    UnknownChannel { index: usize },

    /// observers can only be registered during the initialization phase
    #[error("observer '{observer}' cannot subscribe to '{channel}' after the bus has started")]
    SubscriptionAfterStart { channel: String, observer: String },

    /// channels can only be declared during the initialization phase
    #[error("channel '{0}' cannot be declared after the bus has started")]
    DeclarationAfterStart(String),

    /// channel access was not acquired within the caller's timeout
    #[error("timed out after {timeout:?} waiting for channel '{channel}'")]
    Timeout { channel: String, timeout: Duration },
}

impl BusError {
    /// true for conditions a caller is expected to log and move past
    pub fn is_transient(&self) -> bool {
        matches!(self, BusError::Timeout { .. })
    }
}

pub type BusResult<T> = Result<T, BusError>;
