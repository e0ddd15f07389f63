#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in layerpull
//!
//! Library crates never print. Everything user-visible travels as an
//! [`EventMessage`] over an unbounded channel and the CLI decides how to
//! render or log it.
//!
//! ## Architecture
//!
//! - **Domain-driven events**: grouped by functional domain (download, auth, manifest)
//! - **Unified `EventEmitter` trait**: single API for all emissions
//! - **Metadata envelope**: every event carries an [`EventMeta`] with id, level and source
//! - **Progress aggregation**: [`ProgressAggregator`] keeps batch counters

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod progress;
pub use progress::{format_elapsed, ProgressAggregator, ProgressSnapshot};

pub mod events;
pub use events::{
    AppEvent, AuthEvent, DownloadEvent, FailureContext, GeneralEvent, ManifestEvent,
    ProgressEvent, ResetCause,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// An event together with its metadata envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: AppEvent,
}

impl EventMessage {
    /// Wrap an event with metadata derived from its domain and level
    #[must_use]
    pub fn from_event(event: AppEvent) -> Self {
        let meta = EventMeta::new(
            EventLevel::from(event.log_level()),
            event.event_source(),
            event.correlation_id(),
        );
        Self { meta, event }
    }
}

/// Type alias for the event sender
pub type EventSender = UnboundedSender<EventMessage>;

/// Type alias for the event receiver
pub type EventReceiver = UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout layerpull
///
/// This trait provides a single, consistent API for emitting events regardless of
/// whether you have a raw `EventSender` or a struct that contains one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(EventMessage::from_event(event));
        }
    }

    /// Emit a warning about `context` (a registry, digest or reference)
    fn emit_warning(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message, context)));
    }

    /// Emit an operation started event
    fn emit_operation_started(&self, operation: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationStarted {
            operation: operation.into(),
        }));
    }

    /// Emit an operation completed event
    fn emit_operation_completed(&self, operation: impl Into<String>, success: bool) {
        self.emit(AppEvent::General(GeneralEvent::OperationCompleted {
            operation: operation.into(),
            success,
        }));
    }

    /// Emit an operation failed event
    fn emit_operation_failed(&self, operation: impl Into<String>, error: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationFailed {
            operation: operation.into(),
            error: error.into(),
        }));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}
