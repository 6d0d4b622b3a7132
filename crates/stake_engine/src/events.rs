//! Lifecycle events emitted by the orchestrator.
//!
//! The engine renders nothing itself; a presentation layer subscribes
//! through a [`NotificationSink`].

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::orchestrator::OperationKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Validation passed and the protocol is starting.
    OperationStarted { key: OperationKey },
    OperationSettled {
        key: OperationKey,
        confirmation_id: String,
    },
    OperationFailed {
        key: OperationKey,
        reason: EngineError,
    },
}

impl LifecycleEvent {
    pub fn key(&self) -> &OperationKey {
        match self {
            LifecycleEvent::OperationStarted { key }
            | LifecycleEvent::OperationSettled { key, .. }
            | LifecycleEvent::OperationFailed { key, .. } => key,
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: LifecycleEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: LifecycleEvent) {}
}

/// Writes events to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::OperationStarted { key } => info!("Operation started: {}", key),
            LifecycleEvent::OperationSettled {
                key,
                confirmation_id,
            } => info!("Operation settled: {} ({})", key, confirmation_id),
            LifecycleEvent::OperationFailed { key, reason } => {
                warn!("Operation failed: {}: {}", key, reason)
            }
        }
    }
}

/// Forwards events over an unbounded tokio channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: LifecycleEvent) {
        // a dropped receiver just means nobody is listening any more
        let _ = self.tx.send(event);
    }
}
