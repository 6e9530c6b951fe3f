// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for concurrent bridge events.
//!
//! This module contains message types for logging events related to:
//! * Worker thread start and stop
//! * Messages dropped by a full bounded queue
//! * Faults caught inside the worker loop

use crate::errors::FlowError;
use crate::observability::messages::StructuredLog;
use crate::traits::arrow::EventId;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Bridge worker thread is running.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BridgeStarted<'a> {
    pub bridge: &'a str,
    pub capacity: Option<usize>,
}

impl Display for BridgeStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.capacity {
            Some(capacity) => write!(f, "Bridge '{}' worker started (capacity {})", self.bridge, capacity),
            None => write!(f, "Bridge '{}' worker started (unbounded)", self.bridge),
        }
    }
}

impl StructuredLog for BridgeStarted<'_> {
    fn log(&self) {
        tracing::info!(bridge = self.bridge, capacity = ?self.capacity, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "bridge_worker",
            span_name = name,
            bridge = self.bridge,
            capacity = ?self.capacity,
        )
    }
}

/// Bridge worker drained its queue and exited.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BridgeStopped<'a> {
    pub bridge: &'a str,
    pub delivered: u64,
    pub faulted: u64,
    pub dropped: u64,
}

impl Display for BridgeStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Bridge '{}' worker stopped: delivered={}, faulted={}, dropped={}",
            self.bridge, self.delivered, self.faulted, self.dropped
        )
    }
}

impl StructuredLog for BridgeStopped<'_> {
    fn log(&self) {
        tracing::info!(
            bridge = self.bridge,
            delivered = self.delivered,
            faulted = self.faulted,
            dropped = self.dropped,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("bridge_stopped", span_name = name, bridge = self.bridge)
    }
}

/// A message was discarded because the bounded queue was full.
///
/// # Log Level
/// `warn!` - Data loss by configuration
pub struct BridgeMessageDropped<'a> {
    pub bridge: &'a str,
    pub event_id: EventId,
    pub capacity: usize,
}

impl Display for BridgeMessageDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Bridge '{}' dropped event {}: queue full at {} messages",
            self.bridge, self.event_id, self.capacity
        )
    }
}

impl StructuredLog for BridgeMessageDropped<'_> {
    fn log(&self) {
        tracing::warn!(
            bridge = self.bridge,
            event_id = self.event_id,
            capacity = self.capacity,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("bridge_drop", span_name = name, bridge = self.bridge, event_id = self.event_id)
    }
}

/// A completion signal could not be queued because the bridge is closed.
///
/// # Log Level
/// `warn!` - Subscribers never see completion for this event
pub struct BridgeCompletionLost<'a> {
    pub bridge: &'a str,
    pub event_id: EventId,
    pub error: &'a FlowError,
}

impl Display for BridgeCompletionLost<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Bridge '{}' dropped completion of event {}: {}",
            self.bridge, self.event_id, self.error
        )
    }
}

impl StructuredLog for BridgeCompletionLost<'_> {
    fn log(&self) {
        tracing::warn!(
            bridge = self.bridge,
            event_id = self.event_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("bridge_completion", span_name = name, bridge = self.bridge, event_id = self.event_id)
    }
}

/// The worker caught a fault and keeps consuming.
///
/// # Log Level
/// `warn!` - Routed to the bridge's exception channel as well
pub struct BridgeWorkerFaulted<'a> {
    pub bridge: &'a str,
    pub event_id: EventId,
    pub error: &'a FlowError,
}

impl Display for BridgeWorkerFaulted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Bridge '{}' worker failed on event {} and continues: {}",
            self.bridge, self.event_id, self.error
        )
    }
}

impl StructuredLog for BridgeWorkerFaulted<'_> {
    fn log(&self) {
        tracing::warn!(
            bridge = self.bridge,
            event_id = self.event_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("bridge_fault", span_name = name, bridge = self.bridge, event_id = self.event_id)
    }
}

/// The worker thread panicked outside the per-message guard.
///
/// # Log Level
/// `error!` - Reported when the worker is joined
pub struct BridgeWorkerLost<'a> {
    pub bridge: &'a str,
    pub message: &'a str,
}

impl Display for BridgeWorkerLost<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Bridge '{}' worker thread {}", self.bridge, self.message)
    }
}

impl StructuredLog for BridgeWorkerLost<'_> {
    fn log(&self) {
        tracing::error!(bridge = self.bridge, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("bridge_lost", span_name = name, bridge = self.bridge)
    }
}
