// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for lock-free queue events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Oldest elements were evicted to bring the queue back under its limit.
///
/// # Log Level
/// `trace!` - Expected steady-state behaviour of a bounded queue
pub struct QueueEvicted {
    pub evicted: usize,
    pub remaining: usize,
    pub max_elements: usize,
}

impl Display for QueueEvicted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Evicted {} element(s); {} remain (limit {})",
            self.evicted, self.remaining, self.max_elements
        )
    }
}

impl StructuredLog for QueueEvicted {
    fn log(&self) {
        tracing::trace!(
            evicted = self.evicted,
            remaining = self.remaining,
            max_elements = self.max_elements,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("queue_eviction", span_name = name, max_elements = self.max_elements)
    }
}

/// A queue observer panicked while being notified.
///
/// # Log Level
/// `error!` - The queue operation itself already succeeded
pub struct ObserverPanicked<'a> {
    pub event: &'a str,
    pub message: &'a str,
}

impl Display for ObserverPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Queue observer of '{}' events {}", self.event, self.message)
    }
}

impl StructuredLog for ObserverPanicked<'_> {
    fn log(&self) {
        tracing::error!(event = self.event, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("queue_observer", span_name = name, event = self.event)
    }
}
