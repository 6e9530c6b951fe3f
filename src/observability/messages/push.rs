// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for push arrow events.
//!
//! This module contains message types for logging events related to:
//! * Subscribers failing during multicast delivery
//! * Faults that reach a node with no exception handler
//! * Vote collection and aggregated batch flushes

use crate::errors::FlowError;
use crate::observability::messages::StructuredLog;
use crate::traits::arrow::EventId;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A subscriber failed while receiving a notification.
///
/// # Log Level
/// `warn!` - Delivery to the remaining subscribers continues
pub struct SubscriberFaulted<'a> {
    pub node: &'a str,
    pub subscriber: usize,
    pub event_id: EventId,
    pub error: &'a FlowError,
}

impl Display for SubscriberFaulted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Subscriber #{} of '{}' failed on event {}: {}",
            self.subscriber, self.node, self.event_id, self.error
        )
    }
}

impl StructuredLog for SubscriberFaulted<'_> {
    fn log(&self) {
        tracing::warn!(
            node = self.node,
            subscriber = self.subscriber,
            event_id = self.event_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "subscriber_fault",
            span_name = name,
            node = self.node,
            subscriber = self.subscriber,
            event_id = self.event_id,
        )
    }
}

/// A fault was raised on a node nobody listens to.
///
/// # Log Level
/// `error!` - Otherwise the fault would vanish
pub struct UnhandledFault<'a> {
    pub node: &'a str,
    pub event_id: EventId,
    pub error: &'a FlowError,
}

impl Display for UnhandledFault<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Unhandled fault on '{}' (event {}): {}",
            self.node, self.event_id, self.error
        )
    }
}

impl StructuredLog for UnhandledFault<'_> {
    fn log(&self) {
        tracing::error!(
            node = self.node,
            event_id = self.event_id,
            origin = self.error.origin(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "unhandled_fault",
            span_name = name,
            node = self.node,
            event_id = self.event_id,
        )
    }
}

/// An exception or completion handler itself panicked.
///
/// # Log Level
/// `error!` - The handler's panic is swallowed to protect the pusher
pub struct HandlerPanicked<'a> {
    pub node: &'a str,
    pub channel: &'a str,
    pub message: &'a str,
}

impl Display for HandlerPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "A {} handler of '{}' {}",
            self.channel, self.node, self.message
        )
    }
}

impl StructuredLog for HandlerPanicked<'_> {
    fn log(&self) {
        tracing::error!(node = self.node, channel = self.channel, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("handler_panic", span_name = name, node = self.node, channel = self.channel)
    }
}

/// Every voter has seen the message and the vote is settled.
///
/// # Log Level
/// `trace!` - Per-message detail
pub struct VoteCollected<'a> {
    pub notificator: &'a str,
    pub event_id: EventId,
    pub ballots: usize,
    pub faults: usize,
}

impl Display for VoteCollected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Vote on event {} of '{}' collected: {} ballots, {} faulted",
            self.event_id, self.notificator, self.ballots, self.faults
        )
    }
}

impl StructuredLog for VoteCollected<'_> {
    fn log(&self) {
        tracing::trace!(
            notificator = self.notificator,
            event_id = self.event_id,
            ballots = self.ballots,
            faults = self.faults,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "vote",
            span_name = name,
            notificator = self.notificator,
            event_id = self.event_id,
        )
    }
}

/// An aggregated batch was handed to subscribers.
///
/// # Log Level
/// `debug!` - Per-batch detail
pub struct BatchFlushed<'a> {
    pub notificator: &'a str,
    pub event_id: EventId,
    pub batch_size: usize,
}

impl Display for BatchFlushed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Flushed batch {} of '{}' with {} messages",
            self.event_id, self.notificator, self.batch_size
        )
    }
}

impl StructuredLog for BatchFlushed<'_> {
    fn log(&self) {
        tracing::debug!(
            notificator = self.notificator,
            event_id = self.event_id,
            batch_size = self.batch_size,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "batch_flush",
            span_name = name,
            notificator = self.notificator,
            batch_size = self.batch_size,
        )
    }
}
