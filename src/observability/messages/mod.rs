// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit it with structured fields at its documented level.
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_conduit::observability::messages::bridge::BridgeStarted;
//! use the_conduit::observability::messages::StructuredLog;
//!
//! let msg = BridgeStarted {
//!     bridge: "ingest",
//!     capacity: Some(1024),
//! };
//!
//! msg.log();
//! ```

pub mod bridge;
pub mod pull;
pub mod push;
pub mod queue;

use std::fmt::Display;
use tracing::Span;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog: Display {
    /// Emit the message as a tracing event.
    fn log(&self);

    /// Build a span carrying the same fields as the event.
    fn span(&self, name: &str) -> Span;
}
