// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Diagnostic output is produced through message structs that implement
//! `Display` and [`messages::StructuredLog`], so log text lives in one place
//! per subsystem instead of being scattered through the engine:
//!
//! * `messages::pull` - pipeline composition, iteration faults, resets
//! * `messages::push` - subscriber faults, unhandled faults, votes, batches
//! * `messages::bridge` - bridge worker lifecycle and queue pressure
//! * `messages::queue` - lock-free queue eviction and observer failures
//!
//! # Usage
//!
//! ```rust
//! use the_conduit::observability::messages::{pull::ResetUnsupported, StructuredLog};
//!
//! ResetUnsupported { source: "vertex_scan" }.log();
//! ```

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls leave the first subscriber in place
/// and return `false`.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
