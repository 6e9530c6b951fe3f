// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod aggregated;
pub mod arrow;
pub mod bridge;
pub mod filters;
pub mod multicast;
pub mod notificator;
pub mod voting;

#[cfg(test)]
mod integration_tests;

pub use aggregated::AggregatedNotificator;
pub use arrow::Arrow;
pub use bridge::{BridgeStats, ConcurrentBridge};
pub use filters::FnProcessor;
pub use multicast::{FnReceiver, Multicast};
pub use notificator::Notificator;
pub use voting::{Vote, Voter, VotingNotificator};
