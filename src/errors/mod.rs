// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod composition;
mod config;
mod flow;

pub use composition::CompositionError;
pub use config::ConfigError;
pub use flow::FlowError;

pub(crate) use flow::describe_panic;
