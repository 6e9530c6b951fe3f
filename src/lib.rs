// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod collections;  // lock-free queue
pub mod config;       // engine tunables
pub mod errors;       // error handling
pub mod observability;
pub mod pull;         // demand-driven pipelines
pub mod push;         // arrow graphs, voting, batching, bridges
pub mod traits;       // stage and arrow contracts
