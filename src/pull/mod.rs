// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pull-based traversal pipelines.
//!
//! A pipeline is an ordered chain of [`Stage`](crate::traits::Stage)s; pulling
//! from the last stage lazily pulls every stage before it. Chains built with
//! [`PipelineBuilder`] are checked by the compiler, chains assembled at runtime
//! with [`StageChain`] are checked once when they are built.

mod link;
pub mod path;
pub mod pipeline;
pub mod source;
pub mod stages;


pub use path::{Path, PathEntry};
pub use pipeline::{Pipeline, PipelineBuilder, StageChain, TypeTag};
pub use source::{SequenceSource, StartStage};
pub use stages::{DedupStage, FilterStage, MapStage, RangeStage, ScatterStage};
