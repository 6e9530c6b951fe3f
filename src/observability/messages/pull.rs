// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pull pipeline events.
//!
//! This module contains message types for logging events related to:
//! * Pipeline composition (accepted and rejected chains)
//! * Faults raised by stages during iteration
//! * Sources that cannot rewind

use crate::errors::{CompositionError, FlowError};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A pipeline was composed and is ready to iterate.
///
/// # Log Level
/// `debug!` - Construction detail
pub struct PipelineComposed<'a> {
    pub stages: &'a [String],
    pub emits: &'a str,
}

impl Display for PipelineComposed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Composed pipeline [{}] emitting '{}'",
            self.stages.join(" -> "),
            self.emits
        )
    }
}

impl StructuredLog for PipelineComposed<'_> {
    fn log(&self) {
        tracing::debug!(
            stage_count = self.stages.len(),
            emits = self.emits,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "pipeline",
            span_name = name,
            stage_count = self.stages.len(),
            emits = self.emits,
        )
    }
}

/// A stage chain was rejected before iteration.
///
/// # Log Level
/// `error!` - Programming error in the caller's chain
pub struct CompositionRejected<'a> {
    pub error: &'a CompositionError,
}

impl Display for CompositionRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline composition rejected: {}", self.error)
    }
}

impl StructuredLog for CompositionRejected<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("composition", span_name = name, error = %self.error)
    }
}

/// A stage failed while the pipeline was being pulled.
///
/// # Log Level
/// `warn!` - The fault is returned to the caller as well
pub struct StageFaulted<'a> {
    pub stage: &'a str,
    pub error: &'a FlowError,
}

impl Display for StageFaulted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline faulted at stage '{}': {}", self.stage, self.error)
    }
}

impl StructuredLog for StageFaulted<'_> {
    fn log(&self) {
        tracing::warn!(stage = self.stage, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("stage_fault", span_name = name, stage = self.stage)
    }
}

/// A reset reached a source that cannot rewind.
///
/// # Log Level
/// `warn!` - Iteration continues from the current position
pub struct ResetUnsupported<'a> {
    pub source: &'a str,
}

impl Display for ResetUnsupported<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Source '{}' is not resettable; reset leaves it at its current position",
            self.source
        )
    }
}

impl StructuredLog for ResetUnsupported<'_> {
    fn log(&self) {
        tracing::warn!(source = self.source, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("reset", span_name = name, source = self.source)
    }
}
