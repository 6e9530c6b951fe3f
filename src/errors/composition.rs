// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors raised while wiring a pull pipeline, before any element is pulled.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositionError {
    /// The chain contains no stages at all
    EmptyChain,
    /// The external source does not produce what the first stage consumes
    SourceTypeMismatch {
        /// Element type produced by the source
        produces: &'static str,
        /// Name of the first stage
        stage: String,
        /// Element type the first stage consumes
        expects: &'static str,
    },
    /// Two adjacent stages do not chain
    StageTypeMismatch {
        upstream_index: usize,
        upstream_stage: String,
        produces: &'static str,
        downstream_index: usize,
        downstream_stage: String,
        expects: &'static str,
    },
    /// The last stage does not emit the element type requested by the caller
    OutputTypeMismatch {
        stage: String,
        produces: &'static str,
        requested: &'static str,
    },
}

impl fmt::Display for CompositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositionError::EmptyChain => write!(f, "Cannot compose a pipeline without stages"),
            CompositionError::SourceTypeMismatch {
                produces,
                stage,
                expects,
            } => {
                write!(
                    f,
                    "Source produces '{}' but first stage '{}' consumes '{}'",
                    produces, stage, expects
                )
            }
            CompositionError::StageTypeMismatch {
                upstream_index,
                upstream_stage,
                produces,
                downstream_index,
                downstream_stage,
                expects,
            } => {
                write!(
                    f,
                    "Stage {} '{}' emits '{}' but stage {} '{}' consumes '{}'",
                    upstream_index, upstream_stage, produces, downstream_index, downstream_stage, expects
                )
            }
            CompositionError::OutputTypeMismatch {
                stage,
                produces,
                requested,
            } => {
                write!(
                    f,
                    "Last stage '{}' emits '{}' but the pipeline was requested to emit '{}'",
                    stage, produces, requested
                )
            }
        }
    }
}

impl std::error::Error for CompositionError {}
