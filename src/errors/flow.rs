// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Runtime faults raised while elements flow through pull stages or push arrows.

use std::any::Any;
use thiserror::Error;

use crate::traits::arrow::EventId;

#[derive(Debug, Error)]
pub enum FlowError {
    /// A pull stage failed while producing its next element
    #[error("stage '{stage}' failed during iteration: {source}")]
    Iteration {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    /// The pipeline already failed and cannot be iterated until it is reset
    #[error("pipeline is unusable after stage '{stage}' failed")]
    Faulted { stage: String },

    /// A stage was pulled before anything was plugged into it
    #[error("stage '{stage}' has no source attached")]
    MissingSource { stage: String },

    /// A push arrow (or one of its subscribers) failed while processing a message
    #[error("arrow '{node}' failed on event {event_id}: {source}")]
    ArrowProcessing {
        node: String,
        event_id: EventId,
        #[source]
        source: anyhow::Error,
    },

    /// The background consumer of a bridge failed on a dequeued message
    #[error("bridge '{bridge}' worker failed on event {event_id}: {source}")]
    BridgeWorker {
        bridge: String,
        event_id: EventId,
        #[source]
        source: anyhow::Error,
    },

    /// A voter failed while a vote was being collected
    #[error("voter #{voter} of '{notificator}' failed on event {event_id}: {source}")]
    Voting {
        notificator: String,
        voter: usize,
        event_id: EventId,
        #[source]
        source: anyhow::Error,
    },

    /// A bounded bridge queue is full and its policy rejects new messages
    #[error("bridge '{bridge}' queue is full ({capacity} pending messages)")]
    QueueFull { bridge: String, capacity: usize },

    /// The component no longer accepts input
    #[error("'{component}' has been shut down")]
    Closed { component: String },

    /// A background thread could not be started
    #[error("failed to start background thread for '{component}': {source}")]
    Spawn {
        component: String,
        #[source]
        source: std::io::Error,
    },
}

impl FlowError {
    /// Name of the stage, arrow, bridge or notificator the fault belongs to.
    pub fn origin(&self) -> &str {
        match self {
            FlowError::Iteration { stage, .. }
            | FlowError::Faulted { stage }
            | FlowError::MissingSource { stage } => stage,
            FlowError::ArrowProcessing { node, .. } => node,
            FlowError::BridgeWorker { bridge, .. } | FlowError::QueueFull { bridge, .. } => bridge,
            FlowError::Voting { notificator, .. } => notificator,
            FlowError::Closed { component } | FlowError::Spawn { component, .. } => component,
        }
    }
}

/// Render a caught panic payload for logging and fault reporting.
pub(crate) fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_names_the_failing_component() {
        let err = FlowError::Iteration {
            stage: "map".to_string(),
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.origin(), "map");
        assert!(err.to_string().contains("stage 'map' failed during iteration: boom"));

        let err = FlowError::QueueFull {
            bridge: "ingest".to_string(),
            capacity: 4,
        };
        assert_eq!(err.origin(), "ingest");
    }

    #[test]
    fn test_describe_panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("bad input");
        assert_eq!(describe_panic(payload.as_ref()), "panicked: bad input");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(describe_panic(payload.as_ref()), "panicked: owned");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(describe_panic(payload.as_ref()), "panicked with a non-string payload");
    }
}
