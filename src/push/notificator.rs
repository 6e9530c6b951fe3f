// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::FlowError;
use crate::push::multicast::Multicast;
use crate::traits::{ArrowSender, EventId};

/// Entry node of an arrow graph.
///
/// Assigns each pushed message a fresh event id, starting at 1, and delivers it
/// synchronously to every subscriber.
pub struct Notificator<T> {
    outlets: Multicast<T>,
    next_event_id: AtomicU64,
}

impl<T: 'static> Notificator<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            outlets: Multicast::new(name),
            next_event_id: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        self.outlets.owner()
    }

    /// Deliver `message` to all subscribers and return its event id.
    pub fn push(&self, message: &T) -> EventId {
        let event_id = self.next_id();
        self.outlets.notify(event_id, message);
        event_id
    }

    /// Tell every subscriber that no more messages will follow.
    pub fn complete(&self) -> EventId {
        self.complete_with(None)
    }

    /// Like [`complete`](Self::complete), carrying a final message.
    pub fn complete_with(&self, message: Option<&T>) -> EventId {
        let event_id = self.next_id();
        self.outlets.complete(event_id, message);
        event_id
    }

    /// Raise a fault that originated outside the graph.
    pub fn fail(&self, source: anyhow::Error) -> EventId {
        let event_id = self.next_id();
        let fault = FlowError::ArrowProcessing {
            node: self.name().to_string(),
            event_id,
            source,
        };
        self.outlets.raise(event_id, &fault);
        event_id
    }

    fn next_id(&self) -> EventId {
        self.next_event_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl<T: 'static> ArrowSender<T> for Notificator<T> {
    fn outlets(&self) -> &Multicast<T> {
        &self.outlets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_event_ids_increase() {
        let source = Notificator::<&'static str>::new("words");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        source.on_notification(move |event_id, word: &&'static str| {
            sink.lock().unwrap().push((event_id, *word));
            Ok(())
        });

        assert_eq!(source.push(&"a"), 1);
        assert_eq!(source.push(&"b"), 2);
        assert_eq!(*seen.lock().unwrap(), vec![(1, "a"), (2, "b")]);
    }

    #[test]
    fn test_complete_and_fail_reach_their_channels() {
        let source = Notificator::<i32>::new("numbers");
        let log = Arc::new(Mutex::new(Vec::new()));

        let sink = log.clone();
        source.on_completed(move |sender, event_id, message: Option<&i32>| {
            sink.lock().unwrap().push(format!("{} completed {} {:?}", sender, event_id, message));
        });
        let sink = log.clone();
        source.on_exception(move |sender, event_id, fault| {
            sink.lock().unwrap().push(format!("{} faulted {} {}", sender, event_id, fault));
        });

        source.fail(anyhow::anyhow!("upstream gone"));
        source.complete_with(Some(&5));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].starts_with("numbers faulted 1"));
        assert!(log[0].contains("upstream gone"));
        assert_eq!(log[1], "numbers completed 2 Some(5)");
    }
}
