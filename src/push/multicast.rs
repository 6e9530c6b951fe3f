// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Ordered fan-out of one node's notification, exception and completion channels.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use crate::errors::{describe_panic, FlowError};
use crate::observability::messages::push::{HandlerPanicked, SubscriberFaulted, UnhandledFault};
use crate::observability::messages::StructuredLog;
use crate::traits::{ArrowReceiver, ArrowSender, EventId};

type FaultHandler = Arc<dyn Fn(&str, EventId, &FlowError) + Send + Sync>;
type CompletionHandler<T> = Arc<dyn Fn(&str, EventId, Option<&T>) + Send + Sync>;

/// The outbound channels of a push node.
///
/// Subscribers are invoked synchronously on the calling thread in registration
/// order. Each subscriber runs behind its own fault boundary: an `Err` or a panic
/// is converted into [`FlowError::ArrowProcessing`], raised on this node's
/// exception channel, and delivery continues with the next subscriber.
///
/// Delivery iterates over a snapshot of the subscriber list, so a subscriber
/// may register further subscribers without deadlocking; they are reached
/// from the next message on.
pub struct Multicast<T> {
    owner: String,
    receivers: RwLock<Vec<Arc<dyn ArrowReceiver<T>>>>,
    faults: RwLock<Vec<FaultHandler>>,
    completions: RwLock<Vec<CompletionHandler<T>>>,
}

impl<T: 'static> Multicast<T> {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            receivers: RwLock::new(Vec::new()),
            faults: RwLock::new(Vec::new()),
            completions: RwLock::new(Vec::new()),
        }
    }

    /// Name of the node these channels belong to.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Subscribe to the notification channel only.
    pub fn subscribe(&self, receiver: Arc<dyn ArrowReceiver<T>>) {
        write(&self.receivers).push(receiver);
    }

    /// Subscribe `receiver` to notifications, exceptions and completion.
    pub fn send_to(&self, receiver: Arc<dyn ArrowReceiver<T>>) {
        let on_fault = receiver.clone();
        self.on_exception(move |sender, event_id, fault| {
            on_fault.process_exception(sender, event_id, fault)
        });
        let on_done = receiver.clone();
        self.on_completed(move |sender, event_id, message| {
            on_done.process_completed(sender, event_id, message)
        });
        self.subscribe(receiver);
    }

    pub fn on_exception<F>(&self, handler: F)
    where
        F: Fn(&str, EventId, &FlowError) + Send + Sync + 'static,
    {
        write(&self.faults).push(Arc::new(handler));
    }

    pub fn on_completed<F>(&self, handler: F)
    where
        F: Fn(&str, EventId, Option<&T>) + Send + Sync + 'static,
    {
        write(&self.completions).push(Arc::new(handler));
    }

    pub fn subscriber_count(&self) -> usize {
        read(&self.receivers).len()
    }

    pub fn has_exception_handlers(&self) -> bool {
        !read(&self.faults).is_empty()
    }

    /// Deliver `message` to every subscriber and return how many of them failed.
    pub fn notify(&self, event_id: EventId, message: &T) -> usize {
        let receivers = read(&self.receivers).clone();
        let mut failures = 0;

        for (index, receiver) in receivers.iter().enumerate() {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| receiver.process_arrow(event_id, message)));
            let source = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(payload) => {
                    anyhow::anyhow!("subscriber {}", describe_panic(payload.as_ref()))
                }
            };

            failures += 1;
            let fault = FlowError::ArrowProcessing {
                node: self.owner.clone(),
                event_id,
                source,
            };
            SubscriberFaulted {
                node: &self.owner,
                subscriber: index,
                event_id,
                error: &fault,
            }
            .log();
            self.raise(event_id, &fault);
        }

        failures
    }

    /// Raise `fault` on the exception channel. With nobody listening the fault is
    /// logged instead of being dropped.
    pub fn raise(&self, event_id: EventId, fault: &FlowError) {
        let handlers = read(&self.faults).clone();
        if handlers.is_empty() {
            UnhandledFault {
                node: &self.owner,
                event_id,
                error: fault,
            }
            .log();
            return;
        }

        for handler in &handlers {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| handler(&self.owner, event_id, fault)));
            if let Err(payload) = outcome {
                self.handler_panicked("exception", payload.as_ref());
            }
        }
    }

    /// Signal completion, optionally with a final message.
    pub fn complete(&self, event_id: EventId, message: Option<&T>) {
        let handlers = read(&self.completions).clone();
        for handler in &handlers {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| handler(&self.owner, event_id, message)));
            if let Err(payload) = outcome {
                self.handler_panicked("completed", payload.as_ref());
            }
        }
    }

    fn handler_panicked(&self, channel: &str, payload: &(dyn std::any::Any + Send)) {
        HandlerPanicked {
            node: &self.owner,
            channel,
            message: &describe_panic(payload),
        }
        .log();
    }
}

impl<T: 'static> ArrowSender<T> for Multicast<T> {
    fn outlets(&self) -> &Multicast<T> {
        self
    }
}

fn read<V>(lock: &RwLock<V>) -> std::sync::RwLockReadGuard<'_, V> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<V>(lock: &RwLock<V>) -> std::sync::RwLockWriteGuard<'_, V> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Adapts a closure into a notification-only receiver.
pub struct FnReceiver<F> {
    handler: F,
}

impl<F> FnReceiver<F> {
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<T, F> ArrowReceiver<T> for FnReceiver<F>
where
    F: Fn(EventId, &T) -> anyhow::Result<()> + Send + Sync,
{
    fn process_arrow(&self, event_id: EventId, message: &T) -> anyhow::Result<()> {
        (self.handler)(event_id, message)
    }
}
