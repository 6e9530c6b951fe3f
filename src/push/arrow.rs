// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::errors::{describe_panic, FlowError};
use crate::push::multicast::Multicast;
use crate::traits::{ArrowProcessor, ArrowReceiver, ArrowSender, EventId};

/// A push node that is both receiver and sender.
///
/// Every inbound message runs through the node's [`ArrowProcessor`]. A
/// `Some(out)` result is forwarded to subscribers, `None` is swallowed. Processor
/// failures and panics never reach the pusher; they surface as
/// [`FlowError::ArrowProcessing`] on this node's exception channel.
///
/// Upstream exceptions are passed on unchanged and completion is forwarded
/// without a message, since the final message belongs to the upstream type.
///
/// # Examples
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use the_conduit::push::{filters, Notificator};
/// use the_conduit::traits::ArrowSender;
///
/// let source = Notificator::<i32>::new("numbers");
/// let evens = filters::filter("evens", |n: &i32| n % 2 == 0);
/// source.send_to(evens.clone());
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// evens.on_notification(move |_, n: &i32| {
///     sink.lock().unwrap().push(*n);
///     Ok(())
/// });
///
/// for n in 1..=4 {
///     source.push(&n);
/// }
/// assert_eq!(*seen.lock().unwrap(), vec![2, 4]);
/// ```
pub struct Arrow<TIn, TOut> {
    processor: Mutex<Box<dyn ArrowProcessor<TIn, TOut>>>,
    outlets: Multicast<TOut>,
}

impl<TIn: 'static, TOut: 'static> Arrow<TIn, TOut> {
    pub fn new<P>(name: impl Into<String>, processor: P) -> Arc<Self>
    where
        P: ArrowProcessor<TIn, TOut> + 'static,
    {
        Arc::new(Self {
            processor: Mutex::new(Box::new(processor)),
            outlets: Multicast::new(name),
        })
    }

    pub fn name(&self) -> &str {
        self.outlets.owner()
    }

    fn process(&self, message: &TIn) -> anyhow::Result<Option<TOut>> {
        let mut processor = self
            .processor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        processor.process_message(message)
    }
}

impl<TIn: 'static, TOut: 'static> ArrowReceiver<TIn> for Arrow<TIn, TOut> {
    fn process_arrow(&self, event_id: EventId, message: &TIn) -> anyhow::Result<()> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(message)));
        let source = match outcome {
            Ok(Ok(Some(forward))) => {
                self.outlets.notify(event_id, &forward);
                return Ok(());
            }
            Ok(Ok(None)) => return Ok(()),
            Ok(Err(err)) => err,
            Err(payload) => {
                anyhow::anyhow!("processor {}", describe_panic(payload.as_ref()))
            }
        };

        let fault = FlowError::ArrowProcessing {
            node: self.name().to_string(),
            event_id,
            source,
        };
        self.outlets.raise(event_id, &fault);
        Ok(())
    }

    fn process_exception(&self, _sender: &str, event_id: EventId, fault: &FlowError) {
        self.outlets.raise(event_id, fault);
    }

    fn process_completed(&self, _sender: &str, event_id: EventId, _message: Option<&TIn>) {
        self.outlets.complete(event_id, None);
    }
}

impl<TIn: 'static, TOut: 'static> ArrowSender<TOut> for Arrow<TIn, TOut> {
    fn outlets(&self) -> &Multicast<TOut> {
        &self.outlets
    }
}
