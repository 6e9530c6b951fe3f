use std::sync::Arc;

use crate::errors::FlowError;
use crate::push::multicast::{FnReceiver, Multicast};

/// Identifier of one message travelling through an arrow graph.
///
/// Assigned by the node the message entered through and carried unchanged by
/// every downstream arrow.
pub type EventId = u64;

/// The inbound side of a push node.
///
/// Implementations are invoked synchronously on the pushing thread. Returning
/// an error (or panicking) never reaches the pusher: the sending node catches it
/// and raises it on its own exception channel.
pub trait ArrowReceiver<T>: Send + Sync {
    fn process_arrow(&self, event_id: EventId, message: &T) -> anyhow::Result<()>;

    /// Out-of-band fault raised by an upstream node.
    fn process_exception(&self, sender: &str, event_id: EventId, fault: &FlowError) {
        let _ = (sender, event_id, fault);
    }

    /// Upstream signalled that no more messages will follow.
    fn process_completed(&self, sender: &str, event_id: EventId, message: Option<&T>) {
        let _ = (sender, event_id, message);
    }
}

/// The outbound side of a push node: a notification, an exception and a
/// completion channel, all backed by the node's [`Multicast`].
pub trait ArrowSender<T: 'static> {
    fn outlets(&self) -> &Multicast<T>;

    /// Subscribe `receiver` to all three channels of this node.
    fn send_to(&self, receiver: Arc<dyn ArrowReceiver<T>>) {
        self.outlets().send_to(receiver);
    }

    fn on_notification<F>(&self, handler: F)
    where
        F: Fn(EventId, &T) -> anyhow::Result<()> + Send + Sync + 'static,
        Self: Sized,
    {
        self.outlets().subscribe(Arc::new(FnReceiver::new(handler)));
    }

    fn on_exception<F>(&self, handler: F)
    where
        F: Fn(&str, EventId, &FlowError) + Send + Sync + 'static,
        Self: Sized,
    {
        self.outlets().on_exception(handler);
    }

    fn on_completed<F>(&self, handler: F)
    where
        F: Fn(&str, EventId, Option<&T>) + Send + Sync + 'static,
        Self: Sized,
    {
        self.outlets().on_completed(handler);
    }
}

/// The single extension point of an arrow: turn one inbound message into at
/// most one outbound message. `Ok(None)` means "do not forward".
pub trait ArrowProcessor<TIn, TOut>: Send {
    fn process_message(&mut self, message: &TIn) -> anyhow::Result<Option<TOut>>;
}
