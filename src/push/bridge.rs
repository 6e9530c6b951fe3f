// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The one sanctioned thread boundary of an arrow graph.
//!
//! A [`ConcurrentBridge`] accepts messages on the producer's thread, queues them,
//! and runs its processor on a single dedicated worker thread. The worker pushes
//! results downstream in arrival order.
//!
//! ## Fault handling
//!
//! Every dequeued message is processed behind its own fault boundary. A
//! processor error or panic becomes a [`FlowError::BridgeWorker`] on the
//! bridge's exception channel and the worker moves on to the next message.
//!
//! ## Shutdown
//!
//! [`ConcurrentBridge::shutdown`] stops accepting input, lets the worker drain
//! the queue, and joins it. Dropping the bridge does the same.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

use crate::config::{BridgeConfig, FullPolicy};
use crate::errors::{describe_panic, FlowError};
use crate::observability::messages::bridge::{
    BridgeCompletionLost, BridgeMessageDropped, BridgeStarted, BridgeStopped, BridgeWorkerFaulted, BridgeWorkerLost,
};
use crate::observability::messages::StructuredLog;
use crate::push::filters::FnProcessor;
use crate::push::multicast::Multicast;
use crate::traits::{ArrowProcessor, ArrowReceiver, ArrowSender, EventId};

enum Envelope<T> {
    Message { event_id: EventId, message: T },
    Completed { event_id: EventId },
}

/// Counters of a bridge since it started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Messages accepted into the queue
    pub enqueued: u64,
    /// Messages processed and forwarded downstream
    pub delivered: u64,
    /// Messages the processor chose not to forward
    pub filtered: u64,
    /// Messages whose processing failed
    pub faulted: u64,
    /// Messages discarded because the queue was full
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    filtered: AtomicU64,
    faulted: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

struct BridgeCore<TOut> {
    outlets: Multicast<TOut>,
    counters: Counters,
}

impl<TOut: 'static> BridgeCore<TOut> {
    fn name(&self) -> &str {
        self.outlets.owner()
    }

    fn run<TIn>(
        &self,
        queue: Receiver<Envelope<TIn>>,
        mut processor: Box<dyn ArrowProcessor<TIn, TOut>>,
        capacity: Option<usize>,
    ) {
        let _span = BridgeStarted {
            bridge: self.name(),
            capacity,
        }
        .span("bridge_worker")
        .entered();

        for envelope in queue.iter() {
            match envelope {
                Envelope::Message { event_id, message } => {
                    self.deliver(&mut processor, event_id, &message)
                }
                Envelope::Completed { event_id } => self.outlets.complete(event_id, None),
            }
        }
    }

    fn deliver<TIn>(
        &self,
        processor: &mut Box<dyn ArrowProcessor<TIn, TOut>>,
        event_id: EventId,
        message: &TIn,
    ) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor.process_message(message)));
        let source = match outcome {
            Ok(Ok(Some(forward))) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                self.outlets.notify(event_id, &forward);
                return;
            }
            Ok(Ok(None)) => {
                self.counters.filtered.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Ok(Err(err)) => err,
            Err(payload) => {
                anyhow::anyhow!("processor {}", describe_panic(payload.as_ref()))
            }
        };

        self.counters.faulted.fetch_add(1, Ordering::Relaxed);
        let fault = FlowError::BridgeWorker {
            bridge: self.name().to_string(),
            event_id,
            source,
        };
        BridgeWorkerFaulted {
            bridge: self.name(),
            event_id,
            error: &fault,
        }
        .log();
        self.outlets.raise(event_id, &fault);
    }
}

/// Hands messages from producer threads to one background consumer.
///
/// Ordering is strict FIFO: one queue, one consumer. With a bounded queue the
/// configured [`FullPolicy`] decides what a producer experiences when the queue
/// is full.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use the_conduit::push::ConcurrentBridge;
/// use the_conduit::traits::{ArrowReceiver, ArrowSender};
///
/// let bridge = ConcurrentBridge::<u32, u32>::passthrough("offload").unwrap();
/// let (tx, rx) = crossbeam_channel::unbounded();
/// bridge.on_notification(move |_, n: &u32| {
///     tx.send(*n)?;
///     Ok(())
/// });
///
/// bridge.process_arrow(1, &10).unwrap();
/// assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 10);
/// bridge.shutdown();
/// ```
pub struct ConcurrentBridge<TIn: Send + 'static, TOut: 'static> {
    core: Arc<BridgeCore<TOut>>,
    queue: Mutex<Option<Sender<Envelope<TIn>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    capacity: Option<usize>,
    full_policy: FullPolicy,
}

impl<TIn, TOut> ConcurrentBridge<TIn, TOut>
where
    TIn: Send + 'static,
    TOut: Send + Sync + 'static,
{
    /// Unbounded bridge running `processor` on its worker thread.
    pub fn new<P>(name: impl Into<String>, processor: P) -> Result<Arc<Self>, FlowError>
    where
        P: ArrowProcessor<TIn, TOut> + 'static,
    {
        Self::with_config(name, &BridgeConfig::default(), processor)
    }

    pub fn with_config<P>(
        name: impl Into<String>,
        config: &BridgeConfig,
        processor: P,
    ) -> Result<Arc<Self>, FlowError>
    where
        P: ArrowProcessor<TIn, TOut> + 'static,
    {
        let name = name.into();
        let (sender, receiver) = match config.max_queue_size {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };

        let core = Arc::new(BridgeCore {
            outlets: Multicast::new(name.clone()),
            counters: Counters::default(),
        });

        let worker_core = core.clone();
        let capacity = config.max_queue_size;
        let processor: Box<dyn ArrowProcessor<TIn, TOut>> = Box::new(processor);
        let worker = thread::Builder::new()
            .name(format!("{}-{}", config.get_thread_name_prefix(), name))
            .spawn(move || worker_core.run(receiver, processor, capacity))
            .map_err(|source| FlowError::Spawn {
                component: name.clone(),
                source,
            })?;

        BridgeStarted {
            bridge: &name,
            capacity: config.max_queue_size,
        }
        .log();

        Ok(Arc::new(Self {
            core,
            queue: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            capacity: config.max_queue_size,
            full_policy: config.full_policy,
        }))
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn stats(&self) -> BridgeStats {
        self.core.counters.snapshot()
    }

    /// Messages waiting for the worker.
    pub fn pending(&self) -> usize {
        self.sender().map(|sender| sender.len()).unwrap_or(0)
    }

    pub fn is_running(&self) -> bool {
        self.sender().is_some()
    }

    /// Queue `message` for the worker.
    ///
    /// Blocks while a bounded queue is full under [`FullPolicy::Block`]. Under
    /// [`FullPolicy::DropNewest`] the message is discarded and `Ok` returned;
    /// under [`FullPolicy::Reject`] [`FlowError::QueueFull`] is returned.
    pub fn enqueue(&self, event_id: EventId, message: TIn) -> Result<(), FlowError> {
        let sender = self.sender().ok_or_else(|| self.closed())?;
        let envelope = Envelope::Message { event_id, message };

        match (self.capacity, self.full_policy) {
            (Some(capacity), FullPolicy::DropNewest) => match sender.try_send(envelope) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.core.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    BridgeMessageDropped {
                        bridge: self.name(),
                        event_id,
                        capacity,
                    }
                    .log();
                    return Ok(());
                }
                Err(TrySendError::Disconnected(_)) => return Err(self.closed()),
            },
            (Some(capacity), FullPolicy::Reject) => match sender.try_send(envelope) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    return Err(FlowError::QueueFull {
                        bridge: self.name().to_string(),
                        capacity,
                    })
                }
                Err(TrySendError::Disconnected(_)) => return Err(self.closed()),
            },
            _ => sender.send(envelope).map_err(|_| self.closed())?,
        }

        self.core.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop accepting input, drain the queue and join the worker.
    ///
    /// Idempotent. When called from the worker thread itself (a downstream
    /// subscriber shutting the bridge down) the worker is not joined; it exits
    /// once the queue is drained.
    pub fn shutdown(&self) {
        drop(self.queue.lock().unwrap_or_else(|p| p.into_inner()).take());

        let Some(worker) = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take() else {
            return;
        };
        if worker.thread().id() != thread::current().id() {
            if let Err(payload) = worker.join() {
                BridgeWorkerLost {
                    bridge: self.name(),
                    message: &describe_panic(payload.as_ref()),
                }
                .log();
            }
        }

        let stats = self.stats();
        BridgeStopped {
            bridge: self.name(),
            delivered: stats.delivered,
            faulted: stats.faulted,
            dropped: stats.dropped,
        }
        .log();
    }

    fn queue_completion(&self, event_id: EventId) -> Result<(), FlowError> {
        let sender = self.sender().ok_or_else(|| self.closed())?;
        sender
            .send(Envelope::Completed { event_id })
            .map_err(|_| self.closed())
    }

    fn sender(&self) -> Option<Sender<Envelope<TIn>>> {
        self.queue
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .cloned()
    }

    fn closed(&self) -> FlowError {
        FlowError::Closed {
            component: self.name().to_string(),
        }
    }
}

impl<T> ConcurrentBridge<T, T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Bridge that forwards every message unchanged.
    pub fn passthrough(name: impl Into<String>) -> Result<Arc<Self>, FlowError> {
        Self::new(
            name,
            FnProcessor::new(|message: &T| -> anyhow::Result<Option<T>> { Ok(Some(message.clone())) }),
        )
    }
}

impl<TIn: Send + 'static, TOut: 'static> Drop for ConcurrentBridge<TIn, TOut> {
    fn drop(&mut self) {
        drop(self.queue.get_mut().unwrap_or_else(|p| p.into_inner()).take());
        if let Some(worker) = self.worker.get_mut().unwrap_or_else(|p| p.into_inner()).take() {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl<TIn, TOut> ArrowReceiver<TIn> for ConcurrentBridge<TIn, TOut>
where
    TIn: Clone + Send + 'static,
    TOut: Send + Sync + 'static,
{
    fn process_arrow(&self, event_id: EventId, message: &TIn) -> anyhow::Result<()> {
        self.enqueue(event_id, message.clone())?;
        Ok(())
    }

    fn process_exception(&self, _sender: &str, event_id: EventId, fault: &FlowError) {
        self.core.outlets.raise(event_id, fault);
    }

    /// Completion is queued behind pending messages so it arrives last.
    fn process_completed(&self, _sender: &str, event_id: EventId, _message: Option<&TIn>) {
        if let Err(error) = self.queue_completion(event_id) {
            BridgeCompletionLost {
                bridge: self.name(),
                event_id,
                error: &error,
            }
            .log();
        }
    }
}

impl<TIn: Send + 'static, TOut: 'static> ArrowSender<TOut> for ConcurrentBridge<TIn, TOut> {
    fn outlets(&self) -> &Multicast<TOut> {
        &self.core.outlets
    }
}
