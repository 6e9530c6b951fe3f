// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Debounced batching of pushed messages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::consts::AGGREGATOR_THREAD_PREFIX;
use crate::config::AggregatorConfig;
use crate::errors::FlowError;
use crate::observability::messages::push::BatchFlushed;
use crate::observability::messages::StructuredLog;
use crate::push::multicast::Multicast;
use crate::traits::{ArrowReceiver, ArrowSender, EventId};

struct Batcher<T> {
    batch: Mutex<Vec<T>>,
    outlets: Multicast<Vec<T>>,
    next_event_id: AtomicU64,
}

impl<T: 'static> Batcher<T> {
    fn flush(&self) -> usize {
        let batch = std::mem::take(&mut *self.batch.lock().unwrap_or_else(|p| p.into_inner()));
        if batch.is_empty() {
            return 0;
        }
        let event_id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
        BatchFlushed {
            notificator: self.outlets.owner(),
            event_id,
            batch_size: batch.len(),
        }
        .log();
        self.outlets.notify(event_id, &batch);
        batch.len()
    }
}

/// Collects pushed messages and delivers them as one batch once pushes have
/// been quiet for the debounce period.
///
/// Every push restarts the timer. The timer runs on a dedicated scheduler
/// thread, so subscribers see batches on that thread rather than the pusher's.
/// [`shutdown`](Self::shutdown) flushes whatever is pending and stops the
/// scheduler; it also runs on drop.
pub struct AggregatedNotificator<T: Send + 'static> {
    batcher: Arc<Batcher<T>>,
    kicks: Mutex<Option<UnboundedSender<()>>>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> AggregatedNotificator<T> {
    pub fn new(name: impl Into<String>) -> Result<Self, FlowError> {
        Self::with_config(name, &AggregatorConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: &AggregatorConfig) -> Result<Self, FlowError> {
        Self::with_debounce(name, config.debounce())
    }

    pub fn with_debounce(name: impl Into<String>, debounce: Duration) -> Result<Self, FlowError> {
        let name = name.into();
        let spawn_error = |source| FlowError::Spawn {
            component: name.clone(),
            source,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(spawn_error)?;

        let batcher = Arc::new(Batcher {
            batch: Mutex::new(Vec::new()),
            outlets: Multicast::new(name.clone()),
            next_event_id: AtomicU64::new(1),
        });
        let (kicks, rx) = mpsc::unbounded_channel();

        let scheduled = batcher.clone();
        let scheduler = thread::Builder::new()
            .name(format!("{}-{}", AGGREGATOR_THREAD_PREFIX, name))
            .spawn(move || runtime.block_on(debounce_loop(scheduled, rx, debounce)))
            .map_err(spawn_error)?;

        Ok(Self {
            batcher,
            kicks: Mutex::new(Some(kicks)),
            scheduler: Mutex::new(Some(scheduler)),
        })
    }

    pub fn name(&self) -> &str {
        self.batcher.outlets.owner()
    }

    /// Add `message` to the pending batch and restart the debounce timer.
    pub fn push(&self, message: T) -> Result<(), FlowError> {
        let kicks = self.kicks.lock().unwrap_or_else(|p| p.into_inner());
        let Some(kicks) = kicks.as_ref() else {
            return Err(self.closed());
        };
        self.batcher
            .batch
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(message);
        kicks.send(()).map_err(|_| self.closed())
    }

    pub fn pending(&self) -> usize {
        self.batcher
            .batch
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    /// Deliver the pending batch now, on the calling thread. Returns its size.
    pub fn flush_now(&self) -> usize {
        self.batcher.flush()
    }

    /// Flush what is pending and stop the scheduler. Later pushes fail with
    /// [`FlowError::Closed`]. Calling it again has no effect.
    pub fn shutdown(&self) {
        drop(self.kicks.lock().unwrap_or_else(|p| p.into_inner()).take());

        let scheduler = self.scheduler.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = scheduler {
            // A subscriber shutting us down from the scheduler thread cannot join it
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        self.batcher.flush();
    }

    fn closed(&self) -> FlowError {
        FlowError::Closed {
            component: self.name().to_string(),
        }
    }
}

async fn debounce_loop<T: 'static>(
    batcher: Arc<Batcher<T>>,
    mut kicks: UnboundedReceiver<()>,
    debounce: Duration,
) {
    while kicks.recv().await.is_some() {
        // Wait for a quiet period; every further kick restarts it
        loop {
            match tokio::time::timeout(debounce, kicks.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) | Err(_) => break,
            }
        }
        batcher.flush();
    }
    batcher.flush();
}

impl<T: Send + 'static> Drop for AggregatedNotificator<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Clone + Send + 'static> ArrowReceiver<T> for AggregatedNotificator<T> {
    fn process_arrow(&self, _event_id: EventId, message: &T) -> anyhow::Result<()> {
        self.push(message.clone())?;
        Ok(())
    }

    fn process_exception(&self, _sender: &str, event_id: EventId, fault: &FlowError) {
        self.batcher.outlets.raise(event_id, fault);
    }

    /// Upstream completion flushes the pending batch and passes completion on.
    fn process_completed(&self, _sender: &str, event_id: EventId, _message: Option<&T>) {
        self.flush_now();
        self.batcher.outlets.complete(event_id, None);
    }
}

impl<T: Send + 'static> ArrowSender<Vec<T>> for AggregatedNotificator<T> {
    fn outlets(&self) -> &Multicast<Vec<T>> {
        &self.batcher.outlets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_burst_is_flushed_once_after_quiet_period() {
        let aggregator = AggregatedNotificator::with_debounce("burst", Duration::from_millis(50)).unwrap();
        let (tx, rx) = unbounded();
        aggregator.on_notification(move |event_id, batch: &Vec<u32>| {
            tx.send((event_id, batch.clone()))?;
            Ok(())
        });

        for n in 0..5 {
            aggregator.push(n).unwrap();
        }

        let (event_id, batch) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event_id, 1);
        assert_eq!(batch, vec![0, 1, 2, 3, 4]);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(aggregator.pending(), 0);
    }

    #[test]
    fn test_each_push_restarts_the_quiet_period() {
        let aggregator = AggregatedNotificator::with_debounce("trickle", Duration::from_millis(200)).unwrap();
        let (tx, rx) = unbounded();
        aggregator.on_notification(move |_, batch: &Vec<u32>| {
            tx.send(batch.clone())?;
            Ok(())
        });

        // The trickle outlasts the debounce window, but no gap reaches it.
        for n in 0..8 {
            aggregator.push(n).unwrap();
            thread::sleep(Duration::from_millis(40));
        }
        assert!(rx.try_recv().is_err());

        let batch = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(batch, (0..8).collect::<Vec<_>>());
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_shutdown_flushes_pending_and_closes() {
        let aggregator = AggregatedNotificator::with_debounce("slow", Duration::from_secs(60)).unwrap();
        let (tx, rx) = unbounded();
        aggregator.on_notification(move |_, batch: &Vec<&'static str>| {
            tx.send(batch.clone())?;
            Ok(())
        });

        aggregator.push("a").unwrap();
        aggregator.push("b").unwrap();
        aggregator.shutdown();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), vec!["a", "b"]);
        assert!(matches!(aggregator.push("c"), Err(FlowError::Closed { .. })));
        aggregator.shutdown();
    }

    #[test]
    fn test_flush_now_delivers_on_caller_thread() {
        let aggregator = AggregatedNotificator::with_debounce("manual", Duration::from_secs(60)).unwrap();
        let caller = thread::current().id();
        let (tx, rx) = unbounded();
        aggregator.on_notification(move |_, batch: &Vec<i32>| {
            tx.send((thread::current().id(), batch.len()))?;
            Ok(())
        });

        aggregator.push(1).unwrap();
        assert_eq!(aggregator.flush_now(), 1);
        assert_eq!(aggregator.flush_now(), 0);
        assert_eq!(rx.try_recv().unwrap(), (caller, 1));
    }
}
