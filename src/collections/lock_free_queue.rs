// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Lock-free bounded queue built on a singly linked list with an atomic head.
//!
//! Pushes insert at the head with a compare-and-swap retry loop. Pops unlink the
//! structurally last node, which is the oldest element, so `pop` is O(n).
//! Unlinked nodes are reclaimed through `crossbeam-epoch`, which keeps readers
//! that are still walking the list safe.
//!
//! # Performance
//!
//! - `push`: O(1) amortised, plus eviction when over the limit
//! - `pop`, `peek_oldest`, `contains`: O(n)
//! - `peek`: O(1)

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};

use crate::config::QueueConfig;
use crate::errors::describe_panic;
use crate::observability::messages::queue::{ObserverPanicked, QueueEvicted};
use crate::observability::messages::StructuredLog;

struct Node<T> {
    value: T,
    next: Atomic<Node<T>>,
}

/// A change observed on a [`LockFreeQueue`], carrying the affected value.
pub enum QueueEvent<'a, T> {
    Pushed(&'a T),
    Popped(&'a T),
    Evicted(&'a T),
}

impl<'a, T> QueueEvent<'a, T> {
    pub fn value(&self) -> &'a T {
        match self {
            QueueEvent::Pushed(value) | QueueEvent::Popped(value) | QueueEvent::Evicted(value) => {
                value
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueueEvent::Pushed(_) => "pushed",
            QueueEvent::Popped(_) => "popped",
            QueueEvent::Evicted(_) => "evicted",
        }
    }
}

impl<T> Clone for QueueEvent<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for QueueEvent<'_, T> {}

type Observer<T> = Arc<dyn Fn(QueueEvent<'_, T>) + Send + Sync>;

/// Multi-producer, multi-consumer queue with an optional element limit.
///
/// `push` is linearizable. `len` and eviction are eventually consistent: under
/// contention the count may briefly exceed the limit before the pushing thread
/// evicts back under it.
///
/// # Examples
///
/// ```rust
/// use the_conduit::collections::LockFreeQueue;
///
/// let queue = LockFreeQueue::with_capacity(2);
/// queue.push("a");
/// queue.push("b");
/// queue.push("c");
///
/// assert_eq!(queue.len(), 2);
/// assert_eq!(queue.peek(), Some("c"));
/// assert_eq!(queue.pop(), Some("b"));
/// ```
pub struct LockFreeQueue<T> {
    head: Atomic<Node<T>>,
    count: AtomicIsize,
    max_number_of_elements: Option<usize>,
    observers: RwLock<Vec<Observer<T>>>,
}

impl<T: Clone + Send + Sync + 'static> LockFreeQueue<T> {
    /// Unbounded queue.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Queue that evicts its oldest elements once it holds more than `max_number_of_elements`.
    pub fn with_capacity(max_number_of_elements: usize) -> Self {
        Self::build(Some(max_number_of_elements))
    }

    pub fn with_config(config: &QueueConfig) -> Self {
        Self::build(config.max_number_of_elements)
    }

    fn build(max_number_of_elements: Option<usize>) -> Self {
        Self {
            head: Atomic::null(),
            count: AtomicIsize::new(0),
            max_number_of_elements,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn max_number_of_elements(&self) -> Option<usize> {
        self.max_number_of_elements
    }

    /// Register a callback run after every push, pop and eviction.
    ///
    /// With several observers they run concurrently and all of them finish
    /// before the queue operation returns. A panicking observer is logged and
    /// does not affect the others.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(QueueEvent<'_, T>) + Send + Sync + 'static,
    {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(observer));
    }

    pub fn push(&self, value: T) {
        let guard = epoch::pin();
        let mut node = Owned::new(Node {
            value,
            next: Atomic::null(),
        });

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            node.next.store(head, Ordering::Relaxed);
            match self
                .head
                .compare_exchange(head, node, Ordering::AcqRel, Ordering::Acquire, &guard)
            {
                Ok(inserted) => {
                    self.count.fetch_add(1, Ordering::SeqCst);
                    // SAFETY: the node is reachable and protected by `guard`
                    let value = unsafe { &inserted.deref().value };
                    self.notify(QueueEvent::Pushed(value));
                    break;
                }
                // Another thread moved the head; retry with the new one
                Err(err) => node = err.new,
            }
        }

        self.evict_over_limit(&guard);
    }

    /// Remove and return the oldest element.
    ///
    /// Note the asymmetry with [`peek`](Self::peek), which reads the newest.
    pub fn pop(&self) -> Option<T> {
        let guard = epoch::pin();
        let node = self.unlink_oldest(&guard)?;
        // SAFETY: unlinked but not yet reclaimed while `guard` is pinned
        let value = unsafe { &node.deref().value };
        self.notify(QueueEvent::Popped(value));
        let value = value.clone();
        // SAFETY: the node is no longer reachable from the head
        unsafe { guard.defer_destroy(node) };
        Some(value)
    }

    /// The most recently pushed element.
    pub fn peek(&self) -> Option<T> {
        let guard = epoch::pin();
        let head = self.head.load(Ordering::Acquire, &guard);
        // SAFETY: protected by `guard`
        unsafe { head.as_ref() }.map(|node| node.value.clone())
    }

    /// The element the next [`pop`](Self::pop) would return.
    pub fn peek_oldest(&self) -> Option<T> {
        let guard = epoch::pin();
        let mut current = self.head.load(Ordering::Acquire, &guard);
        let mut oldest = None;
        // SAFETY: every node reached from the head is protected by `guard`
        while let Some(node) = unsafe { current.as_ref() } {
            oldest = Some(&node.value);
            current = node.next.load(Ordering::Acquire, &guard);
        }
        oldest.cloned()
    }

    /// Values from newest to oldest.
    pub fn snapshot(&self) -> Vec<T> {
        let guard = epoch::pin();
        let mut values = Vec::with_capacity(self.len());
        let mut current = self.head.load(Ordering::Acquire, &guard);
        while let Some(node) = unsafe { current.as_ref() } {
            values.push(node.value.clone());
            current = node.next.load(Ordering::Acquire, &guard);
        }
        values
    }

    /// Iterate a snapshot, newest first.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.snapshot().into_iter()
    }

    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        let guard = epoch::pin();
        let mut current = self.head.load(Ordering::Acquire, &guard);
        while let Some(node) = unsafe { current.as_ref() } {
            if node.value == *value {
                return true;
            }
            current = node.next.load(Ordering::Acquire, &guard);
        }
        false
    }

    /// Pop everything. Observers see each removal as `Popped`.
    pub fn clear(&self) {
        while self.pop().is_some() {}
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire, &epoch::pin()).is_null()
    }

    /// Walk to the last node and detach it from its predecessor (or the head).
    fn unlink_oldest<'g>(&'g self, guard: &'g Guard) -> Option<Shared<'g, Node<T>>> {
        loop {
            let mut link = &self.head;
            let mut last = self.head.load(Ordering::Acquire, guard);
            if last.is_null() {
                return None;
            }

            // SAFETY: nodes reached from the head are protected by `guard`
            loop {
                let node = unsafe { last.deref() };
                let next = node.next.load(Ordering::Acquire, guard);
                if next.is_null() {
                    break;
                }
                link = &node.next;
                last = next;
            }

            if link
                .compare_exchange(last, Shared::null(), Ordering::AcqRel, Ordering::Acquire, guard)
                .is_ok()
            {
                self.count.fetch_sub(1, Ordering::SeqCst);
                return Some(last);
            }
        }
    }

    fn evict_over_limit(&self, guard: &Guard) {
        let Some(max_elements) = self.max_number_of_elements else {
            return;
        };

        let mut evicted = 0;
        while self.len() > max_elements {
            let Some(node) = self.unlink_oldest(guard) else {
                break;
            };
            // SAFETY: unlinked, reclaimed only after `guard` is released
            unsafe {
                self.notify(QueueEvent::Evicted(&node.deref().value));
                guard.defer_destroy(node);
            }
            evicted += 1;
        }

        if evicted > 0 {
            QueueEvicted {
                evicted,
                remaining: self.len(),
                max_elements,
            }
            .log();
        }
    }

    fn notify(&self, event: QueueEvent<'_, T>) {
        let observers: Vec<Observer<T>> = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        match observers.as_slice() {
            [] => {}
            [observer] => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer(event))) {
                    ObserverPanicked {
                        event: event.kind(),
                        message: &describe_panic(payload.as_ref()),
                    }
                    .log();
                }
            }
            many => thread::scope(|scope| {
                let handles: Vec<_> = many
                    .iter()
                    .map(|observer| scope.spawn(move || observer(event)))
                    .collect();
                for handle in handles {
                    if let Err(payload) = handle.join() {
                        ObserverPanicked {
                            event: event.kind(),
                            message: &describe_panic(payload.as_ref()),
                        }
                        .log();
                    }
                }
            }),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can reach the nodes
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);
            while !current.is_null() {
                let next = current.deref().next.load(Ordering::Relaxed, guard);
                drop(current.into_owned());
                current = next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Barrier, Mutex};

    #[test]
    fn test_bounded_queue_keeps_newest() {
        let queue = LockFreeQueue::with_capacity(3);
        for value in 1..=5 {
            queue.push(value);
        }

        assert!(queue.len() <= 3);
        assert_eq!(queue.peek(), Some(5));
        assert_eq!(queue.snapshot(), vec![5, 4, 3]);
        assert_eq!(queue.peek_oldest(), Some(3));
    }

    #[test]
    fn test_pop_removes_oldest() {
        let queue = LockFreeQueue::new();
        assert_eq!(queue.pop(), None);

        queue.push('a');
        queue.push('b');
        queue.push('c');

        assert_eq!(queue.pop(), Some('a'));
        assert_eq!(queue.pop(), Some('b'));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some('c'));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_contains_and_clear() {
        let queue = LockFreeQueue::new();
        queue.push("x".to_string());
        queue.push("y".to_string());

        assert!(queue.contains(&"x".to_string()));
        assert!(!queue.contains(&"z".to_string()));

        queue.clear();
        assert!(queue.is_empty());
        assert!(!queue.contains(&"x".to_string()));
        assert_eq!(queue.iter().count(), 0);
    }

    #[test]
    fn test_with_config() {
        let queue = LockFreeQueue::with_config(&QueueConfig {
            max_number_of_elements: Some(1),
        });
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.snapshot(), vec![2]);
        assert_eq!(queue.max_number_of_elements(), Some(1));
    }

    #[test]
    fn test_concurrent_pushes_are_never_lost() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;

        let queue = LockFreeQueue::with_capacity(THREADS * PER_THREAD);
        let barrier = Barrier::new(THREADS);

        thread::scope(|scope| {
            for t in 0..THREADS {
                let queue = &queue;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    for i in 0..PER_THREAD {
                        queue.push(t * PER_THREAD + i);
                    }
                });
            }
        });

        assert!(queue.len() <= THREADS * PER_THREAD);
        let values = queue.snapshot();
        let unique: HashSet<_> = values.iter().copied().collect();
        assert_eq!(values.len(), THREADS * PER_THREAD);
        assert_eq!(unique.len(), values.len());
    }

    #[test]
    fn test_concurrent_push_and_pop_account_for_every_value() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 250;

        let queue = LockFreeQueue::new();
        let popped = Mutex::new(Vec::new());

        thread::scope(|scope| {
            for p in 0..PRODUCERS {
                let queue = &queue;
                scope.spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.push(p * PER_PRODUCER + i);
                    }
                });
            }
            for _ in 0..2 {
                let queue = &queue;
                let popped = &popped;
                scope.spawn(move || {
                    for _ in 0..PER_PRODUCER {
                        if let Some(value) = queue.pop() {
                            popped.lock().unwrap().push(value);
                        }
                    }
                });
            }
        });

        let mut all = popped.into_inner().unwrap();
        all.extend(queue.snapshot());
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_observers_see_every_change() {
        let queue = LockFreeQueue::with_capacity(1);
        let events = Arc::new(Mutex::new(Vec::new()));
        let pushes = Arc::new(AtomicUsize::new(0));

        let recorded = events.clone();
        queue.subscribe(move |event: QueueEvent<'_, i32>| {
            recorded.lock().unwrap().push((event.kind(), *event.value()));
        });
        let counted = pushes.clone();
        queue.subscribe(move |event: QueueEvent<'_, i32>| {
            if let QueueEvent::Pushed(_) = event {
                counted.fetch_add(1, Ordering::SeqCst);
            }
        });

        queue.push(1);
        queue.push(2);
        queue.pop();

        assert_eq!(pushes.load(Ordering::SeqCst), 2);
        assert_eq!(
            *events.lock().unwrap(),
            vec![("pushed", 1), ("pushed", 2), ("evicted", 1), ("popped", 2)]
        );
    }

    #[test]
    fn test_panicking_observer_does_not_break_queue() {
        let queue = LockFreeQueue::new();
        queue.subscribe(|_: QueueEvent<'_, u8>| panic!("observer blew up"));

        queue.push(7);
        assert_eq!(queue.pop(), Some(7));
    }
}
