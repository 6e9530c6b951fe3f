// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Ready-made arrows: skip, distinct, windowed distinct, predicate and map.
//!
//! Each constructor returns an [`Arrow`] wired with one of the processors below.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use crate::collections::LockFreeQueue;
use crate::push::arrow::Arrow;
use crate::traits::ArrowProcessor;

/// Adapts a closure into an [`ArrowProcessor`].
pub struct FnProcessor<F> {
    process: F,
}

impl<F> FnProcessor<F> {
    pub fn new(process: F) -> Self {
        Self { process }
    }
}

impl<TIn, TOut, F> ArrowProcessor<TIn, TOut> for FnProcessor<F>
where
    F: FnMut(&TIn) -> anyhow::Result<Option<TOut>> + Send,
{
    fn process_message(&mut self, message: &TIn) -> anyhow::Result<Option<TOut>> {
        (self.process)(message)
    }
}

/// Drops the first `count` messages and forwards the rest.
pub struct Skip {
    remaining: usize,
}

impl Skip {
    pub fn new(count: usize) -> Self {
        Self { remaining: count }
    }
}

impl<T: Clone> ArrowProcessor<T, T> for Skip {
    fn process_message(&mut self, message: &T) -> anyhow::Result<Option<T>> {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(None);
        }
        Ok(Some(message.clone()))
    }
}

/// Forwards a message only the first time its key is seen.
pub struct Distinct<T, K> {
    key: Box<dyn FnMut(&T) -> K + Send>,
    seen: HashSet<K>,
}

impl<T, K: Eq + Hash> Distinct<T, K> {
    pub fn by_key<F>(key: F) -> Self
    where
        F: FnMut(&T) -> K + Send + 'static,
    {
        Self {
            key: Box::new(key),
            seen: HashSet::new(),
        }
    }
}

impl<T: Clone, K: Eq + Hash + Send> ArrowProcessor<T, T> for Distinct<T, K> {
    fn process_message(&mut self, message: &T) -> anyhow::Result<Option<T>> {
        let key = (self.key)(message);
        Ok(self.seen.insert(key).then(|| message.clone()))
    }
}

/// Forwards a message unless it equals one of the last `window` forwarded messages.
pub struct DistinctWithin<T> {
    recent: LockFreeQueue<T>,
}

impl<T: Clone + Send + Sync + 'static> DistinctWithin<T> {
    pub fn new(window: usize) -> Self {
        Self {
            recent: LockFreeQueue::with_capacity(window),
        }
    }
}

impl<T> ArrowProcessor<T, T> for DistinctWithin<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn process_message(&mut self, message: &T) -> anyhow::Result<Option<T>> {
        if self.recent.contains(message) {
            return Ok(None);
        }
        self.recent.push(message.clone());
        Ok(Some(message.clone()))
    }
}

pub fn skip<T: Clone + 'static>(name: impl Into<String>, count: usize) -> Arc<Arrow<T, T>> {
    Arrow::new(name, Skip::new(count))
}

pub fn distinct<T>(name: impl Into<String>) -> Arc<Arrow<T, T>>
where
    T: Clone + Eq + Hash + Send + 'static,
{
    distinct_by(name, T::clone)
}

pub fn distinct_by<T, K, F>(name: impl Into<String>, key: F) -> Arc<Arrow<T, T>>
where
    T: Clone + 'static,
    K: Eq + Hash + Send + 'static,
    F: FnMut(&T) -> K + Send + 'static,
{
    Arrow::new(name, Distinct::by_key(key))
}

/// Sliding-window dedup; memory stays bounded by `window`.
pub fn distinct_within<T>(name: impl Into<String>, window: usize) -> Arc<Arrow<T, T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Arrow::new(name, DistinctWithin::new(window))
}

pub fn filter<T, F>(name: impl Into<String>, mut predicate: F) -> Arc<Arrow<T, T>>
where
    T: Clone + 'static,
    F: FnMut(&T) -> bool + Send + 'static,
{
    Arrow::new(
        name,
        FnProcessor::new(move |message: &T| -> anyhow::Result<Option<T>> {
            Ok(predicate(message).then(|| message.clone()))
        }),
    )
}

pub fn map<TIn, TOut, F>(name: impl Into<String>, mut transform: F) -> Arc<Arrow<TIn, TOut>>
where
    TIn: 'static,
    TOut: 'static,
    F: FnMut(&TIn) -> TOut + Send + 'static,
{
    Arrow::new(
        name,
        FnProcessor::new(move |message: &TIn| -> anyhow::Result<Option<TOut>> {
            Ok(Some(transform(message)))
        }),
    )
}

/// Like [`map`], but an `Err` is raised on the arrow's exception channel.
pub fn try_map<TIn, TOut, F>(name: impl Into<String>, mut transform: F) -> Arc<Arrow<TIn, TOut>>
where
    TIn: 'static,
    TOut: 'static,
    F: FnMut(&TIn) -> anyhow::Result<TOut> + Send + 'static,
{
    Arrow::new(
        name,
        FnProcessor::new(move |message: &TIn| -> anyhow::Result<Option<TOut>> {
            transform(message).map(Some)
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ArrowReceiver, ArrowSender};
    use std::sync::Mutex;

    fn run<TIn: 'static, TOut: Clone + Send + 'static>(
        arrow: &Arc<Arrow<TIn, TOut>>,
        inputs: Vec<TIn>,
    ) -> Vec<TOut> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        arrow.on_notification(move |_, value: &TOut| {
            sink.lock().unwrap().push(value.clone());
            Ok(())
        });
        for (event_id, input) in inputs.iter().enumerate() {
            arrow.process_arrow(event_id as u64, input).unwrap();
        }
        let out = seen.lock().unwrap().clone();
        out
    }

    #[test]
    fn test_skip() {
        assert_eq!(run(&skip("skip", 2), vec![1, 2, 3, 4, 5]), vec![3, 4, 5]);
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        assert_eq!(
            run(&distinct("distinct"), vec!["a", "b", "a", "c", "b"]),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_distinct_by_key() {
        let arrow = distinct_by("by_len", |word: &String| word.len());
        let words = ["one", "two", "three", "four", "sixty"]
            .iter()
            .map(|w| w.to_string())
            .collect();
        assert_eq!(run(&arrow, words), vec!["one", "three", "four"]);
    }

    #[test]
    fn test_distinct_within_window() {
        assert_eq!(
            run(&distinct_within("recent", 2), vec![1, 2, 1, 3, 1, 1]),
            vec![1, 2, 3, 1]
        );
    }

    #[test]
    fn test_filter_and_map() {
        assert_eq!(run(&filter("odd", |n: &u32| n % 2 == 1), vec![1, 2, 3]), vec![1, 3]);
        assert_eq!(
            run(&map("describe", |n: &u32| format!("n={}", n)), vec![7]),
            vec!["n=7".to_string()]
        );
    }

    #[test]
    fn test_try_map_raises_failures() {
        let arrow = try_map("parse", |s: &&str| Ok(s.parse::<i32>()?));
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = faults.clone();
        arrow.on_exception(move |_, event_id, _| sink.lock().unwrap().push(event_id));

        assert_eq!(run(&arrow, vec!["1", "x", "3"]), vec![1, 3]);
        assert_eq!(*faults.lock().unwrap(), vec![1]);
    }
}
