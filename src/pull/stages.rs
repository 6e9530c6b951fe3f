// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in pull stages.
//!
//! Transforming stages ([`MapStage`], [`ScatterStage`]) append their output to
//! the provenance path. Pass-through stages ([`FilterStage`], [`DedupStage`],
//! [`RangeStage`]) report their upstream's path unchanged.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use crate::errors::FlowError;
use crate::pull::link::Link;
use crate::pull::path::Path;
use crate::traits::{Element, Pull, Stage, Upstream};

type MapFn<S, E> = Box<dyn FnMut(&S) -> anyhow::Result<E>>;

/// Applies a function to every upstream element.
pub struct MapStage<S, E> {
    name: String,
    link: Link<S>,
    map: MapFn<S, E>,
    current: Option<E>,
}

impl<S: Element, E: Element> MapStage<S, E> {
    pub fn new<F>(mut map: F) -> Self
    where
        F: FnMut(&S) -> E + 'static,
    {
        Self::fallible(move |input| Ok(map(input)))
    }

    /// A map whose function may fail; the failure surfaces from `move_next`.
    pub fn fallible<F>(map: F) -> Self
    where
        F: FnMut(&S) -> anyhow::Result<E> + 'static,
    {
        Self {
            name: "map".to_string(),
            link: Link::new(),
            map: Box::new(map),
            current: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<S: Element, E: Element> Pull for MapStage<S, E> {
    type Item = E;

    fn move_next(&mut self) -> Result<bool, FlowError> {
        self.current = None;
        let Some(input) = self.link.advance(&self.name)? else {
            return Ok(false);
        };
        let output = (self.map)(input).map_err(|source| FlowError::Iteration {
            stage: self.name.clone(),
            source,
        })?;
        self.current = Some(output);
        Ok(true)
    }

    fn current(&self) -> Option<&E> {
        self.current.as_ref()
    }

    fn reset(&mut self) {
        self.link.reset();
        self.current = None;
    }

    fn dispose(&mut self) {
        self.link.dispose();
        self.current = None;
    }

    fn path(&self) -> Option<Path> {
        self.link.path_appending(self.current.as_ref())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<S: Element, E: Element> Stage for MapStage<S, E> {
    type Input = S;

    fn set_source(&mut self, source: Upstream<S>) {
        self.link.attach(source);
        self.current = None;
    }
}

/// Lets through the elements matching a predicate.
pub struct FilterStage<T> {
    name: String,
    link: Link<T>,
    predicate: Box<dyn FnMut(&T) -> bool>,
    current: Option<T>,
}

impl<T: Element> FilterStage<T> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: FnMut(&T) -> bool + 'static,
    {
        Self {
            name: "filter".to_string(),
            link: Link::new(),
            predicate: Box::new(predicate),
            current: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: Element> Pull for FilterStage<T> {
    type Item = T;

    fn move_next(&mut self) -> Result<bool, FlowError> {
        self.current = None;
        while let Some(candidate) = self.link.advance(&self.name)? {
            if (self.predicate)(candidate) {
                self.current = Some(candidate.clone());
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn reset(&mut self) {
        self.link.reset();
        self.current = None;
    }

    fn dispose(&mut self) {
        self.link.dispose();
        self.current = None;
    }

    fn path(&self) -> Option<Path> {
        self.link.path_through(self.current.as_ref())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Element> Stage for FilterStage<T> {
    type Input = T;

    fn set_source(&mut self, source: Upstream<T>) {
        self.link.attach(source);
        self.current = None;
    }
}

/// Lets through the first occurrence of every distinct element, in upstream order.
///
/// Distinctness is decided by a key extracted from each element; the default
/// key is the element itself.
pub struct DedupStage<T, K> {
    name: String,
    link: Link<T>,
    key: Box<dyn FnMut(&T) -> K>,
    seen: HashSet<K>,
    current: Option<T>,
}

impl<T: Element + Eq + Hash> DedupStage<T, T> {
    pub fn new() -> Self {
        Self::by_key(T::clone)
    }
}

impl<T: Element + Eq + Hash> Default for DedupStage<T, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element, K: Eq + Hash> DedupStage<T, K> {
    /// Treat elements with equal keys as duplicates.
    pub fn by_key<F>(key: F) -> Self
    where
        F: FnMut(&T) -> K + 'static,
    {
        Self {
            name: "dedup".to_string(),
            link: Link::new(),
            key: Box::new(key),
            seen: HashSet::new(),
            current: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: Element, K: Eq + Hash> Pull for DedupStage<T, K> {
    type Item = T;

    fn move_next(&mut self) -> Result<bool, FlowError> {
        self.current = None;
        while let Some(candidate) = self.link.advance(&self.name)? {
            if self.seen.insert((self.key)(candidate)) {
                self.current = Some(candidate.clone());
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn reset(&mut self) {
        self.link.reset();
        self.seen.clear();
        self.current = None;
    }

    fn dispose(&mut self) {
        self.link.dispose();
        self.seen.clear();
        self.current = None;
    }

    fn path(&self) -> Option<Path> {
        self.link.path_through(self.current.as_ref())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Element, K: Eq + Hash> Stage for DedupStage<T, K> {
    type Input = T;

    fn set_source(&mut self, source: Upstream<T>) {
        self.link.attach(source);
        self.seen.clear();
        self.current = None;
    }
}

/// Lets through the elements at 0-based upstream positions `low..=high`.
///
/// Once the position passes `high` the stage terminates without pulling
/// anything further from its upstream. A missing `high` means unbounded.
pub struct RangeStage<T> {
    name: String,
    link: Link<T>,
    low: usize,
    high: Option<usize>,
    position: usize,
    current: Option<T>,
}

impl<T: Element> RangeStage<T> {
    pub fn new(low: usize, high: Option<usize>) -> Self {
        Self {
            name: "range".to_string(),
            link: Link::new(),
            low,
            high,
            position: 0,
            current: None,
        }
    }

    /// Positions `low..=high`.
    pub fn between(low: usize, high: usize) -> Self {
        Self::new(low, Some(high))
    }

    /// Every position from `low` on.
    pub fn from(low: usize) -> Self {
        Self::new(low, None)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: Element> Pull for RangeStage<T> {
    type Item = T;

    fn move_next(&mut self) -> Result<bool, FlowError> {
        self.current = None;
        loop {
            if matches!(self.high, Some(high) if self.position > high) {
                self.link.terminate();
                return Ok(false);
            }
            let Some(candidate) = self.link.advance(&self.name)? else {
                return Ok(false);
            };
            let position = self.position;
            self.position += 1;
            if position >= self.low {
                self.current = Some(candidate.clone());
                return Ok(true);
            }
        }
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn reset(&mut self) {
        self.link.reset();
        self.position = 0;
        self.current = None;
    }

    fn dispose(&mut self) {
        self.link.dispose();
        self.current = None;
    }

    fn path(&self) -> Option<Path> {
        self.link.path_through(self.current.as_ref())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Element> Stage for RangeStage<T> {
    type Input = T;

    fn set_source(&mut self, source: Upstream<T>) {
        self.link.attach(source);
        self.position = 0;
        self.current = None;
    }
}

type ScatterFn<S, E> = Box<dyn FnMut(&S) -> anyhow::Result<Vec<E>>>;

/// Expands every upstream element into zero or more elements.
///
/// The upstream is not advanced until all elements produced from its current
/// element have been pulled, so each output's path ends with its input.
pub struct ScatterStage<S, E> {
    name: String,
    link: Link<S>,
    scatter: ScatterFn<S, E>,
    pending: VecDeque<E>,
    current: Option<E>,
}

impl<S: Element, E: Element> ScatterStage<S, E> {
    pub fn new<F, I>(mut scatter: F) -> Self
    where
        F: FnMut(&S) -> I + 'static,
        I: IntoIterator<Item = E>,
    {
        Self::fallible(move |input| Ok(scatter(input).into_iter().collect()))
    }

    pub fn fallible<F>(scatter: F) -> Self
    where
        F: FnMut(&S) -> anyhow::Result<Vec<E>> + 'static,
    {
        Self {
            name: "scatter".to_string(),
            link: Link::new(),
            scatter: Box::new(scatter),
            pending: VecDeque::new(),
            current: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<S: Element, E: Element> Pull for ScatterStage<S, E> {
    type Item = E;

    fn move_next(&mut self) -> Result<bool, FlowError> {
        self.current = None;
        loop {
            if let Some(next) = self.pending.pop_front() {
                self.current = Some(next);
                return Ok(true);
            }
            let Some(input) = self.link.advance(&self.name)? else {
                return Ok(false);
            };
            let produced = (self.scatter)(input).map_err(|source| FlowError::Iteration {
                stage: self.name.clone(),
                source,
            })?;
            self.pending.extend(produced);
        }
    }

    fn current(&self) -> Option<&E> {
        self.current.as_ref()
    }

    fn reset(&mut self) {
        self.link.reset();
        self.pending.clear();
        self.current = None;
    }

    fn dispose(&mut self) {
        self.link.dispose();
        self.pending.clear();
        self.current = None;
    }

    fn path(&self) -> Option<Path> {
        self.link.path_appending(self.current.as_ref())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<S: Element, E: Element> Stage for ScatterStage<S, E> {
    type Input = S;

    fn set_source(&mut self, source: Upstream<S>) {
        self.link.attach(source);
        self.pending.clear();
        self.current = None;
    }
}
