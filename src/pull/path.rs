// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Provenance of pipeline elements.
//!
//! A [`Path`] lists, oldest first, the values a pipeline passed through to reach
//! its current element. Paths are rebuilt on demand from the upstream chain, so
//! they cost nothing unless asked for. Stages that only let elements through
//! (filters, dedup, range) report their upstream's path unchanged, which keeps
//! them from repeating the tail entry.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::traits::Element;

trait PathValue: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Element> PathValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// One type-erased value recorded in a [`Path`].
#[derive(Clone)]
pub struct PathEntry(Rc<dyn PathValue>);

impl PathEntry {
    pub fn new<T: Element>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Borrow the recorded value if it has type `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        // Go through the inner value: `Rc<dyn PathValue>` is itself a `PathValue`.
        (*self.0).as_any().downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    pub fn type_name(&self) -> &'static str {
        (*self.0).type_name()
    }
}

impl fmt::Debug for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Ordered record of the values that produced a pipeline's current element.
#[derive(Clone, Debug, Default)]
pub struct Path {
    entries: Vec<PathEntry>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// A path holding a single value.
    pub fn single<T: Element>(value: T) -> Self {
        Self {
            entries: vec![PathEntry::new(value)],
        }
    }

    /// This path followed by `value`.
    pub fn extended<T: Element>(mut self, value: T) -> Self {
        self.entries.push(PathEntry::new(value));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PathEntry> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&PathEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.iter()
    }

    /// Every recorded value of type `T`, in path order.
    pub fn values_of<T: 'static>(&self) -> Vec<&T> {
        self.entries
            .iter()
            .filter_map(|entry| entry.downcast_ref::<T>())
            .collect()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathEntry;
    type IntoIter = std::slice::Iter<'a, PathEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
