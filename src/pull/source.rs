// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Element sources plugged into the start of a pull pipeline.

use crate::errors::FlowError;
use crate::observability::messages::{pull::ResetUnsupported, StructuredLog};
use crate::pull::link::Link;
use crate::pull::path::Path;
use crate::traits::{Element, Pull, Stage, Upstream};

enum Feed<T> {
    /// Backed by owned items; rewinds by moving the cursor back
    Replayable { items: Vec<T>, cursor: usize },
    /// Backed by an arbitrary iterator; cannot rewind
    Streaming(Box<dyn Iterator<Item = T>>),
}

/// A plain sequence of elements.
///
/// Sequences do not track provenance; wrap them in a [`StartStage`] (the
/// pipeline builder does this for you) to start recording paths.
pub struct SequenceSource<T> {
    name: String,
    feed: Feed<T>,
    current: Option<T>,
    disposed: bool,
}

impl<T: Element> SequenceSource<T> {
    /// A resettable source over owned items.
    pub fn replayable<I: IntoIterator<Item = T>>(items: I) -> Self {
        Self {
            name: "sequence".to_string(),
            feed: Feed::Replayable {
                items: items.into_iter().collect(),
                cursor: 0,
            },
            current: None,
            disposed: false,
        }
    }

    /// A source over any iterator. Resetting it has no effect.
    pub fn streaming<I>(iter: I) -> Self
    where
        I: Iterator<Item = T> + 'static,
    {
        Self {
            name: "stream".to_string(),
            feed: Feed::Streaming(Box::new(iter)),
            current: None,
            disposed: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_resettable(&self) -> bool {
        matches!(self.feed, Feed::Replayable { .. })
    }
}

impl<T: Element> Pull for SequenceSource<T> {
    type Item = T;

    fn move_next(&mut self) -> Result<bool, FlowError> {
        if self.disposed {
            self.current = None;
            return Ok(false);
        }
        self.current = match &mut self.feed {
            Feed::Replayable { items, cursor } => {
                let next = items.get(*cursor).cloned();
                if next.is_some() {
                    *cursor += 1;
                }
                next
            }
            Feed::Streaming(iter) => iter.next(),
        };
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn reset(&mut self) {
        match &mut self.feed {
            Feed::Replayable { cursor, .. } => {
                *cursor = 0;
                self.current = None;
            }
            Feed::Streaming(_) => ResetUnsupported { source: &self.name }.log(),
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.current = None;
        self.feed = Feed::Replayable {
            items: Vec::new(),
            cursor: 0,
        };
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// First stage of a pipeline: yields its source's elements unchanged and
/// starts the provenance path with each of them.
pub struct StartStage<T> {
    link: Link<T>,
    current: Option<T>,
}

impl<T: Element> StartStage<T> {
    pub fn new() -> Self {
        Self {
            link: Link::new(),
            current: None,
        }
    }

    pub fn over(source: impl Pull<Item = T> + 'static) -> Self {
        let mut stage = Self::new();
        stage.set_source(Box::new(source));
        stage
    }
}

impl<T: Element> Default for StartStage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Pull for StartStage<T> {
    type Item = T;

    fn move_next(&mut self) -> Result<bool, FlowError> {
        self.current = self.link.advance("start")?.cloned();
        Ok(self.current.is_some())
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
        self.current.as_ref().map(|current| Path::single(current.clone()))
    }

    fn name(&self) -> &str {
        "start"
    }
}

impl<T: Element> Stage for StartStage<T> {
    type Input = T;

    fn set_source(&mut self, source: Upstream<T>) {
        self.link.attach(source);
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<P: Pull>(source: &mut P) -> Vec<P::Item>
    where
        P::Item: Clone,
    {
        let mut out = Vec::new();
        while source.move_next().unwrap() {
            out.push(source.current().unwrap().clone());
        }
        out
    }

    #[test]
    fn test_replayable_source_rewinds() {
        let mut source = SequenceSource::replayable(vec![1, 2, 3]);
        assert!(source.current().is_none());
        assert_eq!(drain(&mut source), vec![1, 2, 3]);
        assert!(source.current().is_none());

        source.reset();
        assert_eq!(drain(&mut source), vec![1, 2, 3]);
    }

    #[test]
    fn test_streaming_source_does_not_rewind() {
        let mut source = SequenceSource::streaming(vec![1, 2, 3].into_iter());
        assert!(!source.is_resettable());
        assert!(source.move_next().unwrap());
        assert_eq!(source.current(), Some(&1));

        source.reset();
        assert_eq!(drain(&mut source), vec![2, 3]);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut source = SequenceSource::replayable(vec!["a"]);
        source.dispose();
        source.dispose();
        assert!(!source.move_next().unwrap());
    }

    #[test]
    fn test_start_stage_records_path() {
        let mut start = StartStage::over(SequenceSource::replayable(vec![10, 20]));
        assert!(start.path().is_none());

        assert!(start.move_next().unwrap());
        let path = start.path().unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path.get(0).unwrap().downcast_ref::<i32>(), Some(&10));
    }

    #[test]
    fn test_start_stage_without_source_fails() {
        let mut start: StartStage<u8> = StartStage::new();
        let err = start.move_next().unwrap_err();
        assert!(matches!(err, FlowError::MissingSource { ref stage } if stage == "start"));
    }
}
