// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline composition and iteration.
//!
//! # Examples
//!
//! ```rust
//! use the_conduit::pull::{DedupStage, MapStage, PipelineBuilder, SequenceSource};
//!
//! let mut pipeline = PipelineBuilder::from_source(SequenceSource::replayable(vec![3, 1, 3, 2]))
//!     .then(DedupStage::new())
//!     .then(MapStage::new(|n: &i32| n * 10))
//!     .build();
//!
//! assert_eq!(pipeline.collect_all().unwrap(), vec![30, 10, 20]);
//! ```

use std::any::{Any, TypeId};
use std::fmt;

use crate::errors::{CompositionError, FlowError};
use crate::observability::messages::pull::{CompositionRejected, PipelineComposed, StageFaulted};
use crate::observability::messages::StructuredLog;
use crate::pull::path::Path;
use crate::pull::source::StartStage;
use crate::traits::{Element, Pull, Stage, Upstream};

/// Runtime identity of an element type, used to check chains assembled at runtime.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    Ready,
    Running,
    Exhausted,
    Faulted { stage: String },
    Disposed,
}

/// A composed chain of stages emitting `T`.
///
/// Iteration delegates to the last stage, which pulls from its upstream on
/// demand. Once `move_next` returns `false` the pipeline stays exhausted until
/// [`reset`](Pull::reset). A stage fault is returned once and leaves the
/// pipeline unusable until it is reset.
///
/// A pipeline must not be iterated from several threads; build one pipeline per
/// traversal instead.
pub struct Pipeline<T> {
    tail: Upstream<T>,
    stages: Vec<String>,
    state: PipelineState,
}

impl<T: 'static> Pipeline<T> {
    fn assemble(tail: Upstream<T>, stages: Vec<String>) -> Self {
        PipelineComposed {
            stages: &stages,
            emits: std::any::type_name::<T>(),
        }
        .log();
        Self {
            tail,
            stages,
            state: PipelineState::Ready,
        }
    }

    /// Stage names, first to last.
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == PipelineState::Exhausted
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.state, PipelineState::Faulted { .. })
    }
}

impl<T: Clone + 'static> Pipeline<T> {
    /// Pull every remaining element.
    pub fn collect_all(&mut self) -> Result<Vec<T>, FlowError> {
        let mut out = Vec::new();
        while self.move_next()? {
            if let Some(current) = self.current() {
                out.push(current.clone());
            }
        }
        Ok(out)
    }
}

impl<T: 'static> Pull for Pipeline<T> {
    type Item = T;

    fn move_next(&mut self) -> Result<bool, FlowError> {
        match &self.state {
            PipelineState::Exhausted | PipelineState::Disposed => return Ok(false),
            PipelineState::Faulted { stage } => {
                return Err(FlowError::Faulted {
                    stage: stage.clone(),
                })
            }
            PipelineState::Ready | PipelineState::Running => {}
        }

        match self.tail.move_next() {
            Ok(true) => {
                self.state = PipelineState::Running;
                Ok(true)
            }
            Ok(false) => {
                self.state = PipelineState::Exhausted;
                Ok(false)
            }
            Err(err) => {
                let stage = err.origin().to_string();
                StageFaulted {
                    stage: &stage,
                    error: &err,
                }
                .log();
                self.state = PipelineState::Faulted { stage };
                Err(err)
            }
        }
    }

    fn current(&self) -> Option<&T> {
        match self.state {
            PipelineState::Running => self.tail.current(),
            _ => None,
        }
    }

    fn reset(&mut self) {
        if self.state == PipelineState::Disposed {
            return;
        }
        self.tail.reset();
        self.state = PipelineState::Ready;
    }

    fn dispose(&mut self) {
        if self.state == PipelineState::Disposed {
            return;
        }
        self.tail.dispose();
        self.state = PipelineState::Disposed;
    }

    fn path(&self) -> Option<Path> {
        match self.state {
            PipelineState::Running => self.tail.path(),
            _ => None,
        }
    }

    fn name(&self) -> &str {
        self.stages.last().map(String::as_str).unwrap_or("pipeline")
    }
}

/// Yields clones of the current element. A fault is yielded once, after which
/// the iterator ends.
impl<T: Clone + 'static> Iterator for Pipeline<T> {
    type Item = Result<T, FlowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_faulted() {
            return None;
        }
        match self.move_next() {
            Ok(true) => self.current().cloned().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Builds a [`Pipeline`] whose stage types are checked at compile time.
pub struct PipelineBuilder<T> {
    tail: Upstream<T>,
    stages: Vec<String>,
}

impl<T: Element> PipelineBuilder<T> {
    /// Start a pipeline over an external source. The source is wrapped in a
    /// [`StartStage`] so element provenance is recorded from the first value.
    pub fn from_source(source: impl Pull<Item = T> + 'static) -> Self {
        let start = StartStage::over(source);
        Self {
            stages: vec![start.name().to_string()],
            tail: Box::new(start),
        }
    }

    /// Append a stage consuming this pipeline's elements.
    pub fn then<S>(self, mut stage: S) -> PipelineBuilder<S::Item>
    where
        S: Stage<Input = T> + 'static,
    {
        let mut stages = self.stages;
        stages.push(stage.name().to_string());
        stage.set_source(self.tail);
        PipelineBuilder {
            tail: Box::new(stage),
            stages,
        }
    }
}

impl<T: 'static> PipelineBuilder<T> {
    pub fn build(self) -> Pipeline<T> {
        Pipeline::assemble(self.tail, self.stages)
    }
}

/// Object-safe view of a stage whose element types are only known at runtime.
trait ErasedStage {
    fn stage_name(&self) -> &str;
    fn input_type(&self) -> TypeTag;
    fn output_type(&self) -> TypeTag;

    /// Plug a boxed `Upstream<Input>` and return this stage as a boxed
    /// `Upstream<Item>`. Hands the upstream back if its type does not match.
    fn attach(self: Box<Self>, upstream: Box<dyn Any>) -> Result<Box<dyn Any>, Box<dyn Any>>;
}

impl<S> ErasedStage for S
where
    S: Stage + 'static,
    S::Input: 'static,
    S::Item: 'static,
{
    fn stage_name(&self) -> &str {
        self.name()
    }

    fn input_type(&self) -> TypeTag {
        TypeTag::of::<S::Input>()
    }

    fn output_type(&self) -> TypeTag {
        TypeTag::of::<S::Item>()
    }

    fn attach(mut self: Box<Self>, upstream: Box<dyn Any>) -> Result<Box<dyn Any>, Box<dyn Any>> {
        let upstream = upstream.downcast::<Upstream<S::Input>>()?;
        self.set_source(*upstream);
        let stage: Upstream<S::Item> = self;
        Ok(Box::new(stage))
    }
}

/// A list of stages assembled at runtime, type-checked once by [`StageChain::build`].
///
/// ```rust
/// use the_conduit::errors::CompositionError;
/// use the_conduit::pull::{FilterStage, MapStage, SequenceSource, StageChain};
///
/// let chain = StageChain::new()
///     .push(MapStage::new(|n: &i32| n.to_string()))
///     .push(FilterStage::new(|n: &i32| *n > 0));
///
/// let err = chain
///     .build::<i32, i32>(Box::new(SequenceSource::replayable(vec![1, 2])))
///     .err()
///     .unwrap();
/// assert!(matches!(err, CompositionError::StageTypeMismatch { upstream_index: 0, .. }));
/// ```
#[derive(Default)]
pub struct StageChain {
    stages: Vec<Box<dyn ErasedStage>>,
}

impl StageChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S>(mut self, stage: S) -> Self
    where
        S: Stage + 'static,
        S::Input: 'static,
        S::Item: 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Check that every stage emits what the next one consumes.
    pub fn validate(&self) -> Result<(), CompositionError> {
        if self.stages.is_empty() {
            return Err(CompositionError::EmptyChain);
        }
        for (index, pair) in self.stages.windows(2).enumerate() {
            let (upstream, downstream) = (&pair[0], &pair[1]);
            if upstream.output_type() != downstream.input_type() {
                return Err(CompositionError::StageTypeMismatch {
                    upstream_index: index,
                    upstream_stage: upstream.stage_name().to_string(),
                    produces: upstream.output_type().name(),
                    downstream_index: index + 1,
                    downstream_stage: downstream.stage_name().to_string(),
                    expects: downstream.input_type().name(),
                });
            }
        }
        Ok(())
    }

    /// Validate the whole chain against `In` and `Out`, then wire it to `source`.
    ///
    /// Nothing is pulled from `source` here; every mismatch is reported before
    /// any stage is connected. As with [`PipelineBuilder::from_source`], the
    /// source is wrapped in a [`StartStage`] so paths begin with the source element.
    pub fn build<In: Element, Out: 'static>(
        self,
        source: Upstream<In>,
    ) -> Result<Pipeline<Out>, CompositionError> {
        if let Err(err) = self.check_ends::<In, Out>().and_then(|_| self.validate()) {
            CompositionRejected { error: &err }.log();
            return Err(err);
        }

        let names: Vec<String> = self.stages.iter().map(|stage| stage.stage_name().to_string()).collect();
        let mut start = StartStage::new();
        start.set_source(source);
        let mut stages = vec![start.name().to_string()];
        stages.extend(names.iter().cloned());
        let mut upstream: Box<dyn Any> = Box::new(Box::new(start) as Upstream<In>);
        for (index, stage) in self.stages.into_iter().enumerate() {
            let name = stage.stage_name().to_string();
            let expects = stage.input_type().name();
            upstream = stage.attach(upstream).map_err(|_| CompositionError::StageTypeMismatch {
                upstream_index: index.saturating_sub(1),
                upstream_stage: names[index.saturating_sub(1)].clone(),
                produces: "<unknown>",
                downstream_index: index,
                downstream_stage: name,
                expects,
            })?;
        }

        let tail = upstream
            .downcast::<Upstream<Out>>()
            .map_err(|_| CompositionError::OutputTypeMismatch {
                stage: names.last().cloned().unwrap_or_default(),
                produces: "<unknown>",
                requested: std::any::type_name::<Out>(),
            })?;
        Ok(Pipeline::assemble(*tail, stages))
    }

    fn check_ends<In: 'static, Out: 'static>(&self) -> Result<(), CompositionError> {
        let (Some(first), Some(last)) = (self.stages.first(), self.stages.last()) else {
            return Err(CompositionError::EmptyChain);
        };
        if first.input_type() != TypeTag::of::<In>() {
            return Err(CompositionError::SourceTypeMismatch {
                produces: std::any::type_name::<In>(),
                stage: first.stage_name().to_string(),
                expects: first.input_type().name(),
            });
        }
        if last.output_type() != TypeTag::of::<Out>() {
            return Err(CompositionError::OutputTypeMismatch {
                stage: last.stage_name().to_string(),
                produces: last.output_type().name(),
                requested: std::any::type_name::<Out>(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pull::source::SequenceSource;
    use crate::pull::stages::{FilterStage, MapStage, RangeStage};
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_source(items: Vec<i32>, pulls: Rc<Cell<usize>>) -> SequenceSource<i32> {
        SequenceSource::streaming(items.into_iter().inspect(move |_| pulls.set(pulls.get() + 1)))
    }

    #[test]
    fn test_typed_builder_composes_and_iterates() {
        let mut pipeline = PipelineBuilder::from_source(SequenceSource::replayable(vec![1, 2, 3, 4]))
            .then(FilterStage::new(|n: &i32| n % 2 == 0).named("evens"))
            .then(MapStage::new(|n: &i32| n * n).named("square"))
            .build();

        assert_eq!(pipeline.stages(), &["start", "evens", "square"]);
        assert!(pipeline.current().is_none());
        assert!(pipeline.move_next().unwrap());
        assert_eq!(pipeline.current(), Some(&4));
        assert!(pipeline.move_next().unwrap());
        assert_eq!(pipeline.current(), Some(&16));
        assert!(!pipeline.move_next().unwrap());
        assert!(pipeline.current().is_none());
        assert!(pipeline.is_exhausted());
    }

    #[test]
    fn test_exhausted_until_reset() {
        let mut pipeline = PipelineBuilder::from_source(SequenceSource::replayable(vec!['x'])).build();
        assert_eq!(pipeline.collect_all().unwrap(), vec!['x']);
        assert!(!pipeline.move_next().unwrap());
        assert!(!pipeline.move_next().unwrap());

        pipeline.reset();
        assert_eq!(pipeline.collect_all().unwrap(), vec!['x']);
    }

    #[test]
    fn test_dynamic_chain_builds_when_types_line_up() {
        let pipeline = StageChain::new()
            .push(MapStage::new(|n: &i32| n.to_string()))
            .push(FilterStage::new(|s: &String| s.len() == 1))
            .build::<i32, String>(Box::new(SequenceSource::replayable(vec![5, 50, 7])));

        let mut pipeline = pipeline.unwrap();
        assert_eq!(pipeline.collect_all().unwrap(), vec!["5".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_dynamic_chain_mismatch_fails_before_iteration() {
        let pulls = Rc::new(Cell::new(0));
        let err = StageChain::new()
            .push(MapStage::new(|n: &i32| n.to_string()).named("stringify"))
            .push(RangeStage::<i32>::between(0, 1).named("first_two"))
            .build::<i32, i32>(Box::new(counting_source(vec![1, 2], pulls.clone())))
            .err()
            .unwrap();

        assert_eq!(pulls.get(), 0);
        match &err {
            CompositionError::StageTypeMismatch {
                upstream_index,
                upstream_stage,
                downstream_index,
                downstream_stage,
                ..
            } => {
                assert_eq!((*upstream_index, *downstream_index), (0, 1));
                assert_eq!(upstream_stage, "stringify");
                assert_eq!(downstream_stage, "first_two");
            }
            other => panic!("Expected StageTypeMismatch, got {:?}", other),
        }
        assert!(err.to_string().contains("'stringify'"));
        assert!(err.to_string().contains("'first_two'"));
    }

    #[test]
    fn test_dynamic_chain_checks_source_and_output() {
        let err = StageChain::new()
            .push(MapStage::new(|n: &u8| *n as u32))
            .build::<i32, u32>(Box::new(SequenceSource::replayable(vec![1])))
            .err()
            .unwrap();
        assert!(matches!(err, CompositionError::SourceTypeMismatch { .. }));

        let err = StageChain::new()
            .push(MapStage::new(|n: &u8| *n as u32))
            .build::<u8, u64>(Box::new(SequenceSource::replayable(vec![1u8])))
            .err()
            .unwrap();
        assert!(matches!(err, CompositionError::OutputTypeMismatch { .. }));

        let err = StageChain::new()
            .build::<u8, u8>(Box::new(SequenceSource::replayable(vec![1u8])))
            .err()
            .unwrap();
        assert_eq!(err, CompositionError::EmptyChain);
    }

    #[test]
    fn test_fault_propagates_once_then_pipeline_is_unusable() {
        let mut pipeline = PipelineBuilder::from_source(SequenceSource::replayable(vec![1, 0, 2]))
            .then(
                MapStage::fallible(|n: &i32| {
                    if *n == 0 {
                        anyhow::bail!("division by zero");
                    }
                    Ok(10 / n)
                })
                .named("divide"),
            )
            .build();

        assert!(pipeline.move_next().unwrap());
        let err = pipeline.move_next().unwrap_err();
        assert!(matches!(err, FlowError::Iteration { ref stage, .. } if stage == "divide"));
        assert!(pipeline.is_faulted());
        assert!(pipeline.current().is_none());

        let err = pipeline.move_next().unwrap_err();
        assert!(matches!(err, FlowError::Faulted { ref stage } if stage == "divide"));
    }

    #[test]
    fn test_iterator_yields_fault_once() {
        let pipeline = PipelineBuilder::from_source(SequenceSource::replayable(vec![1, 2, 3]))
            .then(MapStage::fallible(|n: &i32| {
                if *n == 2 {
                    anyhow::bail!("bad element");
                }
                Ok(*n)
            }))
            .build();

        let results: Vec<_> = pipeline.collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &1);
        assert!(results[1].is_err());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut pipeline = PipelineBuilder::from_source(SequenceSource::replayable(vec![1])).build();
        pipeline.dispose();
        pipeline.dispose();
        assert!(!pipeline.move_next().unwrap());
        pipeline.reset();
        assert!(!pipeline.move_next().unwrap());
    }
}
