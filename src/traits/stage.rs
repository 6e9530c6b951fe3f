use std::fmt::Debug;

use crate::errors::FlowError;
use crate::pull::path::Path;

/// Values that can travel through a pull pipeline and be recorded in a [`Path`].
pub trait Element: Clone + Debug + 'static {}

impl<T: Clone + Debug + 'static> Element for T {}

/// Anything a stage can pull elements from: another stage, a whole pipeline,
/// or a plain sequence.
///
/// The protocol is demand driven. `current` is `None` until a call to
/// `move_next` returns `true`, and stays `None` once it returns `false`.
pub trait Pull {
    type Item;

    /// Advance to the next element, returning `false` once nothing is left.
    fn move_next(&mut self) -> Result<bool, FlowError>;

    /// The element produced by the last successful `move_next`.
    fn current(&self) -> Option<&Self::Item>;

    /// Rewind to the first element. Sources that cannot rewind stay where they are.
    fn reset(&mut self);

    /// Release upstream resources. Calling it more than once has no further effect.
    fn dispose(&mut self);

    /// Provenance of the current element, or `None` when this source does not
    /// track provenance (plain sequences).
    fn path(&self) -> Option<Path> {
        None
    }

    fn name(&self) -> &str;
}

/// A boxed upstream of a stage.
pub type Upstream<T> = Box<dyn Pull<Item = T>>;

/// One unit of a pull pipeline: consumes `Input`, yields `Item`.
pub trait Stage: Pull {
    type Input;

    /// Plug the upstream this stage pulls from, replacing any previous one.
    fn set_source(&mut self, source: Upstream<Self::Input>);
}
