use crate::errors::FlowError;
use crate::pull::path::Path;
use crate::traits::{Element, Upstream};

/// Upstream connection shared by every built-in stage.
///
/// Tracks exhaustion so a stage stays exhausted until reset, and disposal so a
/// disposed stage neither pulls nor disposes its upstream twice.
pub(crate) struct Link<S> {
    source: Option<Upstream<S>>,
    exhausted: bool,
    disposed: bool,
}

impl<S> Link<S> {
    pub(crate) fn new() -> Self {
        Self {
            source: None,
            exhausted: false,
            disposed: false,
        }
    }

    pub(crate) fn attach(&mut self, source: Upstream<S>) {
        self.source = Some(source);
        self.exhausted = false;
        self.disposed = false;
    }

    /// Pull the next upstream element. `Ok(None)` means the upstream is spent.
    pub(crate) fn advance(&mut self, stage: &str) -> Result<Option<&S>, FlowError> {
        if self.exhausted || self.disposed {
            return Ok(None);
        }
        let source = self.source.as_mut().ok_or_else(|| FlowError::MissingSource {
            stage: stage.to_string(),
        })?;
        if source.move_next()? {
            Ok(source.current())
        } else {
            self.exhausted = true;
            Ok(None)
        }
    }

    /// Stop pulling without waiting for the upstream to run dry.
    pub(crate) fn terminate(&mut self) {
        self.exhausted = true;
    }

    pub(crate) fn reset(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            source.reset();
        }
        self.exhausted = false;
    }

    pub(crate) fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(mut source) = self.source.take() {
            source.dispose();
        }
    }

    pub(crate) fn upstream_path(&self) -> Option<Path> {
        self.source.as_ref().and_then(|source| source.path())
    }

    /// Path of an element this stage let through unchanged.
    pub(crate) fn path_through<T: Element>(&self, current: Option<&T>) -> Option<Path> {
        let current = current?;
        Some(
            self.upstream_path()
                .unwrap_or_else(|| Path::single(current.clone())),
        )
    }

    /// Path of an element this stage produced from its upstream's current element.
    pub(crate) fn path_appending<T: Element>(&self, current: Option<&T>) -> Option<Path> {
        let current = current?.clone();
        Some(match self.upstream_path() {
            Some(path) => path.extended(current),
            None => Path::single(current),
        })
    }
}
