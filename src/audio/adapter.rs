// Engine adapter interface
// The controller only talks to decode/output through this trait

use std::time::Duration;

use crate::error::{EngineError, LoadError};

/// Narrow capability set of a decode-and-output engine
///
/// Implementations hold at most one prepared resource. `prepare` replaces
/// whatever was prepared before and leaves output stopped at position zero.
pub trait EngineAdapter: Send {
    /// Open the resource and report its total duration
    fn prepare(&mut self, resource: &str) -> Result<Duration, LoadError>;

    /// Start (or resume) output from the current position
    fn start(&mut self) -> Result<(), EngineError>;

    /// Halt output, keeping the position
    fn stop(&mut self);

    /// Jump to an absolute position
    fn seek(&mut self, position: Duration) -> Result<(), EngineError>;

    /// Output gain in `[0.0, 1.0]`, remembered across `prepare`
    fn set_gain(&mut self, gain: f32);

    /// Elapsed position of the prepared resource
    fn current_position(&self) -> Result<Duration, EngineError>;
}

impl<E: EngineAdapter + ?Sized> EngineAdapter for Box<E> {
    fn prepare(&mut self, resource: &str) -> Result<Duration, LoadError> {
        (**self).prepare(resource)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn seek(&mut self, position: Duration) -> Result<(), EngineError> {
        (**self).seek(position)
    }

    fn set_gain(&mut self, gain: f32) {
        (**self).set_gain(gain)
    }

    fn current_position(&self) -> Result<Duration, EngineError> {
        (**self).current_position()
    }
}
