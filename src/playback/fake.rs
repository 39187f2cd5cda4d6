// Scripted engine for controller tests
// Its clock follows tokio time, so paused-clock tests drive playback

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::audio::EngineAdapter;
use crate::error::{EngineError, LoadError};

#[derive(Default)]
struct FakeState {
    catalog: HashMap<String, Duration>,
    total: Option<Duration>,
    running_since: Option<Instant>,
    offset: Duration,
    gain: f32,
    position_override: Option<Duration>,
    fail_start: bool,
    fail_position: bool,
    seeks: Vec<Duration>,
}

impl FakeState {
    fn position(&self) -> Duration {
        if let Some(position) = self.position_override {
            return position;
        }
        let elapsed = self
            .running_since
            .map(|since| Instant::now().duration_since(since))
            .unwrap_or_default();
        (self.offset + elapsed).min(self.total.unwrap_or_default())
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    pub(crate) fn with_sound(self, resource: &str, total: Duration) -> Self {
        self.state.lock().catalog.insert(resource.to_string(), total);
        self
    }

    pub(crate) fn gain(&self) -> f32 {
        self.state.lock().gain
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.lock().running_since.is_some()
    }

    pub(crate) fn seeks(&self) -> Vec<Duration> {
        self.state.lock().seeks.clone()
    }

    pub(crate) fn fail_start(&self, fail: bool) {
        self.state.lock().fail_start = fail;
    }

    pub(crate) fn fail_position(&self, fail: bool) {
        self.state.lock().fail_position = fail;
    }

    /// Pin the reported position regardless of the clock
    pub(crate) fn override_position(&self, position: Option<Duration>) {
        self.state.lock().position_override = position;
    }
}

impl EngineAdapter for FakeEngine {
    fn prepare(&mut self, resource: &str) -> Result<Duration, LoadError> {
        let mut state = self.state.lock();
        state.running_since = None;
        state.offset = Duration::ZERO;
        state.total = None;

        let total = *state
            .catalog
            .get(resource)
            .ok_or_else(|| LoadError::NotFound(resource.into()))?;
        state.total = Some(total);
        Ok(total)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.fail_start {
            return Err(EngineError::Output("device unplugged".to_string()));
        }
        if state.total.is_none() {
            return Err(EngineError::NotPrepared);
        }
        if state.running_since.is_none() {
            state.running_since = Some(Instant::now());
        }
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.offset = state.position();
        state.running_since = None;
    }

    fn seek(&mut self, position: Duration) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let total = state.total.ok_or(EngineError::NotPrepared)?;
        state.seeks.push(position);
        state.offset = position.min(total);
        if state.running_since.is_some() {
            state.running_since = Some(Instant::now());
        }
        Ok(())
    }

    fn set_gain(&mut self, gain: f32) {
        self.state.lock().gain = gain;
    }

    fn current_position(&self) -> Result<Duration, EngineError> {
        let state = self.state.lock();
        if state.fail_position {
            return Err(EngineError::Output("stream lost".to_string()));
        }
        if state.total.is_none() {
            return Err(EngineError::NotPrepared);
        }
        Ok(state.position())
    }
}
