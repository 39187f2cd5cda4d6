// Playback controller
// Owns the current sound and the transport state machine. Every command and
// every observer sample runs under the same core lock.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};

use super::observer::{TickOutcome, TimeObserver};
use super::store::{PlayerEvent, PlayerStore};
use crate::audio::EngineAdapter;
use crate::error::{EngineError, PlayerError, Result};
use crate::models::{SharePayload, Sound};
use crate::settings::PlayerSettings;
use crate::state::{CommandOutcome, PlaybackState, PlayerSnapshot, Position, Volume};

/// Controller state behind the serialization lock
pub(crate) struct Core {
    this: Weak<Mutex<Core>>,
    runtime: Handle,
    tick_interval: Duration,
    engine: Box<dyn EngineAdapter>,
    store: PlayerStore,
    current_sound: Option<Arc<Sound>>,
    state: PlaybackState,
    position: Position,
    volume: Volume,
    /// Bumped whenever a playback run ends; stale observer ticks compare against it
    run: u64,
    observer: Option<TimeObserver>,
}

impl Core {
    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            current_sound: self.current_sound.clone(),
            state: self.state,
            position: self.position,
            volume: self.volume,
        }
    }

    fn publish(&self) {
        self.store.publish(self.snapshot());
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.state == next {
            return;
        }
        let old = self.state;
        self.state = next;
        tracing::debug!("[Player] {} -> {}", old, next);
        self.store.emit(PlayerEvent::StateChanged { old, new: next });
    }

    fn sound_id(&self) -> String {
        self.current_sound
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_default()
    }

    fn cancel_observer(&mut self) {
        self.run = self.run.wrapping_add(1);
        if let Some(observer) = self.observer.take() {
            observer.cancel();
        }
    }

    fn start_observer(&mut self) {
        self.cancel_observer();
        self.observer = Some(TimeObserver::spawn(
            &self.runtime,
            self.this.clone(),
            self.run,
            self.tick_interval,
        ));
    }

    /// Output failed: halt, drop to Paused and hand the error back
    fn engine_fault(&mut self, err: EngineError) -> PlayerError {
        tracing::warn!("[Player] Engine fault: {}", err);
        self.cancel_observer();
        self.engine.stop();
        if self.state.has_prepared_sound() {
            self.transition(PlaybackState::Paused);
        }
        self.store.emit(PlayerEvent::EngineFault {
            reason: err.to_string(),
        });
        self.publish();
        PlayerError::Engine(err)
    }

    fn load(&mut self, sound: Arc<Sound>) -> Result<Duration> {
        self.cancel_observer();
        self.engine.stop();

        tracing::info!("[Player] Loading {} ({})", sound.id, sound.resource);
        self.current_sound = Some(sound.clone());
        self.position = Position::default();
        self.transition(PlaybackState::Loading);
        self.publish();

        match self.engine.prepare(&sound.resource) {
            Ok(total) => {
                self.engine.set_gain(self.volume.get());
                self.position = Position::new(Duration::ZERO, total);
                self.transition(PlaybackState::Ready);
                self.store.emit(PlayerEvent::SoundLoaded {
                    sound_id: sound.id.clone(),
                    total,
                });
                self.publish();
                Ok(total)
            }
            Err(err) => {
                tracing::warn!("[Player] Failed to load {}: {}", sound.id, err);
                self.position = Position::default();
                self.transition(PlaybackState::Failed);
                self.store.emit(PlayerEvent::LoadFailed {
                    sound_id: sound.id.clone(),
                    reason: err.to_string(),
                });
                self.publish();
                Err(PlayerError::Load(err))
            }
        }
    }

    fn play(&mut self) -> Result<CommandOutcome> {
        match self.state {
            PlaybackState::Playing => return Ok(CommandOutcome::Unchanged),
            PlaybackState::Idle | PlaybackState::Loading | PlaybackState::Failed => {
                return Err(PlayerError::InvalidState {
                    command: "play",
                    state: self.state,
                });
            }
            PlaybackState::Ready | PlaybackState::Paused | PlaybackState::Ended => {}
        }

        // Finished runs restart from the top
        if self.position.is_at_end() {
            if let Err(err) = self.engine.seek(Duration::ZERO) {
                return Err(self.engine_fault(err));
            }
            self.position.set_current(Duration::ZERO);
        }

        if let Err(err) = self.engine.start() {
            return Err(self.engine_fault(err));
        }

        self.start_observer();
        self.transition(PlaybackState::Playing);
        self.publish();
        Ok(CommandOutcome::Applied)
    }

    fn pause(&mut self) -> Result<CommandOutcome> {
        if self.state != PlaybackState::Playing {
            return Ok(CommandOutcome::Unchanged);
        }

        self.cancel_observer();
        // One last sample so the frozen position is where output stopped
        match self.engine.current_position() {
            Ok(position) => self.position.set_current(position),
            Err(err) => return Err(self.engine_fault(err)),
        }
        if self.position.is_at_end() {
            self.finish_playback();
            return Ok(CommandOutcome::Applied);
        }

        self.engine.stop();
        self.transition(PlaybackState::Paused);
        self.publish();
        Ok(CommandOutcome::Applied)
    }

    fn stop(&mut self) -> CommandOutcome {
        let before = (self.state, self.position);

        self.cancel_observer();
        self.engine.stop();

        let next = if self.state.has_prepared_sound() {
            if !self.position.current().is_zero() {
                if let Err(err) = self.engine.seek(Duration::ZERO) {
                    tracing::warn!("[Player] Rewind on stop failed: {}", err);
                }
            }
            PlaybackState::Ready
        } else {
            PlaybackState::Idle
        };
        self.position.set_current(Duration::ZERO);
        self.transition(next);
        self.publish();

        if before == (self.state, self.position) {
            CommandOutcome::Unchanged
        } else {
            CommandOutcome::Applied
        }
    }

    fn seek(&mut self, to: Duration) -> Result<Duration> {
        let target = self.position.clamp(to);

        if self.state.has_prepared_sound() {
            if let Err(err) = self.engine.seek(target) {
                return Err(self.engine_fault(err));
            }
        }

        self.position.set_current(target);
        self.publish();
        Ok(target)
    }

    /// Freshest position: the engine's while playing, the last sample otherwise
    fn live_position(&self) -> Duration {
        if self.state == PlaybackState::Playing {
            if let Ok(position) = self.engine.current_position() {
                return self.position.clamp(position);
            }
        }
        self.position.current()
    }

    fn set_volume(&mut self, value: f32) -> Volume {
        let volume = Volume::new(value);
        self.engine.set_gain(volume.get());
        if volume != self.volume {
            self.volume = volume;
            self.store.emit(PlayerEvent::VolumeChanged { volume });
            self.publish();
        }
        volume
    }

    fn finish_playback(&mut self) {
        self.cancel_observer();
        self.engine.stop();
        self.position.set_current(self.position.total());
        self.transition(PlaybackState::Ended);
        tracing::info!("[Player] Playback ended");
        self.store.emit(PlayerEvent::Ended {
            sound_id: self.sound_id(),
        });
        self.publish();
    }

    fn on_playback_ended(&mut self) -> CommandOutcome {
        if self.state != PlaybackState::Playing {
            return CommandOutcome::Unchanged;
        }
        self.finish_playback();
        CommandOutcome::Applied
    }

    /// Apply one observer sample for `run`
    pub(crate) fn sample(&mut self, run: u64) -> TickOutcome {
        if run != self.run || self.state != PlaybackState::Playing {
            return TickOutcome::Stop;
        }

        match self.engine.current_position() {
            Ok(position) => {
                self.position.set_current(position);
                if self.position.is_at_end() {
                    self.finish_playback();
                    return TickOutcome::Stop;
                }
                self.publish();
                TickOutcome::Continue
            }
            Err(err) => {
                self.engine_fault(err);
                TickOutcome::Stop
            }
        }
    }
}

/// Transport controller for a single sound
///
/// Needs a tokio runtime for the time observer. Dropping the controller stops
/// output and cancels sampling.
pub struct PlaybackController {
    core: Arc<Mutex<Core>>,
    store: PlayerStore,
    seek_step: Duration,
}

impl PlaybackController {
    /// Build on the ambient tokio runtime
    pub fn new<E>(engine: E, settings: &PlayerSettings) -> Result<Self>
    where
        E: EngineAdapter + 'static,
    {
        let runtime = Handle::try_current()?;
        Ok(Self::with_runtime(engine, settings, runtime))
    }

    pub fn with_runtime<E>(mut engine: E, settings: &PlayerSettings, runtime: Handle) -> Self
    where
        E: EngineAdapter + 'static,
    {
        let volume = settings.volume();
        engine.set_gain(volume.get());

        let store = PlayerStore::new(PlayerSnapshot::new(volume), settings.event_capacity);
        let core_store = store.clone();
        let tick_interval = settings.tick_interval();

        let core = Arc::new_cyclic(|this| {
            Mutex::new(Core {
                this: this.clone(),
                runtime,
                tick_interval,
                engine: Box::new(engine),
                store: core_store,
                current_sound: None,
                state: PlaybackState::Idle,
                position: Position::default(),
                volume,
                run: 0,
                observer: None,
            })
        });

        Self {
            core,
            store,
            seek_step: settings.seek_step(),
        }
    }

    /// Make `sound` current and prepare it, returns its total duration
    ///
    /// On failure the sound stays current with state `Failed`.
    pub fn load(&self, sound: Sound) -> Result<Duration> {
        self.core.lock().load(Arc::new(sound))
    }

    pub fn play(&self) -> Result<CommandOutcome> {
        self.core.lock().play()
    }

    pub fn pause(&self) -> Result<CommandOutcome> {
        self.core.lock().pause()
    }

    pub fn toggle_play_pause(&self) -> Result<CommandOutcome> {
        let mut core = self.core.lock();
        if core.state == PlaybackState::Playing {
            core.pause()
        } else {
            core.play()
        }
    }

    /// Halt output and rewind; also the teardown hook for presentation contexts
    pub fn stop(&self) -> Result<CommandOutcome> {
        Ok(self.core.lock().stop())
    }

    /// Jump to `to`, clamped into the sound; returns the applied position
    pub fn seek(&self, to: Duration) -> Result<Duration> {
        self.core.lock().seek(to)
    }

    pub fn seek_forward(&self, by: Duration) -> Result<Duration> {
        let mut core = self.core.lock();
        let target = core.live_position().saturating_add(by);
        core.seek(target)
    }

    pub fn seek_backward(&self, by: Duration) -> Result<Duration> {
        let mut core = self.core.lock();
        let target = core.live_position().saturating_sub(by);
        core.seek(target)
    }

    /// Seek forward by the configured step
    pub fn skip_forward(&self) -> Result<Duration> {
        self.seek_forward(self.seek_step)
    }

    /// Seek backward by the configured step
    pub fn skip_backward(&self) -> Result<Duration> {
        self.seek_backward(self.seek_step)
    }

    /// Store the clamped volume, also when nothing is loaded
    pub fn set_volume(&self, value: f32) -> Volume {
        self.core.lock().set_volume(value)
    }

    /// Engine integrations call this when output runs out
    pub fn on_playback_ended(&self) -> CommandOutcome {
        self.core.lock().on_playback_ended()
    }

    /// Shareable reference to the current sound, no playback side effects
    pub fn share_payload(&self) -> Option<SharePayload> {
        self.core
            .lock()
            .current_sound
            .as_ref()
            .map(|sound| sound.share_payload())
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.store.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.store.events()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.store.snapshot()
    }

    pub fn state(&self) -> PlaybackState {
        self.core.lock().state
    }

    pub fn position(&self) -> Position {
        self.core.lock().position
    }

    pub fn volume(&self) -> Volume {
        self.core.lock().volume
    }

    pub fn current_sound(&self) -> Option<Arc<Sound>> {
        self.core.lock().current_sound.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn seek_step(&self) -> Duration {
        self.seek_step
    }

    /// Explicit teardown, same as dropping the controller
    pub fn dispose(self) {}

    #[cfg(test)]
    pub(crate) fn current_run(&self) -> u64 {
        self.core.lock().run
    }

    #[cfg(test)]
    pub(crate) fn sample_run(&self, run: u64) -> TickOutcome {
        self.core.lock().sample(run)
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        let mut core = self.core.lock();
        core.stop();
        tracing::debug!("[Player] Controller disposed");
    }
}
