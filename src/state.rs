// Player state values published to observers
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::models::Sound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Failed,
}

impl PlaybackState {
    /// States in which a sound is prepared inside the engine
    pub fn has_prepared_sound(self) -> bool {
        matches!(
            self,
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Ended
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Ended => "ended",
            PlaybackState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Current and total time of the loaded sound
///
/// `current` never exceeds `total`; both are zero until a sound is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    current: Duration,
    total: Duration,
}

impl Position {
    pub fn new(current: Duration, total: Duration) -> Self {
        Self {
            current: current.min(total),
            total,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Clamp a requested time into `[0, total]`
    pub fn clamp(&self, to: Duration) -> Duration {
        to.min(self.total)
    }

    pub fn set_current(&mut self, to: Duration) {
        self.current = self.clamp(to);
    }

    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.current)
    }

    pub fn is_at_end(&self) -> bool {
        !self.total.is_zero() && self.current >= self.total
    }

    /// Progress through the sound, 0.0 when nothing is loaded
    pub fn fraction(&self) -> f32 {
        if self.total.is_zero() {
            return 0.0;
        }
        (self.current.as_secs_f64() / self.total.as_secs_f64()) as f32
    }
}

/// Output volume in `[0.0, 1.0]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Volume(f32);

impl Volume {
    pub const MUTED: Volume = Volume(0.0);
    pub const FULL: Volume = Volume(1.0);

    /// Clamp into range; NaN is treated as muted
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::MUTED;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::FULL
    }
}

/// Everything the presentation layer reads, published as one value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub current_sound: Option<Arc<Sound>>,
    pub state: PlaybackState,
    pub position: Position,
    pub volume: Volume,
}

impl PlayerSnapshot {
    pub fn new(volume: Volume) -> Self {
        Self {
            current_sound: None,
            state: PlaybackState::Idle,
            position: Position::default(),
            volume,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

/// Whether a transport command changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    Unchanged,
}
