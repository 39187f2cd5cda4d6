// soloplay - single-sound playback core
// Module declarations
pub mod audio;
pub mod error;
pub mod models;
pub mod playback;
pub mod settings;
pub mod state;

pub use audio::{EngineAdapter, SymphoniaEngine};
pub use error::{EngineError, LoadError, PlayerError};
pub use models::{SharePayload, Sound};
pub use playback::{PlaybackController, PlayerEvent};
pub use settings::PlayerSettings;
pub use state::{CommandOutcome, PlaybackState, PlayerSnapshot, Position, Volume};
