// Playback module
// Controller state machine, time observer and the observable store

pub mod controller;
mod observer;
pub mod store;

#[cfg(test)]
mod fake;

pub use controller::PlaybackController;
pub use store::{PlayerEvent, PlayerStore};
