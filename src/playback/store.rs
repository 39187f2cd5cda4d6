// Observable player state
// Snapshots go through a watch channel (latest value wins), discrete events
// through a broadcast channel

use std::time::Duration;
use tokio::sync::{broadcast, watch};

use crate::state::{PlaybackState, PlayerSnapshot, Volume};

/// Discrete things that happened to the player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StateChanged {
        old: PlaybackState,
        new: PlaybackState,
    },
    SoundLoaded {
        sound_id: String,
        total: Duration,
    },
    LoadFailed {
        sound_id: String,
        reason: String,
    },
    /// Emitted once per playback run that reached the end
    Ended {
        sound_id: String,
    },
    VolumeChanged {
        volume: Volume,
    },
    EngineFault {
        reason: String,
    },
}

/// Publish-on-change holder for the presentation layer
#[derive(Clone)]
pub struct PlayerStore {
    snapshot: watch::Sender<PlayerSnapshot>,
    events: broadcast::Sender<PlayerEvent>,
}

impl PlayerStore {
    pub fn new(initial: PlayerSnapshot, event_capacity: usize) -> Self {
        let (snapshot, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self { snapshot, events }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Replace the snapshot, waking watchers only if something differs
    pub fn publish(&self, next: PlayerSnapshot) -> bool {
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }

    /// Lossy emit: nobody listening is not an error
    pub fn emit(&self, event: PlayerEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("[Player] Event dropped, no subscribers");
        }
    }
}
