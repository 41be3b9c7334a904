//! Fire-and-forget notification channels for player state changes
//!
//! A `Signal` is a multi-subscriber broadcast with no return value: firing
//! with no listeners attached is not an error, and slow listeners may lag
//! rather than block the player.

use tokio::sync::broadcast;

const SIGNAL_CAPACITY: usize = 64;

/// A multi-subscriber notification channel, fired explicitly.
#[derive(Debug)]
pub struct Signal<T: Clone = ()> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> Signal<T> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to future firings of this signal.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Fire the signal, delivering `payload` to every current subscriber.
    pub fn fire(&self, payload: T) {
        // A send error only means nobody is listening right now.
        let _ = self.sender.send(payload);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single position-polling step.
///
/// `skipped` is tri-state on purpose: it is `Some(true)` for a zero-delta
/// sync (a paused seek) and `None` for organic progress, never
/// `Some(false)`. Consumers distinguishing "not skipped" from "explicitly
/// not skipped" rely on the absence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    pub delta_time: f64,
    pub skipped: Option<bool>,
}

/// All signals exposed by the player, one per observable state change.
#[derive(Debug, Default)]
pub struct PlayerSignals {
    pub song_changed: Signal,
    pub song_details_loaded: Signal,
    pub song_lyrics_loaded: Signal,
    pub is_playing_changed: Signal,
    pub time_stepped: Signal<TimeStep>,
    pub is_shuffling_changed: Signal,
    pub loop_mode_changed: Signal,
    pub is_liked_changed: Signal,
}
