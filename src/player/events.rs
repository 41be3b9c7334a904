//! Host event reconciliation
//!
//! Mirrors host notifications into the state aggregate, firing one signal
//! per field that actually changed. Song-change and play-pause handlers need
//! host playback data; when the host has none yet the handler defers itself
//! on a short retry tick instead of failing, and a newer notification of the
//! same kind supersedes any pending retry.

use std::sync::atomic::Ordering;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Duration, sleep};

use super::Player;
use super::state::{LoopMode, SongMetadata};
use crate::host::{HostEvent, PlayerData};

const DEFER_INTERVAL: Duration = Duration::from_millis(50);

impl Player {
    /// Begin mirroring the host: load the on-disk caches, reconcile against
    /// whatever state the host already has, then consume its event stream
    /// until the channel closes.
    pub fn start(&self, mut events: UnboundedReceiver<HostEvent>) {
        let player = self.clone();
        tokio::spawn(async move {
            player.load_stores_from_disk().await;

            player.on_update().await;
            player.on_song_change().await;
            player.on_play_pause().await;
            player.start_poll_chain().await;

            while let Some(event) = events.recv().await {
                tracing::trace!(?event, "Host event received");
                match event {
                    HostEvent::SongChange => player.on_song_change().await,
                    HostEvent::PlayPause => player.on_play_pause().await,
                    HostEvent::Update => player.on_update().await,
                }
            }
            tracing::debug!("Host event stream closed");
        });
    }

    /// Re-derive the liked / shuffle / loop-mode flags from the host.
    ///
    /// Liked also fires on its first observation even when the value matches
    /// the default, since the loaded-flag transition is itself observable.
    pub(crate) async fn on_update(&self) {
        let liked = self.host.get_heart();
        let shuffling = self.host.get_shuffle();
        let loop_mode = LoopMode::from_host(self.host.get_repeat());

        let mut state = self.state.lock().await;
        let fire_liked = !state.has_is_liked_loaded || state.is_liked != liked;
        state.is_liked = liked;
        state.has_is_liked_loaded = true;
        let fire_shuffling = state.is_shuffling != shuffling;
        state.is_shuffling = shuffling;
        let fire_loop_mode = state.loop_mode != loop_mode;
        state.loop_mode = loop_mode;
        drop(state);

        if fire_liked {
            self.signals.is_liked_changed.fire(());
        }
        if fire_shuffling {
            self.signals.is_shuffling_changed.fire(());
        }
        if fire_loop_mode {
            self.signals.loop_mode_changed.fire(());
        }
    }

    pub(crate) async fn on_song_change(&self) {
        let key = self.song_change_defer.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(data) = self.host.data() {
            self.apply_song_change(data, key).await;
            return;
        }

        tracing::debug!("No playback data yet, deferring song change");
        let player = self.clone();
        tokio::spawn(async move {
            loop {
                sleep(DEFER_INTERVAL).await;
                if player.song_change_defer.load(Ordering::SeqCst) != key {
                    // A newer song change superseded this one.
                    return;
                }
                if let Some(data) = player.host.data() {
                    player.apply_song_change(data, key).await;
                    return;
                }
            }
        });
    }

    async fn apply_song_change(&self, data: PlayerData, key: u64) {
        let song = data
            .item
            .as_ref()
            .filter(|item| SongMetadata::is_track(item))
            .and_then(|item| SongMetadata::from_item(item, data.duration_ms));

        let (song, epoch) = {
            let mut state = self.state.lock().await;
            // Re-checked under the lock: a newer song change may have won the
            // race between the data read and here.
            if self.song_change_defer.load(Ordering::SeqCst) != key {
                tracing::debug!("Song change superseded before applying");
                return;
            }
            state.song = song;
            if state.song.is_some() {
                state.timestamp = 0.0;
            }
            state.song_epoch += 1;
            state.has_is_liked_loaded = false;
            (state.song.clone(), state.song_epoch)
        };

        // Loaders reset their state before this returns, so song-changed
        // listeners already see the cleared enrichment fields.
        self.begin_details_load(song.clone(), epoch).await;
        self.begin_lyrics_load(song, epoch).await;
        self.signals.song_changed.fire(());
    }

    pub(crate) async fn on_play_pause(&self) {
        let key = self.play_pause_defer.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(data) = self.host.data() {
            self.apply_play_pause(data, key).await;
            return;
        }

        tracing::debug!("No playback data yet, deferring play-pause");
        let player = self.clone();
        tokio::spawn(async move {
            loop {
                sleep(DEFER_INTERVAL).await;
                if player.play_pause_defer.load(Ordering::SeqCst) != key {
                    return;
                }
                if let Some(data) = player.host.data() {
                    player.apply_play_pause(data, key).await;
                    return;
                }
            }
        });
    }

    async fn apply_play_pause(&self, data: PlayerData, key: u64) {
        let is_playing = !data.is_paused;
        let changed = {
            let mut state = self.state.lock().await;
            if self.play_pause_defer.load(Ordering::SeqCst) != key {
                tracing::debug!("Play-pause superseded before applying");
                return;
            }
            let changed = state.is_playing != is_playing;
            state.is_playing = is_playing;
            changed
        };
        if !changed {
            return;
        }

        self.signals.is_playing_changed.fire(());

        // Playing is the poll chain's sole driver: pausing cancels the
        // pending cycle, resuming starts exactly one fresh chain.
        if is_playing {
            self.start_poll_chain().await;
        } else {
            self.stop_poll_chain().await;
        }
    }
}
