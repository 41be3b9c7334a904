//! Player module - host state mirroring, enrichment loading and signals
//!
//! The [`Player`] is a cloneable handle over shared state. It mirrors the
//! host player's playback state into a local aggregate, loads enriched song
//! data (details, lyrics) through expiring caches, and fires a signal for
//! every observable change. It is organized into submodules by
//! responsibility:
//!
//! - `state`: the state aggregate and song-derived types
//! - `details`: track-details cache loader
//! - `lyrics`: two-stage lyrics cache loader
//! - `events`: host event reconciliation
//! - `timeline`: position polling loop

mod details;
mod events;
mod lyrics;
mod state;
mod timeline;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};

use anyhow::Result;
use chrono::Duration;
use tokio::sync::Mutex;

use crate::api::{
    LyricsTransformer, ProviderLyrics, ProviderLyricsSource, TrackInformation,
    TrackInformationSource, TransformedLyrics,
};
use crate::cache::{DEFAULT_CACHE_DIR, ExpireStore};
use crate::host::HostPlayer;
use crate::signal::PlayerSignals;

pub use state::{
    AlbumDetails, CoverArt, LoopMode, PlayerState, SongDetails, SongMetadata, filter_song_name,
    format_clock,
};
pub use timeline::TimelineClock;

pub const TRACK_INFORMATION_STORE: &str = "player_track_information";
pub const PROVIDER_LYRICS_STORE: &str = "player_provider_lyrics";
pub const TRANSFORMED_LYRICS_STORE: &str = "player_transformed_lyrics";
pub const STORE_VERSION: u32 = 1;

/// Mirrors the host player's state and enriches the active song.
#[derive(Clone)]
pub struct Player {
    pub(crate) host: Arc<dyn HostPlayer>,
    pub(crate) track_source: Arc<dyn TrackInformationSource>,
    pub(crate) lyrics_source: Arc<dyn ProviderLyricsSource>,
    pub(crate) transformer: Arc<dyn LyricsTransformer>,

    pub(crate) state: Arc<Mutex<PlayerState>>,
    pub(crate) signals: Arc<PlayerSignals>,

    pub(crate) track_information_store: ExpireStore<TrackInformation>,
    pub(crate) provider_lyrics_store: ExpireStore<Option<ProviderLyrics>>,
    pub(crate) transformed_lyrics_store: ExpireStore<Option<TransformedLyrics>>,

    pub(crate) clock: Arc<Mutex<TimelineClock>>,
    pub(crate) poll_stop: Arc<Mutex<Option<Arc<AtomicBool>>>>,
    pub(crate) song_change_defer: Arc<AtomicU64>,
    pub(crate) play_pause_defer: Arc<AtomicU64>,
}

impl Player {
    pub fn new(
        host: Arc<dyn HostPlayer>,
        track_source: Arc<dyn TrackInformationSource>,
        lyrics_source: Arc<dyn ProviderLyricsSource>,
        transformer: Arc<dyn LyricsTransformer>,
    ) -> Self {
        Self::with_cache_dir(host, track_source, lyrics_source, transformer, DEFAULT_CACHE_DIR)
    }

    pub fn with_cache_dir(
        host: Arc<dyn HostPlayer>,
        track_source: Arc<dyn TrackInformationSource>,
        lyrics_source: Arc<dyn ProviderLyricsSource>,
        transformer: Arc<dyn LyricsTransformer>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            host,
            track_source,
            lyrics_source,
            transformer,
            state: Arc::new(Mutex::new(PlayerState::default())),
            signals: Arc::new(PlayerSignals::default()),
            track_information_store: ExpireStore::with_cache_dir(
                TRACK_INFORMATION_STORE,
                STORE_VERSION,
                Duration::weeks(2),
                cache_dir.clone(),
            ),
            provider_lyrics_store: ExpireStore::with_cache_dir(
                PROVIDER_LYRICS_STORE,
                STORE_VERSION,
                Duration::days(30),
                cache_dir.clone(),
            ),
            transformed_lyrics_store: ExpireStore::with_cache_dir(
                TRANSFORMED_LYRICS_STORE,
                STORE_VERSION,
                Duration::days(30),
                cache_dir,
            ),
            clock: Arc::new(Mutex::new(TimelineClock::default())),
            poll_stop: Arc::new(Mutex::new(None)),
            song_change_defer: Arc::new(AtomicU64::new(0)),
            play_pause_defer: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The signals this player fires; subscribe before calling
    /// [`Player::start`] to observe the initial reconciliation.
    pub fn signals(&self) -> &PlayerSignals {
        &self.signals
    }

    // ========================================================================
    // Public read state
    // ========================================================================

    pub async fn song(&self) -> Option<SongMetadata> {
        self.state.lock().await.song.clone()
    }

    pub async fn song_details(&self) -> Option<SongDetails> {
        self.state.lock().await.song_details.clone()
    }

    pub async fn have_song_details_loaded(&self) -> bool {
        self.state.lock().await.have_song_details_loaded
    }

    pub async fn song_lyrics(&self) -> Option<TransformedLyrics> {
        self.state.lock().await.song_lyrics.clone()
    }

    pub async fn have_song_lyrics_loaded(&self) -> bool {
        self.state.lock().await.have_song_lyrics_loaded
    }

    pub async fn is_liked(&self) -> bool {
        self.state.lock().await.is_liked
    }

    pub async fn has_is_liked_loaded(&self) -> bool {
        self.state.lock().await.has_is_liked_loaded
    }

    /// Current playback position in seconds; `-1.0` before the first song.
    pub async fn timestamp(&self) -> f64 {
        self.state.lock().await.timestamp
    }

    pub async fn is_playing(&self) -> bool {
        self.state.lock().await.is_playing
    }

    pub async fn is_shuffling(&self) -> bool {
        self.state.lock().await.is_shuffling
    }

    pub async fn loop_mode(&self) -> LoopMode {
        self.state.lock().await.loop_mode
    }

    /// The active song's duration rendered `m:ss`, minutes zero-padded from
    /// ten minutes up.
    pub async fn duration_string(&self) -> String {
        let state = self.state.lock().await;
        let duration = state.song.as_ref().map(|song| song.duration).unwrap_or(0.0);
        format_clock(duration, duration >= 600.0)
    }

    /// The current timestamp rendered `m:ss`; the minute field widens with
    /// the song duration so the display stays stable while playing.
    pub async fn timestamp_string(&self) -> String {
        let state = self.state.lock().await;
        let duration = state.song.as_ref().map(|song| song.duration).unwrap_or(0.0);
        format_clock(state.timestamp, duration >= 600.0)
    }

    // ========================================================================
    // Public commands - thin forwards to the host
    // ========================================================================

    pub async fn set_is_liked(&self, liked: bool) -> Result<()> {
        if liked == self.is_liked().await {
            return Ok(());
        }
        self.host.set_heart(liked).await
    }

    pub async fn set_loop_mode(&self, loop_mode: LoopMode) -> Result<()> {
        self.host.set_repeat(loop_mode.to_host()).await
    }

    pub async fn set_is_shuffling(&self, shuffling: bool) -> Result<()> {
        if shuffling == self.is_shuffling().await {
            return Ok(());
        }
        self.host.set_shuffle(shuffling).await
    }

    pub async fn set_is_playing(&self, playing: bool) -> Result<()> {
        if playing == self.is_playing().await {
            return Ok(());
        }
        if playing {
            self.host.play().await
        } else {
            self.host.pause().await
        }
    }

    pub async fn seek_to(&self, timestamp: f64) -> Result<()> {
        self.host.seek((timestamp * 1000.0) as u64).await
    }

    pub(crate) async fn load_stores_from_disk(&self) {
        if let Err(error) = self.track_information_store.load_from_disk().await {
            tracing::warn!(%error, "Failed to load track information cache");
        }
        if let Err(error) = self.provider_lyrics_store.load_from_disk().await {
            tracing::warn!(%error, "Failed to load provider lyrics cache");
        }
        if let Err(error) = self.transformed_lyrics_store.load_from_disk().await {
            tracing::warn!(%error, "Failed to load transformed lyrics cache");
        }
    }
}
