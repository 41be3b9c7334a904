//! Host player seam
//!
//! The player never talks to a concrete playback client; everything it needs
//! from the host is expressed here. Lifecycle notifications arrive as
//! [`HostEvent`]s on a channel handed to `Player::start`, mirroring how a
//! playback backend surfaces its event stream.

use anyhow::Result;
use async_trait::async_trait;

/// Lifecycle notifications pushed by the host player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The active track changed (or was cleared).
    SongChange,
    /// The paused flag may have flipped.
    PlayPause,
    /// Shuffle / repeat / liked state may have changed.
    Update,
}

/// What kind of item the host is currently playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Track,
    Episode,
    Unknown,
}

/// Host-provided tags for the current item.
#[derive(Debug, Clone, Default)]
pub struct ItemMetadata {
    pub is_local: bool,
    pub image_url: String,
    pub image_small_url: String,
    pub image_large_url: String,
    pub image_xlarge_url: String,
}

/// The item the host reports as currently loaded.
#[derive(Debug, Clone)]
pub struct PlayerItem {
    pub kind: ItemKind,
    pub uri: String,
    pub metadata: ItemMetadata,
}

/// A snapshot of the host's now-playing state. `None` from
/// [`HostPlayer::data`] means the host has not produced playback data yet.
#[derive(Debug, Clone)]
pub struct PlayerData {
    pub item: Option<PlayerItem>,
    pub duration_ms: u64,
    pub is_paused: bool,
}

/// Loop-mode values on the host's wire: 0 = off, 1 = context, 2 = song.
pub const REPEAT_OFF: u8 = 0;
pub const REPEAT_CONTEXT: u8 = 1;
pub const REPEAT_SONG: u8 = 2;

/// Transport control and now-playing queries against the external player.
#[async_trait]
pub trait HostPlayer: Send + Sync {
    /// Current playback snapshot, if the host has produced one.
    fn data(&self) -> Option<PlayerData>;

    fn get_heart(&self) -> bool;
    fn get_shuffle(&self) -> bool;
    /// Raw repeat setting, see the `REPEAT_*` constants.
    fn get_repeat(&self) -> u8;

    async fn set_heart(&self, liked: bool) -> Result<()>;
    async fn set_shuffle(&self, shuffling: bool) -> Result<()>;
    async fn set_repeat(&self, repeat: u8) -> Result<()>;

    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// Low-level playback position query, in milliseconds.
    async fn position(&self) -> Result<u64>;
}

/// Supplier of the host session's access credential.
#[async_trait]
pub trait Session: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}
