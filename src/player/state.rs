//! Player state aggregate and song-derived types

use std::sync::LazyLock;

use regex::Regex;

use crate::api::{AlbumType, ArtistDetails, TrackInformation, TransformedLyrics};
use crate::host::{ItemKind, PlayerItem, REPEAT_CONTEXT, REPEAT_OFF, REPEAT_SONG};

const TRACK_URI_PREFIX: &str = "spotify:track:";
const LOCAL_URI_PREFIX: &str = "spotify:local:";

/// Cover-art URLs at the four sizes the host provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub large: String,
    pub big: String,
    pub default: String,
    pub small: String,
}

/// Identity of the active song. Immutable; replaced wholesale on every song
/// change.
#[derive(Debug, Clone, PartialEq)]
pub struct SongMetadata {
    pub is_local: bool,
    pub uri: String,
    pub id: String,
    /// Seconds.
    pub duration: f64,
    pub cover_art: CoverArt,
}

impl SongMetadata {
    /// Build the song identity from a host item, or `None` when the id
    /// cannot be extracted from the uri.
    pub fn from_item(item: &PlayerItem, duration_ms: u64) -> Option<Self> {
        let is_local = item.metadata.is_local;
        let Some(id) = extract_track_id(&item.uri, is_local) else {
            tracing::warn!(uri = %item.uri, "Could not extract a track id from uri");
            return None;
        };

        Some(Self {
            is_local,
            uri: item.uri.clone(),
            id,
            duration: duration_ms as f64 / 1000.0,
            cover_art: CoverArt {
                large: item.metadata.image_xlarge_url.clone(),
                big: item.metadata.image_large_url.clone(),
                default: item.metadata.image_url.clone(),
                small: item.metadata.image_small_url.clone(),
            },
        })
    }

    pub fn is_track(item: &PlayerItem) -> bool {
        item.kind == ItemKind::Track
    }
}

fn extract_track_id(uri: &str, is_local: bool) -> Option<String> {
    if is_local {
        return uri
            .strip_prefix(LOCAL_URI_PREFIX)
            .filter(|rest| !rest.is_empty())
            .map(str::to_owned);
    }

    uri.strip_prefix(TRACK_URI_PREFIX)
        .filter(|id| {
            !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .map(str::to_owned)
}

/// Loop-mode setting mirrored from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    Song,
    Context,
}

impl LoopMode {
    pub fn from_host(repeat: u8) -> Self {
        match repeat {
            REPEAT_CONTEXT => Self::Context,
            REPEAT_SONG => Self::Song,
            _ => Self::Off,
        }
    }

    pub fn to_host(self) -> u8 {
        match self {
            Self::Off => REPEAT_OFF,
            Self::Context => REPEAT_CONTEXT,
            Self::Song => REPEAT_SONG,
        }
    }
}

/// Album slice of [`SongDetails`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumDetails {
    pub id: String,
    pub album_type: AlbumType,
    pub artists: Vec<ArtistDetails>,
    pub release_year: String,
}

/// Enriched details for the active song, derived from the raw provider
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SongDetails {
    pub isrc: String,
    pub name: String,
    pub artists: Vec<ArtistDetails>,
    pub release_year: String,
    pub album: AlbumDetails,
    /// The normalized provider payload this record was derived from; absent
    /// for the local-track placeholder.
    pub raw: Option<TrackInformation>,
}

impl SongDetails {
    pub fn from_information(information: TrackInformation) -> Self {
        let release_year = release_year(&information.album.release_date);
        Self {
            isrc: information.external_ids.isrc.clone(),
            name: filter_song_name(&information.name),
            artists: information.artists.clone(),
            release_year: release_year.clone(),
            album: AlbumDetails {
                id: information.album.id.clone(),
                album_type: information.album.album_type,
                artists: information.album.artists.clone(),
                release_year,
            },
            raw: Some(information),
        }
    }

    /// Fixed placeholder for local tracks, which have no remote details.
    pub fn local_placeholder() -> Self {
        Self {
            isrc: String::new(),
            name: String::new(),
            artists: Vec::new(),
            release_year: String::new(),
            album: AlbumDetails {
                id: String::new(),
                album_type: AlbumType::Single,
                artists: Vec::new(),
                release_year: String::new(),
            },
            raw: None,
        }
    }
}

fn release_year(release_date: &str) -> String {
    release_date.chars().take(4).collect()
}

// Ordered suffix filters; each removes its first match only.
static SONG_NAME_FILTERS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\s*(?:-|/)\s*(?:(?:Stereo|Mono)\s*)?Remastered(?:\s*\d+)?").unwrap(),
        Regex::new(r"\s*-\s*(?:Stereo|Mono)(?:\s*Version|\s*Mix)?").unwrap(),
        Regex::new(r"\s*\(\s*(?:Stereo|Mono)(?:\s*Mix)?\)?").unwrap(),
    ]
});

/// Strip "remastered / stereo / mono" style suffixes from a track name.
pub fn filter_song_name(name: &str) -> String {
    let mut filtered = name.to_string();
    for filter in SONG_NAME_FILTERS.iter() {
        filtered = filter.replace(&filtered, "").into_owned();
    }
    filtered
}

/// Everything the player mutates; lives behind one mutex so every handler
/// sees a consistent snapshot.
#[derive(Debug)]
pub struct PlayerState {
    pub song: Option<SongMetadata>,
    /// Bumped on every song change; loaders compare their captured value
    /// against this before committing.
    pub song_epoch: u64,

    pub is_liked: bool,
    pub has_is_liked_loaded: bool,
    /// Seconds; `-1.0` until the first song change.
    pub timestamp: f64,
    pub is_playing: bool,
    pub is_shuffling: bool,
    pub loop_mode: LoopMode,

    pub song_details: Option<SongDetails>,
    pub have_song_details_loaded: bool,
    pub song_lyrics: Option<TransformedLyrics>,
    pub have_song_lyrics_loaded: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            song: None,
            song_epoch: 0,
            is_liked: false,
            has_is_liked_loaded: false,
            timestamp: -1.0,
            is_playing: false,
            is_shuffling: false,
            loop_mode: LoopMode::Off,
            song_details: None,
            have_song_details_loaded: false,
            song_lyrics: None,
            have_song_lyrics_loaded: false,
        }
    }
}

/// Render seconds as `m:ss`, widening the minute field to two digits when
/// requested (durations of ten minutes and beyond).
pub fn format_clock(seconds: f64, wide_minutes: bool) -> String {
    let total = seconds.max(0.0) as u64;
    let minutes = total / 60;
    let secs = total % 60;
    if wide_minutes {
        format!("{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
