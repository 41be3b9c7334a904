//! Remote metadata and lyrics providers
//!
//! Trait seams for the two HTTP collaborators plus their `reqwest`-backed
//! production implementations:
//!
//! - `tracks`: the track-information endpoint and its response model
//! - `lyrics`: the lyrics endpoint, lyric payload types and the transform seam

mod lyrics;
mod tracks;

pub use lyrics::{
    LyricsApi, LyricsTransformer, ProviderLyrics, ProviderLyricsSource, TransformedLyrics,
};
pub use tracks::{
    AlbumInformation, AlbumType, ArtistDetails, ExternalIds, TrackApi, TrackInformation,
    TrackInformationSource,
};
