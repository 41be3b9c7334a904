//! Two-stage lyrics cache loader
//!
//! Stage 1 caches raw provider lyrics, stage 2 the transformed display
//! structure; both store `None` as a "known absent" sentinel so a track with
//! no lyrics never hits the network twice. A cached stage-2 entry (present
//! or absent) is used directly; only a stage-2 miss resolves stage 1 and
//! invokes the transform collaborator.

use anyhow::Result;

use super::Player;
use super::state::SongMetadata;
use crate::api::{ProviderLyrics, TransformedLyrics};

impl Player {
    /// Reset the lyrics state for a new song and kick off loading.
    ///
    /// Mirrors `begin_details_load`: the reset and the no-song / local-track
    /// commits are synchronous, the cache/network path is spawned.
    pub(crate) async fn begin_lyrics_load(&self, song: Option<SongMetadata>, epoch: u64) {
        {
            let mut state = self.state.lock().await;
            state.song_lyrics = None;
            state.have_song_lyrics_loaded = false;
        }

        // No song, or a local song: there cannot be lyrics.
        let Some(song) = song.filter(|song| !song.is_local) else {
            let mut state = self.state.lock().await;
            state.have_song_lyrics_loaded = true;
            drop(state);
            self.signals.song_lyrics_loaded.fire(());
            return;
        };

        let player = self.clone();
        tokio::spawn(async move {
            if let Err(error) = player.load_lyrics(song, epoch).await {
                tracing::error!(%error, "Song lyrics load failed");
            }
        });
    }

    async fn load_lyrics(&self, song: SongMetadata, epoch: u64) -> Result<()> {
        let transformed = self.resolve_transformed_lyrics(&song).await?;

        let mut state = self.state.lock().await;
        if state.song_epoch != epoch {
            tracing::debug!(track_id = %song.id, "Discarding stale song lyrics");
            return Ok(());
        }

        state.song_lyrics = transformed;
        state.have_song_lyrics_loaded = true;
        drop(state);
        self.signals.song_lyrics_loaded.fire(());
        Ok(())
    }

    async fn resolve_transformed_lyrics(
        &self,
        song: &SongMetadata,
    ) -> Result<Option<TransformedLyrics>> {
        // Stage 2 first: a stored entry, including the absent sentinel, is
        // authoritative.
        if let Some(stored) = self.transformed_lyrics_store.get(&song.id).await {
            tracing::trace!(track_id = %song.id, "Transformed lyrics cache hit");
            return Ok(stored);
        }

        let provider_lyrics = self.resolve_provider_lyrics(song).await?;
        let transformed = match &provider_lyrics {
            None => None,
            Some(raw) => Some(self.transformer.transform(raw).await?),
        };

        self.transformed_lyrics_store
            .set(song.id.clone(), transformed.clone())
            .await;
        Ok(transformed)
    }

    async fn resolve_provider_lyrics(
        &self,
        song: &SongMetadata,
    ) -> Result<Option<ProviderLyrics>> {
        if let Some(stored) = self.provider_lyrics_store.get(&song.id).await {
            tracing::trace!(track_id = %song.id, "Provider lyrics cache hit");
            return Ok(stored);
        }

        let fetched = self.lyrics_source.provider_lyrics(&song.id).await?;
        self.provider_lyrics_store
            .set(song.id.clone(), fetched.clone())
            .await;
        Ok(fetched)
    }
}
