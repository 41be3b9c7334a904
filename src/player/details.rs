//! Track-details cache loader
//!
//! Resolves enriched details for the active song: cache first, network on a
//! miss, then an epoch-checked commit so a load that outlives its song is
//! dropped silently. The details-loaded signal fires exactly once per song
//! change, including the no-song and local-track short circuits.

use anyhow::Result;

use super::Player;
use super::state::{SongDetails, SongMetadata};
use crate::api::TrackInformation;

impl Player {
    /// Reset the details state for a new song and kick off loading.
    ///
    /// The reset and the no-song / local-track commits happen before this
    /// returns, so a listener reacting to the song-changed signal already
    /// sees the cleared (or placeholder) state. The remote path runs in a
    /// spawned task.
    pub(crate) async fn begin_details_load(&self, song: Option<SongMetadata>, epoch: u64) {
        {
            let mut state = self.state.lock().await;
            state.song_details = None;
            state.have_song_details_loaded = false;
        }

        // Without a song there are no details to load.
        let Some(song) = song else {
            let mut state = self.state.lock().await;
            state.have_song_details_loaded = true;
            drop(state);
            self.signals.song_details_loaded.fire(());
            return;
        };

        // Local songs have no remote details.
        if song.is_local {
            let mut state = self.state.lock().await;
            state.song_details = Some(SongDetails::local_placeholder());
            state.have_song_details_loaded = true;
            drop(state);
            self.signals.song_details_loaded.fire(());
            return;
        }

        let player = self.clone();
        tokio::spawn(async move {
            if let Err(error) = player.load_details(song, epoch).await {
                // Rare by design; the next song change retries wholesale.
                tracing::error!(%error, "Song details load failed");
            }
        });
    }

    async fn load_details(&self, song: SongMetadata, epoch: u64) -> Result<()> {
        let information = self.fetch_track_information(&song).await?;

        let mut state = self.state.lock().await;
        if state.song_epoch != epoch {
            tracing::debug!(track_id = %song.id, "Discarding stale song details");
            return Ok(());
        }

        state.song_details = Some(SongDetails::from_information(information));
        state.have_song_details_loaded = true;
        drop(state);
        self.signals.song_details_loaded.fire(());
        Ok(())
    }

    async fn fetch_track_information(&self, song: &SongMetadata) -> Result<TrackInformation> {
        if let Some(information) = self.track_information_store.get(&song.id).await {
            tracing::trace!(track_id = %song.id, "Track information cache hit");
            return Ok(information);
        }

        let information = self.track_source.track_information(&song.id).await?;
        self.track_information_store
            .set(song.id.clone(), information.clone())
            .await;
        Ok(information)
    }
}
