//! Lyrics endpoint client, lyric payload types and the transform seam

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::host::Session;

const DEFAULT_BASE_URL: &str = "https://beautiful-lyrics.socalifornian.live";

/// Raw lyrics payload as returned by the lyrics provider, pre-transformation.
/// Opaque to the player; only the transform collaborator interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderLyrics(pub serde_json::Value);

/// Display-ready lyrics structure produced from [`ProviderLyrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformedLyrics(pub serde_json::Value);

/// Source of raw provider lyrics, keyed by track id. `Ok(None)` means the
/// provider has no lyrics for the track.
#[async_trait]
pub trait ProviderLyricsSource: Send + Sync {
    async fn provider_lyrics(&self, track_id: &str) -> Result<Option<ProviderLyrics>>;
}

/// Converts raw provider lyrics into the display format.
#[async_trait]
pub trait LyricsTransformer: Send + Sync {
    async fn transform(&self, lyrics: &ProviderLyrics) -> Result<TransformedLyrics>;
}

/// `reqwest`-backed client for `GET {base}/lyrics/{id}` with an explicit
/// bearer token. An empty response body means "no lyrics".
pub struct LyricsApi {
    http: reqwest::Client,
    base_url: String,
    session: Arc<dyn Session>,
}

impl LyricsApi {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self::with_base_url(session, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(session: Arc<dyn Session>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            session,
        }
    }
}

#[async_trait]
impl ProviderLyricsSource for LyricsApi {
    async fn provider_lyrics(&self, track_id: &str) -> Result<Option<ProviderLyrics>> {
        let token = self.session.access_token().await?;
        let url = format!(
            "{}/lyrics/{}",
            self.base_url,
            urlencoding::encode(track_id)
        );

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(track_id, %status, "Lyrics request failed");
            anyhow::bail!("failed to load lyrics for {track_id}: {status}");
        }

        let body = response.text().await?;
        if body.is_empty() {
            return Ok(None);
        }

        Ok(Some(ProviderLyrics(serde_json::from_str(&body)?)))
    }
}
