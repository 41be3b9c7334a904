//! Track-information endpoint client and response model

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::host::Session;

const DEFAULT_BASE_URL: &str = "https://api.spotify.com";

/// Raw track payload as returned by the track-information endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInformation {
    pub name: String,
    #[serde(default)]
    pub external_ids: ExternalIds,
    #[serde(default)]
    pub artists: Vec<ArtistDetails>,
    pub album: AlbumInformation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default)]
    pub isrc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistDetails {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumInformation {
    pub id: String,
    pub album_type: AlbumType,
    #[serde(default)]
    pub artists: Vec<ArtistDetails>,
    pub release_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumType {
    Album,
    Single,
    Compilation,
}

/// Source of enriched track information, keyed by track id.
#[async_trait]
pub trait TrackInformationSource: Send + Sync {
    async fn track_information(&self, track_id: &str) -> Result<TrackInformation>;
}

/// `reqwest`-backed client for `GET {base}/v1/tracks/{id}`.
pub struct TrackApi {
    http: reqwest::Client,
    base_url: String,
    session: Arc<dyn Session>,
}

impl TrackApi {
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
impl TrackInformationSource for TrackApi {
    async fn track_information(&self, track_id: &str) -> Result<TrackInformation> {
        let token = self.session.access_token().await?;
        let url = format!("{}/v1/tracks/{}", self.base_url, track_id);

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(track_id, %status, "Track information request failed");
            anyhow::bail!("failed to load track information for {track_id}: {status}");
        }

        Ok(response.json().await?)
    }
}
