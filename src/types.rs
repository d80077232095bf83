use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Creator metadata captured during acquisition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorInfo {
    pub name: Option<String>,
    pub id: Option<String>,
    pub view_count: Option<i64>,
}

/// Platform and platform-native id parsed from a share URL, known before
/// any network call is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub platform: String,
    pub video_id: String,
}

/// Everything acquisition produces for one video
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Platform-native video id
    pub video_id: String,
    pub platform: String,
    /// Downloaded clip on local disk
    pub media_path: PathBuf,
    /// Normalized WAV extracted from the clip
    pub audio_path: PathBuf,
    /// Caption/description text from the platform
    pub caption: String,
    pub creator: CreatorInfo,
}

/// Resolved place details from the geocoding collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: Option<f64>,
    /// Ordinal price tier 0-4
    pub price_level: Option<u8>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub map_link: Option<String>,
    pub hours: Option<Vec<String>>,
}

/// Acquisition collaborator: fetch the source video, its caption, and
/// creator metadata, producing local media artifacts.
#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Parse the platform and video id out of the URL without touching the
    /// network, so the ledger can be consulted before any download.
    fn identify(&self, url: &str) -> Result<SourceRef>;

    async fn fetch(&self, url: &str) -> Result<Acquisition>;
}

/// Transcription collaborator. Never fails by contract: an unusable audio
/// file or a model failure yields an empty string.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> String;
}

/// On-frame text detection collaborator. May fail; the extraction
/// coordinator catches and degrades.
#[async_trait::async_trait]
pub trait TextDetector: Send + Sync {
    async fn detect_text(&self, media_path: &Path, video_id: &str) -> Result<String>;
}

/// Language-model collaborator. Returns one `Name, City, Category` line
/// per venue, or the sentinel from `constants::NO_PLACES_SENTINEL`.
#[async_trait::async_trait]
pub trait RecommendationExtractor: Send + Sync {
    async fn extract(&self, caption: &str, on_frame_text: &str, transcript: &str)
        -> Result<String>;
}

/// Geocoding collaborator: free-text place search plus a details fetch.
/// `Ok(None)` means the query matched nothing.
#[async_trait::async_trait]
pub trait PlaceResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Option<PlaceDetails>>;
}
