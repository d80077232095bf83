use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A real-world place identified by its (name, address) pair.
///
/// Created on first mention with a resolvable address; mutable fields are
/// refreshed whenever a newer mention resolves the same pair. Never deleted
/// by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Option<i64>,
    pub name: String,
    pub address: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: Option<f64>,
    pub price_level: Option<u8>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub map_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Arguments for creating a venue
#[derive(Debug, Clone)]
pub struct VenueArgs {
    pub name: String,
    pub address: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: Option<f64>,
    pub price_level: Option<u8>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub map_link: Option<String>,
}

impl Venue {
    pub fn new(args: VenueArgs) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: args.name,
            address: args.address,
            city: args.city,
            latitude: args.latitude,
            longitude: args.longitude,
            rating: args.rating,
            price_level: args.price_level,
            phone: args.phone,
            website: args.website,
            map_link: args.map_link,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One (video, venue) link. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: Option<i64>,
    pub platform: String,
    pub video_id: String,
    pub video_url: String,
    pub creator_name: Option<String>,
    pub creator_id: Option<String>,
    pub view_count: Option<i64>,
    pub venue_id: i64,
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    pub fn new(
        platform: &str,
        video_id: &str,
        video_url: &str,
        creator: &crate::types::CreatorInfo,
        venue_id: i64,
    ) -> Self {
        Self {
            id: None,
            platform: platform.to_string(),
            video_id: video_id.to_string(),
            video_url: video_url.to_string(),
            creator_name: creator.name.clone(),
            creator_id: creator.id.clone(),
            view_count: creator.view_count,
            venue_id,
            created_at: Utc::now(),
        }
    }
}

/// Idempotency marker: at most one per (platform, video id), written only
/// after all side effects for that video are committed or abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedVideo {
    pub id: Option<i64>,
    pub platform: String,
    pub video_id: String,
    pub video_url: String,
    pub had_venues: bool,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedVideo {
    pub fn new(platform: &str, video_id: &str, video_url: &str, had_venues: bool) -> Self {
        Self {
            id: None,
            platform: platform.to_string(),
            video_id: video_id.to_string(),
            video_url: video_url.to_string(),
            had_venues,
            processed_at: Utc::now(),
        }
    }
}

/// A descriptive label attachable to venues, many-to-many.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Option<i64>,
    pub name: String,
}
