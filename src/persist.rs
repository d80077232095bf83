use crate::constants::{CURATED_TAG, UNKNOWN_CITY};
use crate::domain::{ProcessedVideo, Venue, VenueArgs, VideoRecord};
use crate::error::{PipelineError, Result};
use crate::resolve::ResolvedMention;
use crate::storage::Storage;
use crate::types::{Acquisition, PlaceDetails};
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Derive the city from a free-text postal address.
///
/// Handles "Street, Postal City, Country" shaped addresses: second-to-last
/// comma segment, last whitespace token. Anything that does not fit yields
/// the unknown-city sentinel instead of failing the write.
pub fn derive_city_from_address(address: &str) -> String {
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    if parts.len() >= 2 {
        if let Some(city) = parts[parts.len() - 2].split_whitespace().last() {
            return city.to_string();
        }
    }
    UNKNOWN_CITY.to_string()
}

/// Result of persisting one video's resolved mentions
#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub venue_ids: Vec<i64>,
    pub venues_linked: usize,
}

/// Idempotent persistence over the `Storage` trait.
///
/// Every venue is written under its own short transaction boundary: a
/// failure persisting venue N is logged and skipped without rolling back
/// venues 1..N-1. The ledger entry is written last, exactly once.
pub struct Persister {
    storage: Arc<dyn Storage>,
}

impl Persister {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Find the venue by exact (name, address) and refresh its mutable
    /// fields, or insert a new row with a derived city. Returns the venue
    /// id either way.
    async fn upsert_venue(&self, place: &PlaceDetails) -> Result<i64> {
        let city = derive_city_from_address(&place.address);

        if let Some(mut existing) = self
            .storage
            .get_venue_by_name_address(&place.name, &place.address)
            .await?
        {
            existing.rating = place.rating;
            existing.price_level = place.price_level;
            existing.phone = place.phone.clone();
            existing.website = place.website.clone();
            existing.map_link = place.map_link.clone();
            existing.city = city;
            existing.updated_at = Utc::now();
            self.storage.update_venue(&existing).await?;

            let venue_id = existing.id.ok_or_else(|| PipelineError::Database {
                message: "Existing venue has no ID".to_string(),
            })?;
            info!("Updated existing venue: {} ({})", existing.name, venue_id);
            return Ok(venue_id);
        }

        let mut venue = Venue::new(VenueArgs {
            name: place.name.clone(),
            address: place.address.clone(),
            city,
            latitude: place.latitude,
            longitude: place.longitude,
            rating: place.rating,
            price_level: place.price_level,
            phone: place.phone.clone(),
            website: place.website.clone(),
            map_link: place.map_link.clone(),
        });
        self.storage.create_venue(&mut venue).await?;

        let venue_id = venue.id.ok_or_else(|| PipelineError::Database {
            message: "Created venue has no ID".to_string(),
        })?;
        info!("Created new venue: {} ({})", venue.name, venue_id);
        counter!("foodreel_venues_created_total").increment(1);
        Ok(venue_id)
    }

    /// Insert the (video, venue) link unless it already exists.
    async fn link_video(
        &self,
        acquisition: &Acquisition,
        video_url: &str,
        venue_id: i64,
    ) -> Result<()> {
        if let Some(existing) = self
            .storage
            .get_video_record(&acquisition.platform, &acquisition.video_id, venue_id)
            .await?
        {
            info!(
                "Video record already exists for ({}, {}) -> venue {}",
                existing.platform, existing.video_id, venue_id
            );
            return Ok(());
        }

        let mut record = VideoRecord::new(
            &acquisition.platform,
            &acquisition.video_id,
            video_url,
            &acquisition.creator,
            venue_id,
        );
        self.storage.create_video_record(&mut record).await?;
        counter!("foodreel_video_records_created_total").increment(1);
        Ok(())
    }

    async fn apply_curated_tag(&self, venue_id: i64) -> Result<()> {
        let tag = self.storage.ensure_tag(CURATED_TAG).await?;
        let tag_id = tag.id.ok_or_else(|| PipelineError::Database {
            message: "Tag has no ID".to_string(),
        })?;
        self.storage.tag_venue(venue_id, tag_id).await
    }

    /// Persist everything for one video: venue upserts, video links, then
    /// exactly one ledger entry.
    ///
    /// A per-venue failure is logged and that venue skipped. A ledger
    /// write failure is re-raised: losing the idempotency guard only risks
    /// duplicate processing, but must not pass silently.
    #[instrument(skip(self, acquisition, resolved), fields(video_id = %acquisition.video_id))]
    pub async fn persist_video(
        &self,
        acquisition: &Acquisition,
        video_url: &str,
        resolved: &[ResolvedMention],
        curated: bool,
    ) -> Result<PersistOutcome> {
        let mut outcome = PersistOutcome::default();

        for item in resolved {
            let venue_id = match self.upsert_venue(&item.place).await {
                Ok(id) => id,
                Err(e) => {
                    counter!("foodreel_venue_persist_failures_total").increment(1);
                    error!(
                        "Failed to persist venue for mention '{}': {}",
                        item.mention.raw, e
                    );
                    continue;
                }
            };

            if let Err(e) = self.link_video(acquisition, video_url, venue_id).await {
                counter!("foodreel_venue_persist_failures_total").increment(1);
                error!("Failed to link video to venue {}: {}", venue_id, e);
                continue;
            }

            if curated {
                if let Err(e) = self.apply_curated_tag(venue_id).await {
                    warn!("Failed to apply curated tag to venue {}: {}", venue_id, e);
                }
            }

            if !outcome.venue_ids.contains(&venue_id) {
                outcome.venue_ids.push(venue_id);
            }
            outcome.venues_linked += 1;
        }

        let had_venues = !outcome.venue_ids.is_empty();
        let mut entry = ProcessedVideo::new(
            &acquisition.platform,
            &acquisition.video_id,
            video_url,
            had_venues,
        );
        self.storage
            .create_processed_video(&mut entry)
            .await
            .map_err(|e| PipelineError::Ledger {
                video_id: acquisition.video_id.clone(),
                message: e.to_string(),
            })?;
        info!(
            "Ledger entry written for video {} (had_venues={})",
            acquisition.video_id, had_venues
        );

        Ok(outcome)
    }

    /// Persist a venue from an upstream catalog seed (no video, no ledger
    /// entry). Seed venues are always curated.
    pub async fn persist_seed(&self, place: &PlaceDetails) -> Result<i64> {
        let venue_id = self.upsert_venue(place).await?;
        self.apply_curated_tag(venue_id).await?;
        Ok(venue_id)
    }
}
