use crate::error::Result;
use crate::extract::ExtractionCoordinator;
use crate::media::MediaStore;
use crate::persist::Persister;
use crate::resolve::RecommendationResolver;
use crate::resources::log_resource_snapshot;
use crate::storage::Storage;
use crate::types::{MediaFetcher, PlaceResolver};
use metrics::counter;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// What happened to one video URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The ledger already has this (platform, video id); nothing was fetched.
    AlreadyProcessed,
    Completed {
        venues_linked: usize,
        had_venues: bool,
    },
}

/// Totals for a batch of URLs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub venues_linked: usize,
}

/// Per-video enrichment pipeline: acquire, extract, resolve, persist.
///
/// Collaborators are injected behind traits so the whole flow runs against
/// fakes in tests. One instance is shared across the process lifetime.
pub struct VideoPipeline {
    fetcher: Arc<dyn MediaFetcher>,
    extraction: ExtractionCoordinator,
    resolver: RecommendationResolver,
    places: Arc<dyn PlaceResolver>,
    persister: Persister,
    storage: Arc<dyn Storage>,
    media: MediaStore,
}

impl VideoPipeline {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        extraction: ExtractionCoordinator,
        resolver: RecommendationResolver,
        places: Arc<dyn PlaceResolver>,
        storage: Arc<dyn Storage>,
        media: MediaStore,
    ) -> Self {
        Self {
            fetcher,
            extraction,
            resolver,
            places,
            persister: Persister::new(Arc::clone(&storage)),
            storage,
            media,
        }
    }

    /// Process one video URL end to end.
    ///
    /// The ledger is consulted before any acquisition work. Acquisition
    /// failures propagate without a ledger entry so the video can be
    /// retried later; every downstream stage degrades instead of failing.
    /// Local media artifacts are removed on success and failure alike.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn process_video(&self, url: &str, curated: bool) -> Result<PipelineOutcome> {
        let source = self.fetcher.identify(url)?;

        if self
            .storage
            .is_video_processed(&source.platform, &source.video_id)
            .await?
        {
            info!(
                "Video {} on {} already processed, skipping",
                source.video_id, source.platform
            );
            counter!("foodreel_videos_skipped_total").increment(1);
            return Ok(PipelineOutcome::AlreadyProcessed);
        }

        log_resource_snapshot("before_video");
        let guard = self.media.guard(&source.video_id);

        // Guard drops on the error path and removes any partial artifacts.
        let acquisition = self.fetcher.fetch(url).await?;

        let extracted = self
            .extraction
            .run(
                &acquisition.media_path,
                &acquisition.audio_path,
                &acquisition.video_id,
            )
            .await;

        let resolved = self.resolver.resolve(&acquisition.caption, &extracted).await?;
        info!("Resolved {} venue(s) for video {}", resolved.len(), source.video_id);

        let outcome = self
            .persister
            .persist_video(&acquisition, url, &resolved, curated)
            .await?;

        guard.cleanup();
        log_resource_snapshot("after_video");
        counter!("foodreel_videos_processed_total").increment(1);

        Ok(PipelineOutcome::Completed {
            venues_linked: outcome.venues_linked,
            had_venues: !outcome.venue_ids.is_empty(),
        })
    }

    /// Process a batch of URLs, one at a time. A failing video is logged
    /// and counted; it never stops the rest of the batch.
    pub async fn process_batch(&self, urls: &[String], curated: bool) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for url in urls {
            match self.process_video(url, curated).await {
                Ok(PipelineOutcome::AlreadyProcessed) => summary.skipped += 1,
                Ok(PipelineOutcome::Completed { venues_linked, .. }) => {
                    summary.processed += 1;
                    summary.venues_linked += venues_linked;
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Failed to process {}: {}", url, e);
                }
            }
        }

        info!(
            "Batch done: {} processed, {} skipped, {} failed, {} venues linked",
            summary.processed, summary.skipped, summary.failed, summary.venues_linked
        );
        summary
    }

    /// Seed one venue straight from a name and city, bypassing video
    /// acquisition and the ledger. Seeded venues are tagged curated.
    pub async fn seed_venue(&self, name: &str, city: &str) -> Result<Option<i64>> {
        let query = format!("{name}, {city}");
        match self.places.resolve(&query).await? {
            Some(place) => {
                let venue_id = self.persister.persist_seed(&place).await?;
                info!("Seeded venue '{}' as id {}", place.name, venue_id);
                Ok(Some(venue_id))
            }
            None => {
                warn!("Seed query '{}' matched no place", query);
                Ok(None)
            }
        }
    }
}
