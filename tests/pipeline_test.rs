//! End-to-end pipeline tests over in-memory storage and fake collaborators.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use foodreel::error::{PipelineError, Result};
use foodreel::extract::ExtractionCoordinator;
use foodreel::media::MediaStore;
use foodreel::pipeline::{PipelineOutcome, VideoPipeline};
use foodreel::resolve::RecommendationResolver;
use foodreel::storage::{InMemoryStorage, Storage};
use foodreel::types::{
    Acquisition, CreatorInfo, MediaFetcher, PlaceDetails, PlaceResolver, RecommendationExtractor,
    SourceRef, TextDetector, Transcriber,
};

struct FakeFetcher {
    media: MediaStore,
    caption: String,
    fetch_calls: AtomicU32,
}

impl FakeFetcher {
    fn new(media: MediaStore, caption: &str) -> Self {
        Self {
            media,
            caption: caption.to_string(),
            fetch_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    fn identify(&self, url: &str) -> Result<SourceRef> {
        match url.split_once("/video/") {
            Some((_, id)) if !id.is_empty() => Ok(SourceRef {
                platform: "tiktok".to_string(),
                video_id: id.trim_end_matches('/').to_string(),
            }),
            _ => Err(PipelineError::UnsupportedSource(url.to_string())),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Acquisition> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let source = self.identify(url)?;

        let media_path = self.media.video_path(&source.video_id);
        let audio_path = self.media.audio_path(&source.video_id);
        std::fs::write(&media_path, b"mp4")?;
        std::fs::write(&audio_path, b"wav")?;

        Ok(Acquisition {
            video_id: source.video_id,
            platform: source.platform,
            media_path,
            audio_path,
            caption: self.caption.clone(),
            creator: CreatorInfo {
                name: Some("@foodie".to_string()),
                id: Some("foodie".to_string()),
                view_count: Some(1000),
            },
        })
    }
}

struct FixedTranscriber(&'static str);

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> String {
        self.0.to_string()
    }
}

struct FixedDetector(&'static str);

#[async_trait]
impl TextDetector for FixedDetector {
    async fn detect_text(&self, _media_path: &Path, _video_id: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct FakeExtractor {
    response: String,
    calls: AtomicU32,
}

impl FakeExtractor {
    fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl RecommendationExtractor for FakeExtractor {
    async fn extract(
        &self,
        _caption: &str,
        _on_frame_text: &str,
        _transcript: &str,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

struct FakePlaces;

#[async_trait]
impl PlaceResolver for FakePlaces {
    async fn resolve(&self, query: &str) -> Result<Option<PlaceDetails>> {
        if query.contains("Trattoria Luna") {
            return Ok(Some(PlaceDetails {
                name: "Trattoria Luna".to_string(),
                address: "Via Roma 5, 00100 Roma, Italy".to_string(),
                latitude: 41.9,
                longitude: 12.5,
                rating: Some(4.6),
                price_level: Some(2),
                phone: Some("+39 06 123456".to_string()),
                website: None,
                map_link: Some("https://maps.example/luna".to_string()),
                hours: None,
            }));
        }
        if query.contains("Grotta Palazzese") {
            return Ok(Some(PlaceDetails {
                name: "Grotta Palazzese".to_string(),
                address: "Via Narciso 59, 70044 Polignano a Mare, Italy".to_string(),
                latitude: 40.99,
                longitude: 17.22,
                rating: Some(4.3),
                price_level: Some(4),
                phone: None,
                website: None,
                map_link: None,
                hours: None,
            }));
        }
        Ok(None)
    }
}

struct Harness {
    pipeline: VideoPipeline,
    storage: Arc<InMemoryStorage>,
    fetcher: Arc<FakeFetcher>,
    extractor: Arc<FakeExtractor>,
    media: MediaStore,
    _tmp: tempfile::TempDir,
}

fn harness(caption: &str, transcript: &'static str, on_frame: &'static str, response: &str) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let media = MediaStore::new(tmp.path()).unwrap();
    let storage = Arc::new(InMemoryStorage::new());
    let fetcher = Arc::new(FakeFetcher::new(media.clone(), caption));
    let extractor = Arc::new(FakeExtractor::new(response));

    let extraction = ExtractionCoordinator::new(
        Arc::new(FixedTranscriber(transcript)),
        Arc::new(FixedDetector(on_frame)),
        2,
        Duration::from_secs(5),
    );
    let resolver = RecommendationResolver::new(extractor.clone(), Arc::new(FakePlaces));

    let pipeline = VideoPipeline::new(
        fetcher.clone(),
        extraction,
        resolver,
        Arc::new(FakePlaces),
        storage.clone() as Arc<dyn Storage>,
        media.clone(),
    );

    Harness {
        pipeline,
        storage,
        fetcher,
        extractor,
        media,
        _tmp: tmp,
    }
}

#[tokio::test]
async fn full_run_links_venues_and_writes_ledger() {
    let h = harness(
        "Best pasta in Rome!",
        "we ate at trattoria luna",
        "TRATTORIA LUNA",
        "Trattoria Luna, Rome, Restaurant\nGrotta Palazzese, Polignano, Restaurant",
    );

    let outcome = h
        .pipeline
        .process_video("https://www.tiktok.com/@foodie/video/111", false)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::Completed {
            venues_linked: 2,
            had_venues: true
        }
    );

    let venues = h.storage.venues();
    assert_eq!(venues.len(), 2);
    let luna = venues.iter().find(|v| v.name == "Trattoria Luna").unwrap();
    assert_eq!(luna.city, "Roma");
    assert_eq!(luna.rating, Some(4.6));

    // One video record per distinct venue
    assert_eq!(h.storage.video_records().len(), 2);

    let ledger = h.storage.ledger();
    assert_eq!(ledger.len(), 1);
    assert!(ledger[0].had_venues);
    assert_eq!(ledger[0].video_id, "111");
}

#[tokio::test]
async fn processed_video_short_circuits_before_any_fetch() {
    let h = harness(
        "caption",
        "",
        "",
        "Trattoria Luna, Rome, Restaurant",
    );

    let url = "https://www.tiktok.com/@foodie/video/222";
    h.pipeline.process_video(url, false).await.unwrap();
    assert_eq!(h.fetcher.fetch_calls.load(Ordering::SeqCst), 1);

    let second = h.pipeline.process_video(url, false).await.unwrap();
    assert_eq!(second, PipelineOutcome::AlreadyProcessed);
    assert_eq!(h.fetcher.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.storage.ledger().len(), 1);
}

#[tokio::test]
async fn fresh_pipeline_over_same_storage_duplicates_nothing() {
    let caption = "Best pasta!";
    let response = "Trattoria Luna, Rome, Restaurant";

    let h1 = harness(caption, "", "", response);
    h1.pipeline
        .process_video("https://www.tiktok.com/@foodie/video/333", false)
        .await
        .unwrap();

    // Same video processed again through a fresh pipeline over the same
    // storage, as if the ledger check had been raced past.
    let tmp = tempfile::tempdir().unwrap();
    let media = MediaStore::new(tmp.path()).unwrap();
    let fetcher = Arc::new(FakeFetcher::new(media.clone(), caption));
    let extraction = ExtractionCoordinator::new(
        Arc::new(FixedTranscriber("")),
        Arc::new(FixedDetector("")),
        2,
        Duration::from_secs(5),
    );
    let resolver =
        RecommendationResolver::new(Arc::new(FakeExtractor::new(response)), Arc::new(FakePlaces));
    let pipeline2 = VideoPipeline::new(
        fetcher,
        extraction,
        resolver,
        Arc::new(FakePlaces),
        h1.storage.clone() as Arc<dyn Storage>,
        media,
    );

    let second = pipeline2
        .process_video("https://www.tiktok.com/@foodie/video/333", false)
        .await
        .unwrap();
    assert_eq!(second, PipelineOutcome::AlreadyProcessed);

    assert_eq!(h1.storage.venues().len(), 1);
    assert_eq!(h1.storage.video_records().len(), 1);
    assert_eq!(h1.storage.ledger().len(), 1);
}

#[tokio::test]
async fn empty_inputs_skip_the_model_and_still_write_ledger() {
    let h = harness("", "", "", "Trattoria Luna, Rome, Restaurant");

    let outcome = h
        .pipeline
        .process_video("https://www.tiktok.com/@foodie/video/444", false)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::Completed {
            venues_linked: 0,
            had_venues: false
        }
    );
    assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);

    let ledger = h.storage.ledger();
    assert_eq!(ledger.len(), 1);
    assert!(!ledger[0].had_venues);
    assert!(h.storage.venues().is_empty());
}

#[tokio::test]
async fn sentinel_response_records_video_with_no_venues() {
    let h = harness(
        "random vlog, nothing to eat here",
        "talking about the weather",
        "",
        "No places of interest found",
    );

    let outcome = h
        .pipeline
        .process_video("https://www.tiktok.com/@foodie/video/555", false)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::Completed {
            venues_linked: 0,
            had_venues: false
        }
    );
    assert!(h.storage.venues().is_empty());
    assert!(h.storage.video_records().is_empty());
    assert_eq!(h.storage.ledger().len(), 1);
}

#[tokio::test]
async fn unresolvable_mentions_are_dropped_not_fatal() {
    let h = harness(
        "two places",
        "",
        "",
        "Trattoria Luna, Rome, Restaurant\nNowhere Cafe, Atlantis, Cafe",
    );

    let outcome = h
        .pipeline
        .process_video("https://www.tiktok.com/@foodie/video/666", false)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::Completed {
            venues_linked: 1,
            had_venues: true
        }
    );
    assert_eq!(h.storage.venues().len(), 1);
}

#[tokio::test]
async fn unsupported_url_fails_without_ledger_entry() {
    let h = harness("caption", "", "", "No places of interest found");

    let err = h
        .pipeline
        .process_video("https://example.com/not-a-video", false)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::UnsupportedSource(_)));
    assert!(err.is_fatal_for_video());
    assert!(h.storage.ledger().is_empty());
    assert_eq!(h.fetcher.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn media_artifacts_are_removed_after_processing() {
    let h = harness(
        "Best pasta!",
        "",
        "",
        "Trattoria Luna, Rome, Restaurant",
    );

    h.pipeline
        .process_video("https://www.tiktok.com/@foodie/video/777", false)
        .await
        .unwrap();

    assert!(!h.media.video_path("777").exists());
    assert!(!h.media.audio_path("777").exists());
}

#[tokio::test]
async fn batch_keeps_going_past_failures() {
    let h = harness("caption", "", "", "Trattoria Luna, Rome, Restaurant");

    let urls = vec![
        "https://www.tiktok.com/@foodie/video/888".to_string(),
        "https://example.com/broken".to_string(),
        "https://www.tiktok.com/@foodie/video/999".to_string(),
    ];
    let summary = h.pipeline.process_batch(&urls, false).await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(h.storage.ledger().len(), 2);
}

#[tokio::test]
async fn seeding_creates_a_curated_venue_without_ledger() {
    let h = harness("", "", "", "No places of interest found");

    let venue_id = h
        .pipeline
        .seed_venue("Trattoria Luna", "Rome")
        .await
        .unwrap()
        .expect("seed should resolve");

    assert_eq!(h.storage.venues().len(), 1);
    assert_eq!(h.storage.tags_for_venue(venue_id).len(), 1);
    assert!(h.storage.ledger().is_empty());
}
