use crate::domain::{ProcessedVideo, Tag, Venue, VideoRecord};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Storage trait for the venue store and the processed-video ledger
#[async_trait]
pub trait Storage: Send + Sync {
    // Venue operations
    async fn create_venue(&self, venue: &mut Venue) -> Result<()>;
    async fn get_venue_by_name_address(&self, name: &str, address: &str)
        -> Result<Option<Venue>>;
    async fn update_venue(&self, venue: &Venue) -> Result<()>;

    // Video record operations
    async fn create_video_record(&self, record: &mut VideoRecord) -> Result<()>;
    async fn get_video_record(
        &self,
        platform: &str,
        video_id: &str,
        venue_id: i64,
    ) -> Result<Option<VideoRecord>>;

    // Processed-video ledger operations
    async fn is_video_processed(&self, platform: &str, video_id: &str) -> Result<bool>;
    async fn create_processed_video(&self, entry: &mut ProcessedVideo) -> Result<()>;

    // Tag operations
    async fn ensure_tag(&self, name: &str) -> Result<Tag>;
    async fn tag_venue(&self, venue_id: i64, tag_id: i64) -> Result<()>;
}

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    venues: Arc<Mutex<HashMap<i64, Venue>>>,
    video_records: Arc<Mutex<HashMap<i64, VideoRecord>>>,
    processed: Arc<Mutex<HashMap<i64, ProcessedVideo>>>,
    tags: Arc<Mutex<HashMap<i64, Tag>>>,
    venue_tags: Arc<Mutex<Vec<(i64, i64)>>>,
    next_id: Arc<Mutex<i64>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            venues: Arc::new(Mutex::new(HashMap::new())),
            video_records: Arc::new(Mutex::new(HashMap::new())),
            processed: Arc::new(Mutex::new(HashMap::new())),
            tags: Arc::new(Mutex::new(HashMap::new())),
            venue_tags: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn allocate_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        id
    }

    /// Snapshot of all venues, for assertions in tests.
    pub fn venues(&self) -> Vec<Venue> {
        self.venues.lock().unwrap().values().cloned().collect()
    }

    /// Snapshot of all video records, for assertions in tests.
    pub fn video_records(&self) -> Vec<VideoRecord> {
        self.video_records
            .lock()
            .unwrap()
            .values()
            .cloned()
            .collect()
    }

    /// Snapshot of the ledger, for assertions in tests.
    pub fn ledger(&self) -> Vec<ProcessedVideo> {
        self.processed.lock().unwrap().values().cloned().collect()
    }

    /// Tag ids attached to a venue, for assertions in tests.
    pub fn tags_for_venue(&self, venue_id: i64) -> Vec<i64> {
        self.venue_tags
            .lock()
            .unwrap()
            .iter()
            .filter(|(v, _)| *v == venue_id)
            .map(|(_, t)| *t)
            .collect()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_venue(&self, venue: &mut Venue) -> Result<()> {
        let id = self.allocate_id();
        venue.id = Some(id);

        let mut venues = self.venues.lock().unwrap();
        venues.insert(id, venue.clone());

        debug!("Created venue: {} with id {}", venue.name, id);
        Ok(())
    }

    async fn get_venue_by_name_address(
        &self,
        name: &str,
        address: &str,
    ) -> Result<Option<Venue>> {
        let venues = self.venues.lock().unwrap();
        let venue = venues
            .values()
            .find(|v| v.name == name && v.address == address)
            .cloned();
        Ok(venue)
    }

    async fn update_venue(&self, venue: &Venue) -> Result<()> {
        let venue_id = venue.id.ok_or_else(|| PipelineError::Database {
            message: "Cannot update venue without ID".to_string(),
        })?;

        let mut venues = self.venues.lock().unwrap();
        venues.insert(venue_id, venue.clone());

        debug!("Updated venue: {} with id {}", venue.name, venue_id);
        Ok(())
    }

    async fn create_video_record(&self, record: &mut VideoRecord) -> Result<()> {
        let id = self.allocate_id();
        record.id = Some(id);

        let mut records = self.video_records.lock().unwrap();
        records.insert(id, record.clone());

        debug!(
            "Created video record {} for venue {}",
            record.video_id, record.venue_id
        );
        Ok(())
    }

    async fn get_video_record(
        &self,
        platform: &str,
        video_id: &str,
        venue_id: i64,
    ) -> Result<Option<VideoRecord>> {
        let records = self.video_records.lock().unwrap();
        let record = records
            .values()
            .find(|r| r.platform == platform && r.video_id == video_id && r.venue_id == venue_id)
            .cloned();
        Ok(record)
    }

    async fn is_video_processed(&self, platform: &str, video_id: &str) -> Result<bool> {
        let processed = self.processed.lock().unwrap();
        Ok(processed
            .values()
            .any(|p| p.platform == platform && p.video_id == video_id))
    }

    async fn create_processed_video(&self, entry: &mut ProcessedVideo) -> Result<()> {
        let mut processed = self.processed.lock().unwrap();

        // One ledger row per (platform, video id); duplicates are ignored
        // so a concurrent duplicate run cannot corrupt the ledger.
        if processed
            .values()
            .any(|p| p.platform == entry.platform && p.video_id == entry.video_id)
        {
            debug!("Ledger entry for {} already present", entry.video_id);
            return Ok(());
        }

        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        entry.id = Some(id);
        entry.processed_at = Utc::now();
        processed.insert(id, entry.clone());

        debug!(
            "Marked video {} as processed (had_venues={})",
            entry.video_id, entry.had_venues
        );
        Ok(())
    }

    async fn ensure_tag(&self, name: &str) -> Result<Tag> {
        let mut tags = self.tags.lock().unwrap();
        if let Some(tag) = tags.values().find(|t| t.name == name) {
            return Ok(tag.clone());
        }

        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        let tag = Tag {
            id: Some(id),
            name: name.to_string(),
        };
        tags.insert(id, tag.clone());

        debug!("Created tag: {} with id {}", name, id);
        Ok(tag)
    }

    async fn tag_venue(&self, venue_id: i64, tag_id: i64) -> Result<()> {
        let mut venue_tags = self.venue_tags.lock().unwrap();
        if !venue_tags.contains(&(venue_id, tag_id)) {
            venue_tags.push((venue_id, tag_id));
            debug!("Attached tag {} to venue {}", tag_id, venue_id);
        }
        Ok(())
    }
}
