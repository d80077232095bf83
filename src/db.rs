use crate::domain::{ProcessedVideo, Tag, Venue, VideoRecord};
use crate::error::{PipelineError, Result};
use crate::storage::Storage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// SQLite-backed storage for venues, video links, the processed-video
/// ledger, and tags.
///
/// Each write commits its own short transaction, so a failure persisting
/// one venue never rolls back venues already committed in the same run.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// In-memory database, used by unit tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../migrations/001_create_schema.sql"))?;
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn venue_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Venue> {
        let created: String = row.get(11)?;
        let updated: String = row.get(12)?;
        Ok(Venue {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            address: row.get(2)?,
            city: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            rating: row.get(6)?,
            price_level: row.get::<_, Option<i64>>(7)?.map(|v| v as u8),
            phone: row.get(8)?,
            website: row.get(9)?,
            map_link: row.get(10)?,
            created_at: Self::parse_timestamp(&created),
            updated_at: Self::parse_timestamp(&updated),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_venue(&self, venue: &mut Venue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO venues (name, address, city, latitude, longitude, rating, price_level,
                                 phone, website, map_link, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                venue.name,
                venue.address,
                venue.city,
                venue.latitude,
                venue.longitude,
                venue.rating,
                venue.price_level.map(|v| v as i64),
                venue.phone,
                venue.website,
                venue.map_link,
                venue.created_at.to_rfc3339(),
                venue.updated_at.to_rfc3339(),
            ],
        )?;
        venue.id = Some(conn.last_insert_rowid());
        debug!("Created venue: {} with id {:?}", venue.name, venue.id);
        Ok(())
    }

    async fn get_venue_by_name_address(
        &self,
        name: &str,
        address: &str,
    ) -> Result<Option<Venue>> {
        let conn = self.conn.lock().unwrap();
        let venue = conn
            .query_row(
                "SELECT id, name, address, city, latitude, longitude, rating, price_level,
                        phone, website, map_link, created_at, updated_at
                 FROM venues WHERE name = ?1 AND address = ?2",
                params![name, address],
                Self::venue_from_row,
            )
            .optional()?;
        Ok(venue)
    }

    async fn update_venue(&self, venue: &Venue) -> Result<()> {
        let venue_id = venue.id.ok_or_else(|| PipelineError::Database {
            message: "Cannot update venue without ID".to_string(),
        })?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE venues SET city = ?1, rating = ?2, price_level = ?3, phone = ?4,
                               website = ?5, map_link = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                venue.city,
                venue.rating,
                venue.price_level.map(|v| v as i64),
                venue.phone,
                venue.website,
                venue.map_link,
                venue.updated_at.to_rfc3339(),
                venue_id,
            ],
        )?;
        debug!("Updated venue: {} with id {}", venue.name, venue_id);
        Ok(())
    }

    async fn create_video_record(&self, record: &mut VideoRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO videos (platform, video_id, video_url, creator_name,
                                           creator_id, view_count, venue_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.platform,
                record.video_id,
                record.video_url,
                record.creator_name,
                record.creator_id,
                record.view_count,
                record.venue_id,
                record.created_at.to_rfc3339(),
            ],
        )?;
        // When the insert was ignored, last_insert_rowid() still points at
        // whatever row was inserted last; look the real id up instead.
        record.id = if changed > 0 {
            Some(conn.last_insert_rowid())
        } else {
            Some(conn.query_row(
                "SELECT id FROM videos WHERE platform = ?1 AND video_id = ?2 AND venue_id = ?3",
                params![record.platform, record.video_id, record.venue_id],
                |row| row.get(0),
            )?)
        };
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
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT id, platform, video_id, video_url, creator_name, creator_id,
                        view_count, venue_id, created_at
                 FROM videos WHERE platform = ?1 AND video_id = ?2 AND venue_id = ?3",
                params![platform, video_id, venue_id],
                |row| {
                    let created: String = row.get(8)?;
                    Ok(VideoRecord {
                        id: Some(row.get(0)?),
                        platform: row.get(1)?,
                        video_id: row.get(2)?,
                        video_url: row.get(3)?,
                        creator_name: row.get(4)?,
                        creator_id: row.get(5)?,
                        view_count: row.get(6)?,
                        venue_id: row.get(7)?,
                        created_at: Self::parse_timestamp(&created),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    async fn is_video_processed(&self, platform: &str, video_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM processed_videos WHERE platform = ?1 AND video_id = ?2",
                params![platform, video_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn create_processed_video(&self, entry: &mut ProcessedVideo) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        // INSERT OR IGNORE against the (platform, video_id) unique key: a
        // duplicate concurrent run wastes work but cannot produce a second
        // ledger row.
        let changed = conn.execute(
            "INSERT OR IGNORE INTO processed_videos
                 (platform, video_id, video_url, had_venues, processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.platform,
                entry.video_id,
                entry.video_url,
                entry.had_venues,
                entry.processed_at.to_rfc3339(),
            ],
        )?;
        entry.id = if changed > 0 {
            Some(conn.last_insert_rowid())
        } else {
            Some(conn.query_row(
                "SELECT id FROM processed_videos WHERE platform = ?1 AND video_id = ?2",
                params![entry.platform, entry.video_id],
                |row| row.get(0),
            )?)
        };
        debug!(
            "Marked video {} as processed (had_venues={})",
            entry.video_id, entry.had_venues
        );
        Ok(())
    }

    async fn ensure_tag(&self, name: &str) -> Result<Tag> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
        let id: i64 = conn.query_row(
            "SELECT id FROM tags WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(Tag {
            id: Some(id),
            name: name.to_string(),
        })
    }

    async fn tag_venue(&self, venue_id: i64, tag_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO venue_tags (venue_id, tag_id) VALUES (?1, ?2)",
            params![venue_id, tag_id],
        )?;
        Ok(())
    }
}
