use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Scoped local directories for per-video media artifacts.
///
/// Directories are created under the configured root on first use; the
/// downloader writes `<root>/video/<id>.mp4` and `<root>/audio/<id>.wav`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    video_dir: PathBuf,
    audio_dir: PathBuf,
}

impl MediaStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let video_dir = root.join("video");
        let audio_dir = root.join("audio");
        fs::create_dir_all(&video_dir)?;
        fs::create_dir_all(&audio_dir)?;
        Ok(Self {
            video_dir,
            audio_dir,
        })
    }

    pub fn video_path(&self, video_id: &str) -> PathBuf {
        self.video_dir.join(format!("{video_id}.mp4"))
    }

    pub fn audio_path(&self, video_id: &str) -> PathBuf {
        self.audio_dir.join(format!("{video_id}.wav"))
    }

    /// Guard that removes this video's artifacts when the pipeline finishes.
    pub fn guard(&self, video_id: &str) -> MediaGuard {
        MediaGuard {
            paths: vec![self.video_path(video_id), self.audio_path(video_id)],
            released: false,
        }
    }
}

/// Removes local media artifacts on both success and failure paths so
/// failed runs do not leak disk space across invocations.
///
/// `cleanup()` is the explicit path; `Drop` is the backstop for early
/// returns and panics.
pub struct MediaGuard {
    paths: Vec<PathBuf>,
    released: bool,
}

impl MediaGuard {
    pub fn cleanup(mut self) {
        self.remove_all();
        self.released = true;
    }

    fn remove_all(&mut self) {
        for path in &self.paths {
            if path.exists() {
                match fs::remove_file(path) {
                    Ok(()) => debug!("Removed media file: {}", path.display()),
                    Err(e) => warn!("Failed to remove media file {}: {}", path.display(), e),
                }
            }
        }
    }
}

impl Drop for MediaGuard {
    fn drop(&mut self) {
        if !self.released {
            self.remove_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_removes_files_on_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path()).unwrap();

        let video = store.video_path("abc");
        let audio = store.audio_path("abc");
        fs::write(&video, b"v").unwrap();
        fs::write(&audio, b"a").unwrap();

        store.guard("abc").cleanup();
        assert!(!video.exists());
        assert!(!audio.exists());
    }

    #[test]
    fn guard_removes_partial_artifacts_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MediaStore::new(tmp.path()).unwrap();

        // Only the video was written before the failure
        let video = store.video_path("abc");
        fs::write(&video, b"v").unwrap();

        {
            let _guard = store.guard("abc");
        }
        assert!(!video.exists());
    }
}
