//! Video acquisition via the yt-dlp and ffmpeg binaries.

use crate::constants::{
    supported_platforms, PLATFORM_INSTAGRAM, PLATFORM_TIKTOK, PLATFORM_YOUTUBE,
};
use crate::error::{PipelineError, Result};
use crate::media::MediaStore;
use crate::retry::RetryPolicy;
use crate::types::{Acquisition, CreatorInfo, MediaFetcher, SourceRef};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument};

static TIKTOK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"tiktok\.com/.*/video/(\d+)").unwrap());
static INSTAGRAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"instagram\.com/(?:reel|reels|p)/([A-Za-z0-9_-]+)").unwrap());
static YOUTUBE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/(?:shorts/|watch\?v=)|youtu\.be/)([A-Za-z0-9_-]{6,})").unwrap()
});

/// Fields we read from `yt-dlp -j` output. Everything else is ignored.
#[derive(Debug, Deserialize)]
struct ProbeInfo {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    uploader_id: Option<String>,
    #[serde(default)]
    view_count: Option<i64>,
}

/// Downloads the clip and caption with yt-dlp, then normalizes the audio
/// track to WAV with ffmpeg. Probe and download are retried; a failure
/// after the retry budget surfaces as a download error.
pub struct YtDlpFetcher {
    media: MediaStore,
    retry: RetryPolicy,
    ytdlp_bin: PathBuf,
    ffmpeg_bin: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(media: MediaStore, retry: RetryPolicy) -> Self {
        Self {
            media,
            retry,
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
        }
    }

    #[cfg(test)]
    fn with_binaries(
        media: MediaStore,
        retry: RetryPolicy,
        ytdlp_bin: PathBuf,
        ffmpeg_bin: PathBuf,
    ) -> Self {
        Self {
            media,
            retry,
            ytdlp_bin,
            ffmpeg_bin,
        }
    }

    async fn probe(&self, url: &str) -> Result<ProbeInfo> {
        let output = Command::new(&self.ytdlp_bin)
            .args(["-j", "--no-download", "--no-playlist", url])
            .output()
            .await
            .map_err(|e| PipelineError::Download {
                message: format!("failed to spawn yt-dlp: {e}"),
            })?;

        if !output.status.success() {
            return Err(PipelineError::Download {
                message: format!(
                    "yt-dlp probe failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let info: ProbeInfo = serde_json::from_slice(&output.stdout)?;
        Ok(info)
    }

    async fn download(&self, url: &str, output_path: &Path) -> Result<()> {
        let output = Command::new(&self.ytdlp_bin)
            .args([
                "-f",
                "best[ext=mp4]/best",
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                "-o",
            ])
            .arg(output_path)
            .arg(url)
            .output()
            .await
            .map_err(|e| PipelineError::Download {
                message: format!("failed to spawn yt-dlp: {e}"),
            })?;

        if !output.status.success() {
            return Err(PipelineError::Download {
                message: format!(
                    "yt-dlp download failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        if !output_path.exists() {
            return Err(PipelineError::Download {
                message: "yt-dlp reported success but wrote no file".to_string(),
            });
        }
        Ok(())
    }

    /// Strip the audio track to 16-bit PCM WAV at 44.1kHz, the format the
    /// transcription service expects.
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        let output = Command::new(&self.ffmpeg_bin)
            .arg("-i")
            .arg(video_path)
            .args(["-vn", "-acodec", "pcm_s16le", "-ar", "44100", "-y"])
            .arg(audio_path)
            .output()
            .await
            .map_err(|e| PipelineError::Download {
                message: format!("failed to spawn ffmpeg: {e}"),
            })?;

        if !output.status.success() {
            return Err(PipelineError::Download {
                message: format!(
                    "ffmpeg audio extraction failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    fn identify(&self, url: &str) -> Result<SourceRef> {
        if let Some(caps) = TIKTOK_RE.captures(url) {
            return Ok(SourceRef {
                platform: PLATFORM_TIKTOK.to_string(),
                video_id: caps[1].to_string(),
            });
        }
        if let Some(caps) = INSTAGRAM_RE.captures(url) {
            return Ok(SourceRef {
                platform: PLATFORM_INSTAGRAM.to_string(),
                video_id: caps[1].to_string(),
            });
        }
        if let Some(caps) = YOUTUBE_RE.captures(url) {
            return Ok(SourceRef {
                platform: PLATFORM_YOUTUBE.to_string(),
                video_id: caps[1].to_string(),
            });
        }
        Err(PipelineError::UnsupportedSource(format!(
            "{url} (supported platforms: {})",
            supported_platforms().join(", ")
        )))
    }

    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Acquisition> {
        let source = self.identify(url)?;
        let video_path = self.media.video_path(&source.video_id);
        let audio_path = self.media.audio_path(&source.video_id);

        // Metadata (caption, creator) and the media download are
        // independent; run them concurrently.
        let (info, downloaded) = tokio::join!(
            self.retry.run("yt-dlp probe", || self.probe(url)),
            self.retry
                .run("yt-dlp download", || self.download(url, &video_path)),
        );
        let info = info?;
        downloaded?;
        debug!(
            "Probe for {} found uploader {:?}",
            source.video_id, info.uploader
        );
        info!("Downloaded {} to {}", source.video_id, video_path.display());

        self.extract_audio(&video_path, &audio_path).await?;

        let creator = CreatorInfo {
            name: info.uploader.as_deref().map(|u| format!("@{u}")),
            id: info.uploader_id.clone(),
            view_count: info.view_count,
        };

        Ok(Acquisition {
            video_id: source.video_id,
            platform: source.platform,
            media_path: video_path,
            audio_path,
            caption: info.description.unwrap_or_default(),
            creator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    fn fetcher() -> YtDlpFetcher {
        let tmp = tempfile::tempdir().unwrap();
        YtDlpFetcher::new(MediaStore::new(tmp.path()).unwrap(), RetryPolicy::default())
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn probe_and_download_overlap() {
        let tmp = tempfile::tempdir().unwrap();

        // Stub yt-dlp: probe (-j) and download each take 400ms. If fetch
        // ran them back to back it would need at least 800ms.
        let ytdlp = write_script(
            tmp.path(),
            "fake-yt-dlp",
            r#"#!/bin/sh
if [ "$1" = "-j" ]; then
  sleep 0.4
  printf '%s' '{"description":"Best pasta!","uploader":"foodie","uploader_id":"foodie","view_count":10}'
  exit 0
fi
sleep 0.4
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
: > "$out"
"#,
        );
        let ffmpeg = write_script(
            tmp.path(),
            "fake-ffmpeg",
            "#!/bin/sh\nfor a in \"$@\"; do out=\"$a\"; done\n: > \"$out\"\n",
        );

        let media = MediaStore::new(tmp.path().join("media")).unwrap();
        let fetcher = YtDlpFetcher::with_binaries(
            media.clone(),
            RetryPolicy::new(
                1,
                Duration::from_millis(1),
                Duration::from_millis(1),
            ),
            ytdlp,
            ffmpeg,
        );

        let started = Instant::now();
        let acquisition = fetcher
            .fetch("https://www.tiktok.com/@foodie/video/101")
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(
            elapsed < Duration::from_millis(700),
            "probe and download ran sequentially: {elapsed:?}"
        );
        assert_eq!(acquisition.caption, "Best pasta!");
        assert_eq!(acquisition.creator.name.as_deref(), Some("@foodie"));
        assert!(media.video_path("101").exists());
        assert!(media.audio_path("101").exists());
    }

    #[test]
    fn identifies_tiktok_urls() {
        let source = fetcher()
            .identify("https://www.tiktok.com/@foodie/video/7301234567890123456")
            .unwrap();
        assert_eq!(source.platform, "tiktok");
        assert_eq!(source.video_id, "7301234567890123456");
    }

    #[test]
    fn identifies_instagram_reels() {
        let source = fetcher()
            .identify("https://www.instagram.com/reel/Cx1yZaBcDeF/")
            .unwrap();
        assert_eq!(source.platform, "instagram");
        assert_eq!(source.video_id, "Cx1yZaBcDeF");
    }

    #[test]
    fn identifies_youtube_shorts() {
        let source = fetcher()
            .identify("https://www.youtube.com/shorts/dQw4w9WgXcQ")
            .unwrap();
        assert_eq!(source.platform, "youtube");
        assert_eq!(source.video_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn rejects_unknown_hosts() {
        let err = fetcher().identify("https://example.com/watch/123").unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedSource(_)));
        assert!(err.is_fatal_for_video());
    }
}
