//! Client for the asynchronous on-frame text detection service.
//!
//! Submit the clip, poll the job until it settles, then deduplicate the
//! per-frame detections and join them into one newline-separated block.
//! The same sign read on fifty frames comes back as one line.

use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;
use crate::types::TextDetector;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Upper bound on polls per job (about ten minutes); the extraction
/// deadline usually fires first, but a job stuck in pending must not spin
/// forever.
const MAX_POLLS: u32 = 300;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    status: JobStatus,
    #[serde(default)]
    detections: Vec<String>,
    #[serde(default)]
    status_message: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum JobStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

pub struct DetectionServiceClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl DetectionServiceClient {
    pub fn new(base_url: String, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    async fn submit(&self, media_path: &Path, video_id: &str) -> Result<String> {
        let bytes = tokio::fs::read(media_path).await?;
        let file_name = media_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("video/mp4")
            .map_err(PipelineError::Http)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("video_id", video_id.to_string());

        let response = self
            .client
            .post(format!("{}/jobs", self.base_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let body: SubmitResponse = response.json().await?;
        Ok(body.job_id)
    }

    async fn poll(&self, job_id: &str) -> Result<Vec<String>> {
        for _ in 0..MAX_POLLS {
            let response = self
                .client
                .get(format!("{}/jobs/{}", self.base_url, job_id))
                .send()
                .await?
                .error_for_status()?;
            let body: JobResponse = response.json().await?;

            match body.status {
                JobStatus::Succeeded => return Ok(body.detections),
                JobStatus::Failed => {
                    return Err(PipelineError::Detection {
                        message: body
                            .status_message
                            .unwrap_or_else(|| "job failed with no status message".to_string()),
                    })
                }
                JobStatus::Pending | JobStatus::InProgress => {
                    debug!("Detection job {} still running", job_id);
                    sleep(POLL_INTERVAL).await;
                }
            }
        }
        Err(PipelineError::Detection {
            message: format!("job {job_id} did not settle after {MAX_POLLS} polls"),
        })
    }
}

/// Collapse repeated frame detections into one block of unique lines,
/// ordered deterministically.
fn dedupe_detections(detections: &[String]) -> String {
    let unique: BTreeSet<&str> = detections
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect();
    unique.into_iter().collect::<Vec<_>>().join("\n")
}

#[async_trait]
impl TextDetector for DetectionServiceClient {
    async fn detect_text(&self, media_path: &Path, video_id: &str) -> Result<String> {
        let job_id = self
            .retry
            .run("detection submit", || self.submit(media_path, video_id))
            .await?;
        info!("Detection job {} submitted for video {}", job_id, video_id);

        let detections = self.poll(&job_id).await?;
        let text = dedupe_detections(&detections);
        info!(
            "Detection found {} unique line(s) for video {}",
            text.lines().count(),
            video_id
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_frames_collapse_to_unique_lines() {
        let detections: Vec<String> = vec![
            "TRATTORIA LUNA".into(),
            "TRATTORIA LUNA".into(),
            "Best pasta in Rome".into(),
            "TRATTORIA LUNA".into(),
        ];
        let text = dedupe_detections(&detections);
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("TRATTORIA LUNA"));
        assert!(text.contains("Best pasta in Rome"));
    }

    #[test]
    fn blank_detections_are_dropped() {
        let detections: Vec<String> = vec!["  ".into(), "".into(), "sign".into()];
        assert_eq!(dedupe_detections(&detections), "sign");
    }

    #[test]
    fn job_status_parses_from_service_payload() {
        let body: JobResponse = serde_json::from_str(
            r#"{"status":"succeeded","detections":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(body.status, JobStatus::Succeeded);
        assert_eq!(body.detections.len(), 2);

        let failed: JobResponse =
            serde_json::from_str(r#"{"status":"failed","status_message":"bad input"}"#).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
    }
}
