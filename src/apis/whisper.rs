//! Client for the HTTP transcription service.

use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;
use crate::types::Transcriber;
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Posts the WAV file to the transcription service and returns the spoken
/// text. The trait contract is infallible: anything that goes wrong yields
/// an empty transcript and a warning, and the pipeline continues on the
/// caption and on-frame text alone.
pub struct WhisperClient {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl WhisperClient {
    pub fn new(url: String, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            retry,
        }
    }

    async fn transcribe_inner(&self, audio_path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(PipelineError::Http)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let body: TranscriptionResponse = response.json().await?;
        Ok(body.text)
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio_path: &Path) -> String {
        match self
            .retry
            .run("transcription", || self.transcribe_inner(audio_path))
            .await
        {
            Ok(text) => {
                info!("Transcribed {} chars from {}", text.len(), audio_path.display());
                text
            }
            Err(e) => {
                counter!("foodreel_transcription_failures_total").increment(1);
                warn!("Transcription failed for {}: {}", audio_path.display(), e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_audio_file_yields_empty_transcript() {
        let client = WhisperClient::new(
            "http://localhost:9/transcribe".to_string(),
            RetryPolicy::new(
                1,
                std::time::Duration::from_millis(1),
                std::time::Duration::from_millis(1),
            ),
        );

        let text = client.transcribe(Path::new("/nonexistent/audio.wav")).await;
        assert_eq!(text, "");
    }
}
