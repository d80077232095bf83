use crate::types::{TextDetector, Transcriber};
use metrics::counter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// Text recovered by the two extraction branches. Either field may be
/// empty; downstream degrades to "no recommendations" when both are.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub transcript: String,
    pub on_frame_text: String,
}

/// Runs audio transcription and on-frame text detection concurrently.
///
/// Both branches are model-bound, so they share a small fixed worker pool
/// rather than spawning unbounded. Each branch fails independently: a
/// failed or timed-out branch degrades to an empty string and is logged,
/// never propagated.
pub struct ExtractionCoordinator {
    transcriber: Arc<dyn Transcriber>,
    detector: Arc<dyn TextDetector>,
    workers: Arc<Semaphore>,
    deadline: Duration,
}

impl ExtractionCoordinator {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        detector: Arc<dyn TextDetector>,
        workers: usize,
        deadline: Duration,
    ) -> Self {
        Self {
            transcriber,
            detector,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            deadline,
        }
    }

    #[instrument(skip(self, media_path, audio_path), fields(video_id = %video_id))]
    pub async fn run(
        &self,
        media_path: &Path,
        audio_path: &Path,
        video_id: &str,
    ) -> ExtractedText {
        let transcriber = Arc::clone(&self.transcriber);
        let detector = Arc::clone(&self.detector);
        let audio = audio_path.to_path_buf();
        let media = media_path.to_path_buf();
        let id = video_id.to_string();

        let transcription_pool = Arc::clone(&self.workers);
        let mut transcription = tokio::spawn(async move {
            let _permit = transcription_pool
                .acquire()
                .await
                .expect("extraction pool closed");
            transcriber.transcribe(&audio).await
        });

        let detection_pool = Arc::clone(&self.workers);
        let mut detection = tokio::spawn(async move {
            let _permit = detection_pool
                .acquire()
                .await
                .expect("extraction pool closed");
            detector.detect_text(&media, &id).await
        });

        let (transcript_result, detection_result) = tokio::join!(
            timeout(self.deadline, &mut transcription),
            timeout(self.deadline, &mut detection),
        );

        let transcript = match transcript_result {
            Ok(Ok(text)) => {
                info!("Transcription completed, {} chars", text.len());
                text
            }
            Ok(Err(join_err)) => {
                counter!("foodreel_transcription_failures_total").increment(1);
                warn!("Transcription task aborted: {}", join_err);
                String::new()
            }
            Err(_) => {
                // The task would otherwise keep its pool permit while it
                // runs on unobserved; abort so the permit returns.
                transcription.abort();
                counter!("foodreel_transcription_failures_total").increment(1);
                warn!("Transcription timed out after {:?}", self.deadline);
                String::new()
            }
        };

        let on_frame_text = match detection_result {
            Ok(Ok(Ok(text))) => {
                info!("Text detection completed, {} chars", text.len());
                text
            }
            Ok(Ok(Err(e))) => {
                counter!("foodreel_detection_failures_total").increment(1);
                warn!("Text detection failed: {}", e);
                String::new()
            }
            Ok(Err(join_err)) => {
                counter!("foodreel_detection_failures_total").increment(1);
                warn!("Text detection task aborted: {}", join_err);
                String::new()
            }
            Err(_) => {
                detection.abort();
                counter!("foodreel_detection_failures_total").increment(1);
                warn!("Text detection timed out after {:?}", self.deadline);
                String::new()
            }
        };

        ExtractedText {
            transcript,
            on_frame_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, Result};
    use async_trait::async_trait;

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

    struct HungDetector;

    #[async_trait]
    impl TextDetector for HungDetector {
        async fn detect_text(&self, _media_path: &Path, _video_id: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl TextDetector for FailingDetector {
        async fn detect_text(&self, _media_path: &Path, _video_id: &str) -> Result<String> {
            Err(PipelineError::Detection {
                message: "service unavailable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn both_branches_return_text() {
        let coordinator = ExtractionCoordinator::new(
            Arc::new(FixedTranscriber("spoken words")),
            Arc::new(FixedDetector("sign text")),
            2,
            Duration::from_secs(5),
        );

        let out = coordinator
            .run(Path::new("/tmp/v.mp4"), Path::new("/tmp/a.wav"), "vid1")
            .await;
        assert_eq!(out.transcript, "spoken words");
        assert_eq!(out.on_frame_text, "sign text");
    }

    #[tokio::test]
    async fn detector_failure_degrades_to_empty() {
        let coordinator = ExtractionCoordinator::new(
            Arc::new(FixedTranscriber("spoken words")),
            Arc::new(FailingDetector),
            2,
            Duration::from_secs(5),
        );

        let out = coordinator
            .run(Path::new("/tmp/v.mp4"), Path::new("/tmp/a.wav"), "vid1")
            .await;
        assert_eq!(out.transcript, "spoken words");
        assert_eq!(out.on_frame_text, "");
    }

    #[tokio::test]
    async fn timed_out_branch_returns_its_permit_to_the_pool() {
        // One permit: a detection that never settles must not hold it past
        // the deadline, or every later video starves.
        let coordinator = ExtractionCoordinator::new(
            Arc::new(FixedTranscriber("spoken words")),
            Arc::new(HungDetector),
            1,
            Duration::from_millis(100),
        );

        let first = coordinator
            .run(Path::new("/tmp/v.mp4"), Path::new("/tmp/a.wav"), "vid1")
            .await;
        assert_eq!(first.on_frame_text, "");

        let second = coordinator
            .run(Path::new("/tmp/v.mp4"), Path::new("/tmp/a.wav"), "vid2")
            .await;
        assert_eq!(second.transcript, "spoken words");
        assert_eq!(second.on_frame_text, "");
    }

    #[tokio::test]
    async fn single_permit_still_completes_both_branches() {
        let coordinator = ExtractionCoordinator::new(
            Arc::new(FixedTranscriber("a")),
            Arc::new(FixedDetector("b")),
            1,
            Duration::from_secs(5),
        );

        let out = coordinator
            .run(Path::new("/tmp/v.mp4"), Path::new("/tmp/a.wav"), "vid1")
            .await;
        assert_eq!(out.transcript, "a");
        assert_eq!(out.on_frame_text, "b");
    }
}
