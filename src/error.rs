use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unsupported source URL: {0}")]
    UnsupportedSource(String),

    #[error("media download failed: {message}")]
    Download { message: String },

    #[error("text detection service error: {message}")]
    Detection { message: String },

    #[error("recommendation extraction failed: {message}")]
    Extraction { message: String },

    #[error("place lookup failed: {message}")]
    Geocode { message: String },

    #[error("database error: {message}")]
    Database { message: String },

    #[error("ledger write failed for video {video_id}: {message}")]
    Ledger { video_id: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl PipelineError {
    /// Fatal-for-video errors short-circuit the pipeline and leave no
    /// ledger entry, so the caller may retry the video later.
    pub fn is_fatal_for_video(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedSource(_) | PipelineError::Download { .. }
        )
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(e: rusqlite::Error) -> Self {
        PipelineError::Database {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
