//! Language-model client for recommendation extraction.

use crate::constants::NO_PLACES_SENTINEL;
use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;
use crate::types::RecommendationExtractor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Build the extraction prompt. The model is instructed to answer one
/// `Name, City, Category` line per venue, or the exact sentinel phrase.
fn build_prompt(caption: &str, on_frame_text: &str, transcript: &str) -> String {
    format!(
        "Analyze the following information from a short-form video and identify recommended places:\n\
         \n\
         Description: {caption}\n\
         Transcription: {transcript}\n\
         Text in images: {on_frame_text}\n\
         \n\
         Instructions:\n\
         1. Return only specific places that are being explicitly recommended or reviewed\n\
         2. Format each place as: [Place Name], [City] (if not in any city use the closest city), [Type of Place]\n\
         3. One place per line\n\
         4. If no specific place is mentioned, return exactly: \"{NO_PLACES_SENTINEL}\"\n\
         \n\
         Example format:\n\
         Maseria Moroseta, Ostuni, Boutique Hotel\n\
         Grotta Palazzese, Polignano, Restaurant\n\
         \n\
         Notes: The city name must be in english."
    )
}

/// Chat-completions client. Holds the endpoint and model from config and
/// the API key from the environment.
pub struct OpenAiExtractor {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenAiExtractor {
    pub fn new(url: String, model: String, retry: RetryPolicy) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")?;
        Ok(Self {
            client: reqwest::Client::new(),
            url,
            model,
            api_key,
            retry,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: 300,
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PipelineError::Extraction {
                message: "model response contained no choices".to_string(),
            })?;
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl RecommendationExtractor for OpenAiExtractor {
    #[instrument(skip_all)]
    async fn extract(
        &self,
        caption: &str,
        on_frame_text: &str,
        transcript: &str,
    ) -> Result<String> {
        let prompt = build_prompt(caption, on_frame_text, transcript);
        let response = self
            .retry
            .run("recommendation extraction", || self.complete(&prompt))
            .await?;
        info!("Model returned {} line(s)", response.lines().count());
        Ok(response)
    }
}
