use crate::constants::NO_PLACES_SENTINEL;
use crate::error::Result;
use crate::extract::ExtractedText;
use crate::types::{PlaceDetails, PlaceResolver, RecommendationExtractor};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// One candidate venue line from the extractor, `Name, City, Category`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    /// The original line, used verbatim as the geocoding query
    pub raw: String,
    pub name: String,
    pub city: String,
    pub category: Option<String>,
}

/// Parse the extractor's response into mentions.
///
/// The sentinel appearing anywhere means the whole response carries no
/// venues. Lines are trimmed; blanks dropped; the first two commas split
/// name and city, the remainder is the category.
pub fn parse_mentions(response: &str) -> Vec<Mention> {
    if response.contains(NO_PLACES_SENTINEL) {
        return Vec::new();
    }

    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut parts = line.splitn(3, ',');
            let name = parts.next().unwrap_or_default().trim().to_string();
            let city = parts
                .next()
                .map(|c| c.trim().to_string())
                .unwrap_or_else(|| crate::constants::UNKNOWN_CITY.to_string());
            let category = parts
                .next()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty());
            Mention {
                raw: line.to_string(),
                name,
                city,
                category,
            }
        })
        .filter(|m| !m.name.is_empty())
        .collect()
}

/// A mention together with the venue details it resolved to.
#[derive(Debug, Clone)]
pub struct ResolvedMention {
    pub mention: Mention,
    pub place: PlaceDetails,
}

/// Turns raw text into geocoded venue candidates: one language-model call
/// for the whole video, then one places lookup per mention.
pub struct RecommendationResolver {
    extractor: Arc<dyn RecommendationExtractor>,
    places: Arc<dyn PlaceResolver>,
}

impl RecommendationResolver {
    pub fn new(extractor: Arc<dyn RecommendationExtractor>, places: Arc<dyn PlaceResolver>) -> Self {
        Self { extractor, places }
    }

    /// Returns the resolved venues for one video. Mentions that fail to
    /// geocode are dropped with a warning; an extractor failure degrades
    /// to "no venues" rather than failing the video.
    #[instrument(skip_all)]
    pub async fn resolve(&self, caption: &str, extracted: &ExtractedText) -> Result<Vec<ResolvedMention>> {
        // Nothing to analyze: skip the external call entirely.
        if caption.is_empty() && extracted.transcript.is_empty() && extracted.on_frame_text.is_empty() {
            info!("All text inputs empty, skipping recommendation extraction");
            return Ok(Vec::new());
        }

        let response = match self
            .extractor
            .extract(caption, &extracted.on_frame_text, &extracted.transcript)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                counter!("foodreel_extractor_failures_total").increment(1);
                warn!("Recommendation extraction failed: {}", e);
                return Ok(Vec::new());
            }
        };

        let mentions = parse_mentions(&response);
        if mentions.is_empty() {
            info!("No venue mentions in extractor response");
            return Ok(Vec::new());
        }
        info!("Extractor returned {} mention(s)", mentions.len());

        let mut resolved = Vec::new();
        for mention in mentions {
            match self.places.resolve(&mention.raw).await {
                Ok(Some(place)) => {
                    info!("Resolved '{}' to {}", mention.raw, place.name);
                    resolved.push(ResolvedMention { mention, place });
                }
                Ok(None) => {
                    counter!("foodreel_geocode_misses_total").increment(1);
                    warn!("No geocoding result for mention '{}'", mention.raw);
                }
                Err(e) => {
                    counter!("foodreel_geocode_failures_total").increment(1);
                    warn!("Geocoding failed for mention '{}': {}", mention.raw, e);
                }
            }
        }

        Ok(resolved)
    }
}
