//! Geocoding against the Places HTTP API: free-text search to find the
//! place, then a details fetch for the fields the venue store keeps.

use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;
use crate::types::{PlaceDetails, PlaceResolver};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    place_id: String,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<DetailsResult>,
}

#[derive(Debug, Deserialize)]
struct DetailsResult {
    name: String,
    #[serde(default)]
    formatted_address: Option<String>,
    geometry: Geometry,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    price_level: Option<u8>,
    #[serde(default)]
    formatted_phone_number: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    opening_hours: Option<OpeningHours>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct OpeningHours {
    #[serde(default)]
    weekday_text: Option<Vec<String>>,
}

impl DetailsResult {
    fn into_place_details(self) -> PlaceDetails {
        PlaceDetails {
            name: self.name,
            address: self.formatted_address.unwrap_or_default(),
            latitude: self.geometry.location.lat,
            longitude: self.geometry.location.lng,
            rating: self.rating,
            price_level: self.price_level,
            phone: self.formatted_phone_number,
            website: self.website,
            map_link: self.url,
            hours: self.opening_hours.and_then(|h| h.weekday_text),
        }
    }
}

const DETAIL_FIELDS: &str = "name,formatted_address,geometry/location,rating,price_level,\
                             formatted_phone_number,opening_hours,website,url";

pub struct GooglePlacesResolver {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl GooglePlacesResolver {
    pub fn new(base_url: String, retry: RetryPolicy) -> Result<Self> {
        let api_key = std::env::var("GOOGLE_MAPS_API_KEY")?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            retry,
        })
    }

    async fn text_search(&self, query: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/textsearch/json", self.base_url))
            .query(&[("query", query), ("key", &self.api_key)])
            .send()
            .await?
            .error_for_status()?;
        let body: TextSearchResponse = response.json().await?;

        match body.status.as_str() {
            "OK" => Ok(body.results.into_iter().next().map(|r| r.place_id)),
            "ZERO_RESULTS" => Ok(None),
            other => Err(PipelineError::Geocode {
                message: format!("text search returned status {other}"),
            }),
        }
    }

    async fn details(&self, place_id: &str) -> Result<PlaceDetails> {
        let response = self
            .client
            .get(format!("{}/details/json", self.base_url))
            .query(&[
                ("place_id", place_id),
                ("fields", DETAIL_FIELDS),
                ("key", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: DetailsResponse = response.json().await?;

        if body.status != "OK" {
            return Err(PipelineError::Geocode {
                message: format!("details returned status {}", body.status),
            });
        }
        body.result
            .map(DetailsResult::into_place_details)
            .ok_or_else(|| PipelineError::Geocode {
                message: "details returned OK with no result".to_string(),
            })
    }
}

#[async_trait]
impl PlaceResolver for GooglePlacesResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, query: &str) -> Result<Option<PlaceDetails>> {
        let place_id = self
            .retry
            .run("places text search", || self.text_search(query))
            .await?;

        let Some(place_id) = place_id else {
            warn!("No place found for query '{}'", query);
            return Ok(None);
        };

        let details = self
            .retry
            .run("places details", || self.details(&place_id))
            .await?;
        info!("Resolved '{}' to '{}'", query, details.name);
        Ok(Some(details))
    }
}
