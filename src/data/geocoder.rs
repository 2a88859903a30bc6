use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use crate::config::GeocoderConfig;
use crate::data::cache::GeocodeCache;
use crate::data::types::Coordinates;

/// Turns free-text addresses into coordinates. Resolution is best-effort:
/// every failure collapses to `None`.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, address: &str) -> Option<Coordinates>;
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    user_agent: String,
    cache: Arc<GeocodeCache>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig, cache: Arc<GeocodeCache>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            cache,
        }
    }

    async fn search(&self, address: &str) -> Result<Vec<NominatimPlace>> {
        let url = format!("{}/search", self.base_url);

        let places = self.client
            .get(&url)
            .query(&[("format", "json"), ("q", address)])
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .context("Failed to reach geocoder")?
            .json()
            .await
            .context("Failed to parse geocoder response")?;

        Ok(places)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, address: &str) -> Option<Coordinates> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }

        if let Some(coords) = self.cache.get(address) {
            debug!("Geocode cache hit for {:?}", address);
            return Some(coords);
        }

        let places = match self.search(address).await {
            Ok(places) => places,
            Err(e) => {
                warn!("Geocoding failed for {:?}: {:#}", address, e);
                return None;
            }
        };

        match places.first().and_then(first_match_coordinates) {
            Some(coords) => {
                self.cache.insert(address, coords);
                Some(coords)
            }
            None => {
                warn!("No coordinates found for address: {:?}", address);
                None
            }
        }
    }
}

fn first_match_coordinates(place: &NominatimPlace) -> Option<Coordinates> {
    let lat = place.lat.trim().parse::<f64>().ok()?;
    let lng = place.lon.trim().parse::<f64>().ok()?;
    Some(Coordinates { lat, lng })
}
