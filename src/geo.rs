use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeocodingConfig;
use crate::error::AppError;
use crate::users::repo_types::Location;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("no geocoding result")]
    NoMatch,
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geocoding service returned status {0}")]
    Status(String),
}

impl From<GeoError> for AppError {
    fn from(e: GeoError) -> Self {
        match e {
            GeoError::NoMatch => AppError::UnresolvedLocation,
            other => {
                warn!(error = %other, "geocoding failed");
                AppError::External(
                    "Location lookup is unavailable. Please try again later.".into(),
                )
            }
        }
    }
}

/// Resolves free-text city/country into a normalized place with coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, city: &str, country: &str) -> Result<Location, GeoError>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    address_components: Vec<AddressComponent>,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    types: Vec<String>,
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

// Most specific first.
const CITY_COMPONENTS: [&str; 3] = [
    "locality",
    "administrative_area_level_4",
    "administrative_area_level_2",
];

fn component<'a>(result: &'a GeocodeResult, kind: &str) -> Option<&'a str> {
    result
        .address_components
        .iter()
        .find(|c| c.types.iter().any(|t| t == kind))
        .map(|c| c.long_name.as_str())
}

fn to_location(response: GeocodeResponse, city: &str, country: &str) -> Result<Location, GeoError> {
    match response.status.as_str() {
        "" | "OK" | "ZERO_RESULTS" => {}
        other => return Err(GeoError::Status(other.to_string())),
    }
    let first = response.results.first().ok_or(GeoError::NoMatch)?;

    let city = CITY_COMPONENTS
        .iter()
        .find_map(|kind| component(first, kind))
        .unwrap_or(city);
    let country = component(first, "country").unwrap_or(country);
    let point = &first.geometry.location;

    Ok(Location {
        city: city.to_string(),
        country: country.to_string(),
        coordinates: [point.lng, point.lat],
    })
}

pub struct GoogleGeocoder {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GoogleGeocoder {
    pub fn new(config: &GeocodingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn resolve(&self, city: &str, country: &str) -> Result<Location, GeoError> {
        let address = format!("{city}, {country}");
        let response: GeocodeResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(status = %response.status, results = response.results.len(), "geocode response");
        to_location(response, city, country)
    }
}
