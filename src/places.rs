//! Google Places "nearby search" client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::PlacesConfig;
use crate::error::PlacesError;
use crate::geo::Coordinate;
use crate::model::Venue;
use crate::resolver::{PlacesQuery, PlacesService};

pub struct GooglePlaces {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl GooglePlaces {
    pub fn new(config: &PlacesConfig) -> Result<Self, PlacesError> {
        let http = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn params(&self, query: &PlacesQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            (
                "location",
                format!("{},{}", query.origin.latitude, query.origin.longitude),
            ),
            ("rankby", query.rank_by.as_str().to_string()),
            ("type", query.category.clone()),
            ("key", self.api_key.clone()),
        ];
        if query.open_now {
            params.push(("opennow", "true".to_string()));
        }
        params
    }
}

#[async_trait]
impl PlacesService for GooglePlaces {
    async fn nearby_search(&self, query: &PlacesQuery) -> Result<Vec<Venue>, PlacesError> {
        let response: NearbySearchResponse = self
            .http
            .get(&self.endpoint)
            .query(&self.params(query))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(
            "Places status {} with {} results",
            response.status,
            response.results.len()
        );
        response.into_venues()
    }
}

#[derive(Debug, Deserialize)]
struct NearbySearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    name: String,
    geometry: Geometry,
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

impl NearbySearchResponse {
    fn into_venues(self) -> Result<Vec<Venue>, PlacesError> {
        match self.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(self
                .results
                .into_iter()
                .map(|place| {
                    let location = place.geometry.location;
                    Venue::new(place.name, Coordinate::new(location.lat, location.lng))
                })
                .collect()),
            _ => Err(PlacesError::Status {
                message: self
                    .error_message
                    .unwrap_or_else(|| "no error message".to_string()),
                status: self.status,
            }),
        }
    }
}
