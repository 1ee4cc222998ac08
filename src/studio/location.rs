//! Location resolution for maps-grounded generation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::studio::error::StudioError;
use crate::studio::types::Coordinates;

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("location lookup failed: {0}")]
    Lookup(String),
    #[error("location service returned invalid coordinates")]
    InvalidCoordinates,
}

/// Single-shot position query.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Resolve the caller's coordinates once. No retry, no caching.
pub async fn resolve_location(
    provider: Option<&dyn LocationProvider>,
) -> Result<Coordinates, StudioError> {
    let provider = provider.ok_or(StudioError::GeolocationUnavailable)?;
    let coords = provider
        .current_position()
        .await
        .map_err(|e| StudioError::GeolocationDenied(e.to_string()))?;
    info!("📍 Location resolved: {:.4}, {:.4}", coords.latitude, coords.longitude);
    Ok(coords)
}

pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// Coordinates known up front (config file or command line).
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

/// Approximate position from an IP geolocation endpoint.
///
/// The endpoint must answer with a JSON object carrying `latitude` and
/// `longitude` numbers.
pub struct IpLocation {
    endpoint: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct IpLookupResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl IpLocation {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }
}

#[async_trait]
impl LocationProvider for IpLocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        let response = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| LocationError::Lookup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocationError::Lookup(format!("HTTP {status}")));
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Lookup(e.to_string()))?;
        debug!("IP lookup answered lat={:?} lng={:?}", body.latitude, body.longitude);

        match (body.latitude, body.longitude) {
            (Some(latitude), Some(longitude)) if valid_coordinates(latitude, longitude) => {
                Ok(Coordinates { latitude, longitude })
            }
            _ => Err(LocationError::InvalidCoordinates),
        }
    }
}
