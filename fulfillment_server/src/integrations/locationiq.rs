use std::sync::Arc;

use fulfillment_engine::traits::{ExternalServiceError, GeoPoint, RouteEstimate, RoutePlanner};
use log::*;
use reqwest::Client;
use serde_json::Value;

use crate::config::RoutingConfig;

pub const DEFAULT_LOCATIONIQ_URL: &str = "https://us1.locationiq.com/v1";
const SERVICE: &str = "LocationIQ";

/// Driving directions from LocationIQ, used for the driver ETA shown to customers.
#[derive(Clone)]
pub struct LocationIqRouter {
    config: RoutingConfig,
    client: Arc<Client>,
}

impl LocationIqRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config, client: Arc::new(Client::new()) }
    }

    /// LocationIQ takes coordinates as `lon,lat` pairs.
    pub fn directions_url(&self, from: GeoPoint, to: GeoPoint) -> String {
        format!(
            "{}/directions/driving/{},{};{},{}",
            self.config.base_url.trim_end_matches('/'),
            from.longitude,
            from.latitude,
            to.longitude,
            to.latitude
        )
    }
}

impl RoutePlanner for LocationIqRouter {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<Option<RouteEstimate>, ExternalServiceError> {
        if !self.config.is_configured() {
            return Err(ExternalServiceError::NotConfigured(SERVICE.into()));
        }
        let url = self.directions_url(from, to);
        trace!("🗺️ Requesting route: {url}");
        let response = self
            .client
            .get(url)
            .query(&[("key", self.config.api_key.reveal().as_str()), ("overview", "false")])
            .send()
            .await
            .map_err(|e| ExternalServiceError::RequestFailed { service: SERVICE.into(), reason: e.to_string() })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExternalServiceError::RequestFailed { service: SERVICE.into(), reason: format!("HTTP {status}") });
        }
        let body = response.json::<Value>().await.map_err(|e| ExternalServiceError::InvalidResponse {
            service: SERVICE.into(),
            reason: e.to_string(),
        })?;
        let route = parse_route(&body);
        if route.is_none() {
            debug!("🗺️ {SERVICE} returned no route");
        }
        Ok(route)
    }
}

/// The first route's distance (metres) and duration (seconds), if there is one.
fn parse_route(body: &Value) -> Option<RouteEstimate> {
    let route = body.get("routes")?.get(0)?;
    let distance_meters = route.get("distance")?.as_f64()?;
    let duration_seconds = route.get("duration")?.as_f64()?;
    Some(RouteEstimate { distance_meters, duration_seconds })
}
