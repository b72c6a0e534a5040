//! Interfaces to the external services the engine consumes but never implements.
//!
//! Both are best-effort. A failure is logged by the caller and never rolls back or fails the operation that triggered
//! it.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::NotificationEvent;

#[derive(Debug, Clone, Error)]
pub enum ExternalServiceError {
    #[error("{0} is not configured")]
    NotConfigured(String),
    #[error("Request to {service} failed. {reason}")]
    RequestFailed { service: String, reason: String },
    #[error("Unexpected response from {service}. {reason}")]
    InvalidResponse { service: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns a point only when both coordinates are known.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        latitude.zip(longitude).map(|(lat, lon)| Self::new(lat, lon))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

impl RouteEstimate {
    pub fn eta_minutes(&self) -> i64 {
        #[allow(clippy::cast_possible_truncation)]
        let minutes = (self.duration_seconds / 60.0).round() as i64;
        minutes
    }
}

/// Delivers push notifications to users' devices.
#[allow(async_fn_in_trait)]
pub trait NotificationGateway {
    async fn notify(&self, notification: &NotificationEvent) -> Result<(), ExternalServiceError>;
}

/// Driving distance and duration between two points. Used for display only.
#[allow(async_fn_in_trait)]
pub trait RoutePlanner {
    /// `Ok(None)` means the service answered but had no route.
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<Option<RouteEstimate>, ExternalServiceError>;
}

/// A route planner for deployments without one. ETAs are always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRoutePlanner;

impl RoutePlanner for NoRoutePlanner {
    async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> Result<Option<RouteEstimate>, ExternalServiceError> {
        Ok(None)
    }
}
