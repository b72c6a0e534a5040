use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{DeliveryTracking, OrderNumber, TrackingHistory, TrackingStatus},
    traits::{GeoPoint, RouteEstimate},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub status: Option<TrackingStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl LocationUpdate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, status: None, notes: None }
    }

    pub fn with_status(mut self, status: TrackingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Driver-reported statuses are restricted to the transit leg of the journey.
    pub fn is_permitted_status(status: TrackingStatus) -> bool {
        matches!(status, TrackingStatus::OnTheWay | TrackingStatus::Arrived | TrackingStatus::Delivered)
    }
}

/// Sent when the driver collects the order from the merchant. The driver's position is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupProof {
    pub latitude: f64,
    pub longitude: f64,
    /// Reference to the stored pickup photo. Opaque to the engine.
    #[serde(default)]
    pub pickup_photo: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PickupProof {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, pickup_photo: None, notes: None }
    }

    pub fn with_photo<S: Into<String>>(mut self, photo: S) -> Self {
        self.pickup_photo = Some(photo.into());
        self
    }
}

/// Sent when the driver hands the order over. The position and a photo of the handover are required; the recipient's
/// signature is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryProof {
    pub latitude: f64,
    pub longitude: f64,
    pub delivery_photo: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DeliveryProof {
    pub fn new<S: Into<String>>(latitude: f64, longitude: f64, delivery_photo: S) -> Self {
        Self { latitude, longitude, delivery_photo: delivery_photo.into(), signature: None, notes: None }
    }

    pub fn with_signature<S: Into<String>>(mut self, signature: S) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// The columns a driver transition may write, on top of the status itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingPatch {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
    pub pickup_photo: Option<String>,
    pub delivery_photo: Option<String>,
    pub signature: Option<String>,
}

impl From<&PickupProof> for TrackingPatch {
    fn from(p: &PickupProof) -> Self {
        Self {
            latitude: Some(p.latitude),
            longitude: Some(p.longitude),
            notes: p.notes.clone(),
            pickup_photo: p.pickup_photo.clone(),
            ..Default::default()
        }
    }
}

impl From<&DeliveryProof> for TrackingPatch {
    fn from(p: &DeliveryProof) -> Self {
        Self {
            latitude: Some(p.latitude),
            longitude: Some(p.longitude),
            notes: p.notes.clone(),
            delivery_photo: Some(p.delivery_photo.clone()),
            signature: p.signature.clone(),
            ..Default::default()
        }
    }
}

impl From<&LocationUpdate> for TrackingPatch {
    fn from(u: &LocationUpdate) -> Self {
        Self { latitude: Some(u.latitude), longitude: Some(u.longitude), notes: u.notes.clone(), ..Default::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSnapshot {
    pub id: i64,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub vehicle_number: Option<String>,
}

impl DriverSnapshot {
    pub fn from_tracking(tracking: &DeliveryTracking) -> Option<Self> {
        tracking.driver_id.map(|id| Self {
            id,
            name: tracking.driver_name.clone(),
            phone: tracking.driver_phone.clone(),
            vehicle_number: tracking.vehicle_number.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: TrackingStatus,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl From<&TrackingHistory> for TimelineEntry {
    fn from(h: &TrackingHistory) -> Self {
        Self {
            status: h.status,
            title: timeline_title(h.status),
            description: h.description.clone(),
            icon: timeline_icon(h.status).to_string(),
            latitude: h.latitude,
            longitude: h.longitude,
            timestamp: h.created_at,
        }
    }
}

fn timeline_title(status: TrackingStatus) -> String {
    use TrackingStatus::*;
    match status {
        WaitingDriver | DriverAssigned | OnTheWay | Arrived | Delivered => status.label().to_string(),
        other => title_case(&other.to_string()),
    }
}

fn timeline_icon(status: TrackingStatus) -> &'static str {
    match status {
        TrackingStatus::WaitingDriver => "time",
        TrackingStatus::DriverAssigned => "person",
        TrackingStatus::OnTheWay => "car",
        TrackingStatus::Arrived => "location",
        TrackingStatus::Delivered => "checkmark-done",
        _ => "information-circle",
    }
}

/// `waiting_merchant` becomes `Waiting Merchant`
fn title_case(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// What a customer sees when tracking an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingView {
    pub order_id: i64,
    pub order_number: OrderNumber,
    pub status: TrackingStatus,
    pub status_label: String,
    pub progress: u8,
    pub driver: Option<DriverSnapshot>,
    pub current_location: Option<GeoPoint>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    pub pickup_photo: Option<String>,
    pub delivery_photo: Option<String>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub timeline: Vec<TimelineEntry>,
}

impl TrackingView {
    pub fn new(order_number: OrderNumber, tracking: &DeliveryTracking, histories: &[TrackingHistory]) -> Self {
        Self {
            order_id: tracking.order_id,
            order_number,
            status: tracking.status,
            status_label: tracking.status.label().to_string(),
            progress: tracking.status.progress(),
            driver: DriverSnapshot::from_tracking(tracking),
            current_location: GeoPoint::from_parts(tracking.current_latitude, tracking.current_longitude),
            estimated_delivery_at: tracking.estimated_delivery_at,
            pickup_photo: tracking.pickup_photo.clone(),
            delivery_photo: tracking.delivery_photo.clone(),
            picked_up_at: tracking.picked_up_at,
            delivered_at: tracking.delivered_at,
            timeline: histories.iter().map(TimelineEntry::from).collect(),
        }
    }
}

/// The driver's live position, with a display-only ETA to the delivery address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverLocation {
    pub order_id: i64,
    pub status: TrackingStatus,
    pub driver: Option<DriverSnapshot>,
    pub location: GeoPoint,
    pub destination: Option<GeoPoint>,
    pub distance_meters: Option<f64>,
    pub eta_seconds: Option<f64>,
    pub eta_minutes: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl DriverLocation {
    pub fn with_route(mut self, route: Option<RouteEstimate>) -> Self {
        self.distance_meters = route.map(|r| r.distance_meters);
        self.eta_seconds = route.map(|r| r.duration_seconds);
        self.eta_minutes = route.map(|r| r.eta_minutes());
        self
    }
}
