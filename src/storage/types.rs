use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::data::types::{OrderDraft, OrderId};

/// Authenticated rider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// What the rider was about to submit, saved before the create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub pickup_address: String,
    pub dropoff_address: String,
    pub price: f64,
    pub distance_km: f64,
    pub estimated_time_min: String,
    pub passengers: u32,
    pub comment: String,
    /// Unix millis.
    pub timestamp: i64,
}

impl DraftSnapshot {
    pub fn from_draft(draft: &OrderDraft, at: DateTime<Utc>) -> Self {
        Self {
            pickup_address: draft.pickup.text.clone(),
            dropoff_address: draft.dropoff.text.clone(),
            price: draft.estimate.price,
            distance_km: draft.estimate.distance_km,
            estimated_time_min: draft.estimate.estimated_time.clone(),
            passengers: draft.passengers,
            comment: draft.comment.clone(),
            timestamp: at.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveOrder {
    pub order_id: OrderId,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub price: f64,
    pub distance_km: f64,
    pub estimated_time: String,
    pub passengers: u32,
    pub driver_name: String,
    pub created_at: DateTime<Utc>,
}

impl ActiveOrder {
    pub fn new(order_id: OrderId, draft: &OrderDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id,
            pickup_address: draft.pickup.text.clone(),
            dropoff_address: draft.dropoff.text.clone(),
            price: draft.estimate.price,
            distance_km: draft.estimate.distance_km,
            estimated_time: draft.estimate.estimated_time.clone(),
            passengers: draft.passengers,
            driver_name: "Водитель".to_string(),
            created_at,
        }
    }
}

/// One completed order in the rider's local history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub date: String,
    pub from: String,
    pub to: String,
    pub price: String,
    pub distance: String,
    pub status: String,
    pub driver: String,
    pub order_id: OrderId,
}
