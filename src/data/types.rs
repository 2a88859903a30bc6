use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Free-text address with best-effort resolved coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub text: String,
    pub coords: Option<Coordinates>,
}

impl Address {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            coords: None,
        }
    }
}

/// Server-issued order identifier. The backend sends integers, but nothing
/// on this side depends on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(String);

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for OrderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Keep numeric ids numeric so stored records match what the backend sent.
        match self.0.parse::<i64>() {
            Ok(n) if n.to_string() == self.0 => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Scalar::deserialize(deserializer)? {
            Scalar::Number(n) if n.fract() == 0.0 => Ok(Self((n as i64).to_string())),
            Scalar::Number(n) => Ok(Self(n.to_string())),
            Scalar::Text(s) => Ok(Self(s)),
        }
    }
}

/// A JSON value the backend sends as either a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

fn default_arrival_minutes() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub driver_id: i64,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub car_brand: String,
    #[serde(default)]
    pub car_number: String,
    #[serde(default = "default_arrival_minutes")]
    pub arrival_minutes: u32,
    #[serde(default)]
    pub has_co_driver: bool,
    #[serde(default)]
    pub driver_rating: Option<f64>,
}

/// What the backend reports once a driver has been accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub driver_name: String,
    pub estimated_arrival: Scalar,
    #[serde(default)]
    pub price: Option<Scalar>,
    pub order_id: OrderId,
}

/// Price, distance and duration as shown to the rider before submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEstimate {
    pub price: f64,
    pub distance_km: f64,
    pub estimated_time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub pickup: Address,
    pub dropoff: Address,
    pub passengers: u32,
    pub comment: String,
    pub estimate: RouteEstimate,
}

/// Body of `POST /api/web/order/create`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub client_id: i64,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub comment: String,
    pub passengers: u32,
    pub price: f64,
    pub distance_km: f64,
    pub estimated_time_min: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lon: Option<f64>,
    pub dropoff_lat: Option<f64>,
    pub dropoff_lon: Option<f64>,
}

impl CreateOrderRequest {
    pub fn from_draft(client_id: i64, draft: &OrderDraft) -> Self {
        Self {
            client_id,
            pickup_address: draft.pickup.text.clone(),
            dropoff_address: draft.dropoff.text.clone(),
            comment: draft.comment.clone(),
            passengers: draft.passengers,
            price: draft.estimate.price,
            distance_km: draft.estimate.distance_km,
            estimated_time_min: draft.estimate.estimated_time.clone(),
            pickup_lat: draft.pickup.coords.map(|c| c.lat),
            pickup_lon: draft.pickup.coords.map(|c| c.lng),
            dropoff_lat: draft.dropoff.coords.map(|c| c.lat),
            dropoff_lon: draft.dropoff.coords.map(|c| c.lng),
        }
    }
}

/// Server-side view of an order, as returned by `GET /api/web/order/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub driver_arrived: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_accepts_number_or_string() {
        let id: OrderId = serde_json::from_str("42").unwrap();
        assert_eq!(id, OrderId::from(42));

        let id: OrderId = serde_json::from_str("\"abc-1\"").unwrap();
        assert_eq!(id.to_string(), "abc-1");

        assert_eq!(serde_json::to_string(&OrderId::from(42)).unwrap(), "42");
    }

    #[test]
    fn test_order_id_keeps_leading_zeros() {
        let id = OrderId::from("007");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"007\"");

        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(serde_json::to_string(&OrderId::from("-3")).unwrap(), "-3");
    }

    #[test]
    fn test_bid_tolerates_missing_optional_fields() {
        let bid: Bid = serde_json::from_str(
            r#"{"driver_id": 7, "car_brand": "Toyota", "car_number": "A123"}"#,
        )
        .unwrap();

        assert_eq!(bid.driver_name, None);
        assert_eq!(bid.arrival_minutes, 5);
        assert!(!bid.has_co_driver);
    }

    #[test]
    fn test_create_request_sends_null_for_unknown_coordinates() {
        let draft = OrderDraft {
            pickup: Address {
                text: "Lenina 1".to_string(),
                coords: Some(Coordinates { lat: 55.0, lng: 37.0 }),
            },
            dropoff: Address::new("Mira 5"),
            passengers: 1,
            comment: String::new(),
            estimate: RouteEstimate {
                price: 150.0,
                distance_km: 5.0,
                estimated_time: "15 минут".to_string(),
            },
        };

        let body = serde_json::to_value(CreateOrderRequest::from_draft(9, &draft)).unwrap();
        assert_eq!(body["pickup_lat"], 55.0);
        assert!(body["dropoff_lat"].is_null());
        assert!(body["dropoff_lon"].is_null());
        assert_eq!(body["estimated_time_min"], "15 минут");
    }
}
