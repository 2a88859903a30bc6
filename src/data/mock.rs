//! Scripted test doubles for the order backend and the geocoder.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use crate::data::geocoder::Geocoder;
use crate::data::order_api::{ApiError, OrderApi};
use crate::data::types::{Bid, Coordinates, CreateOrderRequest, OrderDetails, OrderId, OrderSummary};

/// Replays queued outcomes in order; an exhausted queue falls back to a
/// benign default (order 42, no bids, accept without details).
#[derive(Default)]
pub struct ScriptedOrderApi {
    create: Mutex<VecDeque<Result<OrderId, ApiError>>>,
    bids: Mutex<VecDeque<Result<Vec<Bid>, ApiError>>>,
    accept: Mutex<VecDeque<Result<Option<OrderDetails>, ApiError>>>,
    lookups: Mutex<VecDeque<Result<OrderSummary, ApiError>>>,
    pub created: Mutex<Vec<CreateOrderRequest>>,
    pub accepted: Mutex<Vec<(OrderId, i64)>>,
    pub cancelled: Mutex<Vec<(OrderId, String)>>,
    bid_fetches: AtomicUsize,
}

impl ScriptedOrderApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(self, outcome: Result<OrderId, ApiError>) -> Self {
        self.create.lock().unwrap().push_back(outcome);
        self
    }

    pub fn on_bids(self, outcome: Result<Vec<Bid>, ApiError>) -> Self {
        self.bids.lock().unwrap().push_back(outcome);
        self
    }

    pub fn on_accept(self, outcome: Result<Option<OrderDetails>, ApiError>) -> Self {
        self.accept.lock().unwrap().push_back(outcome);
        self
    }

    pub fn on_get(self, outcome: Result<OrderSummary, ApiError>) -> Self {
        self.lookups.lock().unwrap().push_back(outcome);
        self
    }

    pub fn bid_fetches(&self) -> usize {
        self.bid_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderApi for ScriptedOrderApi {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderId, ApiError> {
        self.created.lock().unwrap().push(request.clone());
        self.create
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(OrderId::from(42)))
    }

    async fn fetch_bids(&self, _order_id: &OrderId) -> Result<Vec<Bid>, ApiError> {
        self.bid_fetches.fetch_add(1, Ordering::SeqCst);
        self.bids.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn accept_bid(
        &self,
        order_id: &OrderId,
        driver_id: i64,
    ) -> Result<Option<OrderDetails>, ApiError> {
        self.accepted.lock().unwrap().push((order_id.clone(), driver_id));
        self.accept.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<(), ApiError> {
        self.cancelled
            .lock()
            .unwrap()
            .push((order_id.clone(), reason.to_string()));
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<OrderSummary, ApiError> {
        self.lookups.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ApiError::Status {
                status: 404,
                detail: format!("Заказ {} не найден", order_id),
            })
        })
    }
}

/// Resolves only the addresses it was given.
#[derive(Default)]
pub struct FixedGeocoder {
    known: HashMap<String, Coordinates>,
    calls: AtomicUsize,
}

impl FixedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: &str, coords: Coordinates) -> Self {
        self.known.insert(address.to_string(), coords);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn resolve(&self, address: &str) -> Option<Coordinates> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.known.get(address.trim()).copied()
    }
}

pub fn order_summary(id: i64, status: &str) -> OrderSummary {
    OrderSummary {
        id: OrderId::from(id),
        status: status.to_string(),
        pickup_address: "ул. Ленина, 1".to_string(),
        dropoff_address: "пр. Мира, 5".to_string(),
        driver_id: Some(7),
        comment: None,
        driver_arrived: false,
    }
}

pub fn sample_bid() -> Bid {
    Bid {
        driver_id: 7,
        driver_name: Some("Ivan".to_string()),
        car_brand: "Toyota".to_string(),
        car_number: "A123".to_string(),
        arrival_minutes: 4,
        has_co_driver: false,
        driver_rating: None,
    }
}

/// Serve one canned JSON response per connection on a loopback port and
/// return its base URL. Connections past the last response are refused.
pub async fn serve_canned(responses: Vec<(u16, &'static str)>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            read_request(&mut socket).await;

            let reason = reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("");
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                return;
            }
        }
    }

    format!("http://{}", addr)
}
