use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;
use crate::config::SimulatorConfig;
use crate::data::order_api::{ApiError, OrderApi};
use crate::data::types::{Bid, CreateOrderRequest, OrderDetails, OrderId, OrderSummary, Scalar};

const DRIVER_NAMES: [&str; 6] = ["Иван", "Алексей", "Марат", "Сергей", "Ринат", "Дмитрий"];
const CAR_BRANDS: [&str; 5] = ["Toyota", "Kia", "Hyundai", "Lada", "Skoda"];

/// In-process stand-in for the order backend. Drivers "respond" at random
/// while the order is being polled.
pub struct SimulatedOrderApi {
    config: SimulatorConfig,
    next_id: AtomicI64,
    orders: DashMap<OrderId, SimulatedOrder>,
}

struct SimulatedOrder {
    request: CreateOrderRequest,
    bids: Vec<Bid>,
    status: &'static str,
    driver_id: Option<i64>,
}

impl SimulatedOrderApi {
    pub fn new(config: SimulatorConfig) -> Self {
        info!(
            "Simulated backend initialized (bid rate {:.0}%, up to {} bids)",
            config.bid_rate * 100.0,
            config.max_bids
        );

        Self {
            config,
            next_id: AtomicI64::new(1000),
            orders: DashMap::new(),
        }
    }

    fn random_bid(existing: &[Bid]) -> Bid {
        let mut rng = rand::thread_rng();
        let driver_id = loop {
            let id = rng.gen_range(100..1000);
            if existing.iter().all(|b| b.driver_id != id) {
                break id;
            }
        };

        Bid {
            driver_id,
            driver_name: Some(DRIVER_NAMES[rng.gen_range(0..DRIVER_NAMES.len())].to_string()),
            car_brand: CAR_BRANDS[rng.gen_range(0..CAR_BRANDS.len())].to_string(),
            car_number: format!("А{:03}МР", rng.gen_range(1..1000)),
            arrival_minutes: rng.gen_range(2..15),
            has_co_driver: rng.gen_bool(0.1),
            driver_rating: Some(rng.gen_range(40..=50) as f64 / 10.0),
        }
    }

    fn roll(probability: f64) -> bool {
        rand::thread_rng().gen::<f64>() < probability
    }

    fn unknown(order_id: &OrderId) -> ApiError {
        ApiError::Status {
            status: 404,
            detail: format!("Заказ {} не найден", order_id),
        }
    }
}

#[async_trait]
impl OrderApi for SimulatedOrderApi {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderId, ApiError> {
        let id = OrderId::from(self.next_id.fetch_add(1, Ordering::SeqCst));
        info!(
            "Simulated order {} created: {} -> {} ({:.2} ₽)",
            id, request.pickup_address, request.dropoff_address, request.price
        );

        self.orders.insert(
            id.clone(),
            SimulatedOrder {
                request: request.clone(),
                bids: Vec::new(),
                status: "pending",
                driver_id: None,
            },
        );
        Ok(id)
    }

    async fn fetch_bids(&self, order_id: &OrderId) -> Result<Vec<Bid>, ApiError> {
        let mut order = self.orders
            .get_mut(order_id)
            .ok_or_else(|| Self::unknown(order_id))?;

        if order.status == "pending"
            && order.bids.len() < self.config.max_bids
            && Self::roll(self.config.bid_rate)
        {
            let bid = Self::random_bid(&order.bids);
            info!("Simulated driver {} responded to order {}", bid.driver_id, order_id);
            order.bids.push(bid);
        }

        Ok(order.bids.clone())
    }

    async fn accept_bid(
        &self,
        order_id: &OrderId,
        driver_id: i64,
    ) -> Result<Option<OrderDetails>, ApiError> {
        let mut order = self.orders
            .get_mut(order_id)
            .ok_or_else(|| Self::unknown(order_id))?;

        let bid = order.bids
            .iter()
            .find(|b| b.driver_id == driver_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 400,
                detail: "Невозможно принять водителя".to_string(),
            })?;

        if !Self::roll(self.config.accept_rate) {
            return Err(ApiError::Status {
                status: 400,
                detail: "Водитель уже выполняет другой заказ. Пожалуйста выберите другого."
                    .to_string(),
            });
        }

        order.status = "accepted";
        order.driver_id = Some(driver_id);

        Ok(Some(OrderDetails {
            driver_name: bid
                .driver_name
                .unwrap_or_else(|| format!("Водитель #{}", driver_id)),
            estimated_arrival: Scalar::Text(format!("{} мин", bid.arrival_minutes)),
            price: Some(Scalar::Number(order.request.price)),
            order_id: order_id.clone(),
        }))
    }

    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<(), ApiError> {
        let mut order = self.orders
            .get_mut(order_id)
            .ok_or_else(|| Self::unknown(order_id))?;

        info!("Simulated order {} cancelled: {}", order_id, reason);
        order.status = "cancelled";
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<OrderSummary, ApiError> {
        let order = self.orders
            .get(order_id)
            .ok_or_else(|| Self::unknown(order_id))?;

        Ok(OrderSummary {
            id: order_id.clone(),
            status: order.status.to_string(),
            pickup_address: order.request.pickup_address.clone(),
            dropoff_address: order.request.dropoff_address.clone(),
            driver_id: order.driver_id,
            comment: Some(order.request.comment.clone()),
            driver_arrived: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            client_id: 1,
            pickup_address: "Ленина 1".to_string(),
            dropoff_address: "Мира 5".to_string(),
            comment: String::new(),
            passengers: 1,
            price: 250.0,
            distance_km: 4.2,
            estimated_time_min: "12 минут".to_string(),
            pickup_lat: None,
            pickup_lon: None,
            dropoff_lat: None,
            dropoff_lon: None,
        }
    }

    fn eager() -> SimulatorConfig {
        SimulatorConfig {
            bid_rate: 1.0,
            max_bids: 2,
            accept_rate: 1.0,
        }
    }

    #[tokio::test]
    async fn test_bids_accumulate_up_to_limit() {
        let api = SimulatedOrderApi::new(eager());
        let id = api.create_order(&request()).await.unwrap();

        assert_eq!(api.fetch_bids(&id).await.unwrap().len(), 1);
        assert_eq!(api.fetch_bids(&id).await.unwrap().len(), 2);
        assert_eq!(api.fetch_bids(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_accept_returns_details() {
        let api = SimulatedOrderApi::new(eager());
        let id = api.create_order(&request()).await.unwrap();
        let bid = api.fetch_bids(&id).await.unwrap().remove(0);

        let details = api.accept_bid(&id, bid.driver_id).await.unwrap().unwrap();
        assert_eq!(details.order_id, id);
        assert_eq!(details.price, Some(Scalar::Number(250.0)));

        let summary = api.get_order(&id).await.unwrap();
        assert_eq!(summary.status, "accepted");
        assert_eq!(summary.driver_id, Some(bid.driver_id));
    }

    #[tokio::test]
    async fn test_unknown_driver_rejected() {
        let api = SimulatedOrderApi::new(eager());
        let id = api.create_order(&request()).await.unwrap();

        assert!(matches!(
            api.accept_bid(&id, 1).await,
            Err(ApiError::Status { status: 400, .. })
        ));
        assert!(api.fetch_bids(&OrderId::from(1)).await.is_err());
    }
}
