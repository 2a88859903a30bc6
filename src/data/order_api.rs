use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::config::ApiConfig;
use crate::data::types::{Bid, CreateOrderRequest, OrderDetails, OrderId, OrderSummary};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Сетевая ошибка: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Ошибка сервера: {status} {detail}")]
    Status { status: u16, detail: String },

    #[error("{0}")]
    Rejected(String),

    #[error("Некорректный ответ сервера: {0}")]
    Decode(String),
}

/// Backend order API, as seen from the rider's side.
#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderId, ApiError>;

    async fn fetch_bids(&self, order_id: &OrderId) -> Result<Vec<Bid>, ApiError>;

    /// `Ok(None)` means the backend accepted without echoing order details.
    async fn accept_bid(
        &self,
        order_id: &OrderId,
        driver_id: i64,
    ) -> Result<Option<OrderDetails>, ApiError>;

    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<(), ApiError>;

    async fn get_order(&self, order_id: &OrderId) -> Result<OrderSummary, ApiError>;
}

pub struct HttpOrderApi {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    order_id: Option<OrderId>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BidsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    bids: Vec<Bid>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AcceptResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    order_details: Option<OrderDetails>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    order: Option<OrderSummary>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct AcceptRequest {
    driver_id: i64,
}

#[derive(Debug, Serialize)]
struct CancelRequest<'a> {
    reason: &'a str,
}

impl HttpOrderApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.resolved_base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/web/{}", self.base_url, path)
    }
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderId, ApiError> {
        let response = self.client
            .post(self.url("order/create"))
            .json(request)
            .send()
            .await?;

        let body: CreateOrderResponse = decode(response).await?;
        match body {
            CreateOrderResponse { success: true, order_id: Some(id), .. } => Ok(id),
            CreateOrderResponse { message, .. } => Err(ApiError::Rejected(
                message.unwrap_or_else(|| "Ошибка при создании заказа".to_string()),
            )),
        }
    }

    async fn fetch_bids(&self, order_id: &OrderId) -> Result<Vec<Bid>, ApiError> {
        let response = self.client
            .get(self.url(&format!("order/{}/bids", order_id)))
            .send()
            .await?;

        let body: BidsResponse = decode(response).await?;
        if !body.success {
            return Err(ApiError::Rejected(
                body.message.unwrap_or_else(|| "Ошибка при получении откликов".to_string()),
            ));
        }

        debug!("Order {}: {} bids", order_id, body.bids.len());
        Ok(body.bids)
    }

    async fn accept_bid(
        &self,
        order_id: &OrderId,
        driver_id: i64,
    ) -> Result<Option<OrderDetails>, ApiError> {
        let response = self.client
            .post(self.url(&format!("order/{}/accept", order_id)))
            .json(&AcceptRequest { driver_id })
            .send()
            .await?;

        let body: AcceptResponse = decode(response).await?;
        if body.success {
            Ok(body.order_details)
        } else {
            Err(ApiError::Rejected(
                body.message.unwrap_or_else(|| "Ошибка при выборе водителя".to_string()),
            ))
        }
    }

    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<(), ApiError> {
        let response = self.client
            .post(self.url(&format!("order/{}/cancel", order_id)))
            .json(&CancelRequest { reason })
            .send()
            .await?;

        let body: ActionResponse = decode(response).await?;
        if body.success {
            Ok(())
        } else {
            Err(ApiError::Rejected(
                body.message.unwrap_or_else(|| "Ошибка при отмене заказа".to_string()),
            ))
        }
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<OrderSummary, ApiError> {
        let response = self.client
            .get(self.url(&format!("order/{}", order_id)))
            .send()
            .await?;

        let body: OrderResponse = decode(response).await?;
        match body {
            OrderResponse { success: true, order: Some(order), .. } => Ok(order),
            OrderResponse { message, .. } => Err(ApiError::Rejected(
                message.unwrap_or_else(|| "Заказ не найден".to_string()),
            )),
        }
    }
}

/// Decode a successful body, or turn an HTTP error into `ApiError::Status`
/// carrying the server's `detail` when it sent one.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            detail: error_detail(status, &body),
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

fn error_detail(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        });

    detail.unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string())
}
