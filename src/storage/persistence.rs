use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use crate::data::order_api::{ApiError, OrderApi};
use crate::data::types::OrderSummary;
use crate::storage::types::{ActiveOrder, DraftSnapshot, HistoryEntry, UserRecord};

pub const USER_KEY: &str = "tg_user";
pub const LAST_DRAFT_KEY: &str = "last_order_data";
pub const ACTIVE_ORDER_KEY: &str = "activeOrderData";
pub const HISTORY_KEY: &str = "orderHistory";

/// Server statuses under which a stored active order is still in play.
const LIVE_ORDER_STATUSES: [&str; 2] = ["pending", "accepted"];

/// Client-side records, each an opaque JSON blob under a fixed key.
pub struct ClientStore {
    conn: Connection,
    history_limit: usize,
}

impl ClientStore {
    pub fn new(db_path: &str, history_limit: usize) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open client store: {}", db_path))?;
        Self::init(conn, history_limit)
    }

    #[cfg(test)]
    pub fn in_memory(history_limit: usize) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, history_limit)
    }

    fn init(conn: Connection, history_limit: usize) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            "#
        )?;

        Ok(Self { conn, history_limit })
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self.conn
            .query_row("SELECT value FROM records WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;

        raw.map(|json| {
            serde_json::from_str(&json).with_context(|| format!("Corrupt record under {}", key))
        })
        .transpose()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM records WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn user(&self) -> Result<Option<UserRecord>> {
        self.get(USER_KEY)
    }

    pub fn save_user(&self, user: &UserRecord) -> Result<()> {
        self.put(USER_KEY, user)
    }

    pub fn save_last_draft(&self, draft: &DraftSnapshot) -> Result<()> {
        self.put(LAST_DRAFT_KEY, draft)
    }

    pub fn last_draft(&self) -> Result<Option<DraftSnapshot>> {
        self.get(LAST_DRAFT_KEY)
    }

    pub fn save_active_order(&self, order: &ActiveOrder) -> Result<()> {
        self.put(ACTIVE_ORDER_KEY, order)
    }

    pub fn active_order(&self) -> Result<Option<ActiveOrder>> {
        self.get(ACTIVE_ORDER_KEY)
    }

    pub fn clear_active_order(&self) -> Result<()> {
        self.remove(ACTIVE_ORDER_KEY)
    }

    /// Newest first, oldest evicted past the limit. Returns the new length.
    pub fn push_history(&self, entry: HistoryEntry) -> Result<usize> {
        let mut history = self.history()?;
        history.insert(0, entry);
        history.truncate(self.history_limit);
        self.put(HISTORY_KEY, &history)?;
        Ok(history.len())
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        match self.get::<Vec<HistoryEntry>>(HISTORY_KEY) {
            Ok(history) => Ok(history.unwrap_or_default()),
            Err(e) => {
                warn!("Discarding unreadable order history: {:#}", e);
                Ok(Vec::new())
            }
        }
    }
}

/// Check what a previous run left behind against the server. Returns the
/// stored active order when the server still has it in play; a finished or
/// unknown order is cleared locally.
pub async fn recover_from_restart(
    store: &ClientStore,
    api: &dyn OrderApi,
) -> Result<Option<OrderSummary>> {
    let mut live = None;

    if let Some(active) = store.active_order()? {
        info!(
            "Active order from previous session: #{} {} -> {}",
            active.order_id, active.pickup_address, active.dropoff_address
        );

        match api.get_order(&active.order_id).await {
            Ok(order) if LIVE_ORDER_STATUSES.contains(&order.status.as_str()) => {
                info!("Order #{} is still {} on the server", order.id, order.status);
                live = Some(order);
            }
            Ok(order) => {
                info!("Order #{} is {}, clearing local active order", order.id, order.status);
                store.clear_active_order()?;
            }
            Err(ApiError::Status { status: 404, .. }) => {
                warn!("Order #{} is unknown to the server, clearing it", active.order_id);
                store.clear_active_order()?;
            }
            Err(e) => warn!("Could not check order #{}: {}", active.order_id, e),
        }
    }

    if let Some(draft) = store.last_draft()? {
        info!(
            "Last submitted draft: {} -> {} ({:.2} ₽)",
            draft.pickup_address, draft.dropoff_address, draft.price
        );
    }

    info!("Order history: {} entries", store.history()?.len());
    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::{order_summary, ScriptedOrderApi};
    use crate::data::types::OrderId;

    fn entry(n: i64) -> HistoryEntry {
        HistoryEntry {
            id: format!("order_{}", n),
            date: "01.02.2026, 10:00".to_string(),
            from: "Ленина 1".to_string(),
            to: "Мира 5".to_string(),
            price: "150 ₽".to_string(),
            distance: "5".to_string(),
            status: "completed".to_string(),
            driver: "Ivan".to_string(),
            order_id: OrderId::from(n),
        }
    }

    #[test]
    fn test_history_is_newest_first_and_capped() {
        let store = ClientStore::in_memory(10).unwrap();
        for n in 1..=10 {
            assert_eq!(store.push_history(entry(n)).unwrap(), n as usize);
        }

        assert_eq!(store.push_history(entry(11)).unwrap(), 10);

        let history = store.history().unwrap();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].order_id, OrderId::from(11));
        assert_eq!(history[9].order_id, OrderId::from(2));
    }

    #[test]
    fn test_records_round_trip_under_fixed_keys() {
        let store = ClientStore::in_memory(10).unwrap();
        assert!(store.user().unwrap().is_none());

        let user = UserRecord {
            id: 77,
            first_name: Some("Анна".to_string()),
            username: None,
        };
        store.save_user(&user).unwrap();
        assert_eq!(store.user().unwrap(), Some(user));

        let raw: String = store.conn
            .query_row("SELECT value FROM records WHERE key = ?1", params![USER_KEY], |row| row.get(0))
            .unwrap();
        assert!(raw.contains("\"id\":77"));
    }

    #[test]
    fn test_active_order_is_camel_case() {
        let store = ClientStore::in_memory(10).unwrap();
        let order = ActiveOrder {
            order_id: OrderId::from(42),
            pickup_address: "a".to_string(),
            dropoff_address: "b".to_string(),
            price: 150.0,
            distance_km: 5.0,
            estimated_time: "15 минут".to_string(),
            passengers: 1,
            driver_name: "Водитель".to_string(),
            created_at: Utc::now(),
        };
        store.save_active_order(&order).unwrap();

        let raw: String = store.conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![ACTIVE_ORDER_KEY],
                |row| row.get(0),
            )
            .unwrap();
        assert!(raw.contains("\"orderId\":42"));

        store.clear_active_order().unwrap();
        assert!(store.active_order().unwrap().is_none());
    }

    fn store_with_active(id: i64) -> ClientStore {
        let store = ClientStore::in_memory(10).unwrap();
        store
            .save_active_order(&ActiveOrder {
                order_id: OrderId::from(id),
                pickup_address: "ул. Ленина, 1".to_string(),
                dropoff_address: "пр. Мира, 5".to_string(),
                price: 150.0,
                distance_km: 5.0,
                estimated_time: "15 минут".to_string(),
                passengers: 1,
                driver_name: "Водитель".to_string(),
                created_at: Utc::now(),
            })
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_recovery_keeps_order_still_in_play() {
        let store = store_with_active(42);
        let api = ScriptedOrderApi::new().on_get(Ok(order_summary(42, "accepted")));

        let live = recover_from_restart(&store, &api).await.unwrap();

        assert_eq!(live.map(|o| o.status), Some("accepted".to_string()));
        assert!(store.active_order().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_recovery_clears_finished_or_unknown_orders() {
        let store = store_with_active(42);
        let api = ScriptedOrderApi::new().on_get(Ok(order_summary(42, "completed")));
        assert!(recover_from_restart(&store, &api).await.unwrap().is_none());
        assert!(store.active_order().unwrap().is_none());

        // Default lookup answers 404.
        let store = store_with_active(43);
        let api = ScriptedOrderApi::new();
        assert!(recover_from_restart(&store, &api).await.unwrap().is_none());
        assert!(store.active_order().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recovery_keeps_record_when_server_unreachable() {
        let store = store_with_active(42);
        let api = ScriptedOrderApi::new().on_get(Err(ApiError::Rejected("timeout".to_string())));

        assert!(recover_from_restart(&store, &api).await.unwrap().is_none());
        assert!(store.active_order().unwrap().is_some());
    }

    #[test]
    fn test_corrupt_history_reads_as_empty() {
        let store = ClientStore::in_memory(10).unwrap();
        store.put(HISTORY_KEY, &"not a list").unwrap();

        assert!(store.history().unwrap().is_empty());
        assert_eq!(store.push_history(entry(1)).unwrap(), 1);
    }
}
