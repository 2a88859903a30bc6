//! Pure view descriptions. Nothing here touches the terminal; a `Screen`
//! decides how to show them.

use crate::data::types::{Bid, OrderDetails};

pub const WAITING_FOR_DRIVERS: &str = "Ожидание откликов водителей...";
pub const POLL_ERROR_NOTICE: &str =
    "Ошибка при получении откликов. Повторная попытка через 3 секунды...";

#[derive(Debug, Clone, PartialEq)]
pub struct DriverCard {
    pub driver_id: i64,
    pub initial: String,
    pub name: String,
    pub car: String,
    pub arrival: String,
    pub badges: Vec<String>,
}

impl DriverCard {
    pub fn from_bid(bid: &Bid) -> Self {
        let name = bid
            .driver_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Водитель #{}", bid.driver_id));

        let initial = bid
            .driver_name
            .as_deref()
            .and_then(|n| n.chars().next())
            .unwrap_or('В')
            .to_string();

        let mut badges = Vec::new();
        if let Some(rating) = bid.driver_rating {
            badges.push(format!("★ {:.1}", rating));
        }
        if bid.has_co_driver {
            badges.push("С напарником".to_string());
        }

        Self {
            driver_id: bid.driver_id,
            initial,
            name,
            car: format!("{} • {}", bid.car_brand, bid.car_number),
            arrival: format!("Прибытие: {} мин", bid.arrival_minutes),
            badges,
        }
    }
}

/// What the driver list area of the bid modal currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum BidBoard {
    Waiting,
    Drivers(Vec<DriverCard>),
    PollError,
}

impl BidBoard {
    pub fn from_bids(bids: &[Bid]) -> Self {
        BidBoard::Drivers(bids.iter().map(DriverCard::from_bid).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BidModalView {
    pub order_id: String,
    pub timer: String,
    pub board: BidBoard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Accepted,
    Cancelled,
}

/// A terminal screen: replaces everything else and offers a single action
/// that starts over.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub kind: ResultKind,
    pub title: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
    pub action: String,
}

/// Figures the accepted screen shows, merged from the server's answer and
/// what the rider saw before submitting.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedSummary {
    pub driver_name: String,
    pub estimated_arrival: String,
    pub price: String,
    pub distance: String,
    pub order_id: String,
}

impl AcceptedSummary {
    pub fn new(details: &OrderDetails, price_display: &str, distance_display: &str) -> Self {
        Self {
            driver_name: details.driver_name.clone(),
            estimated_arrival: details.estimated_arrival.to_string(),
            price: details
                .price
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| price_display.to_string()),
            distance: distance_display.to_string(),
            order_id: details.order_id.to_string(),
        }
    }
}

pub fn accepted_view(summary: &AcceptedSummary) -> ResultView {
    ResultView {
        kind: ResultKind::Accepted,
        title: "Заказ принят!".to_string(),
        message: format!(
            "Водитель {} едет к вам. Прибытие через {}.",
            summary.driver_name, summary.estimated_arrival
        ),
        fields: vec![
            ("Стоимость поездки".to_string(), summary.price.clone()),
            ("Расстояние".to_string(), summary.distance.clone()),
            ("Номер заказа".to_string(), format!("#{}", summary.order_id)),
        ],
        action: "НА ГЛАВНУЮ".to_string(),
    }
}

pub fn cancelled_view() -> ResultView {
    ResultView {
        kind: ResultKind::Cancelled,
        title: "Заказ отменен".to_string(),
        message: "Время на выбор водителя истекло. Заказ автоматически отменен.".to_string(),
        fields: Vec::new(),
        action: "СОЗДАТЬ НОВЫЙ ЗАКАЗ".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::sample_bid;
    use crate::data::types::{OrderId, Scalar};

    #[test]
    fn test_driver_card_from_bid() {
        let card = DriverCard::from_bid(&sample_bid());

        assert_eq!(card.driver_id, 7);
        assert_eq!(card.initial, "I");
        assert_eq!(card.name, "Ivan");
        assert_eq!(card.car, "Toyota • A123");
        assert_eq!(card.arrival, "Прибытие: 4 мин");
        assert!(card.badges.is_empty());
    }

    #[test]
    fn test_anonymous_driver_card() {
        let bid = Bid {
            driver_name: None,
            driver_rating: Some(4.83),
            has_co_driver: true,
            ..sample_bid()
        };
        let card = DriverCard::from_bid(&bid);

        assert_eq!(card.initial, "В");
        assert_eq!(card.name, "Водитель #7");
        assert_eq!(card.badges, vec!["★ 4.8".to_string(), "С напарником".to_string()]);
    }

    #[test]
    fn test_accepted_view_falls_back_to_display_price() {
        let details = OrderDetails {
            driver_name: "Ivan".to_string(),
            estimated_arrival: Scalar::Text("4 мин".to_string()),
            price: None,
            order_id: OrderId::from(42),
        };
        let view = accepted_view(&AcceptedSummary::new(&details, "320 ₽", "6,4 км"));

        assert_eq!(view.kind, ResultKind::Accepted);
        assert_eq!(view.message, "Водитель Ivan едет к вам. Прибытие через 4 мин.");
        assert_eq!(view.fields[0].1, "320 ₽");
        assert_eq!(view.fields[1].1, "6,4 км");
        assert_eq!(view.fields[2].1, "#42");
    }

    #[test]
    fn test_cancelled_view() {
        let view = cancelled_view();
        assert_eq!(view.kind, ResultKind::Cancelled);
        assert_eq!(view.title, "Заказ отменен");
        assert_eq!(view.action, "СОЗДАТЬ НОВЫЙ ЗАКАЗ");
    }
}
