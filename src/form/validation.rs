use crate::data::estimates::parse_estimate;
use crate::data::types::{Address, OrderDraft};

/// Shortest address (in characters, after trimming) that still blocks submission.
const MIN_ADDRESS_LEN: usize = 3;

pub const MSG_BOTH_MISSING: &str = "Укажите адрес отправления и назначения";
pub const MSG_PICKUP_MISSING: &str = "Укажите адрес отправления";
pub const MSG_DROPOFF_MISSING: &str = "Укажите адрес назначения";
pub const MSG_INCOMPLETE: &str = "Заполните оба адреса для оформления заказа";
pub const MSG_COMPUTING_ROUTE: &str = "✅ Адреса заполнены. Маршрут рассчитывается...";

/// Everything the rider has typed so far, plus the route estimates shown next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FormInput {
    pub pickup: String,
    pub pickup_full: String,
    pub dropoff: String,
    pub dropoff_full: String,
    pub comment: String,
    pub passengers: u32,
    pub price_display: String,
    pub distance_display: String,
    pub duration_display: String,
}

impl Default for FormInput {
    fn default() -> Self {
        Self {
            pickup: String::new(),
            pickup_full: String::new(),
            dropoff: String::new(),
            dropoff_full: String::new(),
            comment: String::new(),
            passengers: 1,
            price_display: String::new(),
            distance_display: String::new(),
            duration_display: String::new(),
        }
    }
}

impl FormInput {
    pub fn pickup_text(&self) -> &str {
        preferred(&self.pickup_full, &self.pickup)
    }

    pub fn dropoff_text(&self) -> &str {
        preferred(&self.dropoff_full, &self.dropoff)
    }

    /// The route counts as calculated once both price and distance are on display.
    pub fn route_calculated(&self) -> bool {
        self.price_display.contains('₽') && self.distance_display.contains("км")
    }

    pub fn to_draft(&self) -> OrderDraft {
        OrderDraft {
            pickup: Address::new(self.pickup_text()),
            dropoff: Address::new(self.dropoff_text()),
            passengers: self.passengers.max(1),
            comment: self.comment.trim().to_string(),
            estimate: parse_estimate(
                &self.price_display,
                &self.distance_display,
                &self.duration_display,
            ),
        }
    }
}

fn preferred<'a>(full: &'a str, plain: &'a str) -> &'a str {
    let full = full.trim();
    if full.is_empty() {
        plain.trim()
    } else {
        full
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: &'static str,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormStatus {
    pub submit_enabled: bool,
    pub message: Option<StatusMessage>,
}

impl Default for FormStatus {
    fn default() -> Self {
        Self {
            submit_enabled: false,
            message: None,
        }
    }
}

pub fn evaluate(input: &FormInput) -> FormStatus {
    let start = input.pickup_text();
    let end = input.dropoff_text();

    if long_enough(start) && long_enough(end) {
        let message = (!input.route_calculated()).then_some(StatusMessage {
            text: MSG_COMPUTING_ROUTE,
            tone: Tone::Success,
        });
        return FormStatus {
            submit_enabled: true,
            message,
        };
    }

    let text = match (start.is_empty(), end.is_empty()) {
        (true, true) => MSG_BOTH_MISSING,
        (true, false) => MSG_PICKUP_MISSING,
        (false, true) => MSG_DROPOFF_MISSING,
        (false, false) => MSG_INCOMPLETE,
    };

    FormStatus {
        submit_enabled: false,
        message: Some(StatusMessage { text, tone: Tone::Error }),
    }
}

fn long_enough(address: &str) -> bool {
    address.chars().count() > MIN_ADDRESS_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pickup: &str, dropoff: &str) -> FormInput {
        FormInput {
            pickup: pickup.to_string(),
            dropoff: dropoff.to_string(),
            ..FormInput::default()
        }
    }

    fn message(status: &FormStatus) -> &'static str {
        status.message.as_ref().map(|m| m.text).unwrap_or("")
    }

    #[test]
    fn test_short_or_missing_addresses_block_submission() {
        let cases = [
            ("", "", MSG_BOTH_MISSING),
            ("   ", "  ", MSG_BOTH_MISSING),
            ("", "Мира 5", MSG_PICKUP_MISSING),
            ("Ленина 1", "", MSG_DROPOFF_MISSING),
            ("abc", "xyz", MSG_INCOMPLETE),
            (" ул ", "Мира 5", MSG_INCOMPLETE),
            ("Ленина 1", "дом", MSG_INCOMPLETE),
        ];

        for (pickup, dropoff, expected) in cases {
            let status = evaluate(&input(pickup, dropoff));
            assert!(!status.submit_enabled, "{:?} -> {:?}", pickup, dropoff);
            assert_eq!(message(&status), expected, "{:?} -> {:?}", pickup, dropoff);
            assert_eq!(status.message.unwrap().tone, Tone::Error);
        }
    }

    #[test]
    fn test_long_addresses_enable_submission() {
        for (pickup, dropoff) in [("abcd", "wxyz"), ("  Ленина 1 ", "Мира 5"), ("Арбат", "Тверская")] {
            let status = evaluate(&input(pickup, dropoff));
            assert!(status.submit_enabled);
            assert_eq!(message(&status), MSG_COMPUTING_ROUTE);
            assert_eq!(status.message.unwrap().tone, Tone::Success);
        }
    }

    #[test]
    fn test_calculated_route_clears_provisional_message() {
        let mut form = input("Ленина 1", "Мира 5");
        form.price_display = "320 ₽".to_string();
        form.distance_display = "6,4 км".to_string();

        let status = evaluate(&form);
        assert!(status.submit_enabled);
        assert!(status.message.is_none());
    }

    #[test]
    fn test_full_address_field_wins() {
        let form = FormInput {
            pickup: "abc".to_string(),
            pickup_full: "ул. Ленина, 1, Москва".to_string(),
            dropoff: "Мира 5".to_string(),
            ..FormInput::default()
        };

        assert_eq!(form.pickup_text(), "ул. Ленина, 1, Москва");
        assert!(evaluate(&form).submit_enabled);
    }

    #[test]
    fn test_draft_uses_display_defaults() {
        let mut form = input("Ленина 1", "Мира 5");
        form.passengers = 0;
        form.price_display = "цена уточняется".to_string();

        let draft = form.to_draft();
        assert_eq!(draft.passengers, 1);
        assert_eq!(draft.estimate.price, 150.0);
        assert_eq!(draft.estimate.distance_km, 5.0);
        assert_eq!(draft.estimate.estimated_time, "15 минут");
        assert!(draft.pickup.coords.is_none());
    }
}
