use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;
use crate::data::types::RouteEstimate;

pub const DEFAULT_PRICE: f64 = 150.0;
pub const DEFAULT_DISTANCE_KM: f64 = 5.0;
pub const DEFAULT_DURATION: &str = "15 минут";

/// Placeholder shown while the route is still being calculated.
const DURATION_PENDING: &str = "Рассчитывается";

/// Parse a price display such as "123.45 ₽". Anything without the ruble
/// sign, unparsable or negative falls back to the default.
pub fn parse_price(text: &str) -> f64 {
    if !text.contains('₽') {
        return DEFAULT_PRICE;
    }
    parse_display_number(text).unwrap_or_else(|| {
        warn!("Unparsable price display {:?}, using default", text);
        DEFAULT_PRICE
    })
}

/// Parse a distance display such as "7,2 км".
pub fn parse_distance_km(text: &str) -> f64 {
    if !text.contains("км") {
        return DEFAULT_DISTANCE_KM;
    }
    parse_display_number(text).unwrap_or_else(|| {
        warn!("Unparsable distance display {:?}, using default", text);
        DEFAULT_DISTANCE_KM
    })
}

pub fn parse_duration(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == DURATION_PENDING {
        DEFAULT_DURATION.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn parse_estimate(price: &str, distance: &str, duration: &str) -> RouteEstimate {
    RouteEstimate {
        price: parse_price(price),
        distance_km: parse_distance_km(distance),
        estimated_time: parse_duration(duration),
    }
}

fn number_prefix() -> Option<&'static Regex> {
    static NUMBER_PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    NUMBER_PREFIX
        .get_or_init(|| Regex::new(r"^(?:\d+(?:\.\d*)?|\.\d+)").ok())
        .as_ref()
}

/// Keep digits and separators, treat the first comma as the decimal point
/// and read the longest numeric prefix.
fn parse_display_number(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let normalized = digits.replacen(',', ".", 1);

    let value = number_prefix()?
        .find(&normalized)?
        .as_str()
        .parse::<f64>()
        .ok()?;

    (value.is_finite() && value >= 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price() {
        assert!((parse_price("123.45 ₽") - 123.45).abs() < 1e-9);
        assert!((parse_price("99,5 ₽") - 99.5).abs() < 1e-9);
        assert_eq!(parse_price("₽ ???"), DEFAULT_PRICE);
        assert_eq!(parse_price("бесплатно"), DEFAULT_PRICE);
        assert_eq!(parse_price(""), DEFAULT_PRICE);
    }

    #[test]
    fn test_parse_distance() {
        assert!((parse_distance_km("7,2 км") - 7.2).abs() < 1e-9);
        assert!((parse_distance_km("12 км") - 12.0).abs() < 1e-9);
        assert_eq!(parse_distance_km("далеко"), DEFAULT_DISTANCE_KM);
        assert_eq!(parse_distance_km("км"), DEFAULT_DISTANCE_KM);
    }

    #[test]
    fn test_number_pattern_compiled_once() {
        let first = number_prefix().unwrap();
        let second = number_prefix().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_unparsable_displays_fall_back_to_defaults() {
        assert_eq!(parse_price("-- ₽"), DEFAULT_PRICE);
        assert_eq!(parse_distance_km("?? км"), DEFAULT_DISTANCE_KM);
    }

    #[test]
    fn test_garbled_separators_read_prefix() {
        // "1,234.5" -> "1.234.5" -> 1.234
        assert!((parse_price("1,234.5 ₽") - 1.234).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("Рассчитывается"), DEFAULT_DURATION);
        assert_eq!(parse_duration("  "), DEFAULT_DURATION);
        assert_eq!(parse_duration("22 минуты"), "22 минуты");
    }
}
