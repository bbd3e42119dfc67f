use once_cell::sync::Lazy;
use regex::Regex;

static ORDER_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z0-9]{10,}").expect("order number pattern is a valid regex"));

/// Returns the first run of ten or more upper-case letters and digits in a charge description. The checkout flow puts
/// the order number in the description, e.g. `"Payment for order ORD20240001"`.
pub fn extract_order_number(description: &str) -> Option<&str> {
    ORDER_NUMBER.find(description).map(|m| m.as_str())
}
