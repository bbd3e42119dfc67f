use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
pub use storefront_common::Amount;

//--------------------------------------      OrderId       ---------------------------------------------------------
/// The opaque primary key of an order. This is not the order number the customer sees.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Generates a fresh order id of the form `ord_<16 hex digits>`.
    pub fn random() -> Self {
        Self(format!("ord_{:016x}", rand::random::<u64>()))
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for OrderId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

//--------------------------------------   PaymentStatus    ---------------------------------------------------------
/// Payment status of an order. The only transition this crate performs is `Pending` to `Confirmed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Confirmed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}

//--------------------------------------   PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[sqlx(rename = "CREDIT_CARD")]
    #[serde(rename = "CREDIT_CARD")]
    CreditCard,
    #[sqlx(rename = "PROMPTPAY")]
    #[serde(rename = "PROMPTPAY")]
    PromptPay,
    #[sqlx(rename = "MOBILE_BANKING")]
    #[serde(rename = "MOBILE_BANKING")]
    MobileBanking,
    #[default]
    #[sqlx(rename = "OTHER")]
    #[serde(rename = "OTHER")]
    Other,
}

impl PaymentMethod {
    /// Maps a processor source type onto a payment method. Charges without a source were paid by card.
    pub fn from_source_type(source_type: Option<&str>) -> Self {
        match source_type.map(str::to_ascii_lowercase).as_deref() {
            None => PaymentMethod::CreditCard,
            Some("promptpay") => PaymentMethod::PromptPay,
            Some(s) if s.starts_with("mobile_banking") => PaymentMethod::MobileBanking,
            Some(_) => PaymentMethod::Other,
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::PromptPay => "PROMPTPAY",
            PaymentMethod::MobileBanking => "MOBILE_BANKING",
            PaymentMethod::Other => "OTHER",
        };
        f.write_str(s)
    }
}

//--------------------------------------       Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub payment_status: PaymentStatus,
    pub total_price: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_confirmed(&self) -> bool {
        self.payment_status == PaymentStatus::Confirmed
    }
}

/// An order as submitted by the checkout flow. The order is created `PENDING` together with an empty payment record.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub order_number: String,
    pub total_price: Amount,
    pub payment_method: PaymentMethod,
}

impl NewOrder {
    pub fn new<S: Into<String>>(order_number: S, total_price: Amount) -> Self {
        Self {
            id: OrderId::random(),
            order_number: order_number.into(),
            total_price,
            payment_method: PaymentMethod::default(),
        }
    }

    pub fn with_id<I: Into<OrderId>>(mut self, id: I) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }
}

//--------------------------------------    PaymentInfo     ---------------------------------------------------------
/// The payment record of an order. There is at most one per order, and once `transaction_ref` is set it never changes.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub id: i64,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub transaction_ref: Option<String>,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The payment details carried by a confirmation, applied to an order's payment record when it is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub transaction_ref: String,
    pub amount: Amount,
    pub method: PaymentMethod,
}

impl PaymentDetails {
    pub fn new<S: Into<String>>(transaction_ref: S, amount: Amount, method: PaymentMethod) -> Self {
        Self { transaction_ref: transaction_ref.into(), amount, method }
    }
}

//------------------------------------ PendingConfirmation -------------------------------------------------------
/// A confirmation that could not be matched to an order when it arrived.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub id: i64,
    pub transaction_ref: String,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// The webhook body exactly as it was received.
    pub raw_payload: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPendingConfirmation {
    pub transaction_ref: String,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub raw_payload: String,
}

//------------------------------------  ConfirmedPayment  -------------------------------------------------------
/// The result of atomically confirming an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedPayment {
    pub order: Order,
    pub payment: PaymentInfo,
    /// False if the order was already confirmed before this call.
    pub newly_confirmed: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_method_from_source() {
        assert_eq!(PaymentMethod::from_source_type(None), PaymentMethod::CreditCard);
        assert_eq!(PaymentMethod::from_source_type(Some("promptpay")), PaymentMethod::PromptPay);
        assert_eq!(PaymentMethod::from_source_type(Some("mobile_banking_kbank")), PaymentMethod::MobileBanking);
        assert_eq!(PaymentMethod::from_source_type(Some("truemoney")), PaymentMethod::Other);
    }

    #[test]
    fn status_serializes_in_caps() {
        assert_eq!(serde_json::to_string(&PaymentStatus::Confirmed).unwrap(), "\"CONFIRMED\"");
        assert_eq!(serde_json::to_string(&PaymentMethod::PromptPay).unwrap(), "\"PROMPTPAY\"");
        let id = OrderId::random();
        assert!(id.as_str().starts_with("ord_"));
        assert_eq!(id.as_str().len(), 20);
    }
}
