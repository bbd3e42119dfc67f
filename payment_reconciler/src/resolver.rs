//! Cascading order lookup.
//!
//! An [`OrderResolver`] evaluates an ordered list of [`Strategy`]s and stops at the first one that finds an order.
//! The default precedence is:
//! 1. [`Strategy::TransactionReference`]: the order whose payment record already carries the processor reference.
//! 2. [`Strategy::OrderHint`]: a known hint, tried as an order id and then as an order number.
//! 3. [`Strategy::DescriptionOrderNumber`]: an order number embedded in the charge description.
use std::fmt::Display;

use log::*;

use crate::{
    db::traits::OrderManagement,
    db_types::{Order, OrderId},
    helpers::extract_order_number,
    webhook::{ConfirmationEvent, OrderHint},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    TransactionReference,
    OrderHint,
    DescriptionOrderNumber,
}

impl Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::TransactionReference => f.write_str("transaction reference"),
            Strategy::OrderHint => f.write_str("order hint"),
            Strategy::DescriptionOrderNumber => f.write_str("order number in description"),
        }
    }
}

/// The facts about a confirmation that the strategies can work with.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionRequest<'a> {
    pub transaction_ref: &'a str,
    pub hint: Option<&'a OrderHint>,
    pub description: Option<&'a str>,
}

impl<'a> From<&'a ConfirmationEvent> for ResolutionRequest<'a> {
    fn from(event: &'a ConfirmationEvent) -> Self {
        Self {
            transaction_ref: event.transaction_ref.as_str(),
            hint: event.hint.as_ref(),
            description: event.description.as_deref(),
        }
    }
}

impl Strategy {
    pub async fn resolve<B: OrderManagement>(
        &self,
        db: &B,
        req: &ResolutionRequest<'_>,
    ) -> Result<Option<Order>, B::Error> {
        match self {
            Strategy::TransactionReference => db.order_by_transaction_ref(req.transaction_ref).await,
            Strategy::OrderHint => match req.hint {
                Some(OrderHint::Known(value)) => match db.order_by_id(&OrderId::from(value.as_str())).await? {
                    Some(order) => Ok(Some(order)),
                    None => db.order_by_number(value).await,
                },
                Some(OrderHint::Unresolved) | None => Ok(None),
            },
            Strategy::DescriptionOrderNumber => match req.description.and_then(extract_order_number) {
                Some(number) => db.order_by_number(number).await,
                None => Ok(None),
            },
        }
    }
}

/// An order found by the resolver, and the strategy that found it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub order: Order,
    pub strategy: Strategy,
}

#[derive(Debug, Clone)]
pub struct OrderResolver {
    strategies: Vec<Strategy>,
}

impl Default for OrderResolver {
    fn default() -> Self {
        Self::new(vec![Strategy::TransactionReference, Strategy::OrderHint, Strategy::DescriptionOrderNumber])
    }
}

impl OrderResolver {
    /// Builds a resolver from the given strategies. A transaction reference lookup is always evaluated first, whether
    /// or not it is in the list.
    pub fn new(strategies: Vec<Strategy>) -> Self {
        let mut result = vec![Strategy::TransactionReference];
        for s in strategies {
            if !result.contains(&s) {
                result.push(s);
            }
        }
        Self { strategies: result }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub async fn resolve<B: OrderManagement>(
        &self,
        db: &B,
        req: &ResolutionRequest<'_>,
    ) -> Result<Option<Resolution>, B::Error> {
        for strategy in &self.strategies {
            if let Some(order) = strategy.resolve(db, req).await? {
                debug!("🧭️ {} resolved to order {} by {strategy}", req.transaction_ref, order.id);
                return Ok(Some(Resolution { order, strategy: *strategy }));
            }
            trace!("🧭️ {strategy} found nothing for {}", req.transaction_ref);
        }
        debug!("🧭️ No order found for {}", req.transaction_ref);
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reference_lookup_is_always_first() {
        let r = OrderResolver::new(vec![Strategy::DescriptionOrderNumber, Strategy::OrderHint]);
        assert_eq!(r.strategies(), &[
            Strategy::TransactionReference,
            Strategy::DescriptionOrderNumber,
            Strategy::OrderHint
        ]);
        let r = OrderResolver::new(vec![Strategy::OrderHint, Strategy::TransactionReference, Strategy::OrderHint]);
        assert_eq!(r.strategies(), &[Strategy::TransactionReference, Strategy::OrderHint]);
        assert_eq!(OrderResolver::default().strategies().len(), 3);
    }
}
