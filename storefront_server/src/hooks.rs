//! Event hooks the server registers with the reconciliation engine at startup.
use log::*;
use payment_reconciler::events::{ConfirmationBufferedEvent, EventHooks, OrderConfirmedEvent};

pub fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_confirmed(|ev: OrderConfirmedEvent| {
        Box::pin(async move {
            info!(
                "📬️ Order {} ({}) confirmed. {} paid via {:?}, ref {}",
                ev.order.order_number,
                ev.order.id,
                ev.payment.amount,
                ev.payment.method,
                ev.payment.transaction_ref.as_deref().unwrap_or("-")
            );
        })
    });
    hooks.on_confirmation_buffered(|ev: ConfirmationBufferedEvent| {
        Box::pin(async move {
            info!(
                "📬️ Payment {} for {} was buffered ({}). It will be linked when its order appears.",
                ev.pending.transaction_ref, ev.pending.amount, ev.reason
            );
        })
    });
    hooks
}
