use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{ConfirmOutcome, InsertOrderResult, LinkOutcome, ReconciliationDatabase},
    db_types::{ConfirmedPayment, NewOrder, OrderId, PendingConfirmation},
    events::{ConfirmationBufferedEvent, EventProducers, OrderConfirmedEvent},
    resolver::{OrderResolver, ResolutionRequest},
    rp_api::{
        errors::ReconciliationError,
        status_objects::{BufferReason, ConfirmationStatus, ReconcileOutcome, StatusSource, SweepResult},
    },
    webhook::{classify, relayed_via, ClassifiedEvent, ConfirmationEvent, EventKind, OrderHint, SOURCE_COMPLETE},
};

#[derive(Debug, Clone, Copy)]
pub struct ReconciliationConfig {
    /// Buffer confirmations whose order hint names an order that cannot be found, instead of rejecting them.
    pub buffer_unknown_hints: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self { buffer_unknown_hints: true }
    }
}

/// `ReconciliationApi` applies payment confirmations to orders.
///
/// A confirmation that resolves to an order confirms it atomically. One that does not is written to the pending buffer,
/// from which it is later linked by [`Self::sweep_pending`] or by hand with [`Self::link_pending`].
pub struct ReconciliationApi<B> {
    db: B,
    resolver: OrderResolver,
    producers: EventProducers,
    config: ReconciliationConfig,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.config)
    }
}

impl<B: Clone> Clone for ReconciliationApi<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            resolver: self.resolver.clone(),
            producers: self.producers.clone(),
            config: self.config,
        }
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, resolver: OrderResolver::default(), producers, config: ReconciliationConfig::default() }
    }

    pub fn with_config(mut self, config: ReconciliationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolver(mut self, resolver: OrderResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }
}

impl<B> ReconciliationApi<B>
where B: ReconciliationDatabase
{
    /// Applies a successful payment confirmation.
    ///
    /// * If an order is found, it is confirmed together with its payment record, in one transaction. If that order is
    ///   already paid by a different charge, nothing about the order changes and this payment is buffered with
    ///   [`BufferReason::OrderPaidByOtherCharge`] so that it is not lost.
    /// * Otherwise the confirmation is buffered, unless its hint names an order that does not exist and buffering of
    ///   such hints is disabled. In that case [`ReconciliationError::NoMatchingOrder`] is returned.
    ///
    /// Calling this any number of times with the same event has the same effect as calling it once.
    pub async fn reconcile(&self, event: &ConfirmationEvent) -> Result<ReconcileOutcome, ReconciliationError> {
        let reference = event.transaction_ref.as_str();
        trace!("🔄️ Reconciling {reference} ({}, {})", event.kind, event.amount);
        let req = ResolutionRequest::from(event);
        let resolution = self.resolver.resolve(&self.db, &req).await.map_err(ReconciliationError::database)?;
        let reason = match resolution {
            Some(resolution) => {
                let outcome = self
                    .db
                    .confirm_order_payment(&resolution.order.id, event.payment_details())
                    .await
                    .map_err(ReconciliationError::database)?;
                let (order, existing_ref) = match outcome {
                    ConfirmOutcome::Confirmed(confirmed) => {
                        if confirmed.newly_confirmed {
                            info!(
                                "🔄️✅️ Order {} ({}) confirmed by payment {reference} of {}",
                                confirmed.order.order_number, confirmed.order.id, event.amount
                            );
                            self.call_order_confirmed_hook(&confirmed).await;
                        } else {
                            let id = &confirmed.order.id;
                            debug!("🔄️✅️ Order {id} was already confirmed. {reference} changed nothing.");
                        }
                        return Ok(ReconcileOutcome::Confirmed(confirmed));
                    },
                    ConfirmOutcome::PaidByOtherCharge { order, existing_ref } => (order, existing_ref),
                };
                warn!(
                    "🔄️⏳️ Payment {reference} of {} resolves to order {}, which is already paid by {existing_ref}. \
                     Buffering it for review.",
                    event.amount, order.order_number
                );
                BufferReason::OrderPaidByOtherCharge { order_number: order.order_number, existing_ref }
            },
            None => self.unresolved_reason(event)?,
        };
        let pending =
            self.db.upsert_pending_confirmation(event.to_pending()).await.map_err(ReconciliationError::database)?;
        self.call_confirmation_buffered_hook(&pending, &reason).await;
        Ok(ReconcileOutcome::Buffered { pending, reason })
    }

    /// Re-runs order resolution for up to `batch_size` unprocessed buffered confirmations and links every one that now
    /// resolves. Each sweep picks the rows that have been swept the fewest times, so rows that never match cannot hide
    /// the rest of the buffer from later sweeps. Unmatched rows are otherwise left untouched.
    pub async fn sweep_pending(&self, batch_size: usize) -> Result<SweepResult, ReconciliationError> {
        let rows = self.db.claim_pending_for_sweep(batch_size).await.map_err(ReconciliationError::database)?;
        let mut result = SweepResult { examined: rows.len(), ..Default::default() };
        for row in rows {
            let event = event_from_pending(&row);
            let req = ResolutionRequest::from(&event);
            let order = match self.resolver.resolve(&self.db, &req).await {
                Ok(Some(resolution)) => resolution.order,
                Ok(None) => {
                    result.still_pending += 1;
                    continue;
                },
                Err(e) => {
                    warn!("🔄️🧹️ Could not resolve buffered payment {}. {e}", row.transaction_ref);
                    result.failed += 1;
                    continue;
                },
            };
            match self.db.link_pending_confirmation(&row.transaction_ref, &order.id).await {
                Ok(LinkOutcome::Linked(confirmed)) => {
                    info!("🔄️🧹️ Buffered payment {} linked to order {}", row.transaction_ref, order.id);
                    if confirmed.newly_confirmed {
                        self.call_order_confirmed_hook(&confirmed).await;
                    }
                    result.linked += 1;
                },
                Ok(LinkOutcome::AlreadyProcessed) => {
                    debug!("🔄️🧹️ Buffered payment {} was linked concurrently", row.transaction_ref);
                    result.linked += 1;
                },
                Ok(LinkOutcome::PaidByOtherCharge(existing_ref)) => {
                    debug!(
                        "🔄️🧹️ Buffered payment {} matches order {}, already paid by {existing_ref}. Leaving it for review",
                        row.transaction_ref, order.id
                    );
                    result.still_pending += 1;
                },
                Ok(outcome) => {
                    warn!("🔄️🧹️ Could not link buffered payment {}: {outcome:?}", row.transaction_ref);
                    result.failed += 1;
                },
                Err(e) => {
                    warn!("🔄️🧹️ Could not link buffered payment {}. {e}", row.transaction_ref);
                    result.failed += 1;
                },
            }
        }
        Ok(result)
    }

    /// Manually links a buffered confirmation to an order.
    pub async fn link_pending(
        &self,
        transaction_ref: &str,
        order_id: &OrderId,
    ) -> Result<ConfirmedPayment, ReconciliationError> {
        let outcome =
            self.db.link_pending_confirmation(transaction_ref, order_id).await.map_err(ReconciliationError::database)?;
        match outcome {
            LinkOutcome::Linked(confirmed) => {
                info!("🔄️🔗️ Buffered payment {transaction_ref} manually linked to order {order_id}");
                if confirmed.newly_confirmed {
                    self.call_order_confirmed_hook(&confirmed).await;
                }
                Ok(confirmed)
            },
            LinkOutcome::PendingNotFound => Err(ReconciliationError::PendingNotFound(transaction_ref.to_string())),
            LinkOutcome::OrderNotFound => Err(ReconciliationError::OrderNotFound(order_id.clone())),
            LinkOutcome::AlreadyProcessed => Err(ReconciliationError::AlreadyProcessed(transaction_ref.to_string())),
            LinkOutcome::PaidByOtherCharge(existing_ref) => {
                Err(ReconciliationError::OrderPaidByOtherCharge { order_id: order_id.clone(), existing_ref })
            },
        }
    }

    pub async fn unprocessed_pending(&self, limit: usize) -> Result<Vec<PendingConfirmation>, ReconciliationError> {
        self.db.fetch_unprocessed_pending(limit).await.map_err(ReconciliationError::database)
    }

    pub async fn status_by_order_id(&self, id: &OrderId) -> Result<Option<ConfirmationStatus>, ReconciliationError> {
        let order = self.db.order_by_id(id).await.map_err(ReconciliationError::database)?;
        Ok(order.map(|o| ConfirmationStatus { status: o.payment_status, order: Some(o), source: StatusSource::Order }))
    }

    /// The status of a payment, looked up by its processor reference: the linked order first, then the pending
    /// buffer. Returns `None` if the database knows nothing about the reference.
    pub async fn status_by_reference(
        &self,
        transaction_ref: &str,
    ) -> Result<Option<ConfirmationStatus>, ReconciliationError> {
        if let Some(order) =
            self.db.order_by_transaction_ref(transaction_ref).await.map_err(ReconciliationError::database)?
        {
            let status = order.payment_status;
            return Ok(Some(ConfirmationStatus { status, order: Some(order), source: StatusSource::Order }));
        }
        let pending =
            self.db.fetch_pending_confirmation(transaction_ref).await.map_err(ReconciliationError::database)?;
        Ok(pending.map(|p| ConfirmationStatus { status: p.status, order: None, source: StatusSource::PendingBuffer }))
    }

    /// Creates an order and its empty payment record. Orders are normally created by the checkout flow; this is the
    /// same operation.
    pub async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, ReconciliationError> {
        self.db.insert_order(order).await.map_err(ReconciliationError::database)
    }

    fn unresolved_reason(&self, event: &ConfirmationEvent) -> Result<BufferReason, ReconciliationError> {
        let reference = event.transaction_ref.as_str();
        let reason = match &event.hint {
            Some(OrderHint::Unresolved) => {
                info!("🔄️⏳️ Payment {reference} arrived before its order was created. Buffering it.");
                BufferReason::UnresolvedHint
            },
            None => {
                warn!("🔄️⏳️ Payment {reference} carries no order hint and matched no order. Buffering it.");
                BufferReason::NoHint
            },
            Some(OrderHint::Known(hint)) if self.config.buffer_unknown_hints => {
                warn!("🔄️⏳️ Payment {reference} names order '{hint}', which does not exist. Buffering it.");
                BufferReason::UnknownHint(hint.clone())
            },
            Some(OrderHint::Known(hint)) => {
                error!("🔄️❌️ Payment {reference} names order '{hint}', which does not exist.");
                return Err(ReconciliationError::NoMatchingOrder {
                    transaction_ref: reference.to_string(),
                    hint: hint.clone(),
                });
            },
        };
        Ok(reason)
    }

    async fn call_order_confirmed_hook(&self, confirmed: &ConfirmedPayment) {
        for emitter in &self.producers.order_confirmed_producer {
            debug!("🔄️📬️ Notifying order confirmed hook subscribers");
            let event = OrderConfirmedEvent::new(confirmed.order.clone(), confirmed.payment.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_confirmation_buffered_hook(&self, pending: &PendingConfirmation, reason: &BufferReason) {
        for emitter in &self.producers.confirmation_buffered_producer {
            debug!("🔄️📬️ Notifying confirmation buffered hook subscribers");
            let event = ConfirmationBufferedEvent::new(pending.clone(), reason.to_string());
            emitter.publish_event(event).await;
        }
    }
}

/// Rebuilds the confirmation behind a buffered row. A charge payload (including one relayed for a `source.complete`
/// event) still carries the hint and the description; for anything else only the transaction reference can be used.
fn event_from_pending(row: &PendingConfirmation) -> ConfirmationEvent {
    let kind = match classify(row.raw_payload.as_bytes()) {
        Ok(ClassifiedEvent::ChargeCompleted(charge)) if charge.id == row.transaction_ref => {
            let kind = match relayed_via(&row.raw_payload).as_deref() {
                Some(SOURCE_COMPLETE) => EventKind::SourceCompleted,
                _ => EventKind::ChargeCompleted,
            };
            let mut event = ConfirmationEvent::from_charge(kind, &charge, &row.raw_payload);
            event.amount = row.amount;
            event.method = row.method;
            return event;
        },
        Ok(ClassifiedEvent::SourceCompleted { .. }) => EventKind::SourceCompleted,
        _ => EventKind::ChargeCompleted,
    };
    ConfirmationEvent {
        kind,
        transaction_ref: row.transaction_ref.clone(),
        amount: row.amount,
        method: row.method,
        description: None,
        hint: None,
        raw_payload: row.raw_payload.clone(),
    }
}
