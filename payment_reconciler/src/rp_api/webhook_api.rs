use std::{fmt::Debug, sync::Arc, time::Duration};

use log::*;
use serde_json::Value;

use crate::{
    charges::{select_charge_for_source, ChargeLookupError, ChargeProvider, ProcessorCharge},
    db::traits::ReconciliationDatabase,
    db_types::PaymentStatus,
    diagnostics::{DiagnosticOutcome, DiagnosticRecord, DiagnosticSink},
    rp_api::{
        errors::{ReconciliationError, WebhookError},
        reconciliation_api::ReconciliationApi,
        status_objects::{BufferReason, ConfirmationStatus, ReconcileOutcome, StatusSource},
    },
    webhook::{classify, relayed_charge_payload, ClassifiedEvent, ConfirmationEvent, EventKind, SOURCE_COMPLETE},
};

#[derive(Debug, Clone, Copy)]
pub struct WebhookConfig {
    /// Upper bound on each call to the payment processor.
    pub lookup_timeout: Duration,
    /// How many recent charges to scan for the charge behind a completed source.
    pub charge_scan_limit: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { lookup_timeout: Duration::from_secs(10), charge_scan_limit: 20 }
    }
}

/// What happened to a webhook that was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Confirmed { order_id: String, order_number: String, transaction_ref: String },
    Buffered { transaction_ref: String, reason: BufferReason },
    Ignored { reason: String },
}

impl WebhookOutcome {
    pub fn message(&self) -> String {
        match self {
            WebhookOutcome::Confirmed { order_number, transaction_ref, .. } => {
                format!("Payment {transaction_ref} confirmed order {order_number}")
            },
            WebhookOutcome::Buffered { transaction_ref, reason } => {
                format!("Payment {transaction_ref} recorded for later matching ({reason})")
            },
            WebhookOutcome::Ignored { reason } => format!("Event ignored: {reason}"),
        }
    }
}

/// `WebhookApi` takes a raw processor webhook from the wire to the database.
///
/// The webhook is classified, the charge behind a `source.complete` event is looked up at the processor, and the
/// resulting confirmation is reconciled. Exactly one [`DiagnosticRecord`] is written for every call.
pub struct WebhookApi<B, C> {
    engine: ReconciliationApi<B>,
    provider: C,
    diagnostics: Arc<dyn DiagnosticSink>,
    config: WebhookConfig,
}

impl<B, C> Debug for WebhookApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi ({:?})", self.config)
    }
}

impl<B, C> WebhookApi<B, C> {
    pub fn new(engine: ReconciliationApi<B>, provider: C, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self { engine, provider, diagnostics, config: WebhookConfig::default() }
    }

    pub fn with_config(mut self, config: WebhookConfig) -> Self {
        self.config = config;
        self
    }

    pub fn engine(&self) -> &ReconciliationApi<B> {
        &self.engine
    }

}

impl<B, C> WebhookApi<B, C>
where
    B: ReconciliationDatabase,
    C: ChargeProvider,
{
    /// Handles one webhook body.
    ///
    /// Returns an outcome for everything the processor should consider delivered, including events that were
    /// deliberately ignored and processor lookups that failed. Returns an error for malformed payloads, database
    /// failures (so that the processor retries), and unmatched known hints when those are not buffered.
    pub async fn handle_webhook(&self, body: &[u8]) -> Result<WebhookOutcome, WebhookError> {
        let classified = match classify(body) {
            Ok(c) => c,
            Err(e) => {
                self.record(&peek_kind(body), None, DiagnosticOutcome::MalformedPayload, e.to_string());
                return Err(e);
            },
        };
        let raw = String::from_utf8_lossy(body);
        match classified {
            ClassifiedEvent::Ignored { kind } => {
                let reason = format!("'{kind}' events are not reconciled");
                Ok(self.ignore(&kind, None, reason))
            },
            ClassifiedEvent::ChargeCompleted(charge) => {
                let kind = EventKind::ChargeCompleted;
                if !charge.is_successful() {
                    let reason = format!("charge {} has status '{}'", charge.id, charge.status);
                    return Ok(self.ignore(&kind.to_string(), Some(&charge.id), reason));
                }
                let event = ConfirmationEvent::from_charge(kind, &charge, &raw);
                self.apply(&event).await
            },
            ClassifiedEvent::SourceCompleted { source_id } => {
                let charge = match self.find_source_charge(&source_id).await {
                    Ok(Some(charge)) => charge,
                    Ok(None) => {
                        let reason = format!("no recent charge was created from source {source_id}");
                        return Ok(self.ignore(SOURCE_COMPLETE, None, reason));
                    },
                    Err(e) => {
                        let detail = format!("Could not look up the charge for source {source_id}. {e}");
                        self.record(SOURCE_COMPLETE, None, DiagnosticOutcome::UpstreamUnavailable, detail);
                        return Ok(WebhookOutcome::Ignored { reason: e.to_string() });
                    },
                };
                if !charge.is_successful() {
                    let reason = format!("charge {} for source {source_id} has status '{}'", charge.id, charge.status);
                    return Ok(self.ignore(SOURCE_COMPLETE, Some(&charge.id), reason));
                }
                // Buffer the charge, not the source event, so a later sweep can still read its hint.
                let payload = relayed_charge_payload(&charge, SOURCE_COMPLETE, &raw);
                let event = ConfirmationEvent::from_charge(EventKind::SourceCompleted, &charge, &payload);
                self.apply(&event).await
            },
        }
    }

    /// Looks up the status of a payment by its processor reference. The database is consulted first; if it knows
    /// nothing, the processor is asked. A processor failure reads as `PENDING`.
    pub async fn status_by_reference(&self, transaction_ref: &str) -> Result<ConfirmationStatus, ReconciliationError> {
        if let Some(status) = self.engine.status_by_reference(transaction_ref).await? {
            return Ok(status);
        }
        let status = match tokio::time::timeout(self.config.lookup_timeout, self.provider.fetch_charge(transaction_ref))
            .await
        {
            Ok(Ok(charge)) if charge.is_successful() => PaymentStatus::Confirmed,
            Ok(Ok(charge)) => {
                trace!("📨️ Charge {transaction_ref} has status '{}' at the processor", charge.status);
                PaymentStatus::Pending
            },
            Ok(Err(e)) => {
                debug!("📨️ Processor lookup of {transaction_ref} failed. {e}. Reporting it as pending.");
                PaymentStatus::Pending
            },
            Err(_) => {
                debug!("📨️ Processor lookup of {transaction_ref} timed out. Reporting it as pending.");
                PaymentStatus::Pending
            },
        };
        Ok(ConfirmationStatus { status, order: None, source: StatusSource::Processor })
    }

    async fn apply(&self, event: &ConfirmationEvent) -> Result<WebhookOutcome, WebhookError> {
        let kind = event.kind.to_string();
        let reference = Some(event.transaction_ref.as_str());
        match self.engine.reconcile(event).await {
            Ok(ReconcileOutcome::Confirmed(confirmed)) => {
                let detail = if confirmed.newly_confirmed {
                    format!("Order {} confirmed", confirmed.order.order_number)
                } else {
                    format!("Order {} was already confirmed", confirmed.order.order_number)
                };
                self.record(&kind, reference, DiagnosticOutcome::Confirmed, detail);
                Ok(WebhookOutcome::Confirmed {
                    order_id: confirmed.order.id.to_string(),
                    order_number: confirmed.order.order_number,
                    transaction_ref: event.transaction_ref.clone(),
                })
            },
            Ok(ReconcileOutcome::Buffered { pending, reason }) => {
                let outcome = match reason {
                    BufferReason::UnresolvedHint => DiagnosticOutcome::BufferedUnresolvedHint,
                    BufferReason::NoHint => DiagnosticOutcome::BufferedNoHint,
                    BufferReason::UnknownHint(_) => DiagnosticOutcome::BufferedUnknownHint,
                    BufferReason::OrderPaidByOtherCharge { .. } => DiagnosticOutcome::BufferedExtraCharge,
                };
                let detail = format!("Buffered as pending confirmation #{} ({reason}), amount {}", pending.id, pending.amount);
                self.record(&kind, reference, outcome, detail);
                Ok(WebhookOutcome::Buffered { transaction_ref: pending.transaction_ref, reason })
            },
            Err(e) => {
                let outcome = match e {
                    ReconciliationError::NoMatchingOrder { .. } => DiagnosticOutcome::NoMatchingOrder,
                    _ => DiagnosticOutcome::LookupFailure,
                };
                self.record(&kind, reference, outcome, e.to_string());
                Err(e.into())
            },
        }
    }

    async fn find_source_charge(&self, source_id: &str) -> Result<Option<ProcessorCharge>, WebhookError> {
        let limit = self.config.charge_scan_limit;
        trace!("📨️ Scanning the {limit} most recent charges for source {source_id}");
        let charges = tokio::time::timeout(self.config.lookup_timeout, self.provider.recent_charges(limit))
            .await
            .map_err(|_| WebhookError::UpstreamTimeout(format!("no answer after {:?}", self.config.lookup_timeout)))?
            .map_err(|e| match e {
                ChargeLookupError::Timeout => WebhookError::UpstreamTimeout(e.to_string()),
                other => WebhookError::UpstreamFailure(other.to_string()),
            })?;
        Ok(select_charge_for_source(&charges, source_id).cloned())
    }

    fn ignore(&self, kind: &str, reference: Option<&str>, reason: String) -> WebhookOutcome {
        self.record(kind, reference, DiagnosticOutcome::Ignored, reason.clone());
        WebhookOutcome::Ignored { reason }
    }

    fn record(&self, kind: &str, reference: Option<&str>, outcome: DiagnosticOutcome, detail: String) {
        self.diagnostics.record(&DiagnosticRecord::new(kind, reference, outcome, detail));
    }
}

/// Best-effort event kind of a body that failed classification.
fn peek_kind(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("key").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| "unknown".to_string())
}
