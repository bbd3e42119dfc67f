use log::*;
use serde_json::{json, Map, Value};

use crate::{
    charges::ProcessorCharge,
    db_types::Amount,
    rp_api::errors::WebhookError,
};

pub const CHARGE_COMPLETE: &str = "charge.complete";
pub const SOURCE_COMPLETE: &str = "source.complete";
const RELAYED_VIA: &str = "via";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    /// A `charge.complete` event, with the charge as embedded in the payload. Its status has not been checked.
    ChargeCompleted(ProcessorCharge),
    /// A `source.complete` event. The charge must be looked up separately.
    SourceCompleted { source_id: String },
    /// A well-formed event of a kind that reconciliation does not care about.
    Ignored { kind: String },
}

/// Inspects a raw webhook body and works out what kind of event it is.
///
/// Fails with [`WebhookError::MalformedPayload`] if the body is not a JSON object, has no string `key`, or is a
/// recognised kind that lacks `data.id` (and `data.status`, for charges).
pub fn classify(body: &[u8]) -> Result<ClassifiedEvent, WebhookError> {
    let value = serde_json::from_slice::<Value>(body)
        .map_err(|e| WebhookError::MalformedPayload(format!("Body is not valid JSON. {e}")))?;
    let root = value.as_object().ok_or_else(|| WebhookError::MalformedPayload("Body is not a JSON object".into()))?;
    let kind = root
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| WebhookError::MalformedPayload("Event has no 'key' field".into()))?;
    trace!("📨️ Classifying '{kind}' event");
    match kind {
        CHARGE_COMPLETE => {
            let data = data_object(root, kind)?;
            charge_from_data(data).map(ClassifiedEvent::ChargeCompleted)
        },
        SOURCE_COMPLETE => {
            let data = data_object(root, kind)?;
            let source_id = required_str(data, "id", kind)?;
            Ok(ClassifiedEvent::SourceCompleted { source_id })
        },
        other => Ok(ClassifiedEvent::Ignored { kind: other.to_string() }),
    }
}

fn data_object<'a>(root: &'a Map<String, Value>, kind: &str) -> Result<&'a Map<String, Value>, WebhookError> {
    root.get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| WebhookError::MalformedPayload(format!("'{kind}' event has no data object")))
}

fn required_str(data: &Map<String, Value>, field: &str, kind: &str) -> Result<String, WebhookError> {
    data.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| WebhookError::MalformedPayload(format!("'{kind}' event is missing data.{field}")))
}

/// Builds a charge from the `data` object of a charge event.
fn charge_from_data(data: &Map<String, Value>) -> Result<ProcessorCharge, WebhookError> {
    let id = required_str(data, "id", CHARGE_COMPLETE)?;
    let status = required_str(data, "status", CHARGE_COMPLETE)?;
    let amount = match data.get("amount").and_then(Value::as_i64) {
        Some(a) => Amount::from(a),
        None => {
            warn!("📨️ Charge {id} has no integer amount. Recording it as zero.");
            Amount::default()
        },
    };
    let description = data.get("description").and_then(Value::as_str).map(String::from);
    let metadata = data.get("metadata").filter(|m| m.is_object()).cloned();
    let source = data.get("source").and_then(Value::as_object);
    let source_id = source.and_then(|s| s.get("id")).and_then(Value::as_str).map(String::from);
    let source_type = source.and_then(|s| s.get("type")).and_then(Value::as_str).map(String::from);
    Ok(ProcessorCharge { id, status, amount, description, metadata, source_id, source_type })
}

/// Renders `charge` as a `charge.complete` body that [`classify`] accepts. Used for confirmations that reached us as some
/// other event kind (`via`), so that the buffered row carries the charge itself. The original body is kept under
/// `relayed_event`.
pub fn relayed_charge_payload(charge: &ProcessorCharge, via: &str, original: &str) -> String {
    let relayed_event = serde_json::from_str::<Value>(original).unwrap_or_else(|_| Value::String(original.to_string()));
    let mut data = json!({
        "id": charge.id,
        "status": charge.status,
        "amount": charge.amount,
        "description": charge.description,
        "metadata": charge.metadata,
    });
    if let Some(id) = &charge.source_id {
        data["source"] = json!({ "id": id, "type": charge.source_type });
    }
    json!({ "key": CHARGE_COMPLETE, (RELAYED_VIA): via, "data": data, "relayed_event": relayed_event }).to_string()
}

/// The event kind a body produced by [`relayed_charge_payload`] originally arrived as.
pub fn relayed_via(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    value.get(RELAYED_VIA).and_then(Value::as_str).map(String::from)
}
