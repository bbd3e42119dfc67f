//! Classification of inbound processor webhooks.
//!
//! [`classify`] is a pure function of the request body. It never touches the database or the processor; the
//! `source.complete` lookup is driven by [`crate::WebhookApi`].
mod classifier;
mod confirmation;

pub use classifier::{
    classify,
    relayed_charge_payload,
    relayed_via,
    ClassifiedEvent,
    CHARGE_COMPLETE,
    SOURCE_COMPLETE,
};
pub use confirmation::{ConfirmationEvent, EventKind, OrderHint};
