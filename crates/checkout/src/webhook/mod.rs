//! Payment provider callbacks.
//!
//! A callback is authenticated with an HMAC over a fixed concatenation of
//! transaction fields, then applied to its order at most once.

pub mod payload;
pub mod reconciler;
pub mod signature;

pub use payload::{
    TransactionCallback, TransactionObject, TransactionOrder, TransactionSourceData,
};
pub use reconciler::{IgnoredReason, WebhookError, WebhookOutcome, WebhookReconciler};
pub use signature::WebhookVerifier;
