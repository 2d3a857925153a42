//! Webhook delivery client.
//!
//! Performs exactly one HTTP POST per call and reports what happened. Retry
//! policy lives in the scheduler; this crate only knows how to talk to the
//! endpoint and how to lay out the JSON body.

mod client;
mod error;
mod wire;

pub use client::{classify, AttemptOutcome, DeliveryClient, WebhookTransport};
pub use error::{error_chain, DeliveryError, DeliveryResult};
pub use wire::WirePayload;
