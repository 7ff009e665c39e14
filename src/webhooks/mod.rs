//! Webhook module for mutating admission requests.
//!
//! Both broker kinds share one pipeline:
//! - `admission`: decode, kind check, mutation engine, JSON patch
//! - `server`: axum router and TLS listener

pub mod admission;
mod server;

pub use admission::{AdmissionError, MutatingHandler, MutationOutcome, into_response};
pub use server::{
    CLUSTER_SERVICE_BROKER_PATH, SERVICE_BROKER_PATH, WebhookError, WebhookState,
    create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
