//! servicecatalog-webhook library crate
//!
//! Mutating admission webhook for the Service Catalog `ServiceBroker` and
//! `ClusterServiceBroker` resources. This module exports the CRD models,
//! the mutation engine, the admission adapter and the servers.

pub mod config;
pub mod crd;
pub mod health;
pub mod mutation;
pub mod webhooks;

pub use config::{ConfigError, WebhookConfig};
pub use health::HealthState;
pub use mutation::{Mutation, MutationDefaults, MutationEngine, RuleSet};
pub use webhooks::{WebhookError, WebhookState, run_webhook_server};
