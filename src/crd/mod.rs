//! Custom Resource Definitions (CRDs) for the Service Catalog broker resources.
//!
//! - `ServiceBroker`: namespaced broker registration
//! - `ClusterServiceBroker`: cluster-scoped broker registration
//!
//! Both kinds share `CommonServiceBrokerSpec`, which carries the relist
//! fields the mutating webhook normalizes.

mod service_broker;

pub use service_broker::*;
