//! Defaulting rules and the per-kind rule sets built from them.

use kube::ResourceExt;

use super::{MutationDefaults, RuleSet};
use crate::crd::{BrokerResource, ClusterServiceBroker, ServiceBroker};

/// Replace whatever finalizers the client sent with the catalog finalizer.
pub fn attach_catalog_finalizer<K: BrokerResource>(defaults: &MutationDefaults, obj: &mut K) {
    *obj.finalizers_mut() = vec![defaults.finalizer.clone()];
}

/// Fill in the default relist behavior when the client left it unset.
pub fn default_relist_behavior<K: BrokerResource>(defaults: &MutationDefaults, obj: &mut K) {
    let spec = obj.common_spec_mut();
    if spec.relist_behavior.is_unset() {
        spec.relist_behavior = defaults.relist_behavior.clone();
    }
}

/// Keep the stored relist counter when the update does not mention it.
///
/// A zero counter is the serialization default, not a reset request. Any
/// non-zero value is an explicit relist request and passes through.
pub fn carry_over_relist_requests<K: BrokerResource>(
    _defaults: &MutationDefaults,
    old: &K,
    new: &mut K,
) {
    if new.common_spec().relist_requests == 0 {
        new.common_spec_mut().relist_requests = old.common_spec().relist_requests;
    }
}

/// Rules for namespaced brokers.
///
/// UPDATE has no rules: the namespaced update defaulting has not been
/// specified, so updates pass through with an empty patch.
pub fn service_broker_rules() -> RuleSet<ServiceBroker> {
    RuleSet::new()
        .on_create(attach_catalog_finalizer)
        .on_create(default_relist_behavior)
}

/// Rules for cluster-scoped brokers.
pub fn cluster_service_broker_rules() -> RuleSet<ClusterServiceBroker> {
    RuleSet::new()
        .on_create(attach_catalog_finalizer)
        .on_create(default_relist_behavior)
        .on_update(carry_over_relist_requests)
}
