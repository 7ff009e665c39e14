// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for servicecatalog-webhook.
//!
//! Uses proptest to generate random brokers and verify the mutation rules.

#[path = "../common/mod.rs"]
mod common;

use kube::ResourceExt;
use proptest::prelude::*;

use servicecatalog_webhook::crd::RelistBehavior;
use servicecatalog_webhook::mutation::{
    MutationDefaults, MutationEngine, cluster_service_broker_rules, service_broker_rules,
};
use servicecatalog_webhook::webhooks::{MutatingHandler, MutationOutcome, Operation};

use common::fixtures::{BrokerBuilder, admission_request, apply_patch, to_json};

/// Strategy for client-supplied finalizer lists (possibly empty).
fn any_finalizers() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}(/[a-z-]{1,12})?", 0..5)
}

/// Strategy for relist behavior, including unset.
fn any_behavior() -> impl Strategy<Value = RelistBehavior> {
    prop_oneof![
        Just(RelistBehavior::Unset),
        Just(RelistBehavior::Duration),
        Just(RelistBehavior::Manual),
        "[A-Z][a-z]{2,8}".prop_map(RelistBehavior::from),
    ]
}

/// Strategy for a configured default (never unset).
fn configured_behavior() -> impl Strategy<Value = RelistBehavior> {
    prop_oneof![Just(RelistBehavior::Duration), Just(RelistBehavior::Manual)]
}

/// Strategy for finalizer tokens.
fn any_token() -> impl Strategy<Value = String> {
    "[a-z]{1,10}/[a-z-]{1,16}"
}

/// Strategy for operations the engine ignores.
fn ignored_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![Just(Operation::Delete), Just(Operation::Connect)]
}

fn defaults(finalizer: String, relist_behavior: RelistBehavior) -> MutationDefaults {
    MutationDefaults {
        finalizer,
        relist_behavior,
    }
}

proptest! {
    /// Property: CREATE leaves exactly one finalizer, the configured token.
    #[test]
    fn create_replaces_finalizers(
        finalizers in any_finalizers(),
        behavior in any_behavior(),
        token in any_token(),
    ) {
        let engine = MutationEngine::new(
            cluster_service_broker_rules(),
            defaults(token.clone(), RelistBehavior::Duration),
        );
        let broker = BrokerBuilder::default()
            .finalizers(finalizers)
            .relist_behavior(behavior)
            .cluster();

        let mutated = engine.mutate(&Operation::Create, &broker, None).into_inner();
        prop_assert_eq!(mutated.finalizers().to_vec(), vec![token]);
    }

    /// Property: CREATE fills an unset behavior and keeps a set one.
    #[test]
    fn create_defaults_only_unset_behavior(
        behavior in any_behavior(),
        default in configured_behavior(),
    ) {
        let engine = MutationEngine::new(
            service_broker_rules(),
            defaults("kubernetes-incubator/service-catalog".to_string(), default.clone()),
        );
        let broker = BrokerBuilder::default().relist_behavior(behavior.clone()).namespaced();

        let mutated = engine.mutate(&Operation::Create, &broker, None).into_inner();
        let expected = if behavior.is_unset() { default } else { behavior };
        prop_assert_eq!(mutated.spec.common.relist_behavior, expected);
    }

    /// Property: CREATE is idempotent.
    #[test]
    fn create_is_idempotent(
        finalizers in any_finalizers(),
        behavior in any_behavior(),
        requests in 0..1000i64,
    ) {
        let engine = MutationEngine::new(cluster_service_broker_rules(), MutationDefaults::default());
        let broker = BrokerBuilder::default()
            .finalizers(finalizers)
            .relist_behavior(behavior)
            .relist_requests(requests)
            .cluster();

        let once = engine.mutate(&Operation::Create, &broker, None).into_inner();
        let twice = engine.mutate(&Operation::Create, &once, None).into_inner();
        prop_assert_eq!(once, twice);
    }

    /// Property: CREATE never touches the relist counter.
    #[test]
    fn create_keeps_relist_requests(requests in 0..1000i64) {
        let engine = MutationEngine::new(cluster_service_broker_rules(), MutationDefaults::default());
        let broker = BrokerBuilder::default().relist_requests(requests).cluster();

        let mutated = engine.mutate(&Operation::Create, &broker, None).into_inner();
        prop_assert_eq!(mutated.spec.common.relist_requests, requests);
    }

    /// Property: UPDATE with a zero counter takes the stored value.
    #[test]
    fn update_carries_over_zero(old_requests in 0..1000i64, finalizers in any_finalizers()) {
        let engine = MutationEngine::new(cluster_service_broker_rules(), MutationDefaults::default());
        let old = BrokerBuilder::default().relist_requests(old_requests).cluster();
        let new = BrokerBuilder::default().finalizers(finalizers.clone()).cluster();

        let mutated = engine.mutate(&Operation::Update, &new, Some(&old)).into_inner();
        prop_assert_eq!(mutated.spec.common.relist_requests, old_requests);
        prop_assert_eq!(mutated.finalizers().to_vec(), finalizers);
    }

    /// Property: UPDATE with a non-zero counter keeps it.
    #[test]
    fn update_passes_through_non_zero(old_requests in 0..1000i64, new_requests in 1..1000i64) {
        let engine = MutationEngine::new(cluster_service_broker_rules(), MutationDefaults::default());
        let old = BrokerBuilder::default().relist_requests(old_requests).cluster();
        let new = BrokerBuilder::default().relist_requests(new_requests).cluster();

        let mutated = engine.mutate(&Operation::Update, &new, Some(&old)).into_inner();
        prop_assert_eq!(mutated.spec.common.relist_requests, new_requests);
    }

    /// Property: namespaced UPDATE is the identity.
    #[test]
    fn namespaced_update_is_identity(
        old_requests in 0..1000i64,
        new_requests in 0..1000i64,
        behavior in any_behavior(),
    ) {
        let engine = MutationEngine::new(service_broker_rules(), MutationDefaults::default());
        let old = BrokerBuilder::default().relist_requests(old_requests).namespaced();
        let new = BrokerBuilder::default()
            .relist_requests(new_requests)
            .relist_behavior(behavior)
            .namespaced();

        let mutated = engine.mutate(&Operation::Update, &new, Some(&old)).into_inner();
        prop_assert_eq!(mutated, new);
    }

    /// Property: DELETE and CONNECT leave the object untouched.
    #[test]
    fn ignored_operations_are_skipped(
        operation in ignored_operation(),
        finalizers in any_finalizers(),
        behavior in any_behavior(),
    ) {
        let engine = MutationEngine::new(cluster_service_broker_rules(), MutationDefaults::default());
        let broker = BrokerBuilder::default()
            .finalizers(finalizers)
            .relist_behavior(behavior)
            .cluster();

        let result = engine.mutate(&operation, &broker, None);
        prop_assert!(!result.is_applied());
        prop_assert_eq!(result.into_inner(), broker);
    }

    /// Property: the CREATE patch applied to the submitted object yields the mutated object.
    #[test]
    fn create_patch_reproduces_mutation(
        finalizers in any_finalizers(),
        behavior in any_behavior(),
        requests in 0..1000i64,
    ) {
        let engine = MutationEngine::new(cluster_service_broker_rules(), MutationDefaults::default());
        let handler = MutatingHandler::new(MutationEngine::new(
            cluster_service_broker_rules(),
            MutationDefaults::default(),
        ));
        let broker = BrokerBuilder::default()
            .finalizers(finalizers)
            .relist_behavior(behavior)
            .relist_requests(requests)
            .cluster();
        let submitted = to_json(&broker);

        let request = admission_request("ClusterServiceBroker", "CREATE", Some(submitted.clone()), None);
        let MutationOutcome::Patched(patch) = handler.handle(&request).unwrap() else {
            panic!("CREATE is always handled");
        };

        let expected = to_json(&engine.mutate(&Operation::Create, &broker, None).into_inner());
        prop_assert_eq!(apply_patch(&submitted, &patch), expected);
    }
}
