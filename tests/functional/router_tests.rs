//! HTTP-level tests against the webhook router.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use servicecatalog_webhook::crd::RelistBehavior;
use servicecatalog_webhook::webhooks::{
    CLUSTER_SERVICE_BROKER_PATH, SERVICE_BROKER_PATH, WebhookState, create_webhook_router,
};
use servicecatalog_webhook::{HealthState, MutationDefaults};
use tower::ServiceExt;

use crate::common::fixtures::{BrokerBuilder, admission_review, to_json};

fn state(defaults: MutationDefaults) -> Arc<WebhookState> {
    Arc::new(WebhookState::new(defaults, Arc::new(HealthState::new())))
}

async fn post(router: Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_response_echoes_request_uid() {
    let router = create_webhook_router(state(MutationDefaults::default()));
    let object = to_json(&BrokerBuilder::default().namespaced());

    let (status, body) = post(
        router,
        SERVICE_BROKER_PATH,
        admission_review("ServiceBroker", "CREATE", Some(object), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["apiVersion"], "admission.k8s.io/v1");
    assert_eq!(body["kind"], "AdmissionReview");
    assert_eq!(body["response"]["uid"], "0df28fbd-5f5f-11e8-bc74-36e6bb280816");
    assert_eq!(body["response"]["allowed"], true);
    assert!(!body["response"]["patch"].is_null());
}

#[tokio::test]
async fn test_normalized_object_has_no_patch() {
    let router = create_webhook_router(state(MutationDefaults::default()));
    let object = to_json(
        &BrokerBuilder::default()
            .finalizer("kubernetes-incubator/service-catalog")
            .relist_behavior(RelistBehavior::Duration)
            .cluster(),
    );

    let (status, body) = post(
        router,
        CLUSTER_SERVICE_BROKER_PATH,
        admission_review("ClusterServiceBroker", "CREATE", Some(object), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], true);
    assert!(body["response"].get("patch").is_none());
}

#[tokio::test]
async fn test_missing_old_object_is_rejected_in_review() {
    let state = state(MutationDefaults::default());
    let router = create_webhook_router(state.clone());
    let object = to_json(&BrokerBuilder::default().cluster());

    let (status, body) = post(
        router,
        CLUSTER_SERVICE_BROKER_PATH,
        admission_review("ClusterServiceBroker", "UPDATE", Some(object), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], false);
    assert_eq!(body["response"]["status"]["code"], 400);
    assert!(
        body["response"]["status"]["message"]
            .as_str()
            .unwrap()
            .contains("old object")
    );

    let metrics = state.health.metrics.encode();
    assert!(metrics.contains("operation=\"UPDATE\""));
    assert!(metrics.contains("outcome=\"error\""));
}

#[tokio::test]
async fn test_delete_is_allowed_without_patch() {
    let router = create_webhook_router(state(MutationDefaults::default()));
    let old = to_json(&BrokerBuilder::default().namespaced());

    let (status, body) = post(
        router,
        SERVICE_BROKER_PATH,
        admission_review("ServiceBroker", "DELETE", None, Some(old)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], true);
    assert!(body["response"].get("patch").is_none());
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let router = create_webhook_router(state(MutationDefaults::default()));
    let request = Request::builder()
        .method("POST")
        .uri("/validate-servicebrokers")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_configured_default_behavior_is_used() {
    let defaults = MutationDefaults {
        relist_behavior: RelistBehavior::Manual,
        ..MutationDefaults::default()
    };
    let router = create_webhook_router(state(defaults));
    let object = to_json(&BrokerBuilder::default().cluster());

    let (_, body) = post(
        router,
        CLUSTER_SERVICE_BROKER_PATH,
        admission_review("ClusterServiceBroker", "CREATE", Some(object), None),
    )
    .await;

    assert_eq!(body["response"]["allowed"], true);
    let patch = body["response"]["patch"].to_string();
    assert!(!patch.is_empty());
}
