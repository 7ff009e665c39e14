//! Admission webhook server.
//!
//! Provides one HTTPS endpoint per broker kind:
//! - `POST /mutating-servicebrokers`
//! - `POST /mutating-clusterservicebrokers`
//!
//! To enable the webhook:
//! 1. Deploy cert-manager (or any issuer) for the serving certificate
//! 2. Create a MutatingWebhookConfiguration pointing at the two paths
//! 3. Mount the TLS certificate secret to the pod at /etc/webhook/certs/

use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use thiserror::Error;
use tracing::{error, info};

use crate::config::WebhookConfig;
use crate::crd::{BrokerResource, ClusterServiceBroker, ServiceBroker};
use crate::health::HealthState;
use crate::mutation::{
    MutationDefaults, MutationEngine, cluster_service_broker_rules, service_broker_rules,
};
use crate::webhooks::admission::{MutatingHandler, into_response};

/// Path of the ServiceBroker mutating endpoint
pub const SERVICE_BROKER_PATH: &str = "/mutating-servicebrokers";
/// Path of the ClusterServiceBroker mutating endpoint
pub const CLUSTER_SERVICE_BROKER_PATH: &str = "/mutating-clusterservicebrokers";

/// Shared state for webhook handlers
pub struct WebhookState {
    pub service_brokers: MutatingHandler<ServiceBroker>,
    pub cluster_service_brokers: MutatingHandler<ClusterServiceBroker>,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    /// Build both handlers from the same defaults.
    pub fn new(defaults: MutationDefaults, health: Arc<HealthState>) -> Self {
        Self {
            service_brokers: MutatingHandler::new(MutationEngine::new(
                service_broker_rules(),
                defaults.clone(),
            )),
            cluster_service_brokers: MutatingHandler::new(MutationEngine::new(
                cluster_service_broker_rules(),
                defaults,
            )),
            health,
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(SERVICE_BROKER_PATH, post(mutate_service_broker))
        .route(CLUSTER_SERVICE_BROKER_PATH, post(mutate_cluster_service_broker))
        .with_state(state)
}

async fn mutate_service_broker(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    admit(&state.service_brokers, &state.health, review)
}

async fn mutate_cluster_service_broker(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    admit(&state.cluster_service_brokers, &state.health, review)
}

/// Run one review through a handler and wrap the response.
///
/// Processed requests are always answered with 200; admission failures are
/// reported inside the review's response status.
fn admit<K: BrokerResource>(
    handler: &MutatingHandler<K>,
    health: &HealthState,
    review: AdmissionReview<DynamicObject>,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let started = Instant::now();
    let result = handler.handle(&request);
    let outcome = match &result {
        Ok(outcome) => outcome.label(),
        Err(_) => "error",
    };
    health.metrics.record_admission(
        &handler.kind(),
        &format!("{:?}", request.operation).to_uppercase(),
        outcome,
        started.elapsed().as_secs_f64(),
    );

    (
        StatusCode::OK,
        Json(into_response(&request, &result).into_review()),
    )
}

/// Errors that can occur when running the webhook server
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on `config.webhook_port` and serves both mutating
/// endpoints. The certificate and key are PEM files.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    config: &WebhookConfig,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;

    let app = create_webhook_router(state);

    let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
    info!(port = config.webhook_port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
