//! Admission adapter around the mutation engine.
//!
//! Turns an `AdmissionRequest<DynamicObject>` into a typed broker, runs the
//! engine, and diffs the decoded object against the mutated one to produce
//! an RFC 6902 patch.
//!
//! The patch base is the decoded object re-serialized, not the raw request
//! body, so fields outside the typed model are never touched by the patch.

use json_patch::Patch;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::crd::BrokerResource;
use crate::mutation::MutationEngine;

/// Failures of the admission pipeline. The engine itself cannot fail.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The request targets a different kind than this handler serves.
    #[error("kind mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },

    #[error("request does not contain an object")]
    MissingObject,

    #[error("update request does not contain the old object")]
    MissingOldObject,

    /// `object` or `oldObject` does not decode into the typed resource.
    #[error("could not decode {field}: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not serialize mutated object: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl AdmissionError {
    /// HTTP-style status code reported in the admission response.
    pub fn status_code(&self) -> u16 {
        match self {
            AdmissionError::Serialization(_) => 500,
            AdmissionError::KindMismatch { .. }
            | AdmissionError::MissingObject
            | AdmissionError::MissingOldObject
            | AdmissionError::Decode { .. } => 400,
        }
    }

    /// Short machine-readable name used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::KindMismatch { .. } => "KindMismatch",
            AdmissionError::MissingObject => "MissingObject",
            AdmissionError::MissingOldObject => "MissingOldObject",
            AdmissionError::Decode { .. } => "DecodeFailed",
            AdmissionError::Serialization(_) => "SerializationFailed",
        }
    }
}

/// Successful result of the admission pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The operation is not one this webhook mutates; allowed unchanged.
    NotHandled,
    /// The object was normalized. The patch may be empty.
    Patched(Patch),
}

impl MutationOutcome {
    /// Metric label for the outcome.
    pub fn label(&self) -> &'static str {
        match self {
            MutationOutcome::NotHandled => "not_handled",
            MutationOutcome::Patched(patch) if patch.0.is_empty() => "unchanged",
            MutationOutcome::Patched(_) => "patched",
        }
    }
}

/// Mutating admission handler for one broker kind.
pub struct MutatingHandler<K> {
    engine: MutationEngine<K>,
}

impl<K: BrokerResource> MutatingHandler<K> {
    pub fn new(engine: MutationEngine<K>) -> Self {
        Self { engine }
    }

    /// Kind served by this handler.
    pub fn kind(&self) -> String {
        K::kind(&()).into_owned()
    }

    /// Run the pipeline for one request and log the result.
    pub fn handle(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<MutationOutcome, AdmissionError> {
        let uid = &request.uid;
        info!(
            uid = %uid,
            operation = ?request.operation,
            kind = %request.kind.kind,
            name = %request.name,
            "Start handling admission request"
        );

        let result = self.mutate(request);
        match &result {
            Ok(MutationOutcome::NotHandled) => {
                info!(
                    uid = %uid,
                    operation = ?request.operation,
                    "{} mutation webhook does not support this operation, action not taken",
                    self.kind()
                );
            }
            Ok(MutationOutcome::Patched(patch)) => {
                info!(
                    uid = %uid,
                    operation = ?request.operation,
                    kind = %request.kind.kind,
                    name = %request.name,
                    patch_ops = patch.0.len(),
                    "Completed admission request"
                );
            }
            Err(e @ AdmissionError::Serialization(_)) => {
                error!(uid = %uid, error = %e, "Failed to serialize mutated object");
            }
            Err(e) => {
                warn!(uid = %uid, error = %e, "Rejecting admission request");
            }
        }
        result
    }

    fn mutate(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<MutationOutcome, AdmissionError> {
        self.match_kind(request)?;

        if !self.engine.handles(&request.operation) {
            return Ok(MutationOutcome::NotHandled);
        }

        let object = request
            .object
            .as_ref()
            .ok_or(AdmissionError::MissingObject)?;
        let new: K = decode(object, "object")?;

        let old: Option<K> = match request.operation {
            Operation::Update => {
                let old_object = request
                    .old_object
                    .as_ref()
                    .ok_or(AdmissionError::MissingOldObject)?;
                Some(decode(old_object, "oldObject")?)
            }
            _ => None,
        };

        let mutation = self.engine.mutate(&request.operation, &new, old.as_ref());
        if !mutation.is_applied() {
            return Ok(MutationOutcome::NotHandled);
        }

        let original = serde_json::to_value(&new).map_err(AdmissionError::Serialization)?;
        let mutated =
            serde_json::to_value(mutation.object()).map_err(AdmissionError::Serialization)?;

        Ok(MutationOutcome::Patched(json_patch::diff(&original, &mutated)))
    }

    /// Group and kind must match; the version is not compared.
    fn match_kind(&self, request: &AdmissionRequest<DynamicObject>) -> Result<(), AdmissionError> {
        let group = K::group(&());
        let kind = K::kind(&());
        if request.kind.group == group && request.kind.kind == kind {
            return Ok(());
        }
        Err(AdmissionError::KindMismatch {
            expected: format!("{}/{}", group, kind),
            actual: format!("{}/{}", request.kind.group, request.kind.kind),
        })
    }
}

fn decode<K: DeserializeOwned>(
    object: &DynamicObject,
    field: &'static str,
) -> Result<K, AdmissionError> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|source| AdmissionError::Decode { field, source })
}

/// Build the admission response for a pipeline result.
pub fn into_response(
    request: &AdmissionRequest<DynamicObject>,
    result: &Result<MutationOutcome, AdmissionError>,
) -> AdmissionResponse {
    match result {
        Ok(MutationOutcome::NotHandled) => AdmissionResponse::from(request),
        Ok(MutationOutcome::Patched(patch)) if patch.0.is_empty() => {
            AdmissionResponse::from(request)
        }
        Ok(MutationOutcome::Patched(patch)) => {
            match AdmissionResponse::from(request).with_patch(patch.clone()) {
                Ok(response) => response,
                Err(e) => {
                    error!(uid = %request.uid, error = %e, "Failed to serialize patch");
                    errored(request, 500, format!("patch serialization error: {e}"))
                }
            }
        }
        Err(e) => errored(request, e.status_code(), e.to_string()),
    }
}

/// Rejection carrying an HTTP-style status code in `response.status.code`.
fn errored(
    request: &AdmissionRequest<DynamicObject>,
    code: u16,
    message: String,
) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request).deny(message);
    response.result.code = code;
    response
}
