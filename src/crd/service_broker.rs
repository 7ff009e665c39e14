//! ServiceBroker and ClusterServiceBroker Custom Resource Definitions.
//!
//! A broker registration points the catalog controller at an Open Service
//! Broker API endpoint. The controller periodically re-fetches ("relists")
//! the broker's catalog; `relistBehavior` selects the trigger policy and
//! `relistRequests` is a counter clients bump to force an immediate relist.

use std::fmt;
use std::str::FromStr;

use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API group of the Service Catalog resources.
pub const SERVICE_CATALOG_GROUP: &str = "servicecatalog.k8s.io";

/// Finalizer the catalog controller requires on every broker so it can
/// clean up offered classes and plans before the broker is removed.
pub const FINALIZER_SERVICE_CATALOG: &str = "kubernetes-incubator/service-catalog";

/// ServiceBroker registers a broker whose offerings are visible in a single namespace.
///
/// Example:
/// ```yaml
/// apiVersion: servicecatalog.k8s.io/v1beta1
/// kind: ServiceBroker
/// metadata:
///   name: ups-broker
///   namespace: brokers
/// spec:
///   url: http://ups-broker.brokers.svc.cluster.local
///   relistBehavior: Duration
///   relistDuration: 15m0s
/// ```
#[derive(CustomResource, Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ServiceBroker",
    plural = "servicebrokers",
    status = "ServiceBrokerStatus",
    derive = "PartialEq",
    namespaced,
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".spec.url"}"#,
    printcolumn = r#"{"name":"Relist", "type":"string", "jsonPath":".spec.relistBehavior"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBrokerSpec {
    #[serde(flatten)]
    pub common: CommonServiceBrokerSpec,

    /// Credentials used to talk to the broker. Secrets live in the broker's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<ServiceBrokerAuthInfo>,
}

/// ClusterServiceBroker registers a broker whose offerings are visible cluster-wide.
#[derive(CustomResource, Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "servicecatalog.k8s.io",
    version = "v1beta1",
    kind = "ClusterServiceBroker",
    plural = "clusterservicebrokers",
    status = "ServiceBrokerStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".spec.url"}"#,
    printcolumn = r#"{"name":"Relist", "type":"string", "jsonPath":".spec.relistBehavior"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceBrokerSpec {
    #[serde(flatten)]
    pub common: CommonServiceBrokerSpec,

    /// Credentials used to talk to the broker. Secrets are referenced by namespace and name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<ClusterServiceBrokerAuthInfo>,
}

/// Fields shared by both broker kinds.
///
/// Fields the webhook may fill in are skipped when unset so that a computed
/// JSON patch adds them rather than replacing a member the stored object
/// might not have.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommonServiceBrokerSpec {
    /// URL of the broker's Open Service Broker API endpoint.
    #[serde(default)]
    pub url: String,

    /// Skip TLS verification when talking to the broker.
    #[serde(
        default,
        rename = "insecureSkipTLSVerify",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub insecure_skip_tls_verify: bool,

    /// Base64 encoded PEM CA bundle used to verify the broker's serving certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,

    /// How the controller decides when to re-fetch the catalog.
    #[serde(default, skip_serializing_if = "RelistBehavior::is_unset")]
    #[schemars(with = "String")]
    pub relist_behavior: RelistBehavior,

    /// Interval between relists when `relistBehavior` is `Duration` (e.g. "15m0s").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relist_duration: Option<String>,

    /// Manual relist trigger. Incrementing it asks the controller to relist now.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub relist_requests: i64,

    /// Filters applied to the broker's catalog before classes and plans are created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_restrictions: Option<CatalogRestrictions>,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Relist trigger policy.
///
/// The empty string is the unset value clients send when they have no
/// preference; the webhook replaces it with the configured default on create.
/// Values other than the two known policies are carried through unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum RelistBehavior {
    /// Relist on a fixed interval (`relistDuration`).
    Duration,
    /// Relist only when `relistRequests` is incremented.
    Manual,
    /// A policy this webhook does not know about.
    Other(String),
    #[default]
    Unset,
}

impl RelistBehavior {
    /// Whether no behavior has been chosen.
    pub fn is_unset(&self) -> bool {
        matches!(self, RelistBehavior::Unset)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RelistBehavior::Duration => "Duration",
            RelistBehavior::Manual => "Manual",
            RelistBehavior::Other(value) => value,
            RelistBehavior::Unset => "",
        }
    }
}

impl From<String> for RelistBehavior {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => RelistBehavior::Unset,
            "Duration" => RelistBehavior::Duration,
            "Manual" => RelistBehavior::Manual,
            _ => RelistBehavior::Other(value),
        }
    }
}

impl From<RelistBehavior> for String {
    fn from(value: RelistBehavior) -> Self {
        match value {
            RelistBehavior::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RelistBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown relist behavior.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown relist behavior {0:?} (expected \"Duration\" or \"Manual\")")]
pub struct ParseRelistBehaviorError(pub String);

impl FromStr for RelistBehavior {
    type Err = ParseRelistBehaviorError;

    /// Parses one of the known behaviors. Unset and unknown values are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Duration" => Ok(RelistBehavior::Duration),
            "Manual" => Ok(RelistBehavior::Manual),
            other => Err(ParseRelistBehaviorError(other.to_string())),
        }
    }
}

/// Restrictions on which classes and plans of the catalog are exposed.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRestrictions {
    /// Label selector style requirements on service classes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_class: Vec<String>,

    /// Label selector style requirements on service plans.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_plan: Vec<String>,
}

/// Auth settings for a namespaced broker.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBrokerAuthInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<LocalSecretAuth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<LocalSecretAuth>,
}

/// Secret in the broker's own namespace.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecretAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    #[serde(default)]
    pub name: String,
}

/// Auth settings for a cluster-scoped broker.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceBrokerAuthInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<ClusterSecretAuth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<ClusterSecretAuth>,
}

/// Secret referenced by namespace and name.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSecretAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<ObjectReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: String,
}

/// Observed state of a broker, written by the catalog controller.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBrokerStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ServiceBrokerCondition>,

    /// Generation of the spec the controller last finished reconciling.
    #[serde(default)]
    pub reconciled_generation: i64,

    /// Start of the in-flight operation, if any (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_start_time: Option<String>,

    /// Time the catalog was last fetched successfully (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_catalog_retrieval_time: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBrokerCondition {
    /// Type of condition ("Ready" or "Failed").
    #[serde(default)]
    pub r#type: String,
    /// Status of the condition ("True", "False", "Unknown").
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_transition_time: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

/// Access to the fields the mutation rules operate on, shared by both broker kinds.
pub trait BrokerResource:
    Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn common_spec(&self) -> &CommonServiceBrokerSpec;
    fn common_spec_mut(&mut self) -> &mut CommonServiceBrokerSpec;
}

impl BrokerResource for ServiceBroker {
    fn common_spec(&self) -> &CommonServiceBrokerSpec {
        &self.spec.common
    }

    fn common_spec_mut(&mut self) -> &mut CommonServiceBrokerSpec {
        &mut self.spec.common
    }
}

impl BrokerResource for ClusterServiceBroker {
    fn common_spec(&self) -> &CommonServiceBrokerSpec {
        &self.spec.common
    }

    fn common_spec_mut(&mut self) -> &mut CommonServiceBrokerSpec {
        &mut self.spec.common
    }
}
