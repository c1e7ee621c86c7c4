//! API models

use serde::{Deserialize, Serialize};

/// Statefulset status reported once every replica is up
pub const STATEFULSET_STATUS_OK: &str = "OK";

/// Body of a deployment create or update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub mz_version: String,
}

/// A deployment as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub mz_version: String,
    #[serde(default)]
    pub flagged_for_update: bool,
    #[serde(default)]
    pub flagged_for_deletion: bool,
    #[serde(default)]
    pub statefulset_status: String,
}

/// Error response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}
