//! Deployment models

use mzcloud_openapi::{Deployment, DeploymentRequest, STATEFULSET_STATUS_OK};
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

/// User-controlled configuration of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredConfig {
    /// Requested size, e.g. `xsmall`
    pub size: String,

    /// Requested Materialize version
    pub mz_version: String,
}

impl DesiredConfig {
    pub fn new(size: impl Into<String>, mz_version: impl Into<String>) -> Self {
        Self {
            size: size.into(),
            mz_version: mz_version.into(),
        }
    }

    /// Check the fields the API cannot default
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.mz_version.trim().is_empty() {
            return Err(ProviderError::ValidationError(
                "mz_version must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the full request body; every update re-sends both fields
    pub fn to_request(&self) -> DeploymentRequest {
        DeploymentRequest {
            size: (!self.size.is_empty()).then(|| self.size.clone()),
            mz_version: self.mz_version.clone(),
        }
    }
}

/// Observed deployment state exposed to callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentView {
    pub id: String,
    pub hostname: String,
    pub cluster_id: String,
    pub name: String,
    pub size: String,
    pub mz_version: String,
}

impl From<&Deployment> for DeploymentView {
    fn from(d: &Deployment) -> Self {
        Self {
            id: d.id.clone(),
            hostname: d.hostname.clone(),
            cluster_id: d.cluster_id.clone(),
            name: d.name.clone(),
            size: d.size.clone(),
            mz_version: d.mz_version.clone(),
        }
    }
}

/// A deployment is converged when no update is pending and its statefulset is ready
pub fn is_converged(d: &Deployment) -> bool {
    !d.flagged_for_update && d.statefulset_status == STATEFULSET_STATUS_OK
}
