//! Caller-side record of a managed deployment

use chrono::{DateTime, Utc};
use mzcloud_openapi::Deployment;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ProviderError;
use crate::models::deployment::DeploymentView;
use crate::reconcile::fsm::{LifecycleEvent, LifecycleFsm, LifecycleState};

/// What the caller knows about one deployment.
///
/// The identifier is recorded once and never replaced; observed fields are
/// overwritten by every fetch or mutation response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceData {
    id: Option<String>,
    observed: Option<DeploymentView>,
    refreshed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    lifecycle: LifecycleFsm,
}

impl ResourceData {
    /// Empty record for a deployment that does not exist yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for an existing deployment known only by id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            lifecycle: LifecycleFsm::tracking(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Recorded id, or an error naming the operation that needed it
    pub fn require_id(&self, op: &str) -> Result<String, ProviderError> {
        self.id.clone().ok_or_else(|| {
            ProviderError::ValidationError(format!("cannot {} a deployment without an id", op))
        })
    }

    pub fn observed(&self) -> Option<&DeploymentView> {
        self.observed.as_ref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Error message of the last failed operation
    pub fn last_error(&self) -> Option<&str> {
        self.lifecycle.error()
    }

    /// Current view, falling back to the bare id when nothing was observed yet
    pub fn view(&self) -> DeploymentView {
        match (&self.observed, &self.id) {
            (Some(view), _) => view.clone(),
            (None, Some(id)) => DeploymentView {
                id: id.clone(),
                ..Default::default()
            },
            (None, None) => DeploymentView::default(),
        }
    }

    /// Apply an observed deployment.
    ///
    /// Returns `false` and leaves the record untouched when the deployment
    /// carries a different id than the one already recorded.
    pub fn apply(&mut self, deployment: &Deployment) -> bool {
        match &self.id {
            Some(id) if *id != deployment.id => {
                warn!(
                    "Ignoring deployment {} observed for record {}",
                    deployment.id, id
                );
                return false;
            }
            Some(_) => {}
            None => self.id = Some(deployment.id.clone()),
        }
        self.observed = Some(DeploymentView::from(deployment));
        self.refreshed_at = Some(Utc::now());
        true
    }

    /// Forget the deployment after it has been deleted
    pub fn clear(&mut self) {
        self.id = None;
        self.observed = None;
        self.refreshed_at = Some(Utc::now());
    }

    pub(crate) fn transition(&mut self, event: LifecycleEvent) -> Result<(), ProviderError> {
        self.lifecycle.process(event)
    }

    /// Record a failure and hand the error back
    pub(crate) fn fail(&mut self, err: ProviderError) -> ProviderError {
        if let Err(e) = self.lifecycle.process(LifecycleEvent::Fail(err.to_string())) {
            warn!("Could not record failure: {}", e);
        }
        err
    }
}
