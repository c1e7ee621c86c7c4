//! Lifecycle reconciler

use std::time::Duration;

use tracing::{debug, info};

use crate::authn::context::CallContext;
use crate::errors::{Operation, ProviderError};
use crate::http::deployments::DeploymentsApi;
use crate::models::deployment::{DeploymentView, DesiredConfig};
use crate::reconcile::classify::{Classification, ConvergenceTarget};
use crate::reconcile::fsm::LifecycleEvent;
use crate::reconcile::poller::{await_condition, PollOptions};
use crate::reconcile::resource::ResourceData;

/// Drives create, read, update and delete of a deployment to a stable state.
///
/// A reconciler holds no per-deployment state, so one instance can serve
/// many deployments concurrently. Operations against the same deployment must
/// be serialized by the caller.
#[derive(Debug, Clone)]
pub struct Reconciler<C> {
    client: C,
    poll: PollOptions,
}

impl<C: DeploymentsApi> Reconciler<C> {
    pub fn new(client: C, poll: PollOptions) -> Self {
        Self { client, poll }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Create a deployment and wait until it is ready.
    ///
    /// The id is recorded in `data` as soon as the API returns it, so a
    /// failure while waiting still leaves enough to issue a delete.
    pub async fn create(
        &self,
        ctx: &CallContext,
        data: &mut ResourceData,
        desired: &DesiredConfig,
        timeout: Duration,
    ) -> Result<DeploymentView, ProviderError> {
        if let Some(id) = data.id() {
            return Err(ProviderError::ValidationError(format!(
                "record already tracks deployment {}",
                id
            )));
        }
        desired.validate()?;
        data.transition(LifecycleEvent::Create)?;

        info!(
            "Creating deployment (size={}, mz_version={})",
            desired.size, desired.mz_version
        );
        let deployment = match self.client.create(ctx, &desired.to_request()).await {
            Ok(d) => d,
            Err(e) => return Err(data.fail(ProviderError::operation(Operation::Create, e))),
        };
        if deployment.id.is_empty() {
            return Err(data.fail(ProviderError::operation(
                Operation::Create,
                ProviderError::Internal("API returned a deployment without an id".to_string()),
            )));
        }
        data.apply(&deployment);
        data.transition(LifecycleEvent::Accepted)?;

        info!("Deployment {} created, waiting for it to become ready", deployment.id);
        self.converge(ctx, data, &deployment.id, ConvergenceTarget::Ready, timeout)
            .await?;
        data.transition(LifecycleEvent::Converged)?;

        info!("Deployment {} is ready", deployment.id);
        Ok(data.view())
    }

    /// Refresh the observed fields with a single fetch; no retries.
    pub async fn read(
        &self,
        ctx: &CallContext,
        data: &mut ResourceData,
    ) -> Result<DeploymentView, ProviderError> {
        let id = data.require_id("read")?;
        debug!("Reading deployment {}", id);

        let deployment = match self.client.retrieve(ctx, &id).await {
            Ok(d) => d,
            Err(e) => return Err(data.fail(ProviderError::operation(Operation::Retrieve, e))),
        };
        if !data.apply(&deployment) {
            return Err(data.fail(ProviderError::Internal(format!(
                "fetched deployment {} while reading {}",
                deployment.id, id
            ))));
        }
        data.transition(LifecycleEvent::Refreshed)?;
        Ok(data.view())
    }

    /// Send the full desired configuration and wait until the deployment is ready again.
    pub async fn update(
        &self,
        ctx: &CallContext,
        data: &mut ResourceData,
        desired: &DesiredConfig,
        timeout: Duration,
    ) -> Result<DeploymentView, ProviderError> {
        let id = data.require_id("update")?;
        desired.validate()?;
        data.transition(LifecycleEvent::Update)?;

        info!(
            "Updating deployment {} (size={}, mz_version={})",
            id, desired.size, desired.mz_version
        );
        match self.client.update(ctx, &id, &desired.to_request()).await {
            Ok(d) => {
                if !data.apply(&d) {
                    return Err(data.fail(ProviderError::Internal(format!(
                        "update of {} returned deployment {}",
                        id, d.id
                    ))));
                }
            }
            Err(e) => return Err(data.fail(ProviderError::operation(Operation::Update, e))),
        }
        data.transition(LifecycleEvent::Accepted)?;

        self.converge(ctx, data, &id, ConvergenceTarget::Ready, timeout)
            .await?;
        data.transition(LifecycleEvent::Converged)?;

        info!("Deployment {} is ready", id);
        Ok(data.view())
    }

    /// Request deletion and wait until the deployment is no longer found.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        data: &mut ResourceData,
        timeout: Duration,
    ) -> Result<(), ProviderError> {
        let id = data.require_id("delete")?;
        data.transition(LifecycleEvent::Delete)?;

        info!("Deleting deployment {}", id);
        if let Err(e) = self.client.destroy(ctx, &id).await {
            return Err(data.fail(ProviderError::operation(Operation::Delete, e)));
        }
        data.transition(LifecycleEvent::Accepted)?;

        self.converge(ctx, data, &id, ConvergenceTarget::Absent, timeout)
            .await?;
        data.transition(LifecycleEvent::Gone)?;
        data.clear();

        info!("Deployment {} deleted", id);
        Ok(())
    }

    async fn converge(
        &self,
        ctx: &CallContext,
        data: &mut ResourceData,
        id: &str,
        target: ConvergenceTarget,
        timeout: Duration,
    ) -> Result<(), ProviderError> {
        let client = &self.client;
        let result = await_condition(
            &self.poll,
            timeout,
            ctx.cancel_token(),
            move || async move { target.evaluate(target.classify(client.retrieve(ctx, id).await)) },
            |classification: &Classification| {
                if let Some(d) = classification.deployment() {
                    data.apply(d);
                }
            },
        )
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(data.fail(e)),
        }
    }
}
