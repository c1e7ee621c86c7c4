//! Deployment API client

use std::sync::Arc;

use async_trait::async_trait;
use mzcloud_openapi::{Deployment, DeploymentRequest};

use crate::authn::context::CallContext;
use crate::errors::ProviderError;
use crate::http::client::HttpClient;

const DEPLOYMENTS_PATH: &str = "/api/deployments";

/// Remote operations on a deployment record.
///
/// None of these wait for the deployment to settle; convergence is handled by
/// the reconciler. A `retrieve` of a missing deployment fails with an error
/// whose [`ProviderError::status`] is `404`.
#[async_trait]
pub trait DeploymentsApi: Send + Sync {
    async fn create(
        &self,
        ctx: &CallContext,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError>;

    async fn retrieve(&self, ctx: &CallContext, id: &str) -> Result<Deployment, ProviderError>;

    async fn update(
        &self,
        ctx: &CallContext,
        id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError>;

    async fn destroy(&self, ctx: &CallContext, id: &str) -> Result<(), ProviderError>;
}

fn deployment_path(id: &str) -> String {
    format!("{}/{}", DEPLOYMENTS_PATH, id)
}

fn check_id(id: &str) -> Result<(), ProviderError> {
    if id.is_empty() || id.contains('/') {
        return Err(ProviderError::ValidationError(format!(
            "invalid deployment id: {:?}",
            id
        )));
    }
    Ok(())
}

#[async_trait]
impl DeploymentsApi for HttpClient {
    async fn create(
        &self,
        ctx: &CallContext,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError> {
        self.post(ctx, DEPLOYMENTS_PATH, request).await
    }

    async fn retrieve(&self, ctx: &CallContext, id: &str) -> Result<Deployment, ProviderError> {
        check_id(id)?;
        self.get(ctx, &deployment_path(id)).await
    }

    async fn update(
        &self,
        ctx: &CallContext,
        id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError> {
        check_id(id)?;
        self.put(ctx, &deployment_path(id), request).await
    }

    async fn destroy(&self, ctx: &CallContext, id: &str) -> Result<(), ProviderError> {
        check_id(id)?;
        self.delete(ctx, &deployment_path(id)).await
    }
}

#[async_trait]
impl<T: DeploymentsApi + ?Sized> DeploymentsApi for Arc<T> {
    async fn create(
        &self,
        ctx: &CallContext,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError> {
        (**self).create(ctx, request).await
    }

    async fn retrieve(&self, ctx: &CallContext, id: &str) -> Result<Deployment, ProviderError> {
        (**self).retrieve(ctx, id).await
    }

    async fn update(
        &self,
        ctx: &CallContext,
        id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError> {
        (**self).update(ctx, id, request).await
    }

    async fn destroy(&self, ctx: &CallContext, id: &str) -> Result<(), ProviderError> {
        (**self).destroy(ctx, id).await
    }
}
