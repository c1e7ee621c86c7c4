//! Single-operation run loop used by the command-line binary

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::options::ProviderOptions;
use crate::authn::access_token::AccessToken;
use crate::authn::context::CallContext;
use crate::errors::ProviderError;
use crate::filesys::file::File;
use crate::http::client::HttpClient;
use crate::http::deployments::DeploymentsApi;
use crate::models::deployment::{DeploymentView, DesiredConfig};
use crate::reconcile::{Reconciler, ResourceData};

/// Operation requested by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create(DesiredConfig),
    Read,
    Update(DesiredConfig),
    Delete,
}

/// Where the caller's record of the deployment lives
#[derive(Debug, Clone)]
pub struct StateOptions {
    /// JSON file holding the `ResourceData`
    pub state_file: File,

    /// Adopt this deployment id when the state file is empty
    pub adopt_id: Option<String>,
}

/// Run one command against the cloud API.
///
/// The record in the state file is written back whatever the outcome, so a
/// deployment created before a failed wait can still be deleted later.
pub async fn run(
    command: Command,
    options: &ProviderOptions,
    token: AccessToken,
    state: &StateOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<Option<DeploymentView>, ProviderError> {
    let client = HttpClient::with_timeout(&options.backend_base_url, options.request_timeout)?;
    let reconciler = Reconciler::new(client, options.poll.clone());

    let cancel = CancellationToken::new();
    let watcher = spawn_shutdown_watcher(cancel.clone(), shutdown_signal);
    let ctx = CallContext::new(token, cancel);

    let mut data = load_state(state).await?;
    let result = execute(&reconciler, &ctx, &mut data, command, options).await;
    watcher.abort();

    if let Err(e) = save_state(&state.state_file, &data).await {
        error!("Failed to save state to {}: {}", state.state_file.path().display(), e);
        if result.is_ok() {
            return Err(e);
        }
    }
    result
}

/// Dispatch a command to the reconciler
pub async fn execute<C: DeploymentsApi>(
    reconciler: &Reconciler<C>,
    ctx: &CallContext,
    data: &mut ResourceData,
    command: Command,
    options: &ProviderOptions,
) -> Result<Option<DeploymentView>, ProviderError> {
    match command {
        Command::Create(desired) => reconciler
            .create(ctx, data, &desired, options.timeouts.create)
            .await
            .map(Some),
        Command::Read => reconciler.read(ctx, data).await.map(Some),
        Command::Update(desired) => reconciler
            .update(ctx, data, &desired, options.timeouts.update)
            .await
            .map(Some),
        Command::Delete => reconciler
            .delete(ctx, data, options.timeouts.delete)
            .await
            .map(|_| None),
    }
}

fn spawn_shutdown_watcher(
    cancel: CancellationToken,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal.await;
        warn!("Shutdown requested, cancelling in-flight operation...");
        cancel.cancel();
    })
}

async fn load_state(state: &StateOptions) -> Result<ResourceData, ProviderError> {
    if state.state_file.exists().await {
        let data: ResourceData = state.state_file.read_json().await?;
        if let (Some(recorded), Some(adopt)) = (data.id(), state.adopt_id.as_deref()) {
            if recorded != adopt {
                return Err(ProviderError::ValidationError(format!(
                    "state file tracks deployment {} but --id={} was given",
                    recorded, adopt
                )));
            }
        }
        if data.id().is_some() || state.adopt_id.is_none() {
            return Ok(data);
        }
    }

    Ok(match &state.adopt_id {
        Some(id) => {
            info!("Adopting existing deployment {}", id);
            ResourceData::with_id(id.clone())
        }
        None => ResourceData::new(),
    })
}

async fn save_state(file: &File, data: &ResourceData) -> Result<(), ProviderError> {
    file.write_json(data).await
}
