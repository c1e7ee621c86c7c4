//! Reconciler tests against an in-memory deployments API

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use mzcloud_openapi::{Deployment, DeploymentRequest};
use mzcloud_provider::authn::access_token::AccessToken;
use mzcloud_provider::authn::context::CallContext;
use mzcloud_provider::errors::ProviderError;
use mzcloud_provider::http::deployments::DeploymentsApi;
use mzcloud_provider::models::deployment::{DeploymentView, DesiredConfig};
use mzcloud_provider::reconcile::fsm::LifecycleState;
use mzcloud_provider::reconcile::poller::PollOptions;
use mzcloud_provider::reconcile::{Reconciler, ResourceData};
use mzcloud_provider::utils::CooldownOptions;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create(DeploymentRequest),
    Retrieve(String),
    Update(String, DeploymentRequest),
    Destroy(String),
}

#[derive(Debug, Clone)]
enum Fetch {
    Found(Deployment),
    Status(StatusCode),
}

/// Deployments API double; the last scripted fetch repeats forever
#[derive(Default)]
struct FakeClient {
    created: Mutex<Option<Deployment>>,
    updated: Mutex<Option<Deployment>>,
    fail_mutations: Mutex<Option<StatusCode>>,
    fetches: Mutex<VecDeque<Fetch>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeClient {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn on_create(&self, deployment: Deployment) {
        *self.created.lock().unwrap() = Some(deployment);
    }

    fn on_update(&self, deployment: Deployment) {
        *self.updated.lock().unwrap() = Some(deployment);
    }

    fn fail_mutations_with(&self, status: StatusCode) {
        *self.fail_mutations.lock().unwrap() = Some(status);
    }

    fn script(&self, fetches: Vec<Fetch>) {
        *self.fetches.lock().unwrap() = fetches.into();
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Retrieve(_)))
            .count()
    }

    fn mutation_error(&self) -> Option<ProviderError> {
        self.fail_mutations
            .lock()
            .unwrap()
            .map(|status| ProviderError::ApiError {
                status,
                body: "{\"detail\":\"rejected\"}".to_string(),
            })
    }
}

#[async_trait]
impl DeploymentsApi for FakeClient {
    async fn create(
        &self,
        _ctx: &CallContext,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError> {
        self.calls.lock().unwrap().push(Call::Create(request.clone()));
        if let Some(e) = self.mutation_error() {
            return Err(e);
        }
        Ok(self.created.lock().unwrap().clone().unwrap_or_default())
    }

    async fn retrieve(&self, _ctx: &CallContext, id: &str) -> Result<Deployment, ProviderError> {
        self.calls.lock().unwrap().push(Call::Retrieve(id.to_string()));
        let mut fetches = self.fetches.lock().unwrap();
        let next = if fetches.len() > 1 {
            fetches.pop_front()
        } else {
            fetches.front().cloned()
        };
        match next {
            Some(Fetch::Found(d)) => Ok(d),
            Some(Fetch::Status(status)) => Err(ProviderError::ApiError {
                status,
                body: String::new(),
            }),
            None => Err(ProviderError::Internal("no fetch scripted".to_string())),
        }
    }

    async fn update(
        &self,
        _ctx: &CallContext,
        id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Update(id.to_string(), request.clone()));
        if let Some(e) = self.mutation_error() {
            return Err(e);
        }
        if let Some(reply) = self.updated.lock().unwrap().clone() {
            return Ok(reply);
        }
        Ok(Deployment {
            id: id.to_string(),
            size: request.size.clone().unwrap_or_default(),
            mz_version: request.mz_version.clone(),
            flagged_for_update: true,
            statefulset_status: "OK".to_string(),
            ..Default::default()
        })
    }

    async fn destroy(&self, _ctx: &CallContext, id: &str) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(Call::Destroy(id.to_string()));
        match self.mutation_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn deployment(id: &str, flagged_for_update: bool, status: &str) -> Deployment {
    Deployment {
        id: id.to_string(),
        name: "crimson-otter".to_string(),
        hostname: format!("{}.materialize.cloud", id),
        cluster_id: "cluster-1".to_string(),
        size: "xsmall".to_string(),
        mz_version: "0.10".to_string(),
        flagged_for_update,
        flagged_for_deletion: false,
        statefulset_status: status.to_string(),
    }
}

fn reconciler(client: &Arc<FakeClient>) -> Reconciler<Arc<FakeClient>> {
    Reconciler::new(
        client.clone(),
        PollOptions {
            backoff: CooldownOptions {
                base_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(2),
                multiplier: 2.0,
                jitter_factor: 0.1,
            },
        },
    )
}

fn ctx() -> CallContext {
    CallContext::detached(AccessToken::new("test-token").unwrap())
}

const TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::test(start_paused = true)]
async fn test_create_waits_until_ready() {
    let client = FakeClient::new();
    client.on_create(deployment("d1", true, "PENDING"));
    client.script(vec![Fetch::Found(deployment("d1", false, "OK"))]);
    let mut data = ResourceData::new();

    let view = reconciler(&client)
        .create(&ctx(), &mut data, &DesiredConfig::new("xsmall", "0.10"), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(
        view,
        DeploymentView {
            id: "d1".to_string(),
            hostname: "d1.materialize.cloud".to_string(),
            cluster_id: "cluster-1".to_string(),
            name: "crimson-otter".to_string(),
            size: "xsmall".to_string(),
            mz_version: "0.10".to_string(),
        }
    );
    assert_eq!(data.state(), LifecycleState::Ready);
    assert_eq!(
        client.calls(),
        vec![
            Call::Create(DeploymentRequest {
                size: Some("xsmall".to_string()),
                mz_version: "0.10".to_string(),
            }),
            Call::Retrieve("d1".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_create_client_error_records_nothing() {
    let client = FakeClient::new();
    client.fail_mutations_with(StatusCode::BAD_REQUEST);
    let mut data = ResourceData::new();

    let err = reconciler(&client)
        .create(&ctx(), &mut data, &DesiredConfig::new("xsmall", "0.10"), TIMEOUT)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("failed to create deployment"));
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert!(data.id().is_none());
    assert_eq!(data.state(), LifecycleState::Failed);
    assert_eq!(client.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_timeout_keeps_id_for_cleanup() {
    let client = FakeClient::new();
    client.on_create(deployment("d1", true, "PENDING"));
    client.script(vec![
        Fetch::Found(deployment("d1", true, "PENDING")),
        Fetch::Found(Deployment {
            hostname: "late.materialize.cloud".to_string(),
            ..deployment("d1", true, "PENDING")
        }),
    ]);
    let mut data = ResourceData::new();
    let reconciler = reconciler(&client);

    let err = reconciler
        .create(
            &ctx(),
            &mut data,
            &DesiredConfig::new("xsmall", "0.10"),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

    match err {
        ProviderError::Timeout { last, .. } => assert_eq!(
            last,
            "expected deployment to be ready but got flagged_for_update=true status=PENDING"
        ),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(data.id(), Some("d1"));
    assert_eq!(data.view().hostname, "late.materialize.cloud");
    assert_eq!(data.state(), LifecycleState::Failed);
    assert!(client.fetch_count() > 1);

    // The recorded id is enough to clean up
    client.script(vec![Fetch::Status(StatusCode::NOT_FOUND)]);
    assert_ok!(reconciler.delete(&ctx(), &mut data, TIMEOUT).await);
    assert!(data.id().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_read_refreshes_without_retry() {
    let client = FakeClient::new();
    client.script(vec![Fetch::Found(deployment("d1", false, "OK"))]);
    let mut data = ResourceData::with_id("d1");

    let view = reconciler(&client).read(&ctx(), &mut data).await.unwrap();
    assert_eq!(view.hostname, "d1.materialize.cloud");
    assert!(data.refreshed_at().is_some());

    client.script(vec![Fetch::Status(StatusCode::BAD_GATEWAY)]);
    let err = reconciler(&client).read(&ctx(), &mut data).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(data.state(), LifecycleState::Failed);
    assert_eq!(client.fetch_count(), 2);
    // Previously observed fields survive a failed read
    assert_eq!(data.view().hostname, "d1.materialize.cloud");
}

#[tokio::test(start_paused = true)]
async fn test_read_requires_id() {
    let client = FakeClient::new();
    let mut data = ResourceData::new();
    assert!(matches!(
        reconciler(&client).read(&ctx(), &mut data).await,
        Err(ProviderError::ValidationError(_))
    ));
    assert!(client.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_resends_full_config_each_time() {
    let client = FakeClient::new();
    client.script(vec![Fetch::Found(deployment("d1", false, "OK"))]);
    let reconciler = reconciler(&client);
    let mut data = ResourceData::with_id("d1");
    let desired = DesiredConfig::new("small", "0.11");

    assert_ok!(reconciler.update(&ctx(), &mut data, &desired, TIMEOUT).await);
    assert_ok!(reconciler.update(&ctx(), &mut data, &desired, TIMEOUT).await);

    let updates: Vec<Call> = client
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Update(..)))
        .collect();
    let expected = Call::Update(
        "d1".to_string(),
        DeploymentRequest {
            size: Some("small".to_string()),
            mz_version: "0.11".to_string(),
        },
    );
    assert_eq!(updates, vec![expected.clone(), expected]);
}

#[tokio::test(start_paused = true)]
async fn test_update_waits_out_pending_flag() {
    let client = FakeClient::new();
    client.script(vec![
        Fetch::Found(deployment("d1", true, "OK")),
        Fetch::Found(deployment("d1", false, "PENDING")),
        Fetch::Found(deployment("d1", false, "OK")),
    ]);
    let mut data = ResourceData::with_id("d1");

    assert_ok!(
        reconciler(&client)
            .update(&ctx(), &mut data, &DesiredConfig::new("xsmall", "0.10"), TIMEOUT)
            .await
    );
    assert_eq!(client.fetch_count(), 3);
    assert_eq!(data.state(), LifecycleState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_update_keeps_waiting_while_not_found() {
    let client = FakeClient::new();
    client.script(vec![Fetch::Status(StatusCode::NOT_FOUND)]);
    let mut data = ResourceData::with_id("d1");

    let err = reconciler(&client)
        .update(
            &ctx(),
            &mut data,
            &DesiredConfig::new("xsmall", "0.10"),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

    match err {
        ProviderError::Timeout { last, .. } => assert_eq!(
            last,
            "expected deployment to be ready but it was not found"
        ),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(client.fetch_count() > 1);
    assert_eq!(data.id(), Some("d1"));
    assert_eq!(data.state(), LifecycleState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_update_rejects_foreign_deployment() {
    let client = FakeClient::new();
    client.on_update(deployment("d2", true, "OK"));
    let mut data = ResourceData::with_id("d1");

    let err = reconciler(&client)
        .update(&ctx(), &mut data, &DesiredConfig::new("xsmall", "0.10"), TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Internal(_)));
    assert_eq!(client.fetch_count(), 0);
    assert_eq!(data.id(), Some("d1"));
    assert_eq!(data.state(), LifecycleState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_for_not_found() {
    let client = FakeClient::new();
    client.script(vec![
        Fetch::Found(Deployment {
            flagged_for_deletion: true,
            ..deployment("d1", false, "OK")
        }),
        Fetch::Status(StatusCode::NOT_FOUND),
    ]);
    let mut data = ResourceData::with_id("d1");

    assert_ok!(reconciler(&client).delete(&ctx(), &mut data, TIMEOUT).await);

    assert_eq!(
        client.calls(),
        vec![
            Call::Destroy("d1".to_string()),
            Call::Retrieve("d1".to_string()),
            Call::Retrieve("d1".to_string()),
        ]
    );
    assert!(data.id().is_none());
    assert_eq!(data.state(), LifecycleState::Absent);
}

#[tokio::test(start_paused = true)]
async fn test_delete_client_error_skips_wait() {
    let client = FakeClient::new();
    client.fail_mutations_with(StatusCode::FORBIDDEN);
    let mut data = ResourceData::with_id("d1");

    let err = reconciler(&client)
        .delete(&ctx(), &mut data, TIMEOUT)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("failed to delete deployment"));
    assert_eq!(client.fetch_count(), 0);
    assert_eq!(data.id(), Some("d1"));
    assert_eq!(data.state(), LifecycleState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_delete_wait_fatal_on_server_error() {
    let client = FakeClient::new();
    client.script(vec![Fetch::Status(StatusCode::INTERNAL_SERVER_ERROR)]);
    let mut data = ResourceData::with_id("d1");

    let err = reconciler(&client)
        .delete(&ctx(), &mut data, TIMEOUT)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("failed to retrieve deployment"));
    assert_eq!(client.fetch_count(), 1);
    assert_eq!(data.id(), Some("d1"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_wait() {
    let client = FakeClient::new();
    client.on_create(deployment("d1", true, "PENDING"));
    client.script(vec![Fetch::Found(deployment("d1", true, "PENDING"))]);
    let cancel = CancellationToken::new();
    let ctx = CallContext::new(AccessToken::new("test-token").unwrap(), cancel.clone());
    let mut data = ResourceData::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.cancel();
    });

    let result = reconciler(&client)
        .create(&ctx, &mut data, &DesiredConfig::new("xsmall", "0.10"), TIMEOUT)
        .await;

    assert!(matches!(result, Err(ProviderError::Cancelled(_))));
    assert_eq!(data.id(), Some("d1"));
    assert_eq!(data.state(), LifecycleState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_independent_deployments_reconcile_concurrently() {
    let first = FakeClient::new();
    first.script(vec![Fetch::Status(StatusCode::NOT_FOUND)]);
    let second = FakeClient::new();
    second.script(vec![
        Fetch::Found(deployment("d2", true, "OK")),
        Fetch::Found(deployment("d2", false, "OK")),
    ]);

    let (r1, r2) = (reconciler(&first), reconciler(&second));
    let (mut a, mut b) = (ResourceData::with_id("d1"), ResourceData::with_id("d2"));
    let desired = DesiredConfig::new("xsmall", "0.10");
    let (ctx_a, ctx_b) = (ctx(), ctx());

    let (deleted, updated) = tokio::join!(
        r1.delete(&ctx_a, &mut a, TIMEOUT),
        r2.update(&ctx_b, &mut b, &desired, TIMEOUT),
    );

    assert_ok!(deleted);
    assert_ok!(updated);
    assert!(a.id().is_none());
    assert_eq!(b.id(), Some("d2"));
}

#[tokio::test(start_paused = true)]
async fn test_update_rejects_empty_version() {
    let client = FakeClient::new();
    let mut data = ResourceData::with_id("d1");

    assert_err!(
        reconciler(&client)
            .update(&ctx(), &mut data, &DesiredConfig::new("xsmall", " "), TIMEOUT)
            .await
    );
    assert!(client.calls().is_empty());
}
