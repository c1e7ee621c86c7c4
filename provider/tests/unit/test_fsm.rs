//! FSM unit tests

use mzcloud_provider::errors::ProviderError;
use mzcloud_provider::reconcile::fsm::{LifecycleEvent, LifecycleFsm, LifecycleState, Phase};

#[test]
fn test_fsm_initial_state() {
    let fsm = LifecycleFsm::new();
    assert_eq!(fsm.state(), LifecycleState::Absent);
    assert!(fsm.error().is_none());
    assert!(!fsm.is_busy());
}

#[test]
fn test_fsm_create_success_flow() {
    let mut fsm = LifecycleFsm::new();

    // Absent -> Creating
    fsm.process(LifecycleEvent::Create).unwrap();
    assert_eq!(fsm.state(), LifecycleState::Creating);

    // Creating -> Converging(create)
    fsm.process(LifecycleEvent::Accepted).unwrap();
    assert_eq!(fsm.state(), LifecycleState::Converging(Phase::Create));

    // Converging -> Ready
    fsm.process(LifecycleEvent::Converged).unwrap();
    assert_eq!(fsm.state(), LifecycleState::Ready);
}

#[test]
fn test_fsm_timeout_during_update() {
    let mut fsm = LifecycleFsm::tracking();

    fsm.process(LifecycleEvent::Update).unwrap();
    fsm.process(LifecycleEvent::Accepted).unwrap();
    fsm.process(LifecycleEvent::Fail("timed out".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), LifecycleState::Failed);
    assert_eq!(fsm.error(), Some("timed out"));
}

#[test]
fn test_fsm_retry_after_failure() {
    let mut fsm = LifecycleFsm::tracking();

    fsm.process(LifecycleEvent::Update).unwrap();
    fsm.process(LifecycleEvent::Fail("error 1".to_string())).unwrap();

    // A failed deployment can be updated again or deleted
    fsm.process(LifecycleEvent::Update).unwrap();
    assert_eq!(fsm.state(), LifecycleState::Updating);
    fsm.process(LifecycleEvent::Fail("error 2".to_string())).unwrap();
    fsm.process(LifecycleEvent::Delete).unwrap();
    assert_eq!(fsm.state(), LifecycleState::Deleting);
}

#[test]
fn test_fsm_delete_flow() {
    let mut fsm = LifecycleFsm::tracking();

    fsm.process(LifecycleEvent::Delete).unwrap();
    fsm.process(LifecycleEvent::Accepted).unwrap();
    assert_eq!(fsm.state(), LifecycleState::Converging(Phase::Delete));

    fsm.process(LifecycleEvent::Gone).unwrap();
    assert_eq!(fsm.state(), LifecycleState::Absent);
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = LifecycleFsm::new();

    // Cannot update or delete something that was never created
    assert!(matches!(
        fsm.process(LifecycleEvent::Update),
        Err(ProviderError::InvalidTransition(_))
    ));
    assert!(fsm.process(LifecycleEvent::Delete).is_err());

    // Cannot create twice
    let mut ready = LifecycleFsm::tracking();
    assert!(ready.process(LifecycleEvent::Create).is_err());
    assert_eq!(ready.state(), LifecycleState::Ready);
}
