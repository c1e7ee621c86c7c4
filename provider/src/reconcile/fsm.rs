//! Finite State Machine for the deployment lifecycle

use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

/// Operation a convergence wait follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Create,
    Update,
    Delete,
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "phase")]
pub enum LifecycleState {
    /// No remote deployment is known
    Absent,

    /// Create request in flight
    Creating,

    /// Mutation accepted, waiting for the remote side to settle
    Converging(Phase),

    /// Converged
    Ready,

    /// Update request in flight
    Updating,

    /// Delete request in flight
    Deleting,

    /// Last operation failed
    Failed,
}

/// Lifecycle event
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// Caller asked for a create
    Create,

    /// Caller asked for an update
    Update,

    /// Caller asked for a delete
    Delete,

    /// Remote accepted the pending mutation
    Accepted,

    /// Deployment reached a stable state
    Converged,

    /// Deployment is confirmed gone
    Gone,

    /// Read refreshed the observed state
    Refreshed,

    /// Operation failed
    Fail(String),
}

/// Lifecycle FSM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleFsm {
    state: LifecycleState,
    error: Option<String>,
}

impl LifecycleFsm {
    /// Create a new FSM in absent state
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Absent,
            error: None,
        }
    }

    /// FSM for a deployment that is already known to exist
    pub fn tracking() -> Self {
        Self {
            state: LifecycleState::Ready,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: LifecycleEvent) -> Result<(), ProviderError> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let new_state = match (self.state, &event) {
            // Caller intents
            (S::Absent | S::Failed, E::Create) => S::Creating,
            (S::Ready | S::Failed, E::Update) => S::Updating,
            (S::Ready | S::Failed, E::Delete) => S::Deleting,

            // Remote accepted the mutation
            (S::Creating, E::Accepted) => S::Converging(Phase::Create),
            (S::Updating, E::Accepted) => S::Converging(Phase::Update),
            (S::Deleting, E::Accepted) => S::Converging(Phase::Delete),

            // Convergence
            (S::Converging(Phase::Create | Phase::Update), E::Converged) => S::Ready,
            (S::Converging(Phase::Delete), E::Gone) => S::Absent,

            // A successful read reflects the remote side, whatever was in flight
            (_, E::Refreshed) => S::Ready,

            (_, E::Fail(_)) => S::Failed,

            // Invalid transitions
            (state, event) => {
                return Err(ProviderError::InvalidTransition(format!(
                    "{:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.error = match event {
            E::Fail(err) => Some(err),
            E::Create | E::Update | E::Delete => None,
            _ => self.error.take(),
        };
        if new_state == S::Ready || new_state == S::Absent {
            self.error = None;
        }
        self.state = new_state;
        Ok(())
    }

    /// Whether an operation is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::Creating
                | LifecycleState::Updating
                | LifecycleState::Deleting
                | LifecycleState::Converging(_)
        )
    }
}

impl Default for LifecycleFsm {
    fn default() -> Self {
        Self::new()
    }
}
