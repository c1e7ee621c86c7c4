//! Classification of fetched deployment state

use mzcloud_openapi::Deployment;

use crate::errors::{Operation, ProviderError};
use crate::models::deployment::is_converged;
use crate::reconcile::poller::Attempt;

/// Semantic outcome of a single fetch
#[derive(Debug)]
pub enum Classification {
    /// Deployment exists but still has remote work pending
    Converging(Deployment),

    /// Deployment exists and is stable
    Converged(Deployment),

    /// Remote reported the deployment as not found
    Absent,

    /// Fetch failed for any other reason
    Fatal(ProviderError),
}

impl Classification {
    /// Observed deployment, if the fetch returned one
    pub fn deployment(&self) -> Option<&Deployment> {
        match self {
            Classification::Converging(d) | Classification::Converged(d) => Some(d),
            Classification::Absent | Classification::Fatal(_) => None,
        }
    }
}

/// State a convergence loop waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceTarget {
    /// Wait until the deployment is converged (after create or update)
    Ready,

    /// Wait until the deployment is gone (after delete)
    Absent,
}

impl ConvergenceTarget {
    /// Classify a fetch result.
    ///
    /// A 404 status means absent whether or not other error detail came with
    /// it; any other error is fatal.
    pub fn classify(self, result: Result<Deployment, ProviderError>) -> Classification {
        match result {
            Err(e) if e.is_not_found() => Classification::Absent,
            Err(e) => Classification::Fatal(ProviderError::operation(Operation::Retrieve, e)),
            Ok(d) => match self {
                ConvergenceTarget::Ready if is_converged(&d) => Classification::Converged(d),
                ConvergenceTarget::Ready | ConvergenceTarget::Absent => {
                    Classification::Converging(d)
                }
            },
        }
    }

    /// Whether a classification completes the wait
    pub fn is_done(self, classification: &Classification) -> bool {
        match self {
            ConvergenceTarget::Ready => matches!(classification, Classification::Converged(_)),
            ConvergenceTarget::Absent => matches!(classification, Classification::Absent),
        }
    }

    /// Describe a state that has not reached the target yet
    pub fn describe(self, classification: &Classification) -> String {
        match (self, classification) {
            (ConvergenceTarget::Ready, Classification::Converging(d))
            | (ConvergenceTarget::Ready, Classification::Converged(d)) => format!(
                "expected deployment to be ready but got flagged_for_update={} status={}",
                d.flagged_for_update, d.statefulset_status
            ),
            (ConvergenceTarget::Absent, Classification::Converging(d))
            | (ConvergenceTarget::Absent, Classification::Converged(d)) => format!(
                "expected deployment to be deleted but got flagged_for_deletion={} status={}",
                d.flagged_for_deletion, d.statefulset_status
            ),
            (ConvergenceTarget::Ready, Classification::Absent) => {
                "expected deployment to be ready but it was not found".to_string()
            }
            (ConvergenceTarget::Absent, Classification::Absent) => {
                "deployment is deleted".to_string()
            }
            (_, Classification::Fatal(e)) => e.to_string(),
        }
    }

    /// Turn a classification into a poll attempt
    pub fn evaluate(self, classification: Classification) -> Attempt<Classification> {
        if let Classification::Fatal(e) = classification {
            return Attempt::Fatal(e);
        }
        if self.is_done(&classification) {
            return Attempt::Done(classification);
        }
        let reason = self.describe(&classification);
        Attempt::Retryable(classification, reason)
    }
}
