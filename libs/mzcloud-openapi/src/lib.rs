//! Materialize Cloud API models

pub mod models;

pub use models::{Deployment, DeploymentRequest, ErrorResponse, STATEFULSET_STATUS_OK};
