//! Materialize Cloud deployment provider
//!
//! Reconciles a desired deployment configuration against the cloud API:
//! mutating calls followed by a bounded, cancellable wait for the deployment
//! to converge.

pub mod app;
pub mod authn;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod reconcile;
pub mod storage;
pub mod utils;
