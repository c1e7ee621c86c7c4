//! Convergence reconciler

pub mod classify;
pub mod fsm;
pub mod poller;
pub mod reconciler;
pub mod resource;

pub use reconciler::Reconciler;
pub use resource::ResourceData;
