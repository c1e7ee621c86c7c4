//! Credentials and call context

pub mod access_token;
pub mod context;
