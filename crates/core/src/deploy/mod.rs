//! Upload orchestration.
//!
//! This module turns a spooled upload plus request fields into a delivered
//! document:
//! - Request validation (button, destination, credential, size)
//! - Session acquisition
//! - Chunked delivery through a [`MessagingClient`](crate::remote::MessagingClient)
//! - Cleanup or retention of the local copy

mod error;
mod service;
mod types;


pub use error::DeployError;
pub use service::DeployService;
pub use types::{
    Credential, DeployConfig, DeployOutcome, DeployRequest, DestinationId, InlineButton,
    ValidatedRequest,
};
