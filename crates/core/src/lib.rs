//! Core upload logic for tgrelay.
//!
//! This crate contains the delivery flow with ZERO web framework or HTTP
//! client dependencies. The messaging platform sits behind a trait.
//!
//! # Modules
//!
//! - `deploy` - Upload orchestration and request validation
//! - `remote` - Messaging client seam
//! - `session` - Per-credential session artifacts
//! - `storage` - Spools, retained uploads and chunk streams

pub mod deploy;
pub mod remote;
pub mod session;
pub mod storage;
