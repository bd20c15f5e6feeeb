//! Shared configuration and error types for tgrelay.
//!
//! This crate provides the pieces every other crate agrees on:
//! - Process configuration loaded once at startup
//! - The error type surfaced to HTTP callers

pub mod config;
pub mod error;

pub use config::{AppConfig, ServerConfig, StorageSettings, TelegramConfig};
pub use error::AppError;
