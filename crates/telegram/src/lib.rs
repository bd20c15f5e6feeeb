//! Telegram Bot API implementation of the tgrelay messaging seam.
//!
//! This crate provides:
//! - [`TelegramClient`], implementing `MessagingClient` over `getMe` and
//!   `sendDocument`
//! - Error mapping from Bot API answers to `RemoteError`
//! - Optional retry of rate-limited and network failures
//! - `getUpdates` decoding for chat discovery

mod client;
pub mod types;

pub use client::{CAPTION_LIMIT, RetryPolicy, TelegramClient, truncate_caption};
pub use types::{Chat, Update};
