//! Local storage for uploads and session files using Apache OpenDAL.
//!
//! Everything lives under one root directory:
//!
//! ```text
//! <root>/
//! ├── tmp/<upload-id>                    spooled upload, deleted after delivery
//! ├── uploads/<upload-id>/<filename>     retained when the request asked to keep it
//! └── sessions/bot_<sha256>.session      cached bot identity per credential
//! ```

mod chunk;
mod config;
mod error;
mod service;

pub use chunk::ChunkSource;
pub use config::StorageConfig;
pub use error::StorageError;
pub use service::{LocalStore, SpoolWriter, SpooledUpload};
