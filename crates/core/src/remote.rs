//! Seam between the orchestrator and the messaging platform.
//!
//! The core never talks HTTP itself; a platform crate implements
//! [`MessagingClient`] and the orchestrator drives it.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deploy::{Credential, DestinationId, InlineButton};
use crate::session::{BotIdentity, Session};
use crate::storage::ChunkSource;

/// Identifier of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document ready to be sent.
#[derive(Debug, Clone)]
pub struct OutgoingDocument {
    /// Target chat.
    pub destination: DestinationId,
    /// Filename shown to recipients.
    pub filename: String,
    /// Optional caption.
    pub caption: Option<String>,
    /// Optional inline URL button.
    pub button: Option<InlineButton>,
    /// File content as a restartable bounded chunk stream.
    pub content: ChunkSource,
}

/// Failures reported by a messaging client.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The platform rejected the credential.
    #[error("credential rejected: {0}")]
    Unauthorized(String),

    /// The platform asked us to slow down.
    #[error("rate limited: {detail}")]
    RateLimited {
        /// Seconds the platform asked to wait, if it said.
        retry_after: Option<u64>,
        /// Platform description.
        detail: String,
    },

    /// The platform refused the request.
    #[error("request rejected ({code}): {description}")]
    Rejected {
        /// Platform error code.
        code: i64,
        /// Platform description.
        description: String,
    },

    /// Transport failure before a platform answer arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The local content stream failed mid-transfer.
    #[error("content stream failed: {0}")]
    Stream(String),
}

impl RemoteError {
    /// Whether another attempt could succeed without changing the request.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }
}

/// Client for a messaging platform.
///
/// This trait is implemented by the platform crate to provide actual remote
/// operations. Retry behavior, if any, belongs to the implementation.
pub trait MessagingClient: Send + Sync {
    /// Verify a credential and return the identity it belongs to.
    fn authenticate(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<BotIdentity, RemoteError>> + Send;

    /// Deliver a document using an authenticated session.
    fn send_document(
        &self,
        session: &Session,
        document: &OutgoingDocument,
    ) -> impl Future<Output = Result<MessageId, RemoteError>> + Send;
}
