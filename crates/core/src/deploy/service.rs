//! Upload orchestrator.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::error::DeployError;
use super::types::{
    Credential, DeployConfig, DeployOutcome, DeployRequest, DestinationId, InlineButton,
    ValidatedRequest,
};
use crate::remote::{MessagingClient, OutgoingDocument};
use crate::session::SessionStore;
use crate::storage::{LocalStore, SpoolWriter, SpooledUpload};

/// Drives one upload from spool to delivery and cleanup.
pub struct DeployService<C: MessagingClient> {
    config: DeployConfig,
    client: Arc<C>,
    store: Arc<LocalStore>,
    sessions: Arc<SessionStore>,
}

impl<C: MessagingClient> DeployService<C> {
    /// Create a new deploy service.
    #[must_use]
    pub fn new(
        config: DeployConfig,
        client: Arc<C>,
        store: Arc<LocalStore>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            config,
            client,
            store,
            sessions,
        }
    }

    /// Maximum accepted file size in bytes.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.store.config().max_file_size
    }

    /// Reject a size declared ahead of the body.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` when `declared` exceeds the maximum.
    pub fn check_declared_size(&self, declared: u64) -> Result<(), DeployError> {
        self.store.validate_size(declared).map_err(DeployError::from)
    }

    /// Open a spool for an incoming file.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` when the declared size already exceeds the
    /// maximum, or `LocalStorage` if the spool cannot be created.
    pub async fn begin_upload(
        &self,
        filename: &str,
        declared_size: Option<u64>,
    ) -> Result<SpoolWriter, DeployError> {
        if let Some(size) = declared_size {
            self.check_declared_size(size)?;
        }
        Ok(self.store.begin_spool(filename).await?)
    }

    /// Check and resolve request fields without touching the network.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure, checked in this order: button,
    /// destination, credential.
    pub fn validate(&self, request: &DeployRequest) -> Result<ValidatedRequest, DeployError> {
        let button = InlineButton::from_fields(
            request.button_active,
            request.button_text.as_deref(),
            request.button_url.as_deref(),
        )?;

        let destination = match non_blank(request.destination.as_deref()) {
            Some(raw) => DestinationId::parse(raw)?,
            None => self
                .config
                .default_destination
                .clone()
                .ok_or(DeployError::MissingDestination)?,
        };

        let credential = match non_blank(request.credential.as_deref()) {
            Some(raw) => Credential::parse(raw)?,
            None => self
                .config
                .default_credential
                .clone()
                .ok_or(DeployError::MissingCredential)?,
        };

        Ok(ValidatedRequest {
            destination,
            credential,
            caption: non_blank(request.caption.as_deref()).map(str::to_string),
            button,
            keep: request.keep,
        })
    }

    /// Deliver a spooled upload.
    ///
    /// The spool is deleted on every path except a successful `keep=true`
    /// delivery, where it is moved under `uploads/`. Once the document is
    /// delivered the call succeeds; a copy that cannot be retained only
    /// leaves `stored_path` empty.
    ///
    /// # Errors
    ///
    /// Returns validation errors before any remote call,
    /// `AuthenticationFailure` if the credential is rejected, and
    /// `RemoteTransferFailure` if delivery fails.
    #[instrument(skip_all, fields(filename = %upload.filename(), size = upload.size()))]
    pub async fn deploy(
        &self,
        request: DeployRequest,
        upload: SpooledUpload,
    ) -> Result<DeployOutcome, DeployError> {
        let validated = match self.prepare(&request, &upload) {
            Ok(validated) => validated,
            Err(e) => {
                self.discard(upload).await;
                return Err(e);
            }
        };

        let session = match self
            .sessions
            .acquire(self.client.as_ref(), &validated.credential)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session acquisition failed");
                self.discard(upload).await;
                return Err(e.into());
            }
        };

        let document = OutgoingDocument {
            destination: validated.destination.clone(),
            filename: upload.filename().to_string(),
            caption: validated.caption,
            button: validated.button,
            content: upload.chunks(self.store.config().chunk_size),
        };
        info!(
            destination = %document.destination,
            chunks = document.content.expected_chunks(),
            bot_id = session.identity().id,
            "Sending document"
        );

        let message_id = match self.client.send_document(&session, &document).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Document delivery failed");
                self.discard(upload).await;
                return Err(e.into());
            }
        };

        let filename = upload.filename().to_string();
        let size = upload.size();
        let stored_path = if validated.keep {
            match self.store.retain(upload).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(
                        %message_id,
                        error = %e,
                        "Document delivered but the upload was not retained"
                    );
                    None
                }
            }
        } else {
            self.discard(upload).await;
            None
        };

        info!(%message_id, kept = stored_path.is_some(), "Document delivered");
        Ok(DeployOutcome {
            message_id,
            destination: validated.destination,
            filename,
            size,
            stored_path,
        })
    }

    /// Release cached sessions.
    pub async fn close(&self) {
        self.sessions.close().await;
    }

    fn prepare(
        &self,
        request: &DeployRequest,
        upload: &SpooledUpload,
    ) -> Result<ValidatedRequest, DeployError> {
        let validated = self.validate(request)?;
        self.store.validate_size(upload.size())?;
        Ok(validated)
    }

    async fn discard(&self, upload: SpooledUpload) {
        if let Err(e) = self.store.discard(upload).await {
            warn!(error = %e, "Failed to delete spool");
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
