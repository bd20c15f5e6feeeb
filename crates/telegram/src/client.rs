//! Telegram Bot API client.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tgrelay_core::deploy::{Credential, InlineButton};
use tgrelay_core::remote::{MessageId, MessagingClient, OutgoingDocument, RemoteError};
use tgrelay_core::session::{BotIdentity, Session};
use tgrelay_shared::TelegramConfig;
use tracing::{debug, warn};

use crate::types::{ApiResponse, SentMessage, Update};

/// Captions longer than this are cut before sending.
pub const CAPTION_LIMIT: usize = 1024;

/// How transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first. Zero disables retrying.
    pub max_retries: u32,
    /// Wait between attempts when the platform does not name one.
    pub delay: Duration,
}

impl RetryPolicy {
    /// How long to wait before retrying after `err`.
    #[must_use]
    pub fn delay_for(&self, err: &RemoteError) -> Duration {
        match err {
            RemoteError::RateLimited {
                retry_after: Some(secs),
                ..
            } => Duration::from_secs(*secs),
            _ => self.delay,
        }
    }
}

impl From<&TelegramConfig> for RetryPolicy {
    fn from(config: &TelegramConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

/// Bot API client.
///
/// One instance serves every credential; the token travels with each call.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl TelegramClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &TelegramConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from(config),
        })
    }

    /// Full URL of a Bot API method.
    #[must_use]
    pub fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{token}/{method}", self.base_url)
    }

    /// Call `getMe`.
    pub async fn get_me(&self, credential: &Credential) -> Result<BotIdentity, RemoteError> {
        let response = self
            .http
            .get(self.method_url(credential.token(), "getMe"))
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    /// Call `getUpdates` without long polling.
    pub async fn get_updates(&self, credential: &Credential) -> Result<Vec<Update>, RemoteError> {
        let response = self
            .http
            .get(self.method_url(credential.token(), "getUpdates"))
            .query(&[("timeout", "0")])
            .send()
            .await
            .map_err(transport_error)?;
        decode(response).await
    }

    async fn send_document_once(
        &self,
        credential: &Credential,
        document: &OutgoingDocument,
    ) -> Result<MessageId, RemoteError> {
        let content = Part::stream_with_length(
            Body::wrap_stream(document.content.stream()),
            document.content.size(),
        )
        .file_name(document.filename.clone());

        let mut form = Form::new()
            .text("chat_id", document.destination.to_string())
            .part("document", content);
        if let Some(caption) = &document.caption {
            form = form.text("caption", truncate_caption(caption));
        }
        if let Some(button) = &document.button {
            form = form.text("reply_markup", reply_markup(button));
        }

        let response = self
            .http
            .post(self.method_url(credential.token(), "sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let message: SentMessage = decode(response).await?;
        Ok(MessageId(message.message_id))
    }
}

impl MessagingClient for TelegramClient {
    async fn authenticate(&self, credential: &Credential) -> Result<BotIdentity, RemoteError> {
        let identity = self.get_me(credential).await?;
        debug!(bot_id = identity.id, "getMe succeeded");
        Ok(identity)
    }

    async fn send_document(
        &self,
        session: &Session,
        document: &OutgoingDocument,
    ) -> Result<MessageId, RemoteError> {
        let mut attempt = 0;
        loop {
            debug!(
                chat = %document.destination,
                filename = %document.filename,
                bytes = document.content.size(),
                attempt,
                "sendDocument"
            );
            match self.send_document_once(session.credential(), document).await {
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(&e);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "sendDocument failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Cut a caption to the platform limit, counting characters.
#[must_use]
pub fn truncate_caption(caption: &str) -> String {
    caption.chars().take(CAPTION_LIMIT).collect()
}

fn reply_markup(button: &InlineButton) -> String {
    json!({
        "inline_keyboard": [[{ "text": button.text, "url": button.url }]]
    })
    .to_string()
}

/// Map a transport failure. The URL is dropped because it carries the token.
fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_body() {
        RemoteError::Stream(err.without_url().to_string())
    } else {
        RemoteError::Network(err.without_url().to_string())
    }
}

fn classify(code: i64, description: String, retry_after: Option<u64>) -> RemoteError {
    match code {
        401 | 404 => RemoteError::Unauthorized(description),
        429 => RemoteError::RateLimited {
            retry_after,
            detail: description,
        },
        _ => RemoteError::Rejected { code, description },
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let status = response.status();
    let status_code = i64::from(status.as_u16());

    let envelope: ApiResponse<T> = match response.json().await {
        Ok(envelope) => envelope,
        Err(e) => {
            let code = if status.is_success() { 502 } else { status_code };
            return Err(classify(
                code,
                format!("unreadable response ({status}): {}", e.without_url()),
                None,
            ));
        }
    };

    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse {
            error_code,
            description,
            parameters,
            ..
        } => {
            let parameters = parameters.unwrap_or_default();
            let mut description = description.unwrap_or_else(|| status.to_string());
            if let Some(chat_id) = parameters.migrate_to_chat_id {
                description = format!("{description} (chat migrated to {chat_id}, use that id)");
            }
            Err(classify(
                error_code.unwrap_or(status_code),
                description,
                parameters.retry_after,
            ))
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
