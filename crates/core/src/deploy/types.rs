//! Deploy request types and value objects.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

use super::error::DeployError;
use crate::remote::MessageId;

/// A bot token of the form `<bot_id>:<secret>`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    token: String,
    bot_id: i64,
}

impl Credential {
    /// Parse a bot token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the token is not `<digits>:<secret>`.
    pub fn parse(token: &str) -> Result<Self, DeployError> {
        let token = token.trim();
        let invalid = || DeployError::InvalidRequest("bot token must look like <bot_id>:<secret>".into());

        let (id, secret) = token.split_once(':').ok_or_else(invalid)?;
        let bot_id = id
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(invalid)?;
        let secret_ok = !secret.is_empty()
            && secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !secret_ok {
            return Err(invalid());
        }

        Ok(Self {
            token: token.to_string(),
            bot_id,
        })
    }

    /// The full token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The numeric bot id embedded in the token.
    #[must_use]
    pub fn bot_id(&self) -> i64 {
        self.bot_id
    }

    /// Hex SHA-256 of the token; safe to use in file names and logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(self.token.as_bytes()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("bot_id", &self.bot_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// A destination chat: numeric chat id or public `@username`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    /// Parse a destination identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for anything that is neither a non-zero
    /// integer nor `@` followed by a username.
    pub fn parse(raw: &str) -> Result<Self, DeployError> {
        let raw = raw.trim();
        let valid = if let Some(name) = raw.strip_prefix('@') {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        } else {
            raw.parse::<i64>().is_ok_and(|id| id != 0)
        };

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(DeployError::InvalidRequest(format!(
                "destination '{raw}' is not a chat id or @username"
            )))
        }
    }

    /// The identifier as sent to the platform.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single inline URL button attached under the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    /// Button label.
    pub text: String,
    /// Absolute http(s) URL the button opens.
    pub url: String,
}

impl InlineButton {
    /// Build the button from the request fields.
    ///
    /// Returns `None` when the button is not active; the other fields are
    /// ignored in that case.
    ///
    /// # Errors
    ///
    /// Returns `InvalidButtonConfig` when the button is active but the text is
    /// blank, the URL is missing, or the URL is not an absolute http(s) URL.
    pub fn from_fields(
        active: bool,
        text: Option<&str>,
        url: Option<&str>,
    ) -> Result<Option<Self>, DeployError> {
        if !active {
            return Ok(None);
        }

        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DeployError::InvalidButtonConfig("button_text is required".into()))?;
        let raw_url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DeployError::InvalidButtonConfig("button_url is required".into()))?;

        let parsed = Url::parse(raw_url).map_err(|e| {
            DeployError::InvalidButtonConfig(format!("button_url '{raw_url}' is invalid: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DeployError::InvalidButtonConfig(format!(
                "button_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        Ok(Some(Self {
            text: text.to_string(),
            url: parsed.into(),
        }))
    }
}

/// A deploy request, minus the file itself.
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    /// Caption shown under the document.
    pub caption: Option<String>,
    /// Keep the uploaded file on disk after delivery.
    pub keep: bool,
    /// Destination override; falls back to the configured default.
    pub destination: Option<String>,
    /// Bot token override; falls back to the configured default.
    pub credential: Option<String>,
    /// Inline button label.
    pub button_text: Option<String>,
    /// Inline button URL.
    pub button_url: Option<String>,
    /// Attach the inline button.
    pub button_active: bool,
}

/// A request whose fields have been checked and resolved.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    /// Resolved destination.
    pub destination: DestinationId,
    /// Resolved credential.
    pub credential: Credential,
    /// Caption, blank captions dropped.
    pub caption: Option<String>,
    /// Inline button, if active.
    pub button: Option<InlineButton>,
    /// Keep the file after delivery.
    pub keep: bool,
}

/// Result of a successful deploy.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    /// Delivered message.
    pub message_id: MessageId,
    /// Chat the document went to.
    pub destination: DestinationId,
    /// Filename supplied by the client.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Where the file was kept, when `keep` was requested.
    pub stored_path: Option<PathBuf>,
}

/// Orchestrator defaults resolved from configuration.
#[derive(Debug, Clone, Default)]
pub struct DeployConfig {
    /// Destination used when a request names none.
    pub default_destination: Option<DestinationId>,
    /// Credential used when a request carries none.
    pub default_credential: Option<Credential>,
}

impl DeployConfig {
    /// Resolve defaults from the Telegram configuration section.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if a configured default is malformed.
    pub fn from_telegram_config(
        telegram: &tgrelay_shared::TelegramConfig,
    ) -> Result<Self, DeployError> {
        let default_destination = telegram
            .default_chat_id
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(DestinationId::parse)
            .transpose()?;
        let default_credential = telegram
            .bot_token
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(Credential::parse)
            .transpose()?;

        Ok(Self {
            default_destination,
            default_credential,
        })
    }
}
