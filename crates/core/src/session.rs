//! Session artifacts: one authenticated bot identity per credential.
//!
//! A session is created the first time a credential is used, persisted as
//! `sessions/bot_<sha256(token)>.session`, and reused by later requests and
//! later processes. Only deleting the file forces a new authentication; the
//! deletion is noticed on the next use, without a restart.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::deploy::Credential;
use crate::remote::{MessagingClient, RemoteError};
use crate::storage::{LocalStore, StorageConfig};

/// Identity returned by the platform for a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    /// Numeric bot id.
    pub id: i64,
    /// Bot username, without `@`.
    #[serde(default)]
    pub username: Option<String>,
    /// Display name.
    pub first_name: String,
}

/// On-disk session format.
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    identity: BotIdentity,
    created_at: DateTime<Utc>,
}

/// An authenticated session handle.
#[derive(Debug)]
pub struct Session {
    credential: Credential,
    identity: BotIdentity,
}

impl Session {
    /// Build a session for an identity that was just authenticated.
    #[must_use]
    pub fn new(credential: Credential, identity: BotIdentity) -> Self {
        Self {
            credential,
            identity,
        }
    }

    /// Credential this session authenticates.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Identity of the bot.
    #[must_use]
    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }
}

/// Owns session artifacts and hands out cached session handles.
pub struct SessionStore {
    store: Arc<LocalStore>,
    cache: Cache<String, Arc<Session>>,
}

impl SessionStore {
    /// Create a session store backed by `store`.
    #[must_use]
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            cache: Cache::builder().max_capacity(1024).build(),
        }
    }

    /// Storage key of the session artifact for `credential`.
    #[must_use]
    pub fn session_key(credential: &Credential) -> String {
        format!(
            "{}/bot_{}.session",
            StorageConfig::SESSIONS_DIR,
            credential.fingerprint()
        )
    }

    /// Return the session for `credential`, authenticating on first use.
    ///
    /// Concurrent first uses of the same credential share one authentication.
    /// A cached session whose artifact was deleted is dropped, so the next
    /// call authenticates again.
    ///
    /// # Errors
    ///
    /// Returns the client's error if authentication is needed and fails.
    pub async fn acquire<C: MessagingClient>(
        &self,
        client: &C,
        credential: &Credential,
    ) -> Result<Arc<Session>, RemoteError> {
        let fingerprint = credential.fingerprint();
        if self.cache.contains_key(&fingerprint)
            && !self.store.exists(&Self::session_key(credential)).await
        {
            info!("Session artifact removed, re-authenticating");
            self.cache.invalidate(&fingerprint).await;
        }

        self.cache
            .try_get_with(fingerprint, self.load_or_authenticate(client, credential))
            .await
            .map_err(|e| (*e).clone())
    }

    async fn load_or_authenticate<C: MessagingClient>(
        &self,
        client: &C,
        credential: &Credential,
    ) -> Result<Arc<Session>, RemoteError> {
        let key = Self::session_key(credential);

        if let Some(record) = self.load_record(&key, credential).await {
            debug!(
                bot_id = record.identity.id,
                created_at = %record.created_at,
                "Session artifact reused"
            );
            return Ok(Arc::new(Session::new(credential.clone(), record.identity)));
        }

        let identity = client.authenticate(credential).await?;
        let record = SessionRecord {
            identity,
            created_at: Utc::now(),
        };
        info!(
            bot_id = record.identity.id,
            username = record.identity.username.as_deref().unwrap_or(""),
            "Authenticated new session"
        );

        match serde_json::to_vec_pretty(&record) {
            Ok(bytes) => {
                if let Err(e) = self.store.write(&key, bytes).await {
                    warn!(error = %e, "Failed to persist session artifact");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode session artifact"),
        }

        Ok(Arc::new(Session::new(credential.clone(), record.identity)))
    }

    async fn load_record(&self, key: &str, credential: &Credential) -> Option<SessionRecord> {
        let bytes = match self.store.read(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read session artifact");
                return None;
            }
        };

        match serde_json::from_slice::<SessionRecord>(&bytes) {
            Ok(record) if record.identity.id == credential.bot_id() => Some(record),
            Ok(record) => {
                warn!(
                    stored = record.identity.id,
                    expected = credential.bot_id(),
                    "Session artifact belongs to another bot, re-authenticating"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Corrupt session artifact, re-authenticating");
                None
            }
        }
    }

    /// Number of sessions currently held in memory.
    #[must_use]
    pub fn cached_sessions(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Release every cached session. Artifacts on disk are kept.
    pub async fn close(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        info!("Session store closed");
    }
}
