//! Application configuration management.

use std::path::PathBuf;

use serde::Deserialize;

/// One mebibyte.
const MIB: u64 = 1024 * 1024;

/// Largest document the Bot API accepts through a self-hosted server.
pub const PLATFORM_MAX_FILE_SIZE: u64 = 2 * 1024 * MIB;

/// Flat environment variables kept from the original deployment, mapped onto
/// their layered configuration keys.
const FLAT_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("DATA_DIR", "storage.data_dir"),
    ("MAX_FILE_SIZE_BYTES", "storage.max_file_size"),
    ("TELEGRAM_CHUNK_SIZE_BYTES", "storage.chunk_size"),
    ("TELEGRAM_API_URL", "telegram.api_base_url"),
    ("BOT_TOKEN", "telegram.bot_token"),
    ("GROUP_ID", "telegram.default_chat_id"),
];

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Local storage and upload limits.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Telegram Bot API configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Local storage layout and upload limits.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Root directory holding `sessions/`, `uploads/` and `tmp/`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Maximum accepted file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Maximum number of bytes handed to the messaging client per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_file_size: default_max_file_size(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max_file_size() -> u64 {
    PLATFORM_MAX_FILE_SIZE
}

fn default_chunk_size() -> u64 {
    50 * MIB
}

/// Telegram Bot API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL. Point this at a self-hosted server for files over 50 MB.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Default bot token, used when a request does not carry one.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Default destination chat, used when a request does not carry one.
    #[serde(default)]
    pub default_chat_id: Option<String>,
    /// Per-request timeout in seconds. Large uploads need a generous value.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Retries after a rate limit or network failure. Zero disables retrying.
    #[serde(default)]
    pub max_retries: u32,
    /// Delay between retries when the platform does not name one.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            bot_token: None,
            default_chat_id: None,
            request_timeout_secs: default_request_timeout(),
            max_retries: 0,
            retry_delay_secs: default_retry_delay(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout() -> u64 {
    3600 // 1 hour
}

fn default_retry_delay() -> u64 {
    5
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TGRELAY")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in FLAT_ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks limits that deserialization alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first invalid setting.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let storage = &self.storage;
        if storage.max_file_size == 0 {
            return Err(config::ConfigError::Message(
                "storage.max_file_size must be greater than zero".to_string(),
            ));
        }
        if storage.chunk_size == 0 {
            return Err(config::ConfigError::Message(
                "storage.chunk_size must be greater than zero".to_string(),
            ));
        }
        if storage.chunk_size > PLATFORM_MAX_FILE_SIZE {
            return Err(config::ConfigError::Message(format!(
                "storage.chunk_size {} exceeds the platform limit of {PLATFORM_MAX_FILE_SIZE} bytes",
                storage.chunk_size
            )));
        }
        if self.telegram.api_base_url.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "telegram.api_base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the `host:port` string the server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_env() -> Vec<(&'static str, Option<&'static str>)> {
        FLAT_ENV_OVERRIDES
            .iter()
            .map(|(var, _)| (*var, None))
            .chain([
                ("RUN_MODE", Some("test-no-such-file")),
                ("TGRELAY__SERVER__PORT", None),
                ("TGRELAY__TELEGRAM__MAX_RETRIES", None),
            ])
            .collect()
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(clean_env(), || {
            let config = AppConfig::load().expect("defaults should load");
            assert_eq!(config.server.host, "0.0.0.0");
            assert_eq!(config.server.port, 8000);
            assert_eq!(config.storage.max_file_size, 2 * 1024 * 1024 * 1024);
            assert_eq!(config.storage.chunk_size, 50 * 1024 * 1024);
            assert_eq!(config.telegram.api_base_url, "https://api.telegram.org");
            assert_eq!(config.telegram.max_retries, 0);
            assert!(config.telegram.bot_token.is_none());
            assert!(config.telegram.default_chat_id.is_none());
        });
    }

    #[test]
    fn test_prefixed_environment() {
        let mut vars = clean_env();
        vars.retain(|(k, _)| {
            !matches!(*k, "TGRELAY__SERVER__PORT" | "TGRELAY__TELEGRAM__MAX_RETRIES")
        });
        vars.push(("TGRELAY__SERVER__PORT", Some("9100")));
        vars.push(("TGRELAY__TELEGRAM__MAX_RETRIES", Some("3")));
        temp_env::with_vars(vars, || {
            let config = AppConfig::load().expect("should load");
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.telegram.max_retries, 3);
        });
    }

    #[test]
    fn test_flat_environment_overrides() {
        let mut vars = clean_env();
        vars.retain(|(k, _)| {
            !matches!(*k, "PORT" | "MAX_FILE_SIZE_BYTES" | "BOT_TOKEN" | "GROUP_ID")
        });
        vars.push(("PORT", Some("8123")));
        vars.push(("MAX_FILE_SIZE_BYTES", Some("1048576")));
        vars.push(("BOT_TOKEN", Some("123456:secret")));
        vars.push(("GROUP_ID", Some("-1001234567890")));
        temp_env::with_vars(vars, || {
            let config = AppConfig::load().expect("should load");
            assert_eq!(config.server.port, 8123);
            assert_eq!(config.storage.max_file_size, 1_048_576);
            assert_eq!(config.telegram.bot_token.as_deref(), Some("123456:secret"));
            assert_eq!(
                config.telegram.default_chat_id.as_deref(),
                Some("-1001234567890")
            );
        });
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = AppConfig {
            server: ServerConfig::default(),
            storage: StorageSettings::default(),
            telegram: TelegramConfig::default(),
        };
        assert!(config.validate().is_ok());

        config.storage.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_chunk() {
        let mut config = AppConfig {
            server: ServerConfig::default(),
            storage: StorageSettings::default(),
            telegram: TelegramConfig::default(),
        };
        config.storage.chunk_size = PLATFORM_MAX_FILE_SIZE + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            storage: StorageSettings::default(),
            telegram: TelegramConfig::default(),
        };
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
    }
}
