use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Top-level service settings.
///
/// Sources, lowest precedence first: built-in defaults, `config/default.toml`,
/// `config/{PAWCHAT_ENV}.toml`, then `PAWCHAT__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub chat: ChatSettings,
    pub call: CallSettings,
    pub livekit: LiveKitSettings,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("PAWCHAT_ENV").unwrap_or_else(|_| "development".to_string());

        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                Environment::with_prefix("PAWCHAT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            log_json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub backend: StorageBackend,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            name: "pawchat".to_string(),
            backend: StorageBackend::Mongo,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: Option<String>,
    /// Lifetime of tokens issued by `AuthService::issue_access_token`.
    pub access_token_ttl_secs: u64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            issuer: None,
            access_token_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub max_content_len: usize,
    pub edit_window_secs: i64,
    pub delete_window_secs: i64,
    pub min_search_len: usize,
    pub default_page_size: u64,
    pub max_page_size: u64,
    /// How many times a mutation re-runs load/mutate/save after a version conflict.
    pub max_save_retries: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_content_len: 1000,
            edit_window_secs: 5 * 60,
            delete_window_secs: 60 * 60,
            min_search_len: 2,
            default_page_size: 20,
            max_page_size: 100,
            max_save_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallSettings {
    pub eviction_grace_secs: u64,
    /// 0 disables the ring timeout; missed calls are then left to the clients.
    pub ring_timeout_secs: u64,
    /// Packet loss percentage above which a quality sample is logged as poor.
    pub packet_loss_threshold: f64,
    pub latency_threshold_ms: f64,
    pub default_history_limit: usize,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            eviction_grace_secs: 60,
            ring_timeout_secs: 45,
            packet_loss_threshold: 5.0,
            latency_threshold_ms: 500.0,
            default_history_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveKitSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub token_ttl_secs: u64,
}

impl Default for LiveKitSettings {
    fn default() -> Self {
        Self {
            url: "wss://livekit.pawchat.local".to_string(),
            api_key: None,
            api_secret: None,
            token_ttl_secs: 600,
        }
    }
}

impl LiveKitSettings {
    pub fn has_credentials(&self) -> bool {
        matches!(
            (self.api_key.as_deref(), self.api_secret.as_deref()),
            (Some(k), Some(s)) if !k.is_empty() && !s.is_empty()
        )
    }
}
