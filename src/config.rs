use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortalConfig {
    pub page_size: usize,
    pub signed_url_default_expiry_secs: i64,
    pub signed_url_max_expiry_secs: i64,
    pub receipt_cache_ttl_secs: i64,
    pub access_token_ttl_secs: i64,
    pub max_upload_size_mb: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        PortalConfig {
            page_size: 10,
            signed_url_default_expiry_secs: 1800,
            signed_url_max_expiry_secs: 604_800,
            receipt_cache_ttl_secs: 86_400,
            access_token_ttl_secs: 43_200,
            max_upload_size_mb: 512,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    // Populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub url_signing_key: String,
    pub use_secure_cookies: bool,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

fn require_absolute(name: &str, value: &str) -> Result<(), config::ConfigError> {
    if Path::new(value).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, value
        )));
    }
    Ok(())
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let database_path = required_var("DATABASE_PATH")?;
        let media_path = required_var("MEDIA_PATH")?;
        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        let url_signing_key = required_var("URL_SIGNING_KEY")?;

        // 128 hex characters = 64 bytes, the minimum cookie key length.
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config::ConfigError::Message(
                "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string(),
            ));
        }

        if url_signing_key.len() < 32 {
            return Err(config::ConfigError::Message(
                "FATAL: 'URL_SIGNING_KEY' must be at least 32 characters long.".to_string(),
            ));
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        require_absolute("DATABASE_PATH", &database_path)?;
        require_absolute("MEDIA_PATH", &media_path)?;

        let builder = config::Config::builder()
            // Web host/port and portal tunables.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("url_signing_key", url_signing_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .build()?;

        builder.try_deserialize()
    }

    /// The SQLite file holding users, notifications, onboarding and invites.
    pub fn portal_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("portal").join("portal.db")
    }

    /// The redb file holding calendar posts.
    pub fn posts_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("posts").join("posts.db")
    }
}
