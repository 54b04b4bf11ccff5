use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub auth: AuthConfig,
    /// Base URL short links are served under; QR payloads are
    /// `{public_base_url}/{short_code}`.
    pub public_base_url: String,
    /// Optional MaxMind City database for click geolocation.
    pub geoip_db_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    ApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// API key to user-id mapping, used in `apikey` mode.
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./lariat.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let redirect_host =
            std::env::var("REDIRECT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let redirect_port = std::env::var("REDIRECT_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()?;

        let auth_mode_str = std::env::var("AUTH_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase();

        let auth_mode = match auth_mode_str.as_str() {
            "none" => AuthMode::None,
            "apikey" => AuthMode::ApiKey,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, apikey"
                );
                AuthMode::None
            }
        };

        let api_keys = if matches!(auth_mode, AuthMode::ApiKey) {
            let raw = std::env::var("API_KEYS")
                .context("API_KEYS must be set when AUTH_MODE=apikey")?;
            parse_api_keys(&raw)?
        } else {
            HashMap::new()
        };

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", redirect_host, redirect_port));

        let geoip_db_path = std::env::var("GEOIP_DB_PATH").ok();

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            auth: AuthConfig {
                mode: auth_mode,
                api_keys,
            },
            public_base_url,
            geoip_db_path,
        })
    }
}

/// `API_KEYS` is a comma-separated list of `key:user` pairs.
fn parse_api_keys(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut keys = HashMap::new();

    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, user) = pair
            .split_once(':')
            .with_context(|| format!("API_KEYS entry '{}' is not a key:user pair", pair))?;
        keys.insert(key.trim().to_string(), user.trim().to_string());
    }

    if keys.is_empty() {
        anyhow::bail!("API_KEYS must contain at least one key:user pair when AUTH_MODE=apikey");
    }

    Ok(keys)
}
