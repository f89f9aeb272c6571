use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MongoDB,
    Memory,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_name: String,
    pub transactions: bool,
    pub access_secret: String,
    pub token_ttl_hours: i64,
    pub payment_secret: Option<String>,
    /// Empty means any origin is accepted.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value: raw })?,
            None => 3000,
        };

        let backend = match get("STORE_BACKEND").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("mongodb") => StoreBackend::MongoDB,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid { name: "STORE_BACKEND", value: other.to_string() })
            }
        };

        let database_url = get("DATABASE_URL");
        if backend == StoreBackend::MongoDB && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let transactions = match get("MONGODB_TRANSACTIONS") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { name: "MONGODB_TRANSACTIONS", value: raw })?,
            None => true,
        };

        let token_ttl_hours = match get("TOKEN_TTL_HOURS") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(hours) if hours > 0 => hours,
                _ => return Err(ConfigError::Invalid { name: "TOKEN_TTL_HOURS", value: raw }),
            },
            None => 24,
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            backend,
            database_url,
            database_name: get("DATABASE_NAME").unwrap_or_else(|| "yoga-master".to_string()),
            transactions,
            access_secret: get("ACCESS_SECRET").ok_or(ConfigError::Missing("ACCESS_SECRET"))?,
            token_ttl_hours,
            payment_secret: get("PAYMENT_SECRET"),
            cors_origins,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
