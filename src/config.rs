//! Server configuration read from the environment (`.env` is loaded first).

use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";
const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
const DEFAULT_ADMIN_PASSWORD: &str = "admin12345";

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a secure, unique value in production")]
    InsecureJwtSecret,
    #[error("invalid HOST/PORT configuration: {0}")]
    InvalidAddress(String),
}

/// Credentials of the admin account seeded when the store has none.
#[derive(Debug, Clone)]
pub enum AdminPassword {
    /// Bcrypt hash from `ADMIN_HASH_PASSWORD`.
    Hashed(String),
    /// Plain password from `ADMIN_PASSWORD` (or the development default).
    Plain(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub bcrypt_cost: u32,
    pub admin_email: String,
    pub admin_password: AdminPassword,
    /// Prepended to relative image paths in API responses consumed by clients.
    pub public_base_url: String,
    pub upload_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let admin_password = if let Ok(hash) = std::env::var("ADMIN_HASH_PASSWORD") {
            AdminPassword::Hashed(hash)
        } else {
            AdminPassword::Plain(env_or("ADMIN_PASSWORD", DEFAULT_ADMIN_PASSWORD))
        };
        let port = env_parse("PORT", 3001);

        Self {
            environment: env_or("ENVIRONMENT", "development"),
            host: env_or("HOST", "127.0.0.1"),
            port,
            jwt_secret: env_or("JWT_SECRET", DEFAULT_JWT_SECRET),
            access_token_minutes: env_parse("ACCESS_TOKEN_MINUTES", 60),
            bcrypt_cost: env_parse("BCRYPT_COST", bcrypt::DEFAULT_COST),
            admin_email: env_or("ADMIN_EMAIL", DEFAULT_ADMIN_EMAIL).to_lowercase(),
            admin_password,
            public_base_url: env_or("PUBLIC_BASE_URL", &format!("http://localhost:{}", port)),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
    }

    /// Refuse insecure production settings; warn about weak ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_production() {
            return Ok(());
        }
        if self.jwt_secret.is_empty() || self.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(ConfigError::InsecureJwtSecret);
        }
        if self.admin_email == DEFAULT_ADMIN_EMAIL {
            tracing::warn!(
                "SECURITY: ADMIN_EMAIL is using an insecure default. \
                 Set ADMIN_EMAIL env var to a real address."
            );
        }
        if matches!(&self.admin_password, AdminPassword::Plain(p) if p == DEFAULT_ADMIN_PASSWORD) {
            tracing::warn!(
                "SECURITY: Neither ADMIN_HASH_PASSWORD nor ADMIN_PASSWORD is set. \
                 Set ADMIN_HASH_PASSWORD to a bcrypt hash of a strong password."
            );
        }
        Ok(())
    }
}
