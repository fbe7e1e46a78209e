use std::sync::Arc;

use crate::auth::JwtKeys;
use crate::config::AppConfig;
use crate::db::Store;

/// Shared by every handler through `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: Arc<JwtKeys>,
    pub store: Store,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store) -> Self {
        let keys = JwtKeys::new(&config.jwt_secret, config.access_token_minutes);
        Self {
            config: Arc::new(config),
            keys: Arc::new(keys),
            store,
        }
    }

    /// Fresh in-memory state for tests. Bcrypt runs at its minimum cost.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let config = AppConfig {
            environment: "test".to_string(),
            jwt_secret: "test-secret".to_string(),
            bcrypt_cost: 4,
            admin_email: "admin@example.com".to_string(),
            admin_password: crate::config::AdminPassword::Plain("admin12345".to_string()),
            upload_dir: std::env::temp_dir().join(format!("commerce-uploads-{}", uuid::Uuid::new_v4())),
            ..AppConfig::default()
        };
        Self::new(config, Store::memory())
    }
}
