//! Login session shared by an [`ApiClient`](super::ApiClient) and its views.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::{Role, UserProfile};

#[derive(Debug, Clone, Default)]
struct SessionData {
    token: Option<String>,
    user: Option<UserProfile>,
}

/// Cheap to clone; clones see the same session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionData>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn token(&self) -> Option<String> {
        self.inner.read().await.token.clone()
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.inner.read().await.user.clone()
    }

    pub async fn set(&self, token: String, user: UserProfile) {
        let mut data = self.inner.write().await;
        data.token = Some(token);
        data.user = Some(user);
    }

    /// Replace the cached profile, keeping the token.
    pub async fn set_user(&self, user: UserProfile) {
        self.inner.write().await.user = Some(user);
    }

    pub async fn clear(&self) {
        *self.inner.write().await = SessionData::default();
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.token.is_some()
    }

    pub async fn is_admin(&self) -> bool {
        let data = self.inner.read().await;
        data.token.is_some() && data.user.as_ref().is_some_and(|u| u.role == Role::Admin)
    }
}
