/**
 * Authentication
 * HS256 access tokens, bcrypt password hashing and the request extractors
 * that guard admin routes.
 */
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AdminPassword;
use crate::db::models::UserRecord;
use crate::db::users::UserInsert;
use crate::domain::models::Role;
use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Tokens
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    pub fn issue(&self, user: &UserRecord) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            exp: (now + Duration::minutes(self.ttl_minutes)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ============================================================================
// Passwords
// ============================================================================

/// Bcrypt is CPU-bound, so both directions run on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::internal(format!("hashing task failed: {}", e)))?
        .map_err(|e| AppError::internal(format!("failed to hash password: {}", e)))
}

pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

// ============================================================================
// Extractors
// ============================================================================

/// Caller identified by a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn from_headers(headers: &HeaderMap, state: &AppState) -> Result<Option<Self>, AppError> {
        let Some(token) = extract_bearer_token(headers) else {
            return Ok(None);
        };
        let claims = state
            .keys
            .verify(token)
            .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;
        let id = claims
            .sub
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;
        let role = claims
            .role
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;
        Ok(Some(AuthUser {
            id,
            email: claims.email,
            role,
        }))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        AuthUser::from_headers(&parts.headers, state)?
            .ok_or_else(|| AppError::unauthorized("No authorization token provided"))
    }
}

/// Authenticated caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!("Non-admin {} attempted an admin action", user.email);
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

/// Caller on public routes. A present but invalid token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(AuthUser::is_admin)
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(AuthUser::from_headers(&parts.headers, state)?))
    }
}

// ============================================================================
// Bootstrap
// ============================================================================

/// Create the configured admin account when the store has no admin yet.
pub async fn seed_admin(state: &AppState) -> Result<Option<UserRecord>, AppError> {
    if state.store.count_admins().await? > 0 {
        return Ok(None);
    }

    let config = &state.config;
    let password_hash = match &config.admin_password {
        AdminPassword::Hashed(hash) => hash.clone(),
        AdminPassword::Plain(plain) => hash_password(plain.clone(), config.bcrypt_cost).await?,
    };

    let user = state
        .store
        .create_user(&UserInsert {
            name: "Admin".to_string(),
            email: config.admin_email.clone(),
            password_hash,
            role: Role::Admin,
        })
        .await?;
    tracing::info!("Seeded admin account {}", user.email);
    Ok(Some(user))
}
