/**
 * Authentication Routes
 * Login, token verification and password change
 */
use axum::{extract::State, Json};

use super::ApiJson;
use crate::auth::{hash_password, verify_password, AuthUser};
use crate::domain::envelope::ApiResponse;
use crate::domain::models::{ChangePasswordRequest, LoginRequest, LoginResult, UserProfile};
use crate::domain::validation;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResult>>> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }
    if let Err(message) = validation::email(&payload.email) {
        return Err(AppError::bad_request(message));
    }

    let Some(user) = state.store.find_user_by_email(&payload.email).await? else {
        tracing::warn!("Login attempt for unknown user: {}", payload.email);
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_password(payload.password, user.password_hash.clone()).await {
        tracing::warn!("Failed login attempt for: {}", user.email);
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let access_token = state.keys.issue(&user).map_err(|e| {
        tracing::error!("Failed to create access token: {}", e);
        AppError::internal("Failed to create token")
    })?;

    tracing::info!("Successful login for user: {}", user.email);
    Ok(Json(
        ApiResponse::ok(LoginResult {
            access_token,
            user: user.profile(),
        })
        .with_message("Logged in"),
    ))
}

/// POST /api/auth/verify
/// Resolve the bearer token to the current profile.
pub async fn verify_token(
    State(state): State<AppState>,
    caller: AuthUser,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let user = state
        .store
        .get_user(caller.id)
        .await
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;
    Ok(Json(ApiResponse::ok(user.profile())))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let payload = validation::password_change(payload)?;
    let user = state.store.get_user(caller.id).await?;

    if !verify_password(payload.current_password, user.password_hash.clone()).await {
        return Err(AppError::bad_request("Current password is incorrect"));
    }

    let password_hash = hash_password(payload.new_password, state.config.bcrypt_cost).await?;
    state
        .store
        .update_password_hash(user.id, &password_hash)
        .await?;

    tracing::info!("Password changed for user: {}", user.email);
    Ok(Json(ApiResponse::done("Password updated")))
}

#[cfg(test)]
mod tests {
    use crate::config::AdminPassword;
    use crate::routes::test_support::{admin_app, send};
    use crate::state::AppState;
    use axum::http::StatusCode;
    use serde_json::json;

    fn admin_password(state: &AppState) -> String {
        match &state.config.admin_password {
            AdminPassword::Plain(p) => p.clone(),
            AdminPassword::Hashed(_) => panic!("tests expect a plain admin password"),
        }
    }

    #[tokio::test]
    async fn test_login_empty_email_returns_bad_request() {
        let (app, _, _) = admin_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "", "password": "admin12345"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_login_invalid_email_format_returns_bad_request() {
        let (app, _, _) = admin_app().await;
        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "no-at-sign", "password": "admin12345"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_wrong_credentials_returns_unauthorized() {
        let (app, state, _) = admin_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": state.config.admin_email, "password": "wrongpassword"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_login_then_verify() {
        let (app, state, _) = admin_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "email": state.config.admin_email.to_uppercase(),
                "password": admin_password(&state),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["accessToken"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["user"]["role"], "admin");
        assert!(body["data"]["user"].get("passwordHash").is_none());

        let (status, body) = send(&app, "POST", "/api/auth/verify", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], state.config.admin_email);
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage_token() {
        let (app, _, _) = admin_app().await;
        let (status, _) =
            send(&app, "POST", "/api/auth/verify", Some("invalid.jwt.token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, "POST", "/api/auth/verify", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (app, state, token) = admin_app().await;
        let current = admin_password(&state);

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/change-password",
            Some(&token),
            Some(json!({"currentPassword": "not-it-at-all", "newPassword": "brand-new-pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Current password is incorrect");

        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/change-password",
            Some(&token),
            Some(json!({"currentPassword": current, "newPassword": "short"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/change-password",
            Some(&token),
            Some(json!({"currentPassword": current, "newPassword": "brand-new-pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": state.config.admin_email, "password": "brand-new-pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
