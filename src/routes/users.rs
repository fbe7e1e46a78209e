/**
 * User Routes
 * Admin accounts and the profile settings form
 */
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};

use super::ApiJson;
use crate::auth::{hash_password, AdminUser, AuthUser};
use crate::db::users::{ProfileUpdate, UserInsert};
use crate::domain::envelope::ApiResponse;
use crate::domain::models::{NewUser, UserProfile};
use crate::domain::validation::{self, ValidationErrors};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::uploads;

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/user/create
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(payload): ApiJson<NewUser>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserProfile>>)> {
    let payload = validation::new_user(payload)?;
    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;

    let user = state
        .store
        .create_user(&UserInsert {
            name: payload.name,
            email: payload.email,
            password_hash,
            role: payload.role,
        })
        .await?;

    tracing::info!("User {} created by {}", user.email, admin.email);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(user.profile()).with_message("User created")),
    ))
}

/// GET /api/user
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<ApiResponse<Vec<UserProfile>>>> {
    let users = state.store.list_users().await?;
    Ok(Json(ApiResponse::ok(
        users.iter().map(|u| u.profile()).collect(),
    )))
}

/// GET /api/user/me
pub async fn me(
    State(state): State<AppState>,
    caller: AuthUser,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let user = state.store.get_user(caller.id).await.map_err(|e| match e {
        crate::db::DbError::NotFound => AppError::NotFound("User not found".to_string()),
        other => other.into(),
    })?;
    Ok(Json(ApiResponse::ok(user.profile())))
}

/// PATCH /api/user
/// Multipart form with optional `name`, `email` and `image` parts.
pub async fn update_profile(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let mut update = ProfileUpdate::default();
    let mut errors = ValidationErrors::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Multipart error: {}", e);
        AppError::bad_request("Invalid multipart data")
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let original_name = field.file_name().unwrap_or("unknown").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file data"))?;
                if bytes.is_empty() {
                    continue;
                }
                let path =
                    uploads::store_image(&state.config.upload_dir, &original_name, &bytes).await?;
                update.image = Some(path);
            }
            "name" | "email" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Invalid form field"))?
                    .trim()
                    .to_string();
                if name == "name" {
                    errors.check("name", validation::required("Name", &value));
                    update.name = Some(value);
                } else {
                    errors.check("email", validation::email(&value));
                    update.email = Some(value);
                }
            }
            other => tracing::debug!("Ignoring unknown profile field: {}", other),
        }
    }

    errors.finish(())?;
    if update.is_empty() {
        return Err(AppError::bad_request("Nothing to update"));
    }

    let user = state.store.update_profile(admin.id, &update).await?;
    tracing::info!("Profile updated for {}", user.email);
    Ok(Json(ApiResponse::ok(user.profile()).with_message("Profile updated")))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{admin_app, send};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-PROFILE-BOUNDARY";

    fn multipart_body(text: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in text {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn patch_profile(app: &axum::Router, token: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let req = Request::patch("/api/user")
            .header("authorization", format!("Bearer {}", token))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_create_and_list_users() {
        let (app, _, token) = admin_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/user/create",
            Some(&token),
            Some(json!({"name": "Grace", "email": "Grace@Example.com", "password": "long-enough"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["email"], "grace@example.com");

        let (status, _) = send(
            &app,
            "POST",
            "/api/user/create",
            Some(&token),
            Some(json!({"name": "Grace", "email": "grace@example.com", "password": "long-enough"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = send(&app, "GET", "/api/user", Some(&token), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_user_validates() {
        let (app, _, token) = admin_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/user/create",
            Some(&token),
            Some(json!({"name": "Grace", "email": "grace@example.com", "password": "short"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password must be at least 8 characters long");
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let (app, state, token) = admin_app().await;
        let (status, _) = send(&app, "GET", "/api/user/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (_, body) = send(&app, "GET", "/api/user/me", Some(&token), None).await;
        assert_eq!(body["data"]["email"], state.config.admin_email);
    }

    #[tokio::test]
    async fn test_profile_update_with_image() {
        let (app, state, token) = admin_app().await;
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let body = multipart_body(&[("name", "Head Admin")], Some(("me.png", &png[..])));
        let (status, body) = patch_profile(&app, &token, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Head Admin");
        let image = body["data"]["image"].as_str().unwrap();
        assert!(image.starts_with("/uploads/") && image.ends_with(".png"));
        let _ = tokio::fs::remove_dir_all(&state.config.upload_dir).await;
    }

    #[tokio::test]
    async fn test_profile_update_rejects_bad_input() {
        let (app, _, token) = admin_app().await;
        let (status, body) =
            patch_profile(&app, &token, multipart_body(&[("email", "nope")], None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid email address");

        let (status, _) = patch_profile(
            &app,
            &token,
            multipart_body(&[], Some(("me.png", &b"not an image at all"[..]))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
