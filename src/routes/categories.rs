use axum::{extract::State, http::StatusCode, Json};

use super::{ApiJson, IdPath};
use crate::auth::AdminUser;
use crate::domain::envelope::ApiResponse;
use crate::domain::models::{Category, NewCategory};
use crate::domain::validation;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn category_not_found(err: AppError) -> AppError {
    match err {
        AppError::NotFound(_) => AppError::NotFound("Category not found".to_string()),
        other => other,
    }
}

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Category>>>> {
    Ok(Json(ApiResponse::ok(state.store.list_categories().await?)))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiJson(payload): ApiJson<NewCategory>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    let payload = validation::new_category(payload)?;
    let category = state.store.create_category(&payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(category).with_message("Category created")),
    ))
}

/// PATCH /api/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    IdPath(id): IdPath,
    ApiJson(payload): ApiJson<NewCategory>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let payload = validation::new_category(payload)?;
    let category = state
        .store
        .update_category(id, &payload)
        .await
        .map_err(|e| category_not_found(e.into()))?;
    Ok(Json(ApiResponse::ok(category).with_message("Category updated")))
}

/// DELETE /api/categories/{id}
pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    IdPath(id): IdPath,
) -> AppResult<Json<ApiResponse<()>>> {
    state
        .store
        .delete_category(id)
        .await
        .map_err(|e| category_not_found(e.into()))?;
    Ok(Json(ApiResponse::done("Category deleted")))
}
