/**
 * Review Routes
 * Public review submission and the moderation queue
 */
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::{clean_text, non_blank, ApiJson, ApiQuery, IdPath};
use crate::auth::{AdminUser, MaybeAuthUser};
use crate::db::reviews::ReviewFilter;
use crate::domain::envelope::ApiResponse;
use crate::domain::models::{NewReview, Review, ReviewStatus};
use crate::domain::pagination::{PageMeta, PageParams};
use crate::domain::validation;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<ReviewStatus>,
    pub product: Option<Uuid>,
    pub search: Option<String>,
}

fn review_not_found(err: AppError) -> AppError {
    match err {
        AppError::NotFound(_) => AppError::NotFound("Review not found".to_string()),
        other => other,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/reviews
/// Admins get the full moderation list. Storefront visitors must name a
/// product and only see its approved, published reviews.
pub async fn list_reviews(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    ApiQuery(query): ApiQuery<ReviewQuery>,
) -> AppResult<Json<ApiResponse<Vec<Review>>>> {
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let filter = if caller.is_admin() {
        ReviewFilter {
            page,
            status: query.status,
            product: query.product,
            search: non_blank(query.search),
            published_only: false,
        }
    } else {
        let Some(product) = query.product else {
            return Err(match caller.0 {
                Some(_) => AppError::Forbidden("Admin access required".to_string()),
                None => AppError::unauthorized("No authorization token provided"),
            });
        };
        ReviewFilter {
            page,
            status: Some(ReviewStatus::Approved),
            product: Some(product),
            search: non_blank(query.search),
            published_only: true,
        }
    };

    let (reviews, total) = state.store.list_reviews(&filter).await?;
    Ok(Json(ApiResponse::paged(reviews, PageMeta::new(&filter.page, total))))
}

/// POST /api/reviews
pub async fn create_review(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<NewReview>,
) -> AppResult<(StatusCode, Json<ApiResponse<Review>>)> {
    payload.comment = clean_text(&payload.comment);
    payload.customer_name = clean_text(&payload.customer_name);
    let payload = validation::new_review(payload)?;

    let review = state.store.create_review(&payload).await?;
    tracing::info!("Review {} submitted for product {}", review.id, review.product_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(review).with_message("Review submitted for moderation")),
    ))
}

async fn set_status(
    state: &AppState,
    id: Uuid,
    status: ReviewStatus,
) -> AppResult<Json<ApiResponse<Review>>> {
    let review = state
        .store
        .set_review_status(id, status)
        .await
        .map_err(|e| review_not_found(e.into()))?;
    Ok(Json(
        ApiResponse::ok(review).with_message(format!("Review {}", status)),
    ))
}

/// PATCH /api/reviews/{id}/approve
pub async fn approve_review(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    IdPath(id): IdPath,
) -> AppResult<Json<ApiResponse<Review>>> {
    set_status(&state, id, ReviewStatus::Approved).await
}

/// PATCH /api/reviews/{id}/reject
pub async fn reject_review(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    IdPath(id): IdPath,
) -> AppResult<Json<ApiResponse<Review>>> {
    set_status(&state, id, ReviewStatus::Rejected).await
}

/// PATCH /api/reviews/{id}/toggle-publish
pub async fn toggle_publish(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    IdPath(id): IdPath,
) -> AppResult<Json<ApiResponse<Review>>> {
    let review = state
        .store
        .toggle_review_publish(id)
        .await
        .map_err(|e| review_not_found(e.into()))?;
    let message = if review.is_published {
        "Review published"
    } else {
        "Review unpublished"
    };
    Ok(Json(ApiResponse::ok(review).with_message(message)))
}

/// DELETE /api/reviews/{id}
pub async fn delete_review(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    IdPath(id): IdPath,
) -> AppResult<Json<ApiResponse<()>>> {
    state
        .store
        .delete_review(id)
        .await
        .map_err(|e| review_not_found(e.into()))?;
    Ok(Json(ApiResponse::done("Review deleted")))
}
