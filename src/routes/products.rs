/**
 * Product Routes
 * Catalog listing for the storefront and product management for admins
 */
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::{clean_text, non_blank, ApiJson, ApiQuery, IdPath};
use crate::auth::{AdminUser, MaybeAuthUser};
use crate::db::products::ProductFilter;
use crate::domain::envelope::ApiResponse;
use crate::domain::models::{NewProduct, Product, ProductSort, ProductUpdate, SortOrder};
use crate::domain::pagination::{PageMeta, PageParams};
use crate::domain::validation;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<ProductSort>,
    pub sort_order: Option<SortOrder>,
    pub category: Option<Uuid>,
    pub search: Option<String>,
}

impl ProductQuery {
    fn into_filter(self, published_only: bool) -> ProductFilter {
        ProductFilter {
            page: PageParams {
                page: self.page,
                limit: self.limit,
            },
            sort_by: self.sort_by.unwrap_or_default(),
            sort_order: self.sort_order.unwrap_or_default(),
            category: self.category,
            search: non_blank(self.search),
            published_only,
        }
    }
}

fn product_not_found(err: AppError) -> AppError {
    match err {
        AppError::NotFound(_) => AppError::NotFound("Product not found".to_string()),
        other => other,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/products
/// Admins see every product; everyone else only published ones.
pub async fn list_products(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> AppResult<Json<ApiResponse<Vec<Product>>>> {
    let filter = query.into_filter(!caller.is_admin());
    let (products, total) = state.store.list_products(&filter).await?;
    Ok(Json(ApiResponse::paged(
        products,
        PageMeta::new(&filter.page, total),
    )))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    IdPath(id): IdPath,
) -> AppResult<Json<ApiResponse<Product>>> {
    let product = state
        .store
        .get_product(id)
        .await
        .map_err(|e| product_not_found(e.into()))?;
    if !product.is_published && !caller.is_admin() {
        return Err(AppError::NotFound("Product not found".to_string()));
    }
    Ok(Json(ApiResponse::ok(product)))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(mut payload): ApiJson<NewProduct>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    payload.description = payload
        .description
        .as_deref()
        .map(clean_text)
        .filter(|d| !d.is_empty());
    let payload = validation::new_product(payload)?;

    let product = state.store.create_product(&payload).await?;
    tracing::info!("Product {} created by {}", product.id, admin.email);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(product).with_message("Product created")),
    ))
}

/// PATCH /api/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    IdPath(id): IdPath,
    ApiJson(mut payload): ApiJson<ProductUpdate>,
) -> AppResult<Json<ApiResponse<Product>>> {
    payload.description = payload.description.as_deref().map(clean_text);
    let payload = validation::product_update(payload)?;

    let product = state
        .store
        .update_product(id, &payload)
        .await
        .map_err(|e| product_not_found(e.into()))?;
    Ok(Json(ApiResponse::ok(product).with_message("Product updated")))
}

/// PATCH /api/products/{id}/toggle-publish
pub async fn toggle_publish(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    IdPath(id): IdPath,
) -> AppResult<Json<ApiResponse<Product>>> {
    let product = state
        .store
        .toggle_product_publish(id)
        .await
        .map_err(|e| product_not_found(e.into()))?;
    let message = if product.is_published {
        "Product published"
    } else {
        "Product unpublished"
    };
    Ok(Json(ApiResponse::ok(product).with_message(message)))
}

/// DELETE /api/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    IdPath(id): IdPath,
) -> AppResult<Json<ApiResponse<()>>> {
    state
        .store
        .delete_product(id)
        .await
        .map_err(|e| product_not_found(e.into()))?;
    tracing::info!("Product {} deleted by {}", id, admin.email);
    Ok(Json(ApiResponse::done("Product deleted")))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{admin_app, send};
    use axum::http::StatusCode;
    use serde_json::json;

    fn lamp(title: &str, price: f64, published: bool) -> serde_json::Value {
        json!({
            "title": title,
            "price": price,
            "discount": 20,
            "quantity": 3,
            "isPublished": published,
        })
    }

    #[tokio::test]
    async fn test_create_requires_admin_token() {
        let (app, _, _) = admin_app().await;
        let (status, body) =
            send(&app, "POST", "/api/products", None, Some(lamp("Lamp", 10.0, true))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_create_validates_payload() {
        let (app, _, token) = admin_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/products",
            Some(&token),
            Some(json!({"title": "", "price": -1.0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("Title is required"));
    }

    #[tokio::test]
    async fn test_public_list_hides_unpublished() {
        let (app, _, token) = admin_app().await;
        for (title, published) in [("Desk Lamp", true), ("Floor Lamp", false), ("Chair", true)] {
            let (status, _) = send(
                &app,
                "POST",
                "/api/products",
                Some(&token),
                Some(lamp(title, 10.0, published)),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, "GET", "/api/products?search=lamp", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["data"][0]["title"], "Desk Lamp");

        let (_, body) = send(
            &app,
            "GET",
            "/api/products?search=lamp&sortBy=title&sortOrder=asc",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["meta"]["total"], 2);
        assert_eq!(body["data"][0]["title"], "Desk Lamp");
        assert_eq!(body["data"][1]["title"], "Floor Lamp");
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let (app, _, token) = admin_app().await;
        for i in 0..12 {
            send(
                &app,
                "POST",
                "/api/products",
                Some(&token),
                Some(lamp(&format!("Lamp {:02}", i), 10.0, true)),
            )
            .await;
        }
        let (_, body) = send(&app, "GET", "/api/products?page=2&limit=10", None, None).await;
        assert_eq!(body["meta"]["totalPages"], 2);
        assert_eq!(body["meta"]["page"], 2);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let (app, _, token) = admin_app().await;
        send(&app, "POST", "/api/products", Some(&token), Some(lamp("Lamp", 10.0, true))).await;
        let (status, body) = send(
            &app,
            "GET",
            "/api/products?page=9223372036854775807&limit=10",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["meta"]["total"], 1);
    }

    #[tokio::test]
    async fn test_description_is_stored_as_plain_text() {
        let (app, _, token) = admin_app().await;
        let mut payload = lamp("Lamp", 10.0, true);
        payload["description"] = json!("Tea & coffee, 5 < 6 <script>alert(1)</script>");
        let (status, body) = send(&app, "POST", "/api/products", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["description"], "Tea & coffee, 5 < 6");

        let uri = format!("/api/products/{}", body["data"]["id"].as_str().unwrap());
        let (_, body) = send(
            &app,
            "PATCH",
            &uri,
            Some(&token),
            Some(json!({"description": "Salt &amp; pepper"})),
        )
        .await;
        assert_eq!(body["data"]["description"], "Salt & pepper");
    }

    #[tokio::test]
    async fn test_bad_sort_field_is_rejected_with_envelope() {
        let (app, _, _) = admin_app().await;
        let (status, body) = send(&app, "GET", "/api/products?sortBy=color", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_toggle_update_and_delete() {
        let (app, _, token) = admin_app().await;
        let (_, created) = send(
            &app,
            "POST",
            "/api/products",
            Some(&token),
            Some(lamp("Lamp", 10.0, false)),
        )
        .await;
        let id = created["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "GET", &format!("/api/products/{}", id), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, toggled) = send(
            &app,
            "PATCH",
            &format!("/api/products/{}/toggle-publish", id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(toggled["data"]["isPublished"], true);

        let (_, updated) = send(
            &app,
            "PATCH",
            &format!("/api/products/{}", id),
            Some(&token),
            Some(json!({"price": 12.5, "description": "<script>x</script>Bright"})),
        )
        .await;
        assert_eq!(updated["data"]["price"], 12.5);
        assert_eq!(updated["data"]["description"], "Bright");
        assert_eq!(updated["data"]["title"], "Lamp");

        let (status, body) = send(
            &app,
            "DELETE",
            &format!("/api/products/{}", id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Product deleted");

        let (status, _) = send(&app, "GET", &format!("/api/products/{}", id), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let (app, _, token) = admin_app().await;
        let mut payload = lamp("Lamp", 10.0, true);
        payload["categoryId"] = json!(uuid::Uuid::new_v4());
        let (status, body) =
            send(&app, "POST", "/api/products", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Category does not exist");
    }
}
