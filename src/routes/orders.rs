use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use super::{ApiJson, ApiQuery, IdPath};
use crate::auth::AdminUser;
use crate::db::orders::OrderFilter;
use crate::domain::envelope::ApiResponse;
use crate::domain::models::{DashboardStats, NewOrder, Order, OrderStatus, OrderStatusUpdate};
use crate::domain::pagination::{PageMeta, PageParams};
use crate::domain::validation;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<OrderStatus>,
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(query): ApiQuery<OrderQuery>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    let filter = OrderFilter {
        page: PageParams {
            page: query.page,
            limit: query.limit,
        },
        status: query.status,
    };
    let (orders, total) = state.store.list_orders(&filter).await?;
    Ok(Json(ApiResponse::paged(orders, PageMeta::new(&filter.page, total))))
}

/// GET /api/orders/stats
pub async fn order_stats(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    Ok(Json(ApiResponse::ok(state.store.dashboard_stats().await?)))
}

/// POST /api/orders
/// Prices come from the catalog, never from the request.
pub async fn place_order(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewOrder>,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    let payload = validation::new_order(payload)?;
    let order = state.store.place_order(&payload).await?;
    tracing::info!(
        "Order {} placed: {} lines, total {:.2}",
        order.id,
        order.items.len(),
        order.total_amount
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(order).with_message("Order placed")),
    ))
}

/// PATCH /api/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    IdPath(id): IdPath,
    ApiJson(payload): ApiJson<OrderStatusUpdate>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state
        .store
        .update_order_status(id, payload.status)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => AppError::NotFound("Order not found".to_string()),
            other => other,
        })?;
    tracing::info!("Order {} marked {} by {}", id, order.status, admin.email);
    Ok(Json(ApiResponse::ok(order).with_message("Order status updated")))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{admin_app, send};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_order_lifecycle_and_stats() {
        let (app, _, token) = admin_app().await;
        let (_, product) = send(
            &app,
            "POST",
            "/api/products",
            Some(&token),
            Some(json!({
                "title": "Lamp",
                "price": 1000.0,
                "discount": 20,
                "quantity": 4,
                "isPublished": true,
            })),
        )
        .await;
        let product_id = product["data"]["id"].as_str().unwrap().to_string();

        let order = json!({
            "customerName": "Ada",
            "customerEmail": "ada@example.com",
            "address": "1 Main St",
            "items": [{"productId": product_id, "quantity": 2}],
        });
        let (status, placed) = send(&app, "POST", "/api/orders", None, Some(order.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(placed["data"]["totalAmount"], 1600.0);
        assert_eq!(placed["data"]["status"], "pending");

        let (status, body) = send(&app, "POST", "/api/orders", None, Some(json!({
            "customerName": "Ada",
            "customerEmail": "ada@example.com",
            "address": "1 Main St",
            "items": [{"productId": product_id, "quantity": 3}],
        }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Insufficient stock for Lamp");

        let uri = format!("/api/orders/{}/status", placed["data"]["id"].as_str().unwrap());
        let (_, updated) =
            send(&app, "PATCH", &uri, Some(&token), Some(json!({"status": "completed"}))).await;
        assert_eq!(updated["data"]["status"], "completed");

        let (_, stats) = send(&app, "GET", "/api/orders/stats", Some(&token), None).await;
        assert_eq!(stats["data"]["totalOrders"], 1);
        assert_eq!(stats["data"]["completedOrders"], 1);
        assert_eq!(stats["data"]["revenue"], 1600.0);

        let (_, list) = send(&app, "GET", "/api/orders?status=completed", Some(&token), None).await;
        assert_eq!(list["meta"]["total"], 1);
    }

    #[tokio::test]
    async fn test_orders_list_is_admin_only() {
        let (app, _, _) = admin_app().await;
        let (status, _) = send(&app, "GET", "/api/orders", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_empty_order_is_rejected() {
        let (app, _, _) = admin_app().await;
        let (status, body) = send(&app, "POST", "/api/orders", None, Some(json!({
            "customerName": "Ada",
            "customerEmail": "ada@example.com",
            "address": "1 Main St",
            "items": [],
        }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Order must contain at least one item");
    }
}
