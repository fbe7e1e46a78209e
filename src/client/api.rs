//! Typed HTTP client for the `/api` surface.
//!
//! Every list and detail read goes through a [`QueryCache`]; every successful
//! mutation invalidates the endpoints whose data it changed. Nothing is
//! updated optimistically.

use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::cache::{cache_key, QueryCache};
use super::query::ListQuery;
use super::session::Session;
use crate::domain::envelope::{ApiResponse, Page};
use crate::domain::images;
use crate::domain::models::{
    Category, ChangePasswordRequest, DashboardStats, LoginRequest, LoginResult, NewCategory,
    NewOrder, NewProduct, NewReview, NewUser, Order, OrderStatus, OrderStatusUpdate, Product,
    ProductUpdate, Review, UserProfile,
};
use crate::domain::validation::{self, ValidationErrors};

/// Shown when the server gives no usable message.
pub const FALLBACK_MESSAGE: &str = "Something went wrong";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PRODUCTS: &str = "/products";
const CATEGORIES: &str = "/categories";
const REVIEWS: &str = "/reviews";
const ORDERS: &str = "/orders";
const ORDER_STATS: &str = "/orders/stats";
const USERS: &str = "/user";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with `success: false` or a non-2xx status.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidEnvelope(String),

    /// Rejected before anything was sent.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// One failure handed to every caller that waited on the same fetch.
    #[error(transparent)]
    Shared(Arc<ClientError>),
}

impl ClientError {
    fn unshare(err: Arc<ClientError>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(ClientError::Shared)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            ClientError::Shared(inner) => inner.status(),
            _ => None,
        }
    }

    /// Text for a notification. Transport and decoding faults fall back to a
    /// generic message.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            ClientError::Validation(errors) => errors.to_string(),
            ClientError::Shared(inner) => inner.user_message(),
            _ => FALLBACK_MESSAGE.to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// An image file attached to a profile update.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Multipart `PATCH /user`. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<ImageUpload>,
}

struct Caches {
    products: QueryCache<Page<Product>>,
    product: QueryCache<Product>,
    categories: QueryCache<Vec<Category>>,
    reviews: QueryCache<Page<Review>>,
    orders: QueryCache<Page<Order>>,
    stats: QueryCache<DashboardStats>,
    users: QueryCache<Vec<UserProfile>>,
}

impl Caches {
    fn new() -> Self {
        Self {
            products: QueryCache::default(),
            product: QueryCache::default(),
            categories: QueryCache::default(),
            reviews: QueryCache::default(),
            orders: QueryCache::default(),
            stats: QueryCache::default(),
            users: QueryCache::default(),
        }
    }

    fn clear(&self) {
        self.products.invalidate_all();
        self.product.invalidate_all();
        self.categories.invalidate_all();
        self.reviews.invalidate_all();
        self.orders.invalidate_all();
        self.stats.invalidate_all();
        self.users.invalidate_all();
    }

    fn products_changed(&self) {
        self.products.invalidate(PRODUCTS);
        self.product.invalidate_all();
        self.stats.invalidate_all();
    }
}

fn data<T>(envelope: ApiResponse<T>) -> ClientResult<T> {
    envelope
        .data
        .ok_or_else(|| ClientError::InvalidEnvelope("success response without data".to_string()))
}

fn page<T>(envelope: ApiResponse<Vec<T>>) -> ClientResult<Page<T>> {
    match (envelope.data, envelope.meta) {
        (Some(items), Some(meta)) => Ok(Page { items, meta }),
        _ => Err(ClientError::InvalidEnvelope(
            "paged response without data or meta".to_string(),
        )),
    }
}

fn message(envelope: ApiResponse<()>) -> String {
    envelope.message.unwrap_or_default()
}

pub struct ApiClient {
    http: reqwest::Client,
    api_base: String,
    asset_base: String,
    session: Session,
    caches: Caches,
    requests: AtomicU64,
}

impl ApiClient {
    /// `base_url` is the server origin, with or without a trailing `/api`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_session(base_url, Session::new())
    }

    pub fn with_session(base_url: &str, session: Session) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let origin = base_url.trim().trim_end_matches('/');
        let origin = origin.strip_suffix("/api").unwrap_or(origin).to_string();

        Ok(Self {
            http,
            api_base: format!("{}/api", origin),
            asset_base: origin,
            session,
            caches: Caches::new(),
            requests: AtomicU64::new(0),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Requests that actually went over the network.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Absolute URL for a stored image path, or the placeholder.
    pub fn image_url(&self, stored: &[String]) -> String {
        images::primary_image(&self.asset_base, stored)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> ClientResult<ApiResponse<T>> {
        let request = match self.session.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        self.requests.fetch_add(1, Ordering::Relaxed);
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiResponse<serde_json::Value>>(&bytes)
                .ok()
                .and_then(|body| body.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
            tracing::debug!("API request rejected ({}): {}", status.as_u16(), message);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::InvalidEnvelope(e.to_string()))?;
        if !envelope.success {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            });
        }
        Ok(envelope)
    }

    // ========================================================================
    // Auth
    // ========================================================================

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<UserProfile> {
        let body = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let result: LoginResult =
            data(self.execute(self.http.post(self.url("/auth/login")).json(&body)).await?)?;

        self.session.set(result.access_token, result.user.clone()).await;
        self.caches.clear();
        tracing::info!("Logged in as {}", result.user.email);
        Ok(result.user)
    }

    pub async fn logout(&self) {
        self.session.clear().await;
        self.caches.clear();
    }

    pub async fn change_password(&self, request: ChangePasswordRequest) -> ClientResult<String> {
        let request = validation::password_change(request)?;
        let envelope = self
            .execute(self.http.post(self.url("/auth/change-password")).json(&request))
            .await?;
        Ok(message(envelope))
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Current profile; also refreshes the one held by the session.
    pub async fn me(&self) -> ClientResult<UserProfile> {
        let user: UserProfile = data(self.execute(self.http.get(self.url("/user/me"))).await?)?;
        self.session.set_user(user.clone()).await;
        Ok(user)
    }

    pub async fn list_users(&self) -> ClientResult<Vec<UserProfile>> {
        let url = self.url(USERS);
        self.caches
            .users
            .get_or_fetch(USERS.to_string(), async move {
                data(self.execute(self.http.get(url)).await?)
            })
            .await
            .map_err(ClientError::unshare)
    }

    pub async fn create_user(&self, user: NewUser) -> ClientResult<UserProfile> {
        let user = validation::new_user(user)?;
        let created = data(
            self.execute(self.http.post(self.url("/user/create")).json(&user))
                .await?,
        )?;
        self.caches.users.invalidate(USERS);
        Ok(created)
    }

    pub async fn update_profile(&self, changes: ProfileChanges) -> ClientResult<UserProfile> {
        let mut form = Form::new();
        if let Some(name) = changes.name {
            form = form.text("name", name);
        }
        if let Some(email) = changes.email {
            form = form.text("email", email);
        }
        if let Some(image) = changes.image {
            form = form.part("image", Part::bytes(image.bytes).file_name(image.file_name));
        }

        let user: UserProfile =
            data(self.execute(self.http.patch(self.url(USERS)).multipart(form)).await?)?;
        self.session.set_user(user.clone()).await;
        self.caches.users.invalidate(USERS);
        Ok(user)
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub async fn list_products(&self, query: &ListQuery) -> ClientResult<Page<Product>> {
        let key = cache_key(PRODUCTS, &query.to_query_string());
        let url = self.url(&key);
        self.caches
            .products
            .get_or_fetch(key, async move { page(self.execute(self.http.get(url)).await?) })
            .await
            .map_err(ClientError::unshare)
    }

    pub async fn get_product(&self, id: Uuid) -> ClientResult<Product> {
        let key = format!("{}/{}", PRODUCTS, id);
        let url = self.url(&key);
        self.caches
            .product
            .get_or_fetch(key, async move { data(self.execute(self.http.get(url)).await?) })
            .await
            .map_err(ClientError::unshare)
    }

    pub async fn create_product(&self, product: NewProduct) -> ClientResult<Product> {
        let product = validation::new_product(product)?;
        let created = data(
            self.execute(self.http.post(self.url(PRODUCTS)).json(&product))
                .await?,
        )?;
        self.caches.products_changed();
        Ok(created)
    }

    pub async fn update_product(&self, id: Uuid, update: ProductUpdate) -> ClientResult<Product> {
        let update = validation::product_update(update)?;
        let url = self.url(&format!("{}/{}", PRODUCTS, id));
        let updated = data(self.execute(self.http.patch(url).json(&update)).await?)?;
        self.caches.products_changed();
        Ok(updated)
    }

    pub async fn toggle_product_publish(&self, id: Uuid) -> ClientResult<Product> {
        let url = self.url(&format!("{}/{}/toggle-publish", PRODUCTS, id));
        let product = data(self.execute(self.http.patch(url)).await?)?;
        self.caches.products_changed();
        Ok(product)
    }

    pub async fn delete_product(&self, id: Uuid) -> ClientResult<String> {
        let url = self.url(&format!("{}/{}", PRODUCTS, id));
        let envelope = self.execute(self.http.delete(url)).await?;
        self.caches.products_changed();
        Ok(message(envelope))
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn list_categories(&self) -> ClientResult<Vec<Category>> {
        let url = self.url(CATEGORIES);
        self.caches
            .categories
            .get_or_fetch(CATEGORIES.to_string(), async move {
                data(self.execute(self.http.get(url)).await?)
            })
            .await
            .map_err(ClientError::unshare)
    }

    pub async fn create_category(&self, category: NewCategory) -> ClientResult<Category> {
        let category = validation::new_category(category)?;
        let created = data(
            self.execute(self.http.post(self.url(CATEGORIES)).json(&category))
                .await?,
        )?;
        self.caches.categories.invalidate(CATEGORIES);
        Ok(created)
    }

    pub async fn update_category(&self, id: Uuid, category: NewCategory) -> ClientResult<Category> {
        let category = validation::new_category(category)?;
        let url = self.url(&format!("{}/{}", CATEGORIES, id));
        let updated = data(self.execute(self.http.patch(url).json(&category)).await?)?;
        self.caches.categories.invalidate(CATEGORIES);
        Ok(updated)
    }

    pub async fn delete_category(&self, id: Uuid) -> ClientResult<String> {
        let url = self.url(&format!("{}/{}", CATEGORIES, id));
        let envelope = self.execute(self.http.delete(url)).await?;
        self.caches.categories.invalidate(CATEGORIES);
        Ok(message(envelope))
    }

    // ========================================================================
    // Reviews
    // ========================================================================

    pub async fn list_reviews(&self, query: &ListQuery) -> ClientResult<Page<Review>> {
        let key = cache_key(REVIEWS, &query.to_query_string());
        let url = self.url(&key);
        self.caches
            .reviews
            .get_or_fetch(key, async move { page(self.execute(self.http.get(url)).await?) })
            .await
            .map_err(ClientError::unshare)
    }

    pub async fn create_review(&self, review: NewReview) -> ClientResult<Review> {
        let review = validation::new_review(review)?;
        let created = data(
            self.execute(self.http.post(self.url(REVIEWS)).json(&review))
                .await?,
        )?;
        self.reviews_changed();
        Ok(created)
    }

    pub async fn approve_review(&self, id: Uuid) -> ClientResult<Review> {
        self.review_action(id, "approve").await
    }

    pub async fn reject_review(&self, id: Uuid) -> ClientResult<Review> {
        self.review_action(id, "reject").await
    }

    pub async fn toggle_review_publish(&self, id: Uuid) -> ClientResult<Review> {
        self.review_action(id, "toggle-publish").await
    }

    pub async fn delete_review(&self, id: Uuid) -> ClientResult<String> {
        let url = self.url(&format!("{}/{}", REVIEWS, id));
        let envelope = self.execute(self.http.delete(url)).await?;
        self.reviews_changed();
        Ok(message(envelope))
    }

    async fn review_action(&self, id: Uuid, action: &str) -> ClientResult<Review> {
        let url = self.url(&format!("{}/{}/{}", REVIEWS, id, action));
        let review = data(self.execute(self.http.patch(url)).await?)?;
        self.reviews_changed();
        Ok(review)
    }

    fn reviews_changed(&self) {
        self.caches.reviews.invalidate(REVIEWS);
        self.caches.stats.invalidate_all();
    }

    // ========================================================================
    // Orders
    // ========================================================================

    pub async fn list_orders(&self, query: &ListQuery) -> ClientResult<Page<Order>> {
        let key = cache_key(ORDERS, &query.to_query_string());
        let url = self.url(&key);
        self.caches
            .orders
            .get_or_fetch(key, async move { page(self.execute(self.http.get(url)).await?) })
            .await
            .map_err(ClientError::unshare)
    }

    pub async fn order_stats(&self) -> ClientResult<DashboardStats> {
        let url = self.url(ORDER_STATS);
        self.caches
            .stats
            .get_or_fetch(ORDER_STATS.to_string(), async move {
                data(self.execute(self.http.get(url)).await?)
            })
            .await
            .map_err(ClientError::unshare)
    }

    /// Stock changes with every order, so product reads are invalidated too.
    pub async fn place_order(&self, order: NewOrder) -> ClientResult<Order> {
        let order = validation::new_order(order)?;
        let placed = data(
            self.execute(self.http.post(self.url(ORDERS)).json(&order))
                .await?,
        )?;
        self.caches.orders.invalidate(ORDERS);
        self.caches.products_changed();
        Ok(placed)
    }

    pub async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> ClientResult<Order> {
        let url = self.url(&format!("{}/{}/status", ORDERS, id));
        let body = OrderStatusUpdate { status };
        let order = data(self.execute(self.http.patch(url).json(&body)).await?)?;
        self.caches.orders.invalidate(ORDERS);
        self.caches.stats.invalidate_all();
        Ok(order)
    }
}
