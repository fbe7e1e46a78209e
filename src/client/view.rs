//! List views for the dashboard and storefront.
//!
//! A view owns its filter state, the rows of the last confirmed fetch, and
//! a transient notification set by mutations. Filters change synchronously;
//! `refresh` fetches the page they describe.
//!
//! Every fetch is stamped with a generation. A response whose generation is
//! older than the latest fetch started is dropped, so the view always shows
//! the last request initiated even when responses arrive out of order.

use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::api::{ApiClient, ClientError, ClientResult};
use super::debounce::{Debouncer, SEARCH_DEBOUNCE};
use super::forms::CategoryForm;
use super::query::ListQuery;
use crate::domain::envelope::Page;
use crate::domain::models::{
    Category, Order, OrderStatus, Product, ProductSort, Review, ReviewStatus, SortOrder,
};
use crate::domain::pagination::{Pagination, DEFAULT_LIMIT};

/// Lifecycle of one fetch or mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Success,
    Error(String),
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Transient message shown after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

/// Identifies one fetch of a [`ListState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// Rows, pagination and fetch state of one list.
#[derive(Debug, Clone)]
pub struct ListState<T> {
    items: Vec<T>,
    pagination: Pagination,
    state: FetchState,
    generation: u64,
}

impl<T> ListState<T> {
    pub fn new(items_per_page: i64) -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination::new(items_per_page),
            state: FetchState::Idle,
            generation: 0,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn pagination_mut(&mut self) -> &mut Pagination {
        &mut self.pagination
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    /// Loaded and holds no rows.
    pub fn is_empty(&self) -> bool {
        self.state == FetchState::Success && self.items.is_empty()
    }

    /// Start a fetch. Any fetch begun earlier becomes stale.
    pub fn begin(&mut self) -> FetchTicket {
        self.generation += 1;
        self.state = FetchState::Loading;
        FetchTicket(self.generation)
    }

    /// Apply a page. Returns false when the ticket is stale and the result
    /// was dropped. Rows of a failed fetch are kept.
    pub fn finish(&mut self, ticket: FetchTicket, result: ClientResult<Page<T>>) -> bool {
        if ticket.0 != self.generation {
            tracing::debug!(
                "Dropping stale response (generation {} < {})",
                ticket.0,
                self.generation
            );
            return false;
        }
        match result {
            Ok(page) => {
                self.items = page.items;
                self.pagination.set_total_items(page.meta.total);
                self.state = FetchState::Success;
            }
            Err(e) => self.state = FetchState::Error(e.user_message()),
        }
        true
    }

    /// Like [`finish`](Self::finish) for endpoints that return every row.
    pub fn finish_all(&mut self, ticket: FetchTicket, result: ClientResult<Vec<T>>) -> bool {
        if ticket.0 != self.generation {
            return false;
        }
        match result {
            Ok(items) => {
                self.pagination.set_total_items(items.len() as i64);
                self.items = items;
                self.state = FetchState::Success;
            }
            Err(e) => self.state = FetchState::Error(e.user_message()),
        }
        true
    }
}

/// Record the outcome of a mutation as a notification.
fn notify<T>(
    notification: &mut Option<Notification>,
    result: ClientResult<T>,
    success: impl Into<String>,
) -> Option<T> {
    match result {
        Ok(value) => {
            *notification = Some(Notification::success(success));
            Some(value)
        }
        Err(e) => {
            tracing::warn!("Mutation failed: {}", e);
            *notification = Some(Notification::error(e.user_message()));
            None
        }
    }
}

/// Search input whose term only changes once typing settles.
struct SearchBox {
    term: String,
    input: Debouncer<String>,
    commits: mpsc::UnboundedReceiver<String>,
}

impl SearchBox {
    fn new() -> Self {
        let (input, commits) = Debouncer::new(SEARCH_DEBOUNCE);
        Self {
            term: String::new(),
            input,
            commits,
        }
    }

    fn term(&self) -> &str {
        &self.term
    }

    fn type_raw(&mut self, raw: String) {
        self.input.push(raw);
    }

    /// Wait for typed input to settle. `None` when nothing was typed,
    /// otherwise whether the committed term differs from the previous one.
    async fn settle(&mut self) -> Option<bool> {
        let raw = if self.input.is_pending() {
            self.commits.recv().await?
        } else {
            self.commits.try_recv().ok()?
        };
        let term = raw.trim().to_string();
        let changed = term != self.term;
        self.term = term;
        Some(changed)
    }
}

// ============================================================================
// Products
// ============================================================================

/// One rendered product row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub discounted_price: f64,
    /// "20% off", absent without a discount.
    pub badge: Option<String>,
    pub image: String,
    pub quantity: i32,
    pub in_stock: bool,
    pub is_published: bool,
}

pub struct ProductListView {
    client: Arc<ApiClient>,
    list: ListState<Product>,
    sort_by: ProductSort,
    sort_order: SortOrder,
    category: Option<Uuid>,
    search: SearchBox,
    mutation: FetchState,
    notification: Option<Notification>,
}

impl ProductListView {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self::with_page_size(client, DEFAULT_LIMIT)
    }

    pub fn with_page_size(client: Arc<ApiClient>, items_per_page: i64) -> Self {
        Self {
            client,
            list: ListState::new(items_per_page),
            sort_by: ProductSort::default(),
            sort_order: SortOrder::default(),
            category: None,
            search: SearchBox::new(),
            mutation: FetchState::Idle,
            notification: None,
        }
    }

    pub fn list(&self) -> &ListState<Product> {
        &self.list
    }

    pub fn search(&self) -> &str {
        self.search.term()
    }

    pub fn mutation(&self) -> &FetchState {
        &self.mutation
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notification.take()
    }

    pub fn query(&self) -> ListQuery {
        ListQuery::from_pagination(self.list.pagination())
            .sorted(self.sort_by, self.sort_order)
            .category(self.category)
            .search(self.search.term())
    }

    pub fn set_page(&mut self, page: i64) {
        self.list.pagination_mut().set_page(page);
    }

    pub fn set_page_size(&mut self, items_per_page: i64) {
        self.list.pagination_mut().set_items_per_page(items_per_page);
    }

    pub fn set_category(&mut self, category: Option<Uuid>) {
        self.category = category;
        self.list.pagination_mut().reset();
    }

    pub fn set_sort(&mut self, sort_by: ProductSort, sort_order: SortOrder) {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self.list.pagination_mut().reset();
    }

    /// Raw keystrokes. The term only takes effect once the input settles.
    pub fn type_search(&mut self, raw: impl Into<String>) {
        self.search.type_raw(raw.into());
    }

    /// Wait for typed input to settle and apply it. Returns false when
    /// nothing was typed.
    pub async fn settle_search(&mut self) -> bool {
        match self.search.settle().await {
            Some(changed) => {
                if changed {
                    self.list.pagination_mut().reset();
                }
                true
            }
            None => false,
        }
    }

    /// Fetch the current page. A page past the end is clamped to the last
    /// page and fetched again.
    pub async fn refresh(&mut self) {
        self.fetch().await;
        if self.list.state() == &FetchState::Success && self.list.pagination_mut().clamp() {
            self.fetch().await;
        }
    }

    async fn fetch(&mut self) {
        let ticket = self.list.begin();
        let result = self.client.list_products(&self.query()).await;
        self.list.finish(ticket, result);
    }

    pub fn rows(&self) -> Vec<ProductRow> {
        self.list
            .items()
            .iter()
            .map(|p| ProductRow {
                id: p.id,
                title: p.title.clone(),
                price: p.price,
                discounted_price: p.discounted_price(),
                badge: p.discount_badge(),
                image: self.client.image_url(&p.images),
                quantity: p.quantity,
                in_stock: p.in_stock(),
                is_published: p.is_published,
            })
            .collect()
    }

    pub async fn toggle_publish(&mut self, id: Uuid) -> bool {
        self.mutation = FetchState::Loading;
        let result = self.client.toggle_product_publish(id).await;
        let message = match &result {
            Ok(p) if p.is_published => "Product published",
            _ => "Product unpublished",
        };
        self.after_mutation(result, message).await
    }

    pub async fn delete(&mut self, id: Uuid) -> bool {
        self.mutation = FetchState::Loading;
        let result = self.client.delete_product(id).await;
        self.after_mutation(result, "Product deleted").await
    }

    async fn after_mutation<T>(&mut self, result: ClientResult<T>, success: &str) -> bool {
        self.mutation = mutation_state(&result);
        let ok = notify(&mut self.notification, result, success).is_some();
        if ok {
            self.refresh().await;
        }
        ok
    }
}

fn mutation_state<T>(result: &ClientResult<T>) -> FetchState {
    match result {
        Ok(_) => FetchState::Success,
        Err(e) => FetchState::Error(e.user_message()),
    }
}

// ============================================================================
// Categories
// ============================================================================

pub struct CategoryListView {
    client: Arc<ApiClient>,
    list: ListState<Category>,
    pending_delete: Option<Uuid>,
    mutation: FetchState,
    notification: Option<Notification>,
}

impl CategoryListView {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            list: ListState::new(DEFAULT_LIMIT),
            pending_delete: None,
            mutation: FetchState::Idle,
            notification: None,
        }
    }

    pub fn rows(&self) -> &[Category] {
        self.list.items()
    }

    pub fn list(&self) -> &ListState<Category> {
        &self.list
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn mutation(&self) -> &FetchState {
        &self.mutation
    }

    pub async fn refresh(&mut self) {
        let ticket = self.list.begin();
        let result = self.client.list_categories().await;
        self.list.finish_all(ticket, result);
    }

    /// Invalid input is reported without a request.
    pub async fn create(&mut self, form: &CategoryForm) -> Option<Category> {
        let payload = match form.validate() {
            Ok(payload) => payload,
            Err(errors) => {
                self.notification = Some(Notification::error(errors.to_string()));
                return None;
            }
        };
        self.mutation = FetchState::Loading;
        let result = self.client.create_category(payload).await;
        self.mutation = mutation_state(&result);
        let created = notify(&mut self.notification, result, "Category created");
        if created.is_some() {
            self.refresh().await;
        }
        created
    }

    /// Open the confirmation dialog for `id`.
    pub fn request_delete(&mut self, id: Uuid) {
        self.pending_delete = Some(id);
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn is_confirming_delete(&self) -> bool {
        self.pending_delete.is_some()
    }

    /// Delete the category awaiting confirmation. The dialog closes on
    /// success and stays open on failure.
    pub async fn confirm_delete(&mut self) -> bool {
        let Some(id) = self.pending_delete else {
            return false;
        };
        self.mutation = FetchState::Loading;
        let result = self.client.delete_category(id).await;
        self.mutation = mutation_state(&result);
        let deleted = notify(&mut self.notification, result, "Category deleted").is_some();
        if deleted {
            self.pending_delete = None;
            self.refresh().await;
        }
        deleted
    }
}

// ============================================================================
// Reviews
// ============================================================================

pub struct ReviewListView {
    client: Arc<ApiClient>,
    list: ListState<Review>,
    status: Option<ReviewStatus>,
    product: Option<Uuid>,
    search: SearchBox,
    mutation: FetchState,
    notification: Option<Notification>,
}

impl ReviewListView {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            list: ListState::new(DEFAULT_LIMIT),
            status: None,
            product: None,
            search: SearchBox::new(),
            mutation: FetchState::Idle,
            notification: None,
        }
    }

    pub fn rows(&self) -> &[Review] {
        self.list.items()
    }

    pub fn list(&self) -> &ListState<Review> {
        &self.list
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn mutation(&self) -> &FetchState {
        &self.mutation
    }

    pub fn query(&self) -> ListQuery {
        ListQuery::from_pagination(self.list.pagination())
            .product(self.product)
            .status(self.status.map(|s| s.as_str()))
            .search(self.search.term())
    }

    pub fn set_status(&mut self, status: Option<ReviewStatus>) {
        self.status = status;
        self.list.pagination_mut().reset();
    }

    pub fn set_product(&mut self, product: Option<Uuid>) {
        self.product = product;
        self.list.pagination_mut().reset();
    }

    pub fn search(&self) -> &str {
        self.search.term()
    }

    /// Raw keystrokes, applied once the input settles.
    pub fn type_search(&mut self, raw: impl Into<String>) {
        self.search.type_raw(raw.into());
    }

    /// Returns false when nothing was typed.
    pub async fn settle_search(&mut self) -> bool {
        match self.search.settle().await {
            Some(changed) => {
                if changed {
                    self.list.pagination_mut().reset();
                }
                true
            }
            None => false,
        }
    }

    pub fn set_page(&mut self, page: i64) {
        self.list.pagination_mut().set_page(page);
    }

    /// A page past the end is clamped to the last page and fetched again.
    pub async fn refresh(&mut self) {
        self.fetch().await;
        if self.list.state() == &FetchState::Success && self.list.pagination_mut().clamp() {
            self.fetch().await;
        }
    }

    async fn fetch(&mut self) {
        let ticket = self.list.begin();
        let result = self.client.list_reviews(&self.query()).await;
        self.list.finish(ticket, result);
    }

    /// Only approved reviews can be published or hidden; for any other
    /// review this does nothing and sends nothing.
    pub async fn toggle_publish(&mut self, id: Uuid) -> bool {
        let allowed = self
            .list
            .items()
            .iter()
            .find(|r| r.id == id)
            .is_some_and(Review::can_toggle_publish);
        if !allowed {
            return false;
        }
        self.mutation = FetchState::Loading;
        let result = self.client.toggle_review_publish(id).await;
        let message = match &result {
            Ok(r) if r.is_published => "Review published",
            _ => "Review hidden",
        };
        self.after_mutation(result, message).await
    }

    pub async fn approve(&mut self, id: Uuid) -> bool {
        self.mutation = FetchState::Loading;
        let result = self.client.approve_review(id).await;
        self.after_mutation(result, "Review approved").await
    }

    pub async fn reject(&mut self, id: Uuid) -> bool {
        self.mutation = FetchState::Loading;
        let result = self.client.reject_review(id).await;
        self.after_mutation(result, "Review rejected").await
    }

    pub async fn delete(&mut self, id: Uuid) -> bool {
        self.mutation = FetchState::Loading;
        let result = self.client.delete_review(id).await;
        self.after_mutation(result, "Review deleted").await
    }

    async fn after_mutation<T>(&mut self, result: ClientResult<T>, success: &str) -> bool {
        self.mutation = mutation_state(&result);
        let ok = notify(&mut self.notification, result, success).is_some();
        if ok {
            self.refresh().await;
        }
        ok
    }
}

// ============================================================================
// Orders
// ============================================================================

pub struct OrderListView {
    client: Arc<ApiClient>,
    list: ListState<Order>,
    status: Option<OrderStatus>,
    mutation: FetchState,
    notification: Option<Notification>,
}

impl OrderListView {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            list: ListState::new(DEFAULT_LIMIT),
            status: None,
            mutation: FetchState::Idle,
            notification: None,
        }
    }

    pub fn rows(&self) -> &[Order] {
        self.list.items()
    }

    pub fn list(&self) -> &ListState<Order> {
        &self.list
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn mutation(&self) -> &FetchState {
        &self.mutation
    }

    pub fn set_status(&mut self, status: Option<OrderStatus>) {
        self.status = status;
        self.list.pagination_mut().reset();
    }

    pub fn set_page(&mut self, page: i64) {
        self.list.pagination_mut().set_page(page);
    }

    pub fn query(&self) -> ListQuery {
        ListQuery::from_pagination(self.list.pagination()).status(self.status.map(|s| s.as_str()))
    }

    /// A page past the end is clamped to the last page and fetched again.
    pub async fn refresh(&mut self) {
        self.fetch().await;
        if self.list.state() == &FetchState::Success && self.list.pagination_mut().clamp() {
            self.fetch().await;
        }
    }

    async fn fetch(&mut self) {
        let ticket = self.list.begin();
        let result = self.client.list_orders(&self.query()).await;
        self.list.finish(ticket, result);
    }

    pub async fn set_order_status(&mut self, id: Uuid, status: OrderStatus) -> bool {
        self.mutation = FetchState::Loading;
        let result: Result<Order, ClientError> =
            self.client.update_order_status(id, status).await;
        self.mutation = mutation_state(&result);
        let ok = notify(&mut self.notification, result, "Order status updated").is_some();
        if ok {
            self.refresh().await;
        }
        ok
    }
}
