/*!
 * Catalog Client
 * Query building, debounced search, request caching and list views that
 * drive the admin dashboard and storefront against the API
 */
pub mod api;
pub mod cache;
pub mod cart;
pub mod debounce;
pub mod forms;
pub mod query;
pub mod session;
pub mod view;

pub use api::{ApiClient, ClientError, ClientResult, ImageUpload, ProfileChanges, FALLBACK_MESSAGE};
pub use cache::{cache_key, QueryCache};
pub use cart::{Cart, CartError, CartLine};
pub use debounce::{Debouncer, DelayedTask, SEARCH_DEBOUNCE};
pub use query::ListQuery;
pub use session::Session;
pub use view::{
    CategoryListView, FetchState, ListState, Notification, NotificationKind, OrderListView,
    ProductListView, ProductRow, ReviewListView,
};
