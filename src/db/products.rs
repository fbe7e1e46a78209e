use chrono::Utc;
use sqlx::{Postgres, QueryBuilder};
use std::cmp::Ordering;
use uuid::Uuid;

use super::memory::{contains_ci, paginate};
use super::{DbError, Store};
use crate::domain::models::{NewProduct, Product, ProductSort, ProductUpdate, SortOrder};
use crate::domain::pagination::PageParams;

const PRODUCT_COLUMNS: &str = "id, title, description, price, discount, quantity, category_id, \
                               is_published, images, attributes, created_at, updated_at";

const MISSING_CATEGORY: &str = "Category does not exist";

/// Filters for the product list.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub page: PageParams,
    pub sort_by: ProductSort,
    pub sort_order: SortOrder,
    pub category: Option<Uuid>,
    pub search: Option<String>,
    /// Hide unpublished products (storefront visitors).
    pub published_only: bool,
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if filter.published_only {
        qb.push(" AND is_published = TRUE");
    }
    if let Some(category) = filter.category {
        qb.push(" AND category_id = ").push_bind(category);
    }
    if let Some(search) = &filter.search {
        qb.push(" AND title ILIKE ").push_bind(like_pattern(search));
    }
}

fn compare_products(a: &Product, b: &Product, sort_by: ProductSort) -> Ordering {
    let primary = match sort_by {
        ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
        ProductSort::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        ProductSort::Price => a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal),
        ProductSort::Quantity => a.quantity.cmp(&b.quantity),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

impl Store {
    async fn ensure_category(&self, category_id: Option<Uuid>) -> Result<(), DbError> {
        if let Some(id) = category_id {
            self.get_category(id).await.map_err(|e| match e {
                DbError::NotFound => DbError::Rejected(MISSING_CATEGORY.to_string()),
                other => other,
            })?;
        }
        Ok(())
    }

    /// One page of products plus the total matching the filter.
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<(Vec<Product>, i64), DbError> {
        match self {
            Store::Postgres(pool) => {
                let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
                push_product_filters(&mut count, filter);
                let (total,): (i64,) = count.build_query_as().fetch_one(pool.as_ref()).await?;

                let mut select = QueryBuilder::<Postgres>::new(format!(
                    "SELECT {} FROM products",
                    PRODUCT_COLUMNS
                ));
                push_product_filters(&mut select, filter);
                select.push(format!(
                    " ORDER BY {} {}, id ASC",
                    filter.sort_by.column(),
                    filter.sort_order.as_str().to_uppercase()
                ));
                select
                    .push(" LIMIT ")
                    .push_bind(filter.page.limit())
                    .push(" OFFSET ")
                    .push_bind(filter.page.offset());
                let products = select
                    .build_query_as::<Product>()
                    .fetch_all(pool.as_ref())
                    .await?;

                Ok((products, total))
            }
            Store::Memory(mem) => {
                let table = mem.products.read().await;
                let mut products: Vec<Product> = table
                    .values()
                    .filter(|p| !filter.published_only || p.is_published)
                    .filter(|p| filter.category.map_or(true, |c| p.category_id == Some(c)))
                    .filter(|p| {
                        filter
                            .search
                            .as_deref()
                            .map_or(true, |s| contains_ci(&p.title, s))
                    })
                    .cloned()
                    .collect();
                products.sort_by(|a, b| {
                    let ordering = compare_products(a, b, filter.sort_by);
                    match filter.sort_order {
                        SortOrder::Asc => ordering,
                        SortOrder::Desc => ordering.reverse(),
                    }
                });
                Ok(paginate(products, &filter.page))
            }
        }
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product, DbError> {
        match self {
            Store::Postgres(pool) => sqlx::query_as::<_, Product>(&format!(
                "SELECT {} FROM products WHERE id = $1",
                PRODUCT_COLUMNS
            ))
            .bind(id)
            .fetch_optional(pool.as_ref())
            .await?
            .ok_or(DbError::NotFound),
            Store::Memory(mem) => mem
                .products
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(DbError::NotFound),
        }
    }

    pub async fn create_product(&self, new: &NewProduct) -> Result<Product, DbError> {
        self.ensure_category(new.category_id).await?;
        let attributes = if new.attributes.is_null() {
            serde_json::json!({})
        } else {
            new.attributes.clone()
        };

        match self {
            Store::Postgres(pool) => sqlx::query_as::<_, Product>(&format!(
                r#"
                INSERT INTO products
                    (title, description, price, discount, quantity, category_id,
                     is_published, images, attributes, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
                RETURNING {}
                "#,
                PRODUCT_COLUMNS
            ))
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.price)
            .bind(new.discount)
            .bind(new.quantity)
            .bind(new.category_id)
            .bind(new.is_published)
            .bind(&new.images)
            .bind(&attributes)
            .fetch_one(pool.as_ref())
            .await
            .map_err(|e| super::conflict_on_violation(e, MISSING_CATEGORY)),
            Store::Memory(mem) => {
                let now = Utc::now();
                let product = Product {
                    id: Uuid::new_v4(),
                    title: new.title.clone(),
                    description: new.description.clone(),
                    price: new.price,
                    discount: new.discount,
                    quantity: new.quantity,
                    category_id: new.category_id,
                    is_published: new.is_published,
                    images: new.images.clone(),
                    attributes,
                    created_at: now,
                    updated_at: now,
                };
                mem.products
                    .write()
                    .await
                    .insert(product.id, product.clone());
                Ok(product)
            }
        }
    }

    pub async fn update_product(&self, id: Uuid, update: &ProductUpdate) -> Result<Product, DbError> {
        if update.category_id.is_some() {
            self.ensure_category(update.category_id).await?;
        }

        match self {
            Store::Postgres(pool) => {
                let mut merged = self.get_product(id).await?;
                apply_update(&mut merged, update);
                sqlx::query_as::<_, Product>(&format!(
                    r#"
                    UPDATE products
                    SET title = $1, description = $2, price = $3, discount = $4, quantity = $5,
                        category_id = $6, is_published = $7, images = $8, attributes = $9,
                        updated_at = now()
                    WHERE id = $10
                    RETURNING {}
                    "#,
                    PRODUCT_COLUMNS
                ))
                .bind(&merged.title)
                .bind(&merged.description)
                .bind(merged.price)
                .bind(merged.discount)
                .bind(merged.quantity)
                .bind(merged.category_id)
                .bind(merged.is_published)
                .bind(&merged.images)
                .bind(&merged.attributes)
                .bind(id)
                .fetch_optional(pool.as_ref())
                .await
                .map_err(|e| super::conflict_on_violation(e, MISSING_CATEGORY))?
                .ok_or(DbError::NotFound)
            }
            Store::Memory(mem) => {
                let mut table = mem.products.write().await;
                let product = table.get_mut(&id).ok_or(DbError::NotFound)?;
                apply_update(product, update);
                product.updated_at = Utc::now();
                Ok(product.clone())
            }
        }
    }

    /// Flip `is_published` and return the updated product.
    pub async fn toggle_product_publish(&self, id: Uuid) -> Result<Product, DbError> {
        match self {
            Store::Postgres(pool) => sqlx::query_as::<_, Product>(&format!(
                r#"
                UPDATE products SET is_published = NOT is_published, updated_at = now()
                WHERE id = $1
                RETURNING {}
                "#,
                PRODUCT_COLUMNS
            ))
            .bind(id)
            .fetch_optional(pool.as_ref())
            .await?
            .ok_or(DbError::NotFound),
            Store::Memory(mem) => {
                let mut table = mem.products.write().await;
                let product = table.get_mut(&id).ok_or(DbError::NotFound)?;
                product.is_published = !product.is_published;
                product.updated_at = Utc::now();
                Ok(product.clone())
            }
        }
    }

    /// Deleting a product also deletes its reviews.
    pub async fn delete_product(&self, id: Uuid) -> Result<(), DbError> {
        match self {
            Store::Postgres(pool) => {
                let result = sqlx::query("DELETE FROM products WHERE id = $1")
                    .bind(id)
                    .execute(pool.as_ref())
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::NotFound);
                }
                Ok(())
            }
            Store::Memory(mem) => {
                let mut products = mem.products.write().await;
                if products.remove(&id).is_none() {
                    return Err(DbError::NotFound);
                }
                mem.reviews.write().await.retain(|_, r| r.product_id != id);
                Ok(())
            }
        }
    }

    /// `(total, published)` product counts.
    pub async fn count_products(&self) -> Result<(i64, i64), DbError> {
        match self {
            Store::Postgres(pool) => Ok(sqlx::query_as::<_, (i64, i64)>(
                "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_published) FROM products",
            )
            .fetch_one(pool.as_ref())
            .await?),
            Store::Memory(mem) => {
                let table = mem.products.read().await;
                let published = table.values().filter(|p| p.is_published).count();
                Ok((table.len() as i64, published as i64))
            }
        }
    }
}

fn apply_update(product: &mut Product, update: &ProductUpdate) {
    if let Some(title) = &update.title {
        product.title = title.clone();
    }
    if let Some(description) = &update.description {
        product.description = Some(description.clone());
    }
    if let Some(price) = update.price {
        product.price = price;
    }
    if let Some(discount) = update.discount {
        product.discount = discount;
    }
    if let Some(quantity) = update.quantity {
        product.quantity = quantity;
    }
    if let Some(category_id) = update.category_id {
        product.category_id = Some(category_id);
    }
    if let Some(is_published) = update.is_published {
        product.is_published = is_published;
    }
    if let Some(images) = &update.images {
        product.images = images.clone();
    }
    if let Some(attributes) = &update.attributes {
        product.attributes = attributes.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::NewCategory;

    fn new_product(title: &str, price: f64) -> NewProduct {
        NewProduct {
            title: title.to_string(),
            description: None,
            price,
            discount: 0,
            quantity: 5,
            category_id: None,
            is_published: true,
            images: vec![],
            attributes: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_pages() {
        let store = Store::memory();
        for (title, price) in [("Desk lamp", 40.0), ("Floor lamp", 120.0), ("Chair", 80.0)] {
            store.create_product(&new_product(title, price)).await.unwrap();
        }

        let filter = ProductFilter {
            page: PageParams::new(1, 10),
            sort_by: ProductSort::Price,
            sort_order: SortOrder::Asc,
            search: Some("LAMP".to_string()),
            ..ProductFilter::default()
        };
        let (products, total) = store.list_products(&filter).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(products[0].title, "Desk lamp");
        assert_eq!(products[1].title, "Floor lamp");

        let filter = ProductFilter {
            page: PageParams::new(2, 2),
            sort_by: ProductSort::Title,
            sort_order: SortOrder::Asc,
            ..ProductFilter::default()
        };
        let (products, total) = store.list_products(&filter).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title, "Floor lamp");
    }

    #[tokio::test]
    async fn test_published_only_hides_drafts() {
        let store = Store::memory();
        let mut draft = new_product("Draft", 1.0);
        draft.is_published = false;
        store.create_product(&draft).await.unwrap();
        store.create_product(&new_product("Live", 1.0)).await.unwrap();

        let filter = ProductFilter {
            published_only: true,
            ..ProductFilter::default()
        };
        let (products, total) = store.list_products(&filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(products[0].title, "Live");
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let store = Store::memory();
        let mut product = new_product("Lamp", 10.0);
        product.category_id = Some(Uuid::new_v4());
        assert!(matches!(
            store.create_product(&product).await,
            Err(DbError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_category_filter_and_delete_guard() {
        let store = Store::memory();
        let category = store
            .create_category(&NewCategory {
                title: "Lighting".to_string(),
            })
            .await
            .unwrap();
        let mut product = new_product("Lamp", 10.0);
        product.category_id = Some(category.id);
        let lamp = store.create_product(&product).await.unwrap();
        store.create_product(&new_product("Chair", 10.0)).await.unwrap();

        let filter = ProductFilter {
            category: Some(category.id),
            ..ProductFilter::default()
        };
        let (_, total) = store.list_products(&filter).await.unwrap();
        assert_eq!(total, 1);

        assert!(matches!(
            store.delete_category(category.id).await,
            Err(DbError::Conflict(_))
        ));
        store.delete_product(lamp.id).await.unwrap();
        store.delete_category(category.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle_and_partial_update() {
        let store = Store::memory();
        let product = store.create_product(&new_product("Lamp", 10.0)).await.unwrap();
        assert_eq!(product.attributes, serde_json::json!({}));

        let toggled = store.toggle_product_publish(product.id).await.unwrap();
        assert!(!toggled.is_published);

        let updated = store
            .update_product(
                product.id,
                &ProductUpdate {
                    price: Some(12.5),
                    ..ProductUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 12.5);
        assert_eq!(updated.title, "Lamp");
        assert_eq!(store.count_products().await.unwrap(), (1, 0));
    }
}
