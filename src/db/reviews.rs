use chrono::Utc;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::memory::{contains_ci, paginate};
use super::models::{convert_rows, ReviewRow};
use super::{DbError, Store};
use crate::domain::models::{NewReview, Review, ReviewStatus};
use crate::domain::pagination::PageParams;

const REVIEW_COLUMNS: &str = "id, product_id, customer_name, rating, comment, images, status, \
                              is_published, created_at, updated_at";

pub const NOT_APPROVED: &str = "Only approved reviews can be published";

#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub page: PageParams,
    pub status: Option<ReviewStatus>,
    pub product: Option<Uuid>,
    /// Matches the comment or the customer name.
    pub search: Option<String>,
    pub published_only: bool,
}

fn push_review_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ReviewFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(product) = filter.product {
        qb.push(" AND product_id = ").push_bind(product);
    }
    if filter.published_only {
        qb.push(" AND is_published = TRUE");
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        qb.push(" AND (comment ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR customer_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl Store {
    pub async fn list_reviews(&self, filter: &ReviewFilter) -> Result<(Vec<Review>, i64), DbError> {
        match self {
            Store::Postgres(pool) => {
                let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM reviews");
                push_review_filters(&mut count, filter);
                let (total,): (i64,) = count.build_query_as().fetch_one(pool.as_ref()).await?;

                let mut select =
                    QueryBuilder::<Postgres>::new(format!("SELECT {} FROM reviews", REVIEW_COLUMNS));
                push_review_filters(&mut select, filter);
                select
                    .push(" ORDER BY created_at DESC, id ASC LIMIT ")
                    .push_bind(filter.page.limit())
                    .push(" OFFSET ")
                    .push_bind(filter.page.offset());
                let rows = select
                    .build_query_as::<ReviewRow>()
                    .fetch_all(pool.as_ref())
                    .await?;

                Ok((convert_rows(rows)?, total))
            }
            Store::Memory(mem) => {
                let table = mem.reviews.read().await;
                let mut reviews: Vec<Review> = table
                    .values()
                    .filter(|r| filter.status.map_or(true, |s| r.status == s))
                    .filter(|r| filter.product.map_or(true, |p| r.product_id == p))
                    .filter(|r| !filter.published_only || r.is_published)
                    .filter(|r| {
                        filter.search.as_deref().map_or(true, |s| {
                            contains_ci(&r.comment, s) || contains_ci(&r.customer_name, s)
                        })
                    })
                    .cloned()
                    .collect();
                reviews.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then_with(|| a.id.cmp(&b.id))
                });
                Ok(paginate(reviews, &filter.page))
            }
        }
    }

    pub async fn get_review(&self, id: Uuid) -> Result<Review, DbError> {
        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, ReviewRow>(&format!(
                    "SELECT {} FROM reviews WHERE id = $1",
                    REVIEW_COLUMNS
                ))
                .bind(id)
                .fetch_optional(pool.as_ref())
                .await?
                .ok_or(DbError::NotFound)?;
                Review::try_from(row)
            }
            Store::Memory(mem) => mem
                .reviews
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(DbError::NotFound),
        }
    }

    /// New reviews start pending and unpublished.
    pub async fn create_review(&self, new: &NewReview) -> Result<Review, DbError> {
        self.get_product(new.product_id).await.map_err(|e| match e {
            DbError::NotFound => DbError::Rejected("Product does not exist".to_string()),
            other => other,
        })?;

        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, ReviewRow>(&format!(
                    r#"
                    INSERT INTO reviews
                        (product_id, customer_name, rating, comment, images, status,
                         is_published, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, 'pending', false, now(), now())
                    RETURNING {}
                    "#,
                    REVIEW_COLUMNS
                ))
                .bind(new.product_id)
                .bind(&new.customer_name)
                .bind(new.rating)
                .bind(&new.comment)
                .bind(&new.images)
                .fetch_one(pool.as_ref())
                .await?;
                Review::try_from(row)
            }
            Store::Memory(mem) => {
                let now = Utc::now();
                let review = Review {
                    id: Uuid::new_v4(),
                    product_id: new.product_id,
                    customer_name: new.customer_name.clone(),
                    rating: new.rating,
                    comment: new.comment.clone(),
                    images: new.images.clone(),
                    status: ReviewStatus::Pending,
                    is_published: false,
                    created_at: now,
                    updated_at: now,
                };
                mem.reviews.write().await.insert(review.id, review.clone());
                Ok(review)
            }
        }
    }

    /// Approve or reject. Anything other than approval also unpublishes.
    pub async fn set_review_status(&self, id: Uuid, status: ReviewStatus) -> Result<Review, DbError> {
        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, ReviewRow>(&format!(
                    r#"
                    UPDATE reviews
                    SET status = $1,
                        is_published = CASE WHEN $1 = 'approved' THEN is_published ELSE false END,
                        updated_at = now()
                    WHERE id = $2
                    RETURNING {}
                    "#,
                    REVIEW_COLUMNS
                ))
                .bind(status.as_str())
                .bind(id)
                .fetch_optional(pool.as_ref())
                .await?
                .ok_or(DbError::NotFound)?;
                Review::try_from(row)
            }
            Store::Memory(mem) => {
                let mut table = mem.reviews.write().await;
                let review = table.get_mut(&id).ok_or(DbError::NotFound)?;
                review.status = status;
                if status != ReviewStatus::Approved {
                    review.is_published = false;
                }
                review.updated_at = Utc::now();
                Ok(review.clone())
            }
        }
    }

    /// Flip `is_published`. Refused unless the review is approved.
    pub async fn toggle_review_publish(&self, id: Uuid) -> Result<Review, DbError> {
        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, ReviewRow>(&format!(
                    r#"
                    UPDATE reviews SET is_published = NOT is_published, updated_at = now()
                    WHERE id = $1 AND status = 'approved'
                    RETURNING {}
                    "#,
                    REVIEW_COLUMNS
                ))
                .bind(id)
                .fetch_optional(pool.as_ref())
                .await?;
                match row {
                    Some(row) => Review::try_from(row),
                    // Distinguish a missing review from one that is not approved.
                    None => {
                        self.get_review(id).await?;
                        Err(DbError::Conflict(NOT_APPROVED.to_string()))
                    }
                }
            }
            Store::Memory(mem) => {
                let mut table = mem.reviews.write().await;
                let review = table.get_mut(&id).ok_or(DbError::NotFound)?;
                if !review.can_toggle_publish() {
                    return Err(DbError::Conflict(NOT_APPROVED.to_string()));
                }
                review.is_published = !review.is_published;
                review.updated_at = Utc::now();
                Ok(review.clone())
            }
        }
    }

    pub async fn delete_review(&self, id: Uuid) -> Result<(), DbError> {
        match self {
            Store::Postgres(pool) => {
                let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
                    .bind(id)
                    .execute(pool.as_ref())
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::NotFound);
                }
                Ok(())
            }
            Store::Memory(mem) => mem
                .reviews
                .write()
                .await
                .remove(&id)
                .map(|_| ())
                .ok_or(DbError::NotFound),
        }
    }

    pub async fn count_reviews_with_status(&self, status: ReviewStatus) -> Result<i64, DbError> {
        match self {
            Store::Postgres(pool) => {
                let (count,): (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE status = $1")
                        .bind(status.as_str())
                        .fetch_one(pool.as_ref())
                        .await?;
                Ok(count)
            }
            Store::Memory(mem) => Ok(mem
                .reviews
                .read()
                .await
                .values()
                .filter(|r| r.status == status)
                .count() as i64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::NewProduct;

    async fn store_with_product() -> (Store, Uuid) {
        let store = Store::memory();
        let product = store
            .create_product(&NewProduct {
                title: "Desk lamp".to_string(),
                description: None,
                price: 40.0,
                discount: 0,
                quantity: 3,
                category_id: None,
                is_published: true,
                images: vec![],
                attributes: serde_json::Value::Null,
            })
            .await
            .unwrap();
        (store, product.id)
    }

    fn new_review(product_id: Uuid, comment: &str) -> NewReview {
        NewReview {
            product_id,
            customer_name: "Ada".to_string(),
            rating: 5,
            comment: comment.to_string(),
            images: vec![],
        }
    }

    #[tokio::test]
    async fn test_new_review_is_pending_and_hidden() {
        let (store, product_id) = store_with_product().await;
        let review = store
            .create_review(&new_review(product_id, "Bright"))
            .await
            .unwrap();
        assert_eq!(review.status, ReviewStatus::Pending);
        assert!(!review.is_published);
    }

    #[tokio::test]
    async fn test_toggle_publish_requires_approval() {
        let (store, product_id) = store_with_product().await;
        let review = store
            .create_review(&new_review(product_id, "Bright"))
            .await
            .unwrap();

        assert!(matches!(
            store.toggle_review_publish(review.id).await,
            Err(DbError::Conflict(_))
        ));

        store
            .set_review_status(review.id, ReviewStatus::Approved)
            .await
            .unwrap();
        let published = store.toggle_review_publish(review.id).await.unwrap();
        assert!(published.is_published);

        let rejected = store
            .set_review_status(review.id, ReviewStatus::Rejected)
            .await
            .unwrap();
        assert!(!rejected.is_published);
    }

    #[tokio::test]
    async fn test_filters_by_status_and_search() {
        let (store, product_id) = store_with_product().await;
        let bright = store
            .create_review(&new_review(product_id, "Very bright"))
            .await
            .unwrap();
        store
            .create_review(&new_review(product_id, "Wobbly base"))
            .await
            .unwrap();
        store
            .set_review_status(bright.id, ReviewStatus::Approved)
            .await
            .unwrap();

        let filter = ReviewFilter {
            status: Some(ReviewStatus::Pending),
            ..ReviewFilter::default()
        };
        let (reviews, total) = store.list_reviews(&filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(reviews[0].comment, "Wobbly base");

        let filter = ReviewFilter {
            search: Some("BRIGHT".to_string()),
            ..ReviewFilter::default()
        };
        let (_, total) = store.list_reviews(&filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(
            store
                .count_reviews_with_status(ReviewStatus::Pending)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_review_for_missing_product_is_rejected() {
        let store = Store::memory();
        assert!(matches!(
            store.create_review(&new_review(Uuid::new_v4(), "?")).await,
            Err(DbError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_product_removes_reviews() {
        let (store, product_id) = store_with_product().await;
        let review = store
            .create_review(&new_review(product_id, "Bright"))
            .await
            .unwrap();
        store.delete_product(product_id).await.unwrap();
        assert!(matches!(
            store.get_review(review.id).await,
            Err(DbError::NotFound)
        ));
    }
}
