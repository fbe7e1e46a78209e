use chrono::Utc;
use uuid::Uuid;

use super::{conflict_on_violation, DbError, Store};
use crate::domain::models::{Category, NewCategory};

const DUPLICATE_TITLE: &str = "A category with this title already exists";
const IN_USE: &str = "Category is still used by products";

impl Store {
    /// All categories, alphabetical.
    pub async fn list_categories(&self) -> Result<Vec<Category>, DbError> {
        match self {
            Store::Postgres(pool) => Ok(sqlx::query_as::<_, Category>(
                "SELECT id, title, created_at, updated_at FROM categories ORDER BY title ASC",
            )
            .fetch_all(pool.as_ref())
            .await?),
            Store::Memory(mem) => {
                let table = mem.categories.read().await;
                let mut categories: Vec<Category> = table.values().cloned().collect();
                categories.sort_by(|a, b| a.title.cmp(&b.title));
                Ok(categories)
            }
        }
    }

    pub async fn get_category(&self, id: Uuid) -> Result<Category, DbError> {
        match self {
            Store::Postgres(pool) => sqlx::query_as::<_, Category>(
                "SELECT id, title, created_at, updated_at FROM categories WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool.as_ref())
            .await?
            .ok_or(DbError::NotFound),
            Store::Memory(mem) => mem
                .categories
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(DbError::NotFound),
        }
    }

    pub async fn create_category(&self, new: &NewCategory) -> Result<Category, DbError> {
        match self {
            Store::Postgres(pool) => sqlx::query_as::<_, Category>(
                r#"
                INSERT INTO categories (title, created_at, updated_at)
                VALUES ($1, now(), now())
                RETURNING id, title, created_at, updated_at
                "#,
            )
            .bind(&new.title)
            .fetch_one(pool.as_ref())
            .await
            .map_err(|e| conflict_on_violation(e, DUPLICATE_TITLE)),
            Store::Memory(mem) => {
                let mut table = mem.categories.write().await;
                if table.values().any(|c| c.title == new.title) {
                    return Err(DbError::Conflict(DUPLICATE_TITLE.to_string()));
                }
                let now = Utc::now();
                let category = Category {
                    id: Uuid::new_v4(),
                    title: new.title.clone(),
                    created_at: now,
                    updated_at: now,
                };
                table.insert(category.id, category.clone());
                Ok(category)
            }
        }
    }

    pub async fn update_category(&self, id: Uuid, update: &NewCategory) -> Result<Category, DbError> {
        match self {
            Store::Postgres(pool) => sqlx::query_as::<_, Category>(
                r#"
                UPDATE categories SET title = $1, updated_at = now()
                WHERE id = $2
                RETURNING id, title, created_at, updated_at
                "#,
            )
            .bind(&update.title)
            .bind(id)
            .fetch_optional(pool.as_ref())
            .await
            .map_err(|e| conflict_on_violation(e, DUPLICATE_TITLE))?
            .ok_or(DbError::NotFound),
            Store::Memory(mem) => {
                let mut table = mem.categories.write().await;
                if table
                    .values()
                    .any(|c| c.id != id && c.title == update.title)
                {
                    return Err(DbError::Conflict(DUPLICATE_TITLE.to_string()));
                }
                let category = table.get_mut(&id).ok_or(DbError::NotFound)?;
                category.title = update.title.clone();
                category.updated_at = Utc::now();
                Ok(category.clone())
            }
        }
    }

    /// Refused while any product still points at the category.
    pub async fn delete_category(&self, id: Uuid) -> Result<(), DbError> {
        match self {
            Store::Postgres(pool) => {
                let result = sqlx::query("DELETE FROM categories WHERE id = $1")
                    .bind(id)
                    .execute(pool.as_ref())
                    .await
                    .map_err(|e| conflict_on_violation(e, IN_USE))?;
                if result.rows_affected() == 0 {
                    return Err(DbError::NotFound);
                }
                Ok(())
            }
            Store::Memory(mem) => {
                let mut categories = mem.categories.write().await;
                if !categories.contains_key(&id) {
                    return Err(DbError::NotFound);
                }
                let products = mem.products.read().await;
                if products.values().any(|p| p.category_id == Some(id)) {
                    return Err(DbError::Conflict(IN_USE.to_string()));
                }
                categories.remove(&id);
                Ok(())
            }
        }
    }

    pub async fn count_categories(&self) -> Result<i64, DbError> {
        match self {
            Store::Postgres(pool) => {
                let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
                    .fetch_one(pool.as_ref())
                    .await?;
                Ok(count)
            }
            Store::Memory(mem) => Ok(mem.categories.read().await.len() as i64),
        }
    }
}
