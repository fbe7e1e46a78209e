//! Database rows that need conversion before they become domain entities.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::DbError;
use crate::domain::models::{Order, OrderItem, Review, Role, UserProfile};

/// Stored user, including the password hash.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            image: self.image.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserRecord {
            role: row.role.parse().map_err(|e| DbError::Decode(format!("{}", e)))?,
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub customer_name: String,
    pub rating: i32,
    pub comment: String,
    pub images: Vec<String>,
    pub status: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = DbError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Review {
            status: row.status.parse().map_err(|e| DbError::Decode(format!("{}", e)))?,
            id: row.id,
            product_id: row.product_id,
            customer_name: row.customer_name,
            rating: row.rating,
            comment: row.comment,
            images: row.images,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub address: String,
    pub items: Json<Vec<OrderItem>>,
    pub status: String,
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            status: row.status.parse().map_err(|e| DbError::Decode(format!("{}", e)))?,
            id: row.id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            address: row.address,
            items: row.items.0,
            total_amount: row.total_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Convert a batch of rows, failing on the first corrupt one.
pub(crate) fn convert_rows<R, T>(rows: Vec<R>) -> Result<Vec<T>, DbError>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_review_status_is_a_decode_error() {
        let now = Utc::now();
        let row = ReviewRow {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            customer_name: "Ada".to_string(),
            rating: 4,
            comment: "Solid".to_string(),
            images: vec![],
            status: "archived".to_string(),
            is_published: false,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(Review::try_from(row), Err(DbError::Decode(_))));
    }

    #[test]
    fn test_profile_drops_password_hash() {
        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            image: None,
            role: Role::Admin,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(record.profile()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "admin");
    }
}
