use chrono::Utc;
use uuid::Uuid;

use super::models::{convert_rows, UserRecord, UserRow};
use super::{conflict_on_violation, DbError, Store};
use crate::domain::models::Role;

const USER_COLUMNS: &str = "id, name, email, password_hash, image, role, created_at, updated_at";
const DUPLICATE_EMAIL: &str = "A user with this email already exists";

/// Fields for inserting a user whose password is already hashed.
#[derive(Debug, Clone)]
pub struct UserInsert {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Profile fields that may change. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.image.is_none()
    }
}

impl Store {
    pub async fn list_users(&self) -> Result<Vec<UserRecord>, DbError> {
        match self {
            Store::Postgres(pool) => {
                let rows = sqlx::query_as::<_, UserRow>(&format!(
                    "SELECT {} FROM users ORDER BY created_at ASC",
                    USER_COLUMNS
                ))
                .fetch_all(pool.as_ref())
                .await?;
                convert_rows(rows)
            }
            Store::Memory(mem) => {
                let table = mem.users.read().await;
                let mut users: Vec<UserRecord> = table.values().cloned().collect();
                users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                Ok(users)
            }
        }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserRecord, DbError> {
        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, UserRow>(&format!(
                    "SELECT {} FROM users WHERE id = $1",
                    USER_COLUMNS
                ))
                .bind(id)
                .fetch_optional(pool.as_ref())
                .await?
                .ok_or(DbError::NotFound)?;
                UserRecord::try_from(row)
            }
            Store::Memory(mem) => mem
                .users
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(DbError::NotFound),
        }
    }

    /// Lookup is case-insensitive; stored emails are lowercase.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DbError> {
        let email = email.trim().to_lowercase();
        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, UserRow>(&format!(
                    "SELECT {} FROM users WHERE email = $1",
                    USER_COLUMNS
                ))
                .bind(&email)
                .fetch_optional(pool.as_ref())
                .await?;
                row.map(UserRecord::try_from).transpose()
            }
            Store::Memory(mem) => Ok(mem
                .users
                .read()
                .await
                .values()
                .find(|u| u.email == email)
                .cloned()),
        }
    }

    pub async fn create_user(&self, new: &UserInsert) -> Result<UserRecord, DbError> {
        let email = new.email.trim().to_lowercase();
        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, UserRow>(&format!(
                    r#"
                    INSERT INTO users (name, email, password_hash, role, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, now(), now())
                    RETURNING {}
                    "#,
                    USER_COLUMNS
                ))
                .bind(&new.name)
                .bind(&email)
                .bind(&new.password_hash)
                .bind(new.role.as_str())
                .fetch_one(pool.as_ref())
                .await
                .map_err(|e| conflict_on_violation(e, DUPLICATE_EMAIL))?;
                UserRecord::try_from(row)
            }
            Store::Memory(mem) => {
                let mut table = mem.users.write().await;
                if table.values().any(|u| u.email == email) {
                    return Err(DbError::Conflict(DUPLICATE_EMAIL.to_string()));
                }
                let now = Utc::now();
                let user = UserRecord {
                    id: Uuid::new_v4(),
                    name: new.name.clone(),
                    email,
                    password_hash: new.password_hash.clone(),
                    image: None,
                    role: new.role,
                    created_at: now,
                    updated_at: now,
                };
                table.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    pub async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<UserRecord, DbError> {
        let email = update.email.as_ref().map(|e| e.trim().to_lowercase());
        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, UserRow>(&format!(
                    r#"
                    UPDATE users SET
                        name = COALESCE($1, name),
                        email = COALESCE($2, email),
                        image = COALESCE($3, image),
                        updated_at = now()
                    WHERE id = $4
                    RETURNING {}
                    "#,
                    USER_COLUMNS
                ))
                .bind(&update.name)
                .bind(&email)
                .bind(&update.image)
                .bind(id)
                .fetch_optional(pool.as_ref())
                .await
                .map_err(|e| conflict_on_violation(e, DUPLICATE_EMAIL))?
                .ok_or(DbError::NotFound)?;
                UserRecord::try_from(row)
            }
            Store::Memory(mem) => {
                let mut table = mem.users.write().await;
                if let Some(email) = &email {
                    if table.values().any(|u| u.id != id && &u.email == email) {
                        return Err(DbError::Conflict(DUPLICATE_EMAIL.to_string()));
                    }
                }
                let user = table.get_mut(&id).ok_or(DbError::NotFound)?;
                if let Some(name) = &update.name {
                    user.name = name.clone();
                }
                if let Some(email) = email {
                    user.email = email;
                }
                if let Some(image) = &update.image {
                    user.image = Some(image.clone());
                }
                user.updated_at = Utc::now();
                Ok(user.clone())
            }
        }
    }

    pub async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), DbError> {
        match self {
            Store::Postgres(pool) => {
                let result = sqlx::query(
                    "UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2",
                )
                .bind(password_hash)
                .bind(id)
                .execute(pool.as_ref())
                .await?;
                if result.rows_affected() == 0 {
                    return Err(DbError::NotFound);
                }
                Ok(())
            }
            Store::Memory(mem) => {
                let mut table = mem.users.write().await;
                let user = table.get_mut(&id).ok_or(DbError::NotFound)?;
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    pub async fn count_admins(&self) -> Result<i64, DbError> {
        match self {
            Store::Postgres(pool) => {
                let (count,): (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
                        .fetch_one(pool.as_ref())
                        .await?;
                Ok(count)
            }
            Store::Memory(mem) => Ok(mem
                .users
                .read()
                .await
                .values()
                .filter(|u| u.role == Role::Admin)
                .count() as i64),
        }
    }
}
