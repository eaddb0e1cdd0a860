use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::users::repo_types::{NewUser, User, UserRow};

const EMAIL_CONSTRAINT: &str = "users_email_key";
const USERNAME_CONSTRAINT: &str = "users_username_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0:?}")]
    Conflict(UniqueField),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(UniqueField::Email) => {
                AppError::Conflict("A user with this email already exists.".into())
            }
            StoreError::Conflict(UniqueField::Username) => {
                AppError::Conflict("Username is already taken".into())
            }
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

/// Persistence for user records. Implementations enforce email and username
/// uniqueness themselves and report violations as [`StoreError::Conflict`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_reset_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    /// Writes back every mutable field of `user`.
    async fn update(&self, user: &User) -> Result<(), StoreError>;
}

const USER_COLUMNS: &str = r#"
    id, email, username, password_hash, dob, gender,
    location_city, location_country, longitude, latitude,
    searching_for, found_at, prelaunch,
    email_verified, email_verification_code, reset_password_code, created_at
"#;

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        binds: &[&str],
    ) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        for b in binds {
            query = query.bind(*b);
        }
        let row = query
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("select user where {clause}"))?;
        Ok(row.map(User::try_from).transpose()?)
    }
}

fn map_unique_violation(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(EMAIL_CONSTRAINT) => return StoreError::Conflict(UniqueField::Email),
                Some(USERNAME_CONSTRAINT) => return StoreError::Conflict(UniqueField::Username),
                _ => {}
            }
        }
    }
    StoreError::Backend(anyhow::Error::new(e).context("write user"))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("select user by id")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one_where("email = $1", &[email]).await
    }

    async fn find_by_reset_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<Option<User>, StoreError> {
        self.fetch_one_where("email = $1 AND reset_password_code = $2", &[email, code])
            .await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.db)
                .await
                .context("check username")?;
        Ok(exists)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (
                email, username, password_hash, dob, gender,
                location_city, location_country, longitude, latitude,
                searching_for, found_at, prelaunch, email_verification_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.dob)
            .bind(user.gender.as_str())
            .bind(&user.location.city)
            .bind(&user.location.country)
            .bind(user.location.coordinates[0])
            .bind(user.location.coordinates[1])
            .bind(user.searching_for.as_str())
            .bind(&user.found_at)
            .bind(user.prelaunch)
            .bind(&user.email_verification_code)
            .fetch_one(&self.db)
            .await
            .map_err(map_unique_violation)?;
        Ok(User::try_from(row)?)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2,
                   email_verified = $3,
                   email_verification_code = $4,
                   reset_password_code = $5,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.password_hash)
        .bind(user.email_verified)
        .bind(&user.email_verification_code)
        .bind(&user.reset_password_code)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIGRATION: &str = include_str!("../../migrations/20240601000000_create_users.sql");

    #[test]
    fn migration_names_the_constraints_violations_are_mapped_from() {
        assert!(MIGRATION.contains(&format!("CONSTRAINT {EMAIL_CONSTRAINT} UNIQUE (email)")));
        assert!(MIGRATION.contains(&format!("CONSTRAINT {USERNAME_CONSTRAINT} UNIQUE (username)")));
    }

    #[test]
    fn conflicts_become_409_with_field_message() {
        let email = AppError::from(StoreError::Conflict(UniqueField::Email));
        assert_eq!(email.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(email.to_string(), "A user with this email already exists.");

        let username = AppError::from(StoreError::Conflict(UniqueField::Username));
        assert_eq!(username.to_string(), "Username is already taken");
    }
}
