//! # User Repository
//!
//! Back-office logins with bcrypt password hashes.
//!
//! ## Login Check
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  authenticate("admin", "s3cret")                                       │
//! │       │                                                                 │
//! │       ├── user exists and is_active?        no → None                  │
//! │       ├── hash starts with $2a$/$2b$/$2y$?  no → None                  │
//! │       ├── bcrypt::verify                    no → None                  │
//! │       └── stamp last_login_at → Some(user)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hashing and verification run on the blocking thread pool.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use mostrador_core::validation::{validate_password, validate_username};
use mostrador_core::{CoreError, User, UserRole};

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// True when `stored` is a bcrypt hash and `password` matches it.
///
/// Anything that is not a bcrypt hash never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    if !BCRYPT_PREFIXES.iter().any(|p| stored.starts_with(p)) {
        return false;
    }
    bcrypt::verify(password, stored).unwrap_or(false)
}

async fn hash_password(password: String, cost: u32) -> DbResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?
        .map_err(|e| DbError::Internal(e.to_string()))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub role: UserRole,
    pub is_active: bool,
    #[serde(default)]
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    cost: u32,
}

impl UserRepository {
    pub fn new(pool: SqlitePool, cost: u32) -> Self {
        UserRepository { pool, cost }
    }

    async fn ensure_employee(&self, employee_id: Option<&str>) -> DbResult<()> {
        if let Some(id) = employee_id {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT id FROM employees WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
            if exists.is_none() {
                return Err(DbError::not_found("Employee", id));
            }
        }
        Ok(())
    }

    pub async fn create(&self, input: &NewUser) -> DbResult<User> {
        let username = input.username.trim();
        validate_username(username)?;
        validate_password(&input.password)?;

        if self.find_by_username(username).await?.is_some() {
            return Err(CoreError::duplicate("username", username).into());
        }
        self.ensure_employee(input.employee_id.as_deref()).await?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: hash_password(input.password.clone(), self.cost).await?,
            employee_id: input.employee_id.clone(),
            role: input.role,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, password_hash, employee_id, role, is_active,
                last_login_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.employee_id)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        info!(username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn update(&self, id: &str, input: &UserUpdate) -> DbResult<User> {
        self.ensure_employee(input.employee_id.as_deref()).await?;

        let result = sqlx::query(
            "UPDATE users SET role = ?2, is_active = ?3, employee_id = ?4, updated_at = ?5 WHERE id = ?1",
        )
        .bind(id)
        .bind(input.role)
        .bind(input.is_active)
        .bind(&input.employee_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        self.get(id).await
    }

    pub async fn change_password(&self, id: &str, new_password: &str) -> DbResult<()> {
        validate_password(new_password)?;
        let hash = hash_password(new_password.to_string(), self.cost).await?;

        let result =
            sqlx::query("UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(hash)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        info!(user_id = %id, "Password changed");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?1")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Checks credentials. `None` for unknown, inactive or mismatching users;
    /// the caller does not learn which.
    pub async fn authenticate(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let Some(mut user) = self.find_by_username(username).await? else {
            warn!(username = %username, "Login for unknown user");
            return Ok(None);
        };

        if !user.is_active {
            warn!(username = %username, "Login for inactive user");
            return Ok(None);
        }

        let stored = user.password_hash.clone();
        let candidate = password.to_string();
        let ok = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?;

        if !ok {
            warn!(username = %username, "Login with wrong password");
            return Ok(None);
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login_at = ?2 WHERE id = ?1")
            .bind(&user.id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        user.last_login_at = Some(now);

        debug!(username = %user.username, "Login succeeded");
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            password: "correcto-123".into(),
            role: UserRole::Cashier,
            employee_id: None,
        }
    }

    #[test]
    fn test_verify_password_requires_bcrypt_hash() {
        let hash = bcrypt::hash("secreto-1", 4).unwrap();
        assert!(verify_password("secreto-1", &hash));
        assert!(!verify_password("otro", &hash));

        // Plaintext or foreign hashes never match, even if equal
        assert!(!verify_password("secreto-1", "secreto-1"));
        assert!(!verify_password("x", "$argon2id$v=19$m=19456,t=2,p=1$abc"));
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();

        let user = repo.create(&new_user("rosa")).await.unwrap();
        assert!(user.password_hash.starts_with("$2"));

        let ok = repo.authenticate("rosa", "correcto-123").await.unwrap().unwrap();
        assert!(ok.last_login_at.is_some());
        assert!(repo.get(&user.id).await.unwrap().last_login_at.is_some());

        assert!(repo.authenticate("rosa", "incorrecto").await.unwrap().is_none());
        assert!(repo.authenticate("nadie", "correcto-123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_login() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        let user = repo.create(&new_user("rosa")).await.unwrap();

        repo.update(
            &user.id,
            &UserUpdate {
                role: UserRole::Cashier,
                is_active: false,
                employee_id: None,
            },
        )
        .await
        .unwrap();

        assert!(repo.authenticate("rosa", "correcto-123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_unique_and_password_change() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        let user = repo.create(&new_user("rosa")).await.unwrap();

        let err = repo.create(&new_user("ROSA")).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Duplicate { .. })));

        repo.change_password(&user.id, "nueva-clave-9").await.unwrap();
        assert!(repo.authenticate("rosa", "correcto-123").await.unwrap().is_none());
        assert!(repo.authenticate("rosa", "nueva-clave-9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_employee_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut input = new_user("rosa");
        input.employee_id = Some("missing".into());
        assert!(matches!(
            db.users().create(&input).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
