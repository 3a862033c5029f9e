//! User accounts and bearer sessions

use chrono::{Duration, Utc};
use imt_common::{auth, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// One user account. The password hash and salt never leave this module.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

/// Profile fields accepted on user update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
}

/// Total and active user counts
#[derive(Debug, Serialize)]
pub struct UserStatistics {
    pub total_users: i64,
    pub total_active_users: i64,
}

/// Create a user with an already-hashed password. Duplicate emails are
/// invalid input.
pub async fn create(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    full_name: Option<&str>,
    role: Option<&str>,
    department: Option<&str>,
) -> Result<User> {
    if email.trim().is_empty() {
        return Err(Error::InvalidInput("Missing required field: email".to_string()));
    }
    if find_by_email(pool, email).await?.is_some() {
        return Err(Error::InvalidInput("Email already exists".to_string()));
    }

    let salt = auth::generate_salt();
    let hash = auth::hash_password(password, &salt);
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, password_salt, full_name, role, department, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(email)
    .bind(&hash)
    .bind(&salt)
    .bind(full_name)
    .bind(role)
    .bind(department)
    .bind(&now)
    .execute(pool)
    .await?;

    get(pool, result.last_insert_rowid()).await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?)
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<User>> {
    Ok(sqlx::query_as::<_, User>("SELECT * FROM users")
        .fetch_all(pool)
        .await?)
}

pub async fn update(pool: &SqlitePool, id: i64, patch: &UserPatch) -> Result<User> {
    if let Some(email) = &patch.email {
        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND id != ?")
            .bind(email)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        if taken.is_some() {
            return Err(Error::InvalidInput("Email already exists".to_string()));
        }
    }

    let result = sqlx::query(
        r#"
        UPDATE users SET
            email = COALESCE(?, email),
            full_name = COALESCE(?, full_name),
            role = COALESCE(?, role),
            department = COALESCE(?, department),
            is_active = COALESCE(?, is_active)
        WHERE id = ?
        "#,
    )
    .bind(&patch.email)
    .bind(&patch.full_name)
    .bind(&patch.role)
    .bind(&patch.department)
    .bind(patch.is_active)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {} not found", id)));
    }

    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {} not found", id)));
    }

    Ok(())
}

/// Flip the account's active flag and return the updated user
pub async fn toggle_active(pool: &SqlitePool, id: i64) -> Result<User> {
    let result = sqlx::query("UPDATE users SET is_active = NOT is_active WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {} not found", id)));
    }

    get(pool, id).await
}

pub async fn statistics(pool: &SqlitePool) -> Result<UserStatistics> {
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    let total_active_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = 1")
        .fetch_one(pool)
        .await?;

    Ok(UserStatistics {
        total_users,
        total_active_users,
    })
}

/// Verify credentials and issue a bearer token. Records the login time.
pub async fn login(pool: &SqlitePool, email: &str, password: &str, ttl_secs: i64) -> Result<(User, String)> {
    let user = find_by_email(pool, email)
        .await?
        .filter(|u| auth::verify_password(password, &u.password_salt, &u.password_hash))
        .ok_or_else(|| Error::InvalidInput("Invalid email or password".to_string()))?;

    let now = Utc::now();
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(user.id)
        .execute(pool)
        .await?;

    let token = auth::new_session_token();
    let expires_at = now + Duration::seconds(ttl_secs);
    sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&token)
        .bind(user.id)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(pool)
        .await?;

    let user = get(pool, user.id).await?;
    Ok((user, token))
}

/// Resolve a bearer token to its user, ignoring expired sessions
pub async fn session_user(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    Ok(sqlx::query_as::<_, User>(
        r#"
        SELECT users.* FROM users
        JOIN sessions ON sessions.user_id = users.id
        WHERE sessions.token = ? AND sessions.expires_at > ?
        "#,
    )
    .bind(token)
    .bind(Utc::now().to_rfc3339())
    .fetch_optional(pool)
    .await?)
}

/// Revoke a bearer token
pub async fn revoke_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        imt_common::db::create_schema(&pool).await.expect("schema");
        pool
    }

    #[tokio::test]
    async fn test_login_issues_token() {
        let pool = test_pool().await;
        create(&pool, "op@plant.example", "secret", Some("Op One"), Some("operator"), None)
            .await
            .expect("create");

        let (user, token) = login(&pool, "op@plant.example", "secret", 3600)
            .await
            .expect("login");
        assert!(user.last_login.is_some());

        let resolved = session_user(&pool, &token)
            .await
            .expect("lookup")
            .expect("session resolves");
        assert_eq!(resolved.email, "op@plant.example");

        revoke_session(&pool, &token).await.expect("revoke");
        assert!(session_user(&pool, &token).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let pool = test_pool().await;
        create(&pool, "op@plant.example", "secret", None, None, None)
            .await
            .expect("create");

        let err = login(&pool, "op@plant.example", "wrong", 3600).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_expired_session_does_not_resolve() {
        let pool = test_pool().await;
        create(&pool, "op@plant.example", "secret", None, None, None)
            .await
            .expect("create");

        let (_, token) = login(&pool, "op@plant.example", "secret", -1)
            .await
            .expect("login");
        assert!(session_user(&pool, &token).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let pool = test_pool().await;
        create(&pool, "op@plant.example", "secret", None, None, None)
            .await
            .expect("create");

        let err = create(&pool, "op@plant.example", "other", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_toggle_active() {
        let pool = test_pool().await;
        let user = create(&pool, "op@plant.example", "secret", None, None, None)
            .await
            .expect("create");
        assert!(user.is_active);

        let toggled = toggle_active(&pool, user.id).await.expect("toggle");
        assert!(!toggled.is_active);

        let stats = statistics(&pool).await.expect("stats");
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_active_users, 0);
    }
}
