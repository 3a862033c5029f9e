//! Database initialization
//!
//! Creates the connection pool and the schema on first run. Table creation
//! is idempotent so startup is safe against existing databases.

use crate::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent). Public so tests can apply the schema to
/// in-memory pools.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_anomalies_table(pool).await?;
    create_maintenance_windows_table(pool).await?;
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    Ok(())
}

async fn create_anomalies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS anomalies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            unit TEXT NOT NULL,
            equipment_id TEXT NOT NULL DEFAULT '',
            system_name TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL,
            equipment_description TEXT NOT NULL,
            owning_section TEXT NOT NULL DEFAULT '',
            integrity_score INTEGER NOT NULL DEFAULT 0,
            availability_score INTEGER NOT NULL DEFAULT 0,
            process_safety_score INTEGER NOT NULL DEFAULT 0,
            criticality_score INTEGER NOT NULL DEFAULT 0,
            priority_level TEXT,
            status TEXT NOT NULL DEFAULT 'open',
            action_plan_description TEXT,
            action_plan_steps TEXT,
            action_plan_duration INTEGER NOT NULL DEFAULT 0,
            action_plan_resources TEXT,
            action_plan_status TEXT NOT NULL DEFAULT 'draft',
            notes TEXT,
            detection_date TEXT,
            last_update_date TEXT,
            maintenance_date TEXT,
            maintenance_flag INTEGER NOT NULL DEFAULT 0,
            maintenance_duration INTEGER NOT NULL DEFAULT 0,
            maintenance_window_id INTEGER,
            attachment_key TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_maintenance_windows_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS maintenance_windows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            window_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'planned',
            duration INTEGER NOT NULL DEFAULT 0,
            date_range INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            start_date TEXT,
            end_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            full_name TEXT,
            role TEXT,
            department TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            last_login TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
