//! Maintenance window storage
//!
//! Windows are referenced from anomalies by bare integer id; deleting a
//! window never touches the anomalies pointing at it.

use chrono::NaiveDate;
use imt_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Status applied when a window is created without one
pub const DEFAULT_WINDOW_STATUS: &str = "planned";

/// A scheduled block of maintenance work
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MaintenanceWindow {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub window_type: String,
    pub status: String,
    pub duration: i64,
    pub date_range: i64,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Construction payload for a new window
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaintenanceWindowDraft {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub window_type: Option<String>,
    pub status: Option<String>,
    pub duration: Option<i64>,
    pub date_range: Option<i64>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Field-level partial update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaintenanceWindowPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub window_type: Option<String>,
    pub status: Option<String>,
    pub duration: Option<i64>,
    pub date_range: Option<i64>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Counts surfaced by the maintenance window KPI endpoint
#[derive(Debug, Serialize)]
pub struct WindowKpis {
    pub kpi: String,
    pub count: i64,
}

pub async fn create(pool: &SqlitePool, draft: &MaintenanceWindowDraft) -> Result<MaintenanceWindow> {
    let required = [
        (&draft.name, "name"),
        (&draft.window_type, "type"),
        (&draft.description, "description"),
    ];
    for (value, name) in required {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            return Err(Error::InvalidInput(format!(
                "Missing required field: {}",
                name
            )));
        }
    }
    if draft.start_date.is_none() || draft.end_date.is_none() {
        return Err(Error::InvalidInput(
            "Missing required field: start_date/end_date".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO maintenance_windows (
            name, window_type, status, duration, date_range, description, start_date, end_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&draft.name)
    .bind(&draft.window_type)
    .bind(
        draft
            .status
            .clone()
            .unwrap_or_else(|| DEFAULT_WINDOW_STATUS.to_string()),
    )
    .bind(draft.duration.unwrap_or(0))
    .bind(draft.date_range.unwrap_or(0))
    .bind(&draft.description)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .execute(pool)
    .await?;

    get(pool, result.last_insert_rowid()).await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<MaintenanceWindow> {
    sqlx::query_as::<_, MaintenanceWindow>("SELECT * FROM maintenance_windows WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Maintenance window {} not found", id)))
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<MaintenanceWindow>> {
    Ok(
        sqlx::query_as::<_, MaintenanceWindow>("SELECT * FROM maintenance_windows")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn update(
    pool: &SqlitePool,
    id: i64,
    patch: &MaintenanceWindowPatch,
) -> Result<MaintenanceWindow> {
    let result = sqlx::query(
        r#"
        UPDATE maintenance_windows SET
            name = COALESCE(?, name),
            window_type = COALESCE(?, window_type),
            status = COALESCE(?, status),
            duration = COALESCE(?, duration),
            date_range = COALESCE(?, date_range),
            description = COALESCE(?, description),
            start_date = COALESCE(?, start_date),
            end_date = COALESCE(?, end_date)
        WHERE id = ?
        "#,
    )
    .bind(&patch.name)
    .bind(&patch.window_type)
    .bind(&patch.status)
    .bind(patch.duration)
    .bind(patch.date_range)
    .bind(&patch.description)
    .bind(patch.start_date)
    .bind(patch.end_date)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "Maintenance window {} not found",
            id
        )));
    }

    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM maintenance_windows WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "Maintenance window {} not found",
            id
        )));
    }

    Ok(())
}

/// Status-count KPIs: `total`, `planned`, `completed`
pub async fn kpis(pool: &SqlitePool, kpi: &str) -> Result<WindowKpis> {
    let count: i64 = match kpi {
        "total" => {
            sqlx::query_scalar("SELECT COUNT(*) FROM maintenance_windows")
                .fetch_one(pool)
                .await?
        }
        "planned" | "completed" => {
            sqlx::query_scalar("SELECT COUNT(*) FROM maintenance_windows WHERE status = ?")
                .bind(kpi)
                .fetch_one(pool)
                .await?
        }
        other => {
            return Err(Error::InvalidInput(format!("Invalid KPI type: {}", other)));
        }
    };

    Ok(WindowKpis {
        kpi: kpi.to_string(),
        count,
    })
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

    fn window_draft(name: &str) -> MaintenanceWindowDraft {
        MaintenanceWindowDraft {
            name: Some(name.to_string()),
            window_type: Some("shutdown".to_string()),
            description: Some("Annual turnaround".to_string()),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 14),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let pool = test_pool().await;

        let created = create(&pool, &window_draft("TA-2025")).await.expect("create");
        assert_eq!(created.status, "planned");
        assert_eq!(created.duration, 0);

        let patch = MaintenanceWindowPatch {
            status: Some("completed".to_string()),
            ..Default::default()
        };
        let updated = update(&pool, created.id, &patch).await.expect("update");
        assert_eq!(updated.status, "completed");
        assert_eq!(updated.name, "TA-2025");
    }

    #[tokio::test]
    async fn test_create_requires_dates() {
        let pool = test_pool().await;

        let mut incomplete = window_draft("TA-2025");
        incomplete.end_date = None;
        let err = create(&pool, &incomplete).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_kpis_count_by_status() {
        let pool = test_pool().await;

        create(&pool, &window_draft("TA-1")).await.expect("create");
        let mut done = window_draft("TA-2");
        done.status = Some("completed".to_string());
        create(&pool, &done).await.expect("create");

        assert_eq!(kpis(&pool, "total").await.expect("total").count, 2);
        assert_eq!(kpis(&pool, "planned").await.expect("planned").count, 1);
        assert_eq!(kpis(&pool, "completed").await.expect("completed").count, 1);

        let err = kpis(&pool, "bogus").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    }
}
