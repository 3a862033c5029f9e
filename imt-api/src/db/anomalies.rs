//! Anomaly repository
//!
//! Durable storage and retrieval of anomaly records: CRUD with typed
//! partial updates, paginated listing, filtered queries, and the
//! transactional bulk insert used by the import pipeline.

use chrono::{NaiveDate, Utc};
use imt_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{QueryBuilder, SqlitePool};

use crate::pagination::{paginate, PAGE_SIZE};

/// Status applied when a record is created without one
pub const DEFAULT_STATUS: &str = "open";
/// Action plan status applied when a record is created without one
pub const DEFAULT_ACTION_PLAN_STATUS: &str = "draft";
/// Rows per INSERT statement during bulk import
pub const INSERT_BATCH_SIZE: usize = 500;

/// One recorded equipment fault
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Anomaly {
    pub id: i64,
    pub unit: String,
    pub equipment_id: String,
    pub system_name: String,
    pub description: String,
    pub equipment_description: String,
    pub owning_section: String,
    pub integrity_score: i64,
    pub availability_score: i64,
    pub process_safety_score: i64,
    pub criticality_score: i64,
    pub priority_level: Option<String>,
    pub status: String,
    pub action_plan_description: Option<String>,
    pub action_plan_steps: Option<Json<serde_json::Value>>,
    pub action_plan_duration: i64,
    pub action_plan_resources: Option<Json<serde_json::Value>>,
    pub action_plan_status: String,
    pub notes: Option<String>,
    pub detection_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,
    pub maintenance_date: Option<NaiveDate>,
    pub maintenance_flag: bool,
    pub maintenance_duration: i64,
    pub maintenance_window_id: Option<i64>,
    pub attachment_key: Option<String>,
}

/// Construction payload for a new anomaly. `id` is always system-assigned;
/// missing workflow fields get their defaults at insert.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnomalyDraft {
    pub unit: Option<String>,
    pub equipment_id: Option<String>,
    pub system_name: Option<String>,
    pub description: Option<String>,
    pub equipment_description: Option<String>,
    pub owning_section: Option<String>,
    pub integrity_score: Option<i64>,
    pub availability_score: Option<i64>,
    pub process_safety_score: Option<i64>,
    pub criticality_score: Option<i64>,
    pub priority_level: Option<String>,
    pub status: Option<String>,
    pub action_plan_description: Option<String>,
    pub action_plan_steps: Option<serde_json::Value>,
    pub action_plan_duration: Option<i64>,
    pub action_plan_resources: Option<serde_json::Value>,
    pub action_plan_status: Option<String>,
    pub notes: Option<String>,
    pub detection_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,
    pub maintenance_date: Option<NaiveDate>,
    pub maintenance_flag: Option<bool>,
    pub maintenance_duration: Option<i64>,
    pub maintenance_window_id: Option<i64>,
    pub attachment_key: Option<String>,
}

/// Field-level partial update. Unknown keys are rejected at
/// deserialization; `id` and `detection_date` are deliberately absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnomalyPatch {
    pub unit: Option<String>,
    pub equipment_id: Option<String>,
    pub system_name: Option<String>,
    pub description: Option<String>,
    pub equipment_description: Option<String>,
    pub owning_section: Option<String>,
    pub integrity_score: Option<i64>,
    pub availability_score: Option<i64>,
    pub process_safety_score: Option<i64>,
    pub criticality_score: Option<i64>,
    pub priority_level: Option<String>,
    pub status: Option<String>,
    pub action_plan_description: Option<String>,
    pub action_plan_steps: Option<serde_json::Value>,
    pub action_plan_duration: Option<i64>,
    pub action_plan_resources: Option<serde_json::Value>,
    pub action_plan_status: Option<String>,
    pub notes: Option<String>,
    pub maintenance_date: Option<NaiveDate>,
    pub maintenance_flag: Option<bool>,
    pub maintenance_duration: Option<i64>,
    pub maintenance_window_id: Option<i64>,
    pub attachment_key: Option<String>,
}

/// One page of anomalies with listing totals
#[derive(Debug)]
pub struct AnomalyPage {
    pub anomalies: Vec<Anomaly>,
    pub total_pages: i64,
    pub total_count: i64,
}

const REQUIRED_CREATE_FIELDS: &[&str] = &[
    "unit",
    "equipment_id",
    "system_name",
    "description",
    "equipment_description",
    "owning_section",
];

const INSERT_COLUMNS: &str = "unit, equipment_id, system_name, description, equipment_description, \
     owning_section, integrity_score, availability_score, process_safety_score, criticality_score, \
     priority_level, status, action_plan_description, action_plan_steps, action_plan_duration, \
     action_plan_resources, action_plan_status, notes, detection_date, last_update_date, \
     maintenance_date, maintenance_flag, maintenance_duration, maintenance_window_id, attachment_key";

/// Create one anomaly after validating the required descriptive fields
pub async fn create(pool: &SqlitePool, draft: &AnomalyDraft) -> Result<Anomaly> {
    let provided = [
        &draft.unit,
        &draft.equipment_id,
        &draft.system_name,
        &draft.description,
        &draft.equipment_description,
        &draft.owning_section,
    ];
    for (value, name) in provided.iter().zip(REQUIRED_CREATE_FIELDS) {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            return Err(Error::InvalidInput(format!(
                "Missing required field: {}",
                name
            )));
        }
    }

    let mut created = bulk_insert(pool, std::slice::from_ref(draft)).await?;
    Ok(created.remove(0))
}

/// Load one anomaly by id
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Anomaly> {
    sqlx::query_as::<_, Anomaly>("SELECT * FROM anomalies WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Anomaly {} not found", id)))
}

/// Apply a partial update. Only fields present in the patch change;
/// `last_update_date` is refreshed on every successful update.
pub async fn update(pool: &SqlitePool, id: i64, patch: &AnomalyPatch) -> Result<Anomaly> {
    let today = Utc::now().date_naive();

    let result = sqlx::query(
        r#"
        UPDATE anomalies SET
            unit = COALESCE(?, unit),
            equipment_id = COALESCE(?, equipment_id),
            system_name = COALESCE(?, system_name),
            description = COALESCE(?, description),
            equipment_description = COALESCE(?, equipment_description),
            owning_section = COALESCE(?, owning_section),
            integrity_score = COALESCE(?, integrity_score),
            availability_score = COALESCE(?, availability_score),
            process_safety_score = COALESCE(?, process_safety_score),
            criticality_score = COALESCE(?, criticality_score),
            priority_level = COALESCE(?, priority_level),
            status = COALESCE(?, status),
            action_plan_description = COALESCE(?, action_plan_description),
            action_plan_steps = COALESCE(?, action_plan_steps),
            action_plan_duration = COALESCE(?, action_plan_duration),
            action_plan_resources = COALESCE(?, action_plan_resources),
            action_plan_status = COALESCE(?, action_plan_status),
            notes = COALESCE(?, notes),
            maintenance_date = COALESCE(?, maintenance_date),
            maintenance_flag = COALESCE(?, maintenance_flag),
            maintenance_duration = COALESCE(?, maintenance_duration),
            maintenance_window_id = COALESCE(?, maintenance_window_id),
            attachment_key = COALESCE(?, attachment_key),
            last_update_date = ?
        WHERE id = ?
        "#,
    )
    .bind(&patch.unit)
    .bind(&patch.equipment_id)
    .bind(&patch.system_name)
    .bind(&patch.description)
    .bind(&patch.equipment_description)
    .bind(&patch.owning_section)
    .bind(patch.integrity_score)
    .bind(patch.availability_score)
    .bind(patch.process_safety_score)
    .bind(patch.criticality_score)
    .bind(&patch.priority_level)
    .bind(&patch.status)
    .bind(&patch.action_plan_description)
    .bind(patch.action_plan_steps.clone().map(Json))
    .bind(patch.action_plan_duration)
    .bind(patch.action_plan_resources.clone().map(Json))
    .bind(&patch.action_plan_status)
    .bind(&patch.notes)
    .bind(patch.maintenance_date)
    .bind(patch.maintenance_flag)
    .bind(patch.maintenance_duration)
    .bind(patch.maintenance_window_id)
    .bind(&patch.attachment_key)
    .bind(today)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Anomaly {} not found", id)));
    }

    get(pool, id).await
}

/// Delete one anomaly by id. No cascade: maintenance windows referenced by
/// the record are untouched.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM anomalies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Anomaly {} not found", id)));
    }

    Ok(())
}

/// Load every anomaly (no ordering guarantee)
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Anomaly>> {
    Ok(sqlx::query_as::<_, Anomaly>("SELECT * FROM anomalies")
        .fetch_all(pool)
        .await?)
}

/// Load one 20-row page (1-based). Pages past the end are empty; page
/// numbers below 1 are invalid input.
pub async fn list_page(pool: &SqlitePool, page_number: i64) -> Result<AnomalyPage> {
    if page_number < 1 {
        return Err(Error::InvalidInput(
            "Page number must be greater than 0".to_string(),
        ));
    }

    let total_count = count(pool).await?;
    let page = paginate(total_count, page_number);

    let anomalies =
        sqlx::query_as::<_, Anomaly>("SELECT * FROM anomalies ORDER BY id LIMIT ? OFFSET ?")
            .bind(PAGE_SIZE)
            .bind(page.offset)
            .fetch_all(pool)
            .await?;

    Ok(AnomalyPage {
        anomalies,
        total_pages: page.total_pages,
        total_count,
    })
}

/// Total number of anomalies
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM anomalies")
        .fetch_one(pool)
        .await?)
}

/// Anomalies with the given status
pub async fn filter_by_status(pool: &SqlitePool, status: &str) -> Result<Vec<Anomaly>> {
    Ok(
        sqlx::query_as::<_, Anomaly>("SELECT * FROM anomalies WHERE status = ?")
            .bind(status)
            .fetch_all(pool)
            .await?,
    )
}

/// Anomalies whose criticality score is at or above the threshold
pub async fn filter_by_min_criticality(pool: &SqlitePool, threshold: i64) -> Result<Vec<Anomaly>> {
    Ok(
        sqlx::query_as::<_, Anomaly>("SELECT * FROM anomalies WHERE criticality_score >= ?")
            .bind(threshold)
            .fetch_all(pool)
            .await?,
    )
}

/// Record the attachment object key for an existing anomaly
pub async fn set_attachment_key(pool: &SqlitePool, id: i64, key: &str) -> Result<()> {
    let result = sqlx::query("UPDATE anomalies SET attachment_key = ? WHERE id = ?")
        .bind(key)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Anomaly {} not found", id)));
    }

    Ok(())
}

/// Insert many drafts in one transaction, batched for statement size.
/// Any rejection rolls the whole set back; on success the created rows are
/// returned in id order.
pub async fn bulk_insert(pool: &SqlitePool, drafts: &[AnomalyDraft]) -> Result<Vec<Anomaly>> {
    if drafts.is_empty() {
        return Ok(Vec::new());
    }

    let today = Utc::now().date_naive();
    let mut tx = pool.begin().await?;
    let mut last_id = 0i64;

    for chunk in drafts.chunks(INSERT_BATCH_SIZE) {
        let mut builder =
            QueryBuilder::new(format!("INSERT INTO anomalies ({}) ", INSERT_COLUMNS));
        builder.push_values(chunk, |mut row, draft| {
            row.push_bind(draft.unit.clone().unwrap_or_default())
                .push_bind(draft.equipment_id.clone().unwrap_or_default())
                .push_bind(draft.system_name.clone().unwrap_or_default())
                .push_bind(draft.description.clone().unwrap_or_default())
                .push_bind(draft.equipment_description.clone().unwrap_or_default())
                .push_bind(draft.owning_section.clone().unwrap_or_default())
                .push_bind(draft.integrity_score.unwrap_or(0))
                .push_bind(draft.availability_score.unwrap_or(0))
                .push_bind(draft.process_safety_score.unwrap_or(0))
                .push_bind(draft.criticality_score.unwrap_or(0))
                .push_bind(draft.priority_level.clone())
                .push_bind(
                    draft
                        .status
                        .clone()
                        .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
                )
                .push_bind(draft.action_plan_description.clone())
                .push_bind(draft.action_plan_steps.clone().map(Json))
                .push_bind(draft.action_plan_duration.unwrap_or(0))
                .push_bind(draft.action_plan_resources.clone().map(Json))
                .push_bind(
                    draft
                        .action_plan_status
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ACTION_PLAN_STATUS.to_string()),
                )
                .push_bind(draft.notes.clone())
                .push_bind(draft.detection_date.unwrap_or(today))
                .push_bind(draft.last_update_date.unwrap_or(today))
                .push_bind(draft.maintenance_date)
                .push_bind(draft.maintenance_flag.unwrap_or(false))
                .push_bind(draft.maintenance_duration.unwrap_or(0))
                .push_bind(draft.maintenance_window_id)
                .push_bind(draft.attachment_key.clone());
        });

        let result = builder.build().execute(&mut *tx).await?;
        last_id = result.last_insert_rowid();
    }

    tx.commit().await?;

    // Rowids are allocated sequentially within the transaction, so the
    // created block is the contiguous range ending at the last insert.
    let first_id = last_id - drafts.len() as i64 + 1;
    Ok(
        sqlx::query_as::<_, Anomaly>("SELECT * FROM anomalies WHERE id BETWEEN ? AND ? ORDER BY id")
            .bind(first_id)
            .bind(last_id)
            .fetch_all(pool)
            .await?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashSet;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        imt_common::db::create_schema(&pool).await.expect("schema");
        pool
    }

    fn draft(unit: &str) -> AnomalyDraft {
        AnomalyDraft {
            unit: Some(unit.to_string()),
            equipment_id: Some("EQ-100".to_string()),
            system_name: Some("Cooling".to_string()),
            description: Some("Bearing vibration above threshold".to_string()),
            equipment_description: Some("Primary coolant pump".to_string()),
            owning_section: Some("Rotating machines".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_roundtrips() {
        let pool = test_pool().await;

        let created = create(&pool, &draft("U1")).await.expect("create");
        assert!(created.id > 0);
        assert_eq!(created.status, "open");
        assert_eq!(created.action_plan_status, "draft");
        assert_eq!(created.integrity_score, 0);
        assert!(created.detection_date.is_some());

        let loaded = get(&pool, created.id).await.expect("get");
        assert_eq!(loaded.unit, "U1");
        assert_eq!(loaded.equipment_id, "EQ-100");
        assert_eq!(loaded.description, "Bearing vibration above threshold");
    }

    #[tokio::test]
    async fn test_create_rejects_missing_required_field() {
        let pool = test_pool().await;

        let mut incomplete = draft("U1");
        incomplete.owning_section = None;
        let err = create(&pool, &incomplete).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);

        let mut blank = draft("U1");
        blank.description = Some("   ".to_string());
        let err = create(&pool, &blank).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_update_changes_only_given_fields() {
        let pool = test_pool().await;
        let created = create(&pool, &draft("U1")).await.expect("create");

        let patch = AnomalyPatch {
            status: Some("closed".to_string()),
            ..Default::default()
        };
        let updated = update(&pool, created.id, &patch).await.expect("update");

        assert_eq!(updated.status, "closed");
        assert_eq!(updated.unit, created.unit);
        assert_eq!(updated.equipment_id, created.equipment_id);
        assert_eq!(updated.detection_date, created.detection_date);
        assert!(updated.last_update_date.is_some());
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let pool = test_pool().await;
        let patch = AnomalyPatch {
            status: Some("closed".to_string()),
            ..Default::default()
        };
        let err = update(&pool, 9999, &patch).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let pool = test_pool().await;
        let created = create(&pool, &draft("U1")).await.expect("create");

        delete(&pool, created.id).await.expect("delete");
        let err = get(&pool, created.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);

        let err = delete(&pool, created.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_filters() {
        let pool = test_pool().await;

        let mut open = draft("U1");
        open.criticality_score = Some(12);
        create(&pool, &open).await.expect("create open");

        let mut closed = draft("U2");
        closed.status = Some("closed".to_string());
        closed.criticality_score = Some(4);
        create(&pool, &closed).await.expect("create closed");

        let open_records = filter_by_status(&pool, "open").await.expect("filter");
        assert_eq!(open_records.len(), 1);
        assert_eq!(open_records[0].unit, "U1");

        let critical = filter_by_min_criticality(&pool, 10).await.expect("filter");
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].criticality_score, 12);

        // Threshold is inclusive
        let at_threshold = filter_by_min_criticality(&pool, 12).await.expect("filter");
        assert_eq!(at_threshold.len(), 1);
    }

    #[tokio::test]
    async fn test_list_page_slices_and_totals() {
        let pool = test_pool().await;

        let drafts: Vec<AnomalyDraft> = (0..45).map(|i| draft(&format!("U{}", i))).collect();
        bulk_insert(&pool, &drafts).await.expect("bulk insert");

        let first = list_page(&pool, 1).await.expect("page 1");
        assert_eq!(first.anomalies.len(), 20);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.total_count, 45);

        let last = list_page(&pool, 3).await.expect("page 3");
        assert_eq!(last.anomalies.len(), 5);

        let past_end = list_page(&pool, 4).await.expect("page 4");
        assert!(past_end.anomalies.is_empty());

        // Concatenating all pages covers the full set exactly once
        let mut seen = HashSet::new();
        for page in 1..=3 {
            for record in list_page(&pool, page).await.expect("page").anomalies {
                assert!(seen.insert(record.id), "duplicate id {}", record.id);
            }
        }
        assert_eq!(seen.len(), 45);
    }

    #[tokio::test]
    async fn test_list_page_rejects_zero_and_negative() {
        let pool = test_pool().await;

        for bad in [0, -1, -20] {
            let err = list_page(&pool, bad).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
        }
    }

    #[tokio::test]
    async fn test_bulk_insert_returns_created_rows_in_order() {
        let pool = test_pool().await;

        let drafts: Vec<AnomalyDraft> = (0..3)
            .map(|i| AnomalyDraft {
                unit: Some(format!("U{}", i)),
                criticality_score: Some(i),
                ..Default::default()
            })
            .collect();
        let created = bulk_insert(&pool, &drafts).await.expect("bulk insert");

        assert_eq!(created.len(), 3);
        assert!(created.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(created[0].unit, "U0");
        assert_eq!(created[2].criticality_score, 2);
        // Defaults are applied to sparse drafts too
        assert_eq!(created[0].status, "open");
        assert_eq!(created[0].action_plan_status, "draft");
        assert_eq!(created[0].equipment_id, "");
    }

    #[tokio::test]
    async fn test_bulk_insert_empty_is_noop() {
        let pool = test_pool().await;
        let created = bulk_insert(&pool, &[]).await.expect("empty bulk");
        assert!(created.is_empty());
        assert_eq!(count(&pool).await.expect("count"), 0);
    }
}
