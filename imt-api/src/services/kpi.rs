//! Named-metric queries over the anomaly set

use imt_common::{Error, Result};
use sqlx::SqlitePool;

use crate::db::anomalies::{self, Anomaly};

/// Criticality score at which an anomaly counts as high criticality
pub const HIGH_CRITICALITY_THRESHOLD: i64 = 10;

/// Resolve a KPI key to its record set. Recognized keys: `open`,
/// `High_Criticality`.
pub async fn query(pool: &SqlitePool, metric: &str) -> Result<Vec<Anomaly>> {
    match metric {
        "open" => anomalies::filter_by_status(pool, "open").await,
        "High_Criticality" => {
            anomalies::filter_by_min_criticality(pool, HIGH_CRITICALITY_THRESHOLD).await
        }
        _ => Err(Error::InvalidInput("Invalid KPI type".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::anomalies::AnomalyDraft;
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

    async fn seed(pool: &SqlitePool, status: &str, criticality: i64) {
        let draft = AnomalyDraft {
            unit: Some("U1".to_string()),
            status: Some(status.to_string()),
            criticality_score: Some(criticality),
            ..Default::default()
        };
        anomalies::bulk_insert(pool, &[draft]).await.expect("seed");
    }

    #[tokio::test]
    async fn test_open_kpi_matches_status_subset() {
        let pool = test_pool().await;
        seed(&pool, "open", 2).await;
        seed(&pool, "closed", 15).await;
        seed(&pool, "open", 11).await;

        let records = query(&pool, "open").await.expect("kpi");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|a| a.status == "open"));
    }

    #[tokio::test]
    async fn test_high_criticality_threshold_is_inclusive() {
        let pool = test_pool().await;
        seed(&pool, "open", 9).await;
        seed(&pool, "open", 10).await;
        seed(&pool, "closed", 14).await;

        let records = query(&pool, "High_Criticality").await.expect("kpi");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|a| a.criticality_score >= 10));
    }

    #[tokio::test]
    async fn test_unknown_kpi_is_invalid() {
        let pool = test_pool().await;
        let err = query(&pool, "bogus").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    }
}
