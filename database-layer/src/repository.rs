// analytics_events persistence
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::connection::DatabasePool;
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::EventRow;

/// Columns bound per row by [`AnalyticsEventRepository::insert_batch`].
const COLUMNS_PER_ROW: usize = 11;

/// Postgres rejects statements with more than `u16::MAX` bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

/// Rows per `INSERT` statement.
pub const INSERT_CHUNK_ROWS: usize = 1000;

const _: () = assert!(INSERT_CHUNK_ROWS * COLUMNS_PER_ROW <= MAX_BIND_PARAMS);

/// Repository for the `analytics_events` table
#[derive(Clone)]
pub struct AnalyticsEventRepository {
    pool: DatabasePool,
}

impl AnalyticsEventRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Insert `rows` in a single transaction.
    ///
    /// Large batches are split into multi-row statements of at most
    /// [`INSERT_CHUNK_ROWS`] rows, all committed together, so either every
    /// row lands or none does.
    pub async fn insert_batch(&self, rows: &[EventRow]) -> DatabaseResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to begin transaction: {}", e)))?;

        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            let mut query = insert_statement(chunk);
            inserted += query.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to commit batch: {}", e)))?;

        debug!(rows = inserted, "Analytics batch committed");
        Ok(inserted)
    }

    /// Delete rows created before `cutoff`, returning how many were removed.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM analytics_events WHERE created_at < $1")
            .bind(cutoff)
            .execute(self.pool.pool())
            .await?;

        info!(deleted = result.rows_affected(), %cutoff, "Old analytics events deleted");
        Ok(result.rows_affected())
    }

    /// Total persisted rows.
    pub async fn count(&self) -> DatabaseResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM analytics_events")
            .fetch_one(self.pool.pool())
            .await?;
        Ok(count.0)
    }
}

fn insert_statement(rows: &[EventRow]) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "INSERT INTO analytics_events (id, user_id, session_id, event_type, entity_type, entity_id, \
         event_metadata, ip_address, user_agent, referrer, created_at) ",
    );

    query.push_values(rows, |mut b, row| {
        b.push_bind(row.id)
            .push_bind(row.user_id)
            .push_bind(row.session_id.clone())
            .push_bind(row.event_type.clone())
            .push_bind(row.entity_type.clone())
            .push_bind(row.entity_id.clone())
            .push_bind(Json(row.metadata.clone()))
            .push_bind(row.ip_address.clone())
            .push_bind(row.user_agent.clone())
            .push_bind(row.referrer.clone())
            .push_bind(row.created_at);
    });

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn row() -> EventRow {
        EventRow {
            id: Uuid::new_v4(),
            user_id: None,
            session_id: Some("s-1".to_string()),
            event_type: "prompt_viewed".to_string(),
            entity_type: "prompt".to_string(),
            entity_id: Some("42".to_string()),
            metadata: serde_json::Map::new(),
            ip_address: None,
            user_agent: None,
            referrer: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_statement_binds_every_column() {
        let rows = vec![row(), row(), row()];
        let query = insert_statement(&rows);
        let sql = query.sql();

        assert!(sql.starts_with("INSERT INTO analytics_events"));
        assert!(sql.contains("$33"));
        assert!(!sql.contains("$34"));
    }

    #[test]
    fn chunk_stays_under_bind_limit() {
        let rows: Vec<EventRow> = (0..INSERT_CHUNK_ROWS).map(|_| row()).collect();
        let query = insert_statement(&rows);
        assert!(query.sql().contains(&format!("${}", INSERT_CHUNK_ROWS * COLUMNS_PER_ROW)));
    }
}
