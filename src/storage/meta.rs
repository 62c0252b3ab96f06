use anyhow::Result;

use super::schema::Database;

const LAST_RUN_KEY: &str = "last_run_at";

impl Database {
    // ========================================================================
    // Run Bookkeeping
    // ========================================================================

    /// Unix timestamp of the last executed ingestion run, if any.
    pub async fn last_run_at(&self) -> Result<Option<i64>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ?")
            .bind(LAST_RUN_KEY)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|(v,)| v.parse().ok()))
    }

    /// Record the start time of an ingestion run.
    pub async fn set_last_run_at(&self, timestamp: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO meta (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        )
        .bind(LAST_RUN_KEY)
        .bind(timestamp.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
