use anyhow::Result;

use super::schema::Database;
use super::types::Source;

impl Database {
    // ========================================================================
    // Source Operations
    // ========================================================================

    /// Sources eligible for the current ingestion run: active,
    /// fetch-enabled, in stable name order.
    pub async fn sources_to_fetch(&self) -> Result<Vec<Source>> {
        let sources = sqlx::query_as::<_, Source>(
            r#"
            SELECT id, name, feed_url, is_active, fetch_enabled
            FROM sources
            WHERE is_active = 1 AND fetch_enabled = 1
            ORDER BY name
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sources)
    }

    /// Create or update a source by name, returning its ID.
    ///
    /// Administration entry point: the pipeline itself never mutates
    /// sources.
    pub async fn insert_source(&self, name: &str, feed_url: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO sources (name, feed_url)
            VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET feed_url = excluded.feed_url
            RETURNING id
        "#,
        )
        .bind(name)
        .bind(feed_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Toggle fetching for a source without deactivating it.
    pub async fn set_fetch_enabled(&self, source_id: i64, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE sources SET fetch_enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
