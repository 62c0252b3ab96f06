use anyhow::Result;

use super::schema::Database;
use super::types::Category;

impl Database {
    // ========================================================================
    // Category Operations
    // ========================================================================

    /// All category definitions, snapshotted once per run.
    pub async fn categories(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, filter, counter FROM categories ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Create or update a category by name, returning its ID.
    pub async fn insert_category(&self, name: &str, filter: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO categories (name, filter)
            VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET filter = excluded.filter
            RETURNING id
        "#,
        )
        .bind(name)
        .bind(filter)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Add `delta` to a category's counter. Counters only ever grow; the
    /// recount pass never passes a negative delta.
    pub async fn increment_category_counter(&self, category_id: i64, delta: i64) -> Result<()> {
        sqlx::query("UPDATE categories SET counter = counter + ? WHERE id = ?")
            .bind(delta)
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Current counter value for one category.
    pub async fn category_counter(&self, category_id: i64) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT counter FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
