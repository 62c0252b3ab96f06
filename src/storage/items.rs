use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{NewItem, StoredItem, UncountedItem};

/// Chunk size for IN-list updates, well under SQLite's parameter limit.
const MARK_BATCH_SIZE: usize = 500;

impl Database {
    // ========================================================================
    // Item Operations
    // ========================================================================

    /// Dedup probe: is there already an item with this exact link for
    /// this source? The steady-state outcome on a re-fetch is `true` for
    /// every item.
    pub async fn item_exists(&self, source_id: i64, link: &str) -> Result<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM items WHERE source_id = ? AND link = ?)",
        )
        .bind(source_id)
        .bind(link)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0 != 0)
    }

    /// Insert a new item, returning its positive row ID.
    ///
    /// Callers are expected to have run the dedup probe first; the
    /// UNIQUE(source_id, link) constraint is the backstop.
    pub async fn insert_item(&self, source_id: i64, item: &NewItem, fetched_at: i64) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO items (source_id, link, title, full_title, description,
                               full_description, date, category, creator,
                               custom1, custom2, url_slug, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(source_id)
        .bind(&item.link)
        .bind(&item.title)
        .bind(&item.full_title)
        .bind(&item.description)
        .bind(&item.full_description)
        .bind(item.date)
        .bind(&item.category)
        .bind(&item.creator)
        .bind(&item.custom1)
        .bind(&item.custom2)
        .bind(&item.url_slug)
        .bind(fetched_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Items the recount pass has not yet folded into category counters.
    pub async fn uncounted_items(&self) -> Result<Vec<UncountedItem>> {
        let items = sqlx::query_as::<_, UncountedItem>(
            "SELECT id, category FROM items WHERE counted = 0 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Mark a set of items as counted, in one transaction.
    ///
    /// The recount pass calls this exactly once per run, after every
    /// counter increment has succeeded, so no item is ever counted twice.
    pub async fn mark_items_counted(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in ids.chunks(MARK_BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("UPDATE items SET counted = 1 WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// All items for a source in insertion order.
    pub async fn items_for_source(&self, source_id: i64) -> Result<Vec<StoredItem>> {
        let items = sqlx::query_as::<_, StoredItem>(
            r#"
            SELECT id, source_id, link, title, full_title, description,
                   full_description, date, category, creator, custom1, custom2,
                   url_slug, counted, fetched_at
            FROM items
            WHERE source_id = ?
            ORDER BY id
        "#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NewItem};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_item(link: &str) -> NewItem {
        NewItem {
            link: link.to_string(),
            title: "Title".to_string(),
            full_title: "Title".to_string(),
            description: None,
            full_description: None,
            date: 1_700_000_000,
            category: None,
            creator: None,
            custom1: None,
            custom2: None,
            url_slug: "title".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_exists() {
        let db = test_db().await;
        let source_id = db.insert_source("S", "https://s.test/rss").await.unwrap();

        assert!(!db.item_exists(source_id, "http://e.com/1").await.unwrap());

        let id = db
            .insert_item(source_id, &test_item("http://e.com/1"), 1_700_000_100)
            .await
            .unwrap();
        assert!(id > 0);
        assert!(db.item_exists(source_id, "http://e.com/1").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_link_different_source_is_not_duplicate() {
        let db = test_db().await;
        let s1 = db.insert_source("A", "https://a.test/rss").await.unwrap();
        let s2 = db.insert_source("B", "https://b.test/rss").await.unwrap();

        db.insert_item(s1, &test_item("http://e.com/1"), 0).await.unwrap();

        assert!(db.item_exists(s1, "http://e.com/1").await.unwrap());
        assert!(!db.item_exists(s2, "http://e.com/1").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected_by_constraint() {
        let db = test_db().await;
        let source_id = db.insert_source("S", "https://s.test/rss").await.unwrap();

        db.insert_item(source_id, &test_item("http://e.com/1"), 0)
            .await
            .unwrap();
        let result = db.insert_item(source_id, &test_item("http://e.com/1"), 0).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mark_items_counted() {
        let db = test_db().await;
        let source_id = db.insert_source("S", "https://s.test/rss").await.unwrap();

        let a = db.insert_item(source_id, &test_item("http://e.com/1"), 0).await.unwrap();
        let b = db.insert_item(source_id, &test_item("http://e.com/2"), 0).await.unwrap();

        assert_eq!(db.uncounted_items().await.unwrap().len(), 2);

        db.mark_items_counted(&[a, b]).await.unwrap();
        assert!(db.uncounted_items().await.unwrap().is_empty());

        // Idempotent on an empty set
        db.mark_items_counted(&[]).await.unwrap();
    }
}
