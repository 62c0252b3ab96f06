use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of feedmill appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A feed source. Read-only during a pipeline run; mutated only by
/// external administration.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub feed_url: String,
    pub is_active: bool,
    pub fetch_enabled: bool,
}

/// A category definition with its include/exclude filter and running
/// counter.
///
/// Filter syntax: pipe-separated include patterns, `~`, pipe-separated
/// exclude patterns. Either half may be absent. The counter belongs to
/// the recount pass and never decreases.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub filter: String,
    pub counter: i64,
}

/// A stored rewrite rule. Rules for a source apply in storage order
/// (`sort_order`, then id) — order is significant.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Rule {
    pub id: i64,
    pub source_name: String,
    pub from_field: String,
    pub to_field: String,
    pub op: String,
    pub pattern: String,
    pub value: String,
    pub int_value: i64,
    pub sort_order: i64,
}

/// Insert payload for a rule (administration and test seeding).
#[derive(Debug, Clone, Default)]
pub struct NewRule {
    pub source_name: String,
    pub from_field: String,
    pub to_field: String,
    pub op: String,
    pub pattern: String,
    pub value: String,
    pub int_value: i64,
    pub sort_order: i64,
}

/// A fully normalized item ready for insertion.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub link: String,
    pub title: String,
    pub full_title: String,
    pub description: Option<String>,
    pub full_description: Option<String>,
    /// Publish time as a unix timestamp.
    pub date: i64,
    pub category: Option<String>,
    pub creator: Option<String>,
    pub custom1: Option<String>,
    pub custom2: Option<String>,
    pub url_slug: String,
}

/// A persisted item row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredItem {
    pub id: i64,
    pub source_id: i64,
    pub link: String,
    pub title: String,
    pub full_title: String,
    pub description: Option<String>,
    pub full_description: Option<String>,
    pub date: i64,
    pub category: Option<String>,
    pub creator: Option<String>,
    pub custom1: Option<String>,
    pub custom2: Option<String>,
    pub url_slug: String,
    pub counted: bool,
    pub fetched_at: i64,
}

/// The slice of an item the recount pass needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UncountedItem {
    pub id: i64,
    pub category: Option<String>,
}
