use anyhow::Result;

use super::schema::Database;
use super::types::{NewRule, Rule};

impl Database {
    // ========================================================================
    // Rule Operations
    // ========================================================================

    /// All rules in application order. Order is significant: later rules
    /// observe the writes of earlier ones.
    pub async fn rules(&self) -> Result<Vec<Rule>> {
        let rules = sqlx::query_as::<_, Rule>(
            r#"
            SELECT id, source_name, from_field, to_field, op, pattern, value,
                   int_value, sort_order
            FROM rules
            ORDER BY sort_order, id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    /// Append a rule, returning its ID.
    pub async fn insert_rule(&self, rule: &NewRule) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO rules (source_name, from_field, to_field, op, pattern,
                               value, int_value, sort_order)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&rule.source_name)
        .bind(&rule.from_field)
        .bind(&rule.to_field)
        .bind(&rule.op)
        .bind(&rule.pattern)
        .bind(&rule.value)
        .bind(rule.int_value)
        .bind(rule.sort_order)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }
}
