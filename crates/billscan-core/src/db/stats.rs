//! Running aggregate operations
//!
//! Aggregates are shared by every server instance pointed at the same
//! database, so they are only ever changed with a single upsert statement.

use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::Stat;

impl Database {
    /// Atomically add `amount` to the named aggregate, creating it at zero
    /// if missing, and return the new value
    pub fn increment_stat(&self, name: &str, amount: f64) -> Result<f64> {
        check_amount(name, amount)?;
        let conn = self.conn()?;
        add_to_stat(&conn, name, amount)
    }

    /// Get a named aggregate
    pub fn get_stat(&self, name: &str) -> Result<Option<Stat>> {
        let conn = self.conn()?;
        let stat = conn
            .query_row(
                "SELECT name, count, updated_at FROM stats WHERE name = ?",
                params![name],
                |row| Self::row_to_stat(row),
            )
            .optional()?;
        Ok(stat)
    }

    /// List all aggregates by name
    pub fn list_stats(&self) -> Result<Vec<Stat>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name, count, updated_at FROM stats ORDER BY name")?;
        let stats = stmt
            .query_map([], |row| Self::row_to_stat(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    fn row_to_stat(row: &rusqlite::Row) -> rusqlite::Result<Stat> {
        let updated_at_str: String = row.get(2)?;
        Ok(Stat {
            name: row.get(0)?,
            count: row.get(1)?,
            updated_at: parse_datetime(&updated_at_str),
        })
    }
}

pub(super) fn check_amount(name: &str, amount: f64) -> Result<()> {
    if !amount.is_finite() {
        return Err(Error::InvalidData(format!(
            "Cannot add non-finite amount {} to {}",
            amount, name
        )));
    }
    Ok(())
}

/// Single-statement upsert; works on a plain connection or inside a transaction
pub(super) fn add_to_stat(conn: &Connection, name: &str, amount: f64) -> Result<f64> {
    let count = conn.query_row(
        r#"
        INSERT INTO stats (name, count, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
        ON CONFLICT(name) DO UPDATE SET
            count = count + excluded.count,
            updated_at = CURRENT_TIMESTAMP
        RETURNING count
        "#,
        params![name, amount],
        |row| row.get(0),
    )?;

    Ok(count)
}
