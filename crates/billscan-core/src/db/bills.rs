//! Bill operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::stats::{add_to_stat, check_amount};
use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Bill, LineItemRecord, NewBill};

const BILL_COLUMNS: &str = "id, vendor_name, items, total, date, image_key, content_hash, \
                            discount, created_at";

impl Database {
    /// Insert a bill under a freshly generated UUID and return the key
    pub fn create_bill(&self, bill: &NewBill) -> Result<String> {
        let conn = self.conn()?;
        insert_bill(&conn, bill)
    }

    /// Insert a bill and add its discount to the named aggregate in one
    /// transaction
    ///
    /// Returns the new bill's key and the aggregate's new value (`None` when
    /// the bill carries no discount). If either write fails neither is kept.
    pub fn record_bill(&self, bill: &NewBill, stat_name: &str) -> Result<(String, Option<f64>)> {
        if let Some(amount) = bill.discount {
            check_amount(stat_name, amount)?;
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let id = insert_bill(&tx, bill)?;
        let total = match bill.discount {
            Some(amount) => Some(add_to_stat(&tx, stat_name, amount)?),
            None => None,
        };

        tx.commit()?;
        Ok((id, total))
    }

    /// Get bill by ID
    pub fn get_bill(&self, id: &str) -> Result<Option<Bill>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM bills WHERE id = ?", BILL_COLUMNS))?;

        let bill = stmt
            .query_row(params![id], |row| Self::row_to_bill(row))
            .optional()?;

        Ok(bill)
    }

    /// List bills, newest first
    pub fn list_bills(&self, limit: i64, offset: i64) -> Result<Vec<Bill>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bills ORDER BY date DESC, created_at DESC LIMIT ? OFFSET ?",
            BILL_COLUMNS
        ))?;

        let bills = stmt
            .query_map(params![limit, offset], |row| Self::row_to_bill(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bills)
    }

    /// Get bills sharing an image hash (same photo uploaded more than once)
    pub fn get_bills_by_hash(&self, content_hash: &str) -> Result<Vec<Bill>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bills WHERE content_hash = ? ORDER BY date DESC",
            BILL_COLUMNS
        ))?;

        let bills = stmt
            .query_map(params![content_hash], |row| Self::row_to_bill(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(bills)
    }

    /// Count stored bills
    pub fn count_bills(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM bills", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete a bill; returns false if it did not exist
    ///
    /// The running aggregate is not adjusted.
    pub fn delete_bill(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM bills WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    /// Helper to convert a row to Bill
    fn row_to_bill(row: &rusqlite::Row) -> rusqlite::Result<Bill> {
        let items_json: String = row.get(2)?;
        let date_str: String = row.get(4)?;
        let created_at_str: String = row.get(8)?;

        let items: Vec<LineItemRecord> = serde_json::from_str(&items_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Bill {
            id: row.get(0)?,
            vendor_name: row.get(1)?,
            items,
            total: row.get(3)?,
            date: DateTime::parse_from_rfc3339(&date_str)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| parse_datetime(&date_str)),
            image_key: row.get(5)?,
            content_hash: row.get(6)?,
            discount: row.get(7)?,
            created_at: parse_datetime(&created_at_str),
        })
    }
}

fn insert_bill(conn: &Connection, bill: &NewBill) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let items_json = serde_json::to_string(&bill.items)?;

    conn.execute(
        "INSERT INTO bills (id, vendor_name, items, total, date, image_key, content_hash, discount)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            bill.vendor_name,
            items_json,
            bill.total,
            bill.date.to_rfc3339(),
            bill.image_key,
            bill.content_hash,
            bill.discount,
        ],
    )?;

    Ok(id)
}
