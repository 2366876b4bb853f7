//! Bill commands (list, show, delete)

use anyhow::{bail, Result};
use billscan_core::db::Database;
use billscan_core::ObjectStore;

use super::truncate;

pub fn cmd_bills_list(db: &Database, limit: i64) -> Result<()> {
    let bills = db.list_bills(limit.max(1), 0)?;

    if bills.is_empty() {
        println!("No bills stored yet.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<36}  {:<10}  {:<28}  {:>12}  {:>5}",
        "ID", "Date", "Vendor", "Total", "Items"
    );
    println!("  {}", "─".repeat(99));
    for bill in &bills {
        println!(
            "  {:<36}  {:<10}  {:<28}  {:>12}  {:>5}",
            bill.id,
            bill.date.format("%Y-%m-%d"),
            truncate(&bill.vendor_name, 28),
            truncate(&bill.total, 12),
            bill.items.len()
        );
    }
    println!();
    println!("  Showing {} of {} bills", bills.len(), db.count_bills()?);

    Ok(())
}

pub fn cmd_bills_show(db: &Database, id: &str) -> Result<()> {
    let Some(bill) = db.get_bill(id)? else {
        bail!("Bill not found: {}", id);
    };

    println!();
    println!("🧾 {}", bill.vendor_name);
    println!("   ID: {}", bill.id);
    println!("   Date: {}", bill.date.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("   Total: {}", bill.total);
    if let Some(discount) = bill.discount {
        println!("   Discount: {:.2}", discount);
    }
    if let Some(key) = &bill.image_key {
        println!("   Image: {}", key);
    }

    if !bill.items.is_empty() {
        println!();
        println!("   {:<32}  {:>10}  {:>8}", "Item", "Price", "Qty");
        for item in &bill.items {
            println!(
                "   {:<32}  {:>10}  {:>8}",
                truncate(item.item.as_deref().unwrap_or("-"), 32),
                item.price.as_deref().unwrap_or("-"),
                item.quantity.as_deref().unwrap_or("-")
            );
        }
    }
    println!();

    Ok(())
}

pub async fn cmd_bills_delete(db: &Database, store: &dyn ObjectStore, id: &str) -> Result<()> {
    if !billscan_core::delete_bill_and_photo(db, store, id).await? {
        bail!("Bill not found: {}", id);
    }

    db.log_audit("cli", "delete", Some("bill"), Some(id), None)?;
    println!("🗑️  Deleted bill {}", id);
    Ok(())
}
