//! Database tests

use super::*;
use crate::models::*;

fn sample_bill(vendor: &str) -> NewBill {
    NewBill {
        vendor_name: vendor.to_string(),
        items: vec![
            LineItemRecord {
                item: Some("Burger".to_string()),
                price: Some("10.00".to_string()),
                quantity: Some("2".to_string()),
            },
            LineItemRecord {
                price: Some("3.50".to_string()),
                ..Default::default()
            },
        ],
        total: "45.00".to_string(),
        date: Utc::now(),
        image_key: Some("abc.jpg".to_string()),
        content_hash: Some("deadbeef".to_string()),
        discount: Some(4.5),
    }
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert_eq!(db.count_bills().unwrap(), 0);
    assert!(db.list_stats().unwrap().is_empty());
}

#[test]
fn test_schema_exists() {
    let db = Database::in_memory().unwrap();
    let conn = db.conn().unwrap();

    let result: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('bills') WHERE name IN ('id', 'vendor_name', 'items', 'total', 'date', 'image_key', 'content_hash', 'discount', 'created_at')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(result, 9, "bills table should have 9 expected columns");

    let result: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('stats') WHERE name IN ('name', 'count', 'updated_at')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(result, 3, "stats table should have 3 expected columns");
}

#[test]
fn test_bill_roundtrip_keeps_partial_items() {
    let db = Database::in_memory().unwrap();

    let id = db.create_bill(&sample_bill("Joe's Diner")).unwrap();
    assert_eq!(id.len(), 36, "bill keys are hyphenated UUIDs");

    let bill = db.get_bill(&id).unwrap().unwrap();
    assert_eq!(bill.vendor_name, "Joe's Diner");
    assert_eq!(bill.total, "45.00");
    assert_eq!(bill.items.len(), 2);
    assert_eq!(bill.items[0].item.as_deref(), Some("Burger"));
    assert!(bill.items[1].item.is_none());
    assert!(bill.items[1].quantity.is_none());
    assert_eq!(bill.image_key.as_deref(), Some("abc.jpg"));
    assert_eq!(bill.discount, Some(4.5));
}

#[test]
fn test_same_vendor_gets_distinct_keys() {
    let db = Database::in_memory().unwrap();

    let a = db.create_bill(&sample_bill("Same")).unwrap();
    let b = db.create_bill(&sample_bill("Same")).unwrap();
    assert_ne!(a, b);
    assert_eq!(db.count_bills().unwrap(), 2);
}

#[test]
fn test_get_missing_bill() {
    let db = Database::in_memory().unwrap();
    assert!(db.get_bill("does-not-exist").unwrap().is_none());
}

#[test]
fn test_list_bills_newest_first_with_paging() {
    let db = Database::in_memory().unwrap();

    for (i, vendor) in ["Oldest", "Middle", "Newest"].iter().enumerate() {
        let mut bill = sample_bill(vendor);
        bill.date = Utc::now() - chrono::Duration::days(10 - i as i64);
        db.create_bill(&bill).unwrap();
    }

    let all = db.list_bills(10, 0).unwrap();
    let vendors: Vec<_> = all.iter().map(|b| b.vendor_name.as_str()).collect();
    assert_eq!(vendors, vec!["Newest", "Middle", "Oldest"]);

    let page = db.list_bills(1, 1).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].vendor_name, "Middle");
}

#[test]
fn test_bills_by_hash() {
    let db = Database::in_memory().unwrap();
    db.create_bill(&sample_bill("One")).unwrap();
    db.create_bill(&sample_bill("Two")).unwrap();

    let mut other = sample_bill("Three");
    other.content_hash = Some("cafebabe".to_string());
    db.create_bill(&other).unwrap();

    assert_eq!(db.get_bills_by_hash("deadbeef").unwrap().len(), 2);
    assert_eq!(db.get_bills_by_hash("cafebabe").unwrap().len(), 1);
    assert!(db.get_bills_by_hash("nope").unwrap().is_empty());
}

#[test]
fn test_delete_bill() {
    let db = Database::in_memory().unwrap();
    let id = db.create_bill(&sample_bill("Gone")).unwrap();

    assert!(db.delete_bill(&id).unwrap());
    assert!(db.get_bill(&id).unwrap().is_none());
    assert!(!db.delete_bill(&id).unwrap());
}

#[test]
fn test_increment_stat_creates_and_accumulates() {
    let db = Database::in_memory().unwrap();

    assert!(db.get_stat(DISCOUNT_STAT).unwrap().is_none());

    assert_eq!(db.increment_stat(DISCOUNT_STAT, 4.5).unwrap(), 4.5);
    assert_eq!(db.increment_stat(DISCOUNT_STAT, 0.5).unwrap(), 5.0);

    let stat = db.get_stat(DISCOUNT_STAT).unwrap().unwrap();
    assert_eq!(stat.name, "stats");
    assert_eq!(stat.count, 5.0);
}

#[test]
fn test_increment_stat_is_per_name() {
    let db = Database::in_memory().unwrap();
    db.increment_stat("a", 1.0).unwrap();
    db.increment_stat("b", 2.0).unwrap();
    db.increment_stat("a", 1.0).unwrap();

    let stats = db.list_stats().unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].name, "a");
    assert_eq!(stats[0].count, 2.0);
    assert_eq!(stats[1].count, 2.0);
}

#[test]
fn test_increment_stat_rejects_non_finite() {
    let db = Database::in_memory().unwrap();
    assert!(matches!(
        db.increment_stat(DISCOUNT_STAT, f64::NAN),
        Err(Error::InvalidData(_))
    ));
    assert!(db.get_stat(DISCOUNT_STAT).unwrap().is_none());
}

#[test]
fn test_record_bill_updates_aggregate() {
    let db = Database::in_memory().unwrap();

    let (id, total) = db.record_bill(&sample_bill("Joe's Diner"), DISCOUNT_STAT).unwrap();
    assert_eq!(total, Some(4.5));
    assert!(db.get_bill(&id).unwrap().is_some());

    let (_, total) = db.record_bill(&sample_bill("Joe's Diner"), DISCOUNT_STAT).unwrap();
    assert_eq!(total, Some(9.0));
    assert_eq!(db.count_bills().unwrap(), 2);
}

#[test]
fn test_record_bill_without_discount_skips_aggregate() {
    let db = Database::in_memory().unwrap();
    let bill = NewBill {
        discount: None,
        ..sample_bill("Cash Only")
    };

    let (_, total) = db.record_bill(&bill, DISCOUNT_STAT).unwrap();
    assert_eq!(total, None);
    assert_eq!(db.count_bills().unwrap(), 1);
    assert!(db.get_stat(DISCOUNT_STAT).unwrap().is_none());
}

#[test]
fn test_record_bill_rolls_back_when_aggregate_fails() {
    let db = Database::in_memory().unwrap();
    db.conn()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER stats_read_only BEFORE INSERT ON stats
             BEGIN SELECT RAISE(ABORT, 'stats are read-only'); END;",
        )
        .unwrap();

    let result = db.record_bill(&sample_bill("Joe's Diner"), DISCOUNT_STAT);
    assert!(matches!(result, Err(Error::Database(_))));
    assert_eq!(db.count_bills().unwrap(), 0);
    assert!(db.get_stat(DISCOUNT_STAT).unwrap().is_none());
}

#[test]
fn test_record_bill_rejects_non_finite_before_writing() {
    let db = Database::in_memory().unwrap();
    let bill = NewBill {
        discount: Some(f64::INFINITY),
        ..sample_bill("Overflow Mart")
    };

    assert!(matches!(
        db.record_bill(&bill, DISCOUNT_STAT),
        Err(Error::InvalidData(_))
    ));
    assert_eq!(db.count_bills().unwrap(), 0);
}

#[test]
fn test_concurrent_increments_are_not_lost() {
    let db = Database::in_memory().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db = db.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    // Retry on SQLITE_BUSY; the statement itself is atomic
                    while db.increment_stat("hits", 1.0).is_err() {
                        std::thread::yield_now();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.get_stat("hits").unwrap().unwrap().count, 100.0);
}

#[test]
fn test_audit_log() {
    let db = Database::in_memory().unwrap();

    db.log_audit("api-key", "upload", Some("bill"), Some("abc"), Some("items=2"))
        .unwrap();
    db.log_audit("local-dev", "view", Some("stats"), None, None)
        .unwrap();

    let entries = db.list_audit_log(10).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "view");
    assert_eq!(entries[1].entity_id.as_deref(), Some("abc"));
}

#[test]
fn test_derive_key_is_stable() {
    let a = derive_key("passphrase").unwrap();
    let b = derive_key("passphrase").unwrap();
    let c = derive_key("other").unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}
