// End-to-end venue flow over an on-disk SQLite database

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use playzone::reports::venue_offset;
use playzone::{
    daily_report, profit_and_loss, render_invoice, seed_defaults, CarStatus, ExpenseCategory,
    ExpenseDraft, OrderItem, PaymentMethod, SqliteStore, Venue,
};
use std::path::PathBuf;

struct TempDb(PathBuf);

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("playzone-{}.db", uuid::Uuid::new_v4()));
        TempDb(path)
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.0.display(), suffix));
        }
    }
}

#[test]
fn test_full_day_at_the_venue() {
    let db = TempDb::new();
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap();

    let mut store = SqliteStore::open(&db.0).unwrap();
    seed_defaults(&mut store).unwrap();
    let mut venue = Venue::load(store).unwrap();
    assert_eq!(venue.cars().len(), 25);
    assert_eq!(venue.menu().len(), 7);

    let racing = venue
        .start_session("Track 1", &["R1".to_string(), "R2".to_string()], t0)
        .unwrap();
    let digging = venue
        .start_session("Construction A", &["C1".to_string()], t0 + Duration::minutes(5))
        .unwrap();
    venue
        .add_order(
            &racing.id,
            vec![
                OrderItem { menu_item_id: 2, quantity: 2 },
                OrderItem { menu_item_id: 6, quantity: 1 },
            ],
        )
        .unwrap();
    drop(venue);

    // Active sessions survive a restart
    let mut venue = Venue::load(SqliteStore::open(&db.0).unwrap()).unwrap();
    assert_eq!(venue.active_sessions().len(), 2);
    assert_eq!(venue.available_zones().len(), 4);
    assert_eq!(venue.car("R2").unwrap().status, CarStatus::InUse);
    assert_eq!(venue.session(&racing.id).unwrap().order.len(), 2);

    let bill = venue.running_bill(&racing.id, t0 + Duration::seconds(1000)).unwrap();
    assert_eq!(bill.chargeable_minutes, 2);
    assert_eq!(bill.order_cost, 59_000);

    let first = venue
        .checkout(&racing.id, PaymentMethod::Cash, t0 + Duration::minutes(20))
        .unwrap();
    assert_eq!(first.play_cost, 5_000);
    assert_eq!(first.total_cost, 64_000);

    let second = venue
        .checkout(&digging.id, PaymentMethod::BankTransfer, t0 + Duration::minutes(65))
        .unwrap();
    assert_eq!(second.play_cost, 45_000);

    venue
        .save_expense(
            None,
            ExpenseDraft {
                name: "Batteries".to_string(),
                amount: 30_000,
                date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                category: ExpenseCategory::CarMaintenance,
            },
        )
        .unwrap();
    drop(venue);

    let venue = Venue::load(SqliteStore::open(&db.0).unwrap()).unwrap();
    assert!(venue.active_sessions().is_empty());
    assert_eq!(venue.ready_cars().len(), 25);
    assert_eq!(venue.transactions().len(), 2);

    let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let report = daily_report(venue.transactions(), day, venue_offset(7));
    assert_eq!(report.total_revenue, 109_000);
    assert_eq!(report.play_revenue, 50_000);
    assert_eq!(report.cafe_revenue, 59_000);

    let pnl = profit_and_loss(venue.transactions(), venue.expenses(), day, day, venue_offset(7));
    assert_eq!(pnl.profit, 79_000);

    let invoice = render_invoice("Playzone & Cafe", &venue.transactions()[1], venue_offset(7));
    assert!(invoice.contains("Milk coffee"));
    assert!(invoice.contains("64.000 ₫"));

    let history = venue.store().events_for_entity("session", &racing.id).unwrap();
    let kinds: Vec<&str> = history.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(kinds, vec!["session_completed", "order_updated", "session_started"]);
}
