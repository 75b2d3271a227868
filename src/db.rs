use crate::billing::BillingConfig;
use crate::entities::{Car, CarStatus, Expense, ExpenseDraft, MenuItem, MenuItemDraft};
use crate::session::{ActiveSession, CompletedTransaction};
use crate::store::{Store, StoreError, StoreResult};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Audit trail entry: every session lifecycle change is an event
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Row counts per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub cars: i64,
    pub menu_items: i64,
    pub expenses: i64,
    pub completed_transactions: i64,
    pub active_sessions: i64,
    pub events: i64,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure => StoreError::Unavailable(e.to_string()),
                ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::AuthorizationForStatementDenied => {
                    StoreError::Unauthorized(e.to_string())
                }
                ErrorCode::ConstraintViolation => StoreError::Conflict(e.to_string()),
                _ => StoreError::classify(&e.to_string()),
            },
            _ => StoreError::classify(&e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(format!("serialization failed: {}", e))
    }
}

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS cars (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            purchase_price INTEGER NOT NULL,
            purchase_date TEXT NOT NULL,
            lifespan_months INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS menu_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            price INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            amount INTEGER NOT NULL,
            date TEXT NOT NULL,
            category TEXT NOT NULL
        )",
        [],
    )?;

    // Costs and priced lines are frozen at checkout; rows are never updated
    conn.execute(
        "CREATE TABLE IF NOT EXISTS completed_transactions (
            id TEXT PRIMARY KEY NOT NULL,
            zone TEXT NOT NULL,
            car_ids TEXT NOT NULL,
            started_at INTEGER NOT NULL,
            ended_at INTEGER NOT NULL,
            order_items TEXT NOT NULL,
            priced_lines TEXT NOT NULL,
            elapsed_seconds INTEGER NOT NULL,
            chargeable_minutes INTEGER NOT NULL,
            play_cost INTEGER NOT NULL,
            order_cost INTEGER NOT NULL,
            total_cost INTEGER NOT NULL,
            payment_method TEXT NOT NULL,
            completed_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS billing_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            config TEXT NOT NULL
        )",
        [],
    )?;

    // UNIQUE(zone): one active session per zone
    conn.execute(
        "CREATE TABLE IF NOT EXISTS active_sessions (
            id TEXT PRIMARY KEY NOT NULL,
            zone TEXT UNIQUE NOT NULL,
            car_ids TEXT NOT NULL,
            started_at INTEGER NOT NULL,
            order_items TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_completed ON completed_transactions(completed_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> StoreResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

// ============================================================================
// Row mapping helpers
// ============================================================================

fn conversion_error(
    idx: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn parse_column<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn millis_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| conversion_error(idx, format!("timestamp out of range: {}", millis)))
}

fn car_from_row(row: &Row) -> rusqlite::Result<Car> {
    Ok(Car {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: parse_column(row, 2)?,
        status: parse_column(row, 3)?,
        purchase_price: row.get(4)?,
        purchase_date: date_column(row, 5)?,
        lifespan_months: row.get(6)?,
    })
}

fn expense_from_row(row: &Row) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        name: row.get(1)?,
        amount: row.get(2)?,
        date: date_column(row, 3)?,
        category: parse_column(row, 4)?,
    })
}

fn session_from_row(row: &Row) -> rusqlite::Result<ActiveSession> {
    Ok(ActiveSession {
        id: row.get(0)?,
        zone: row.get(1)?,
        car_ids: json_column(row, 2)?,
        started_at: millis_column(row, 3)?,
        order: json_column(row, 4)?,
    })
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<CompletedTransaction> {
    Ok(CompletedTransaction {
        id: row.get(0)?,
        zone: row.get(1)?,
        car_ids: json_column(row, 2)?,
        started_at: millis_column(row, 3)?,
        ended_at: millis_column(row, 4)?,
        order: json_column(row, 5)?,
        lines: json_column(row, 6)?,
        elapsed_seconds: row.get(7)?,
        chargeable_minutes: row.get(8)?,
        play_cost: row.get(9)?,
        order_cost: row.get(10)?,
        total_cost: row.get(11)?,
        payment_method: parse_column(row, 12)?,
        completed_at: millis_column(row, 13)?,
    })
}

fn expect_one(affected: usize, entity: &'static str, id: impl ToString) -> StoreResult<()> {
    if affected == 0 {
        Err(StoreError::not_found(entity, id))
    } else {
        Ok(())
    }
}

// ============================================================================
// SQLite store
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
    actor: String,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn,
            actor: "operator".to_string(),
        })
    }

    /// Name recorded on audit events
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get events for a specific entity, newest first
    pub fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> StoreResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY id DESC",
        )?;

        let events = stmt
            .query_map(params![entity_type, entity_id], |row| {
                let timestamp_str: String = row.get(1)?;
                Ok(Event {
                    event_id: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                        .map_err(|e| conversion_error(1, e))?
                        .with_timezone(&Utc),
                    event_type: row.get(2)?,
                    entity_type: row.get(3)?,
                    entity_id: row.get(4)?,
                    data: json_column(row, 5)?,
                    actor: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    pub fn table_counts(&self) -> StoreResult<TableCounts> {
        let count = |table: &str| -> StoreResult<i64> {
            let sql = format!("SELECT COUNT(*) FROM {}", table);
            Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
        };

        Ok(TableCounts {
            cars: count("cars")?,
            menu_items: count("menu_items")?,
            expenses: count("expenses")?,
            completed_transactions: count("completed_transactions")?,
            active_sessions: count("active_sessions")?,
            events: count("events")?,
        })
    }
}

impl Store for SqliteStore {
    fn fetch_cars(&self) -> StoreResult<Vec<Car>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, status, purchase_price, purchase_date, lifespan_months
             FROM cars
             ORDER BY id ASC",
        )?;
        let cars = stmt
            .query_map([], car_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cars)
    }

    fn upsert_car(&mut self, car: &Car) -> StoreResult<Car> {
        self.conn.execute(
            "INSERT INTO cars (id, name, kind, status, purchase_price, purchase_date, lifespan_months)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                status = excluded.status,
                purchase_price = excluded.purchase_price,
                purchase_date = excluded.purchase_date,
                lifespan_months = excluded.lifespan_months",
            params![
                car.id,
                car.name,
                car.kind.as_str(),
                car.status.as_str(),
                car.purchase_price,
                car.purchase_date.format(DATE_FORMAT).to_string(),
                car.lifespan_months,
            ],
        )?;
        Ok(car.clone())
    }

    fn set_car_status(&mut self, car_id: &str, status: CarStatus) -> StoreResult<()> {
        let affected = self.conn.execute(
            "UPDATE cars SET status = ?1 WHERE id = ?2",
            params![status.as_str(), car_id],
        )?;
        expect_one(affected, "car", car_id)
    }

    fn delete_car(&mut self, car_id: &str) -> StoreResult<()> {
        let affected = self
            .conn
            .execute("DELETE FROM cars WHERE id = ?1", params![car_id])?;
        expect_one(affected, "car", car_id)
    }

    fn fetch_menu_items(&self) -> StoreResult<Vec<MenuItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, price FROM menu_items ORDER BY id ASC")?;
        let items = stmt
            .query_map([], |row| {
                Ok(MenuItem {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn insert_menu_item(&mut self, draft: &MenuItemDraft) -> StoreResult<MenuItem> {
        self.conn.execute(
            "INSERT INTO menu_items (name, price) VALUES (?1, ?2)",
            params![draft.name, draft.price],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(draft.clone().with_id(id))
    }

    fn update_menu_item(&mut self, item: &MenuItem) -> StoreResult<MenuItem> {
        let affected = self.conn.execute(
            "UPDATE menu_items SET name = ?1, price = ?2 WHERE id = ?3",
            params![item.name, item.price, item.id],
        )?;
        expect_one(affected, "menu item", item.id)?;
        Ok(item.clone())
    }

    fn delete_menu_item(&mut self, id: i64) -> StoreResult<()> {
        let affected = self
            .conn
            .execute("DELETE FROM menu_items WHERE id = ?1", params![id])?;
        expect_one(affected, "menu item", id)
    }

    fn fetch_expenses(&self) -> StoreResult<Vec<Expense>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, amount, date, category
             FROM expenses
             ORDER BY date DESC, name ASC",
        )?;
        let expenses = stmt
            .query_map([], expense_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(expenses)
    }

    fn insert_expense(&mut self, draft: &ExpenseDraft) -> StoreResult<Expense> {
        let expense = draft.clone().with_id(uuid::Uuid::new_v4().to_string());
        self.conn.execute(
            "INSERT INTO expenses (id, name, amount, date, category) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                expense.id,
                expense.name,
                expense.amount,
                expense.date.format(DATE_FORMAT).to_string(),
                expense.category.as_str(),
            ],
        )?;
        Ok(expense)
    }

    fn update_expense(&mut self, expense: &Expense) -> StoreResult<Expense> {
        let affected = self.conn.execute(
            "UPDATE expenses SET name = ?1, amount = ?2, date = ?3, category = ?4 WHERE id = ?5",
            params![
                expense.name,
                expense.amount,
                expense.date.format(DATE_FORMAT).to_string(),
                expense.category.as_str(),
                expense.id,
            ],
        )?;
        expect_one(affected, "expense", &expense.id)?;
        Ok(expense.clone())
    }

    fn delete_expense(&mut self, id: &str) -> StoreResult<()> {
        let affected = self
            .conn
            .execute("DELETE FROM expenses WHERE id = ?1", params![id])?;
        expect_one(affected, "expense", id)
    }

    fn fetch_billing_config(&self) -> StoreResult<Option<BillingConfig>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT config FROM billing_config WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn upsert_billing_config(&mut self, config: &BillingConfig) -> StoreResult<()> {
        let json = serde_json::to_string(config)?;
        self.conn.execute(
            "INSERT INTO billing_config (id, config) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET config = excluded.config",
            params![json],
        )?;
        Ok(())
    }

    fn fetch_active_sessions(&self) -> StoreResult<Vec<ActiveSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, zone, car_ids, started_at, order_items
             FROM active_sessions
             ORDER BY started_at ASC",
        )?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    fn fetch_transactions(&self) -> StoreResult<Vec<CompletedTransaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, zone, car_ids, started_at, ended_at, order_items, priced_lines,
                    elapsed_seconds, chargeable_minutes, play_cost, order_cost, total_cost,
                    payment_method, completed_at
             FROM completed_transactions
             ORDER BY completed_at DESC",
        )?;
        let transactions = stmt
            .query_map([], transaction_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    fn begin_session(&mut self, session: &ActiveSession) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        for car_id in &session.car_ids {
            let affected = tx.execute(
                "UPDATE cars SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![CarStatus::InUse.as_str(), car_id, CarStatus::Ready.as_str()],
            )?;
            if affected == 0 {
                // Dropping `tx` rolls back the cars already flipped
                return Err(StoreError::Conflict(format!(
                    "car '{}' is missing or not ready",
                    car_id
                )));
            }
        }

        tx.execute(
            "INSERT INTO active_sessions (id, zone, car_ids, started_at, order_items)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id,
                session.zone,
                serde_json::to_string(&session.car_ids)?,
                session.started_at.timestamp_millis(),
                serde_json::to_string(&session.order)?,
            ],
        )?;

        insert_event(
            &tx,
            &Event::new(
                "session_started",
                "session",
                &session.id,
                serde_json::json!({
                    "zone": session.zone,
                    "car_ids": session.car_ids,
                }),
                &self.actor,
            ),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn update_session_order(&mut self, session: &ActiveSession) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        let affected = tx.execute(
            "UPDATE active_sessions SET order_items = ?1 WHERE id = ?2",
            params![serde_json::to_string(&session.order)?, session.id],
        )?;
        expect_one(affected, "session", &session.id)?;

        insert_event(
            &tx,
            &Event::new(
                "order_updated",
                "session",
                &session.id,
                serde_json::json!({ "lines": session.order.len() }),
                &self.actor,
            ),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn complete_session(&mut self, transaction: &CompletedTransaction) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO completed_transactions (
                id, zone, car_ids, started_at, ended_at, order_items, priced_lines,
                elapsed_seconds, chargeable_minutes, play_cost, order_cost, total_cost,
                payment_method, completed_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                transaction.id,
                transaction.zone,
                serde_json::to_string(&transaction.car_ids)?,
                transaction.started_at.timestamp_millis(),
                transaction.ended_at.timestamp_millis(),
                serde_json::to_string(&transaction.order)?,
                serde_json::to_string(&transaction.lines)?,
                transaction.elapsed_seconds,
                transaction.chargeable_minutes,
                transaction.play_cost,
                transaction.order_cost,
                transaction.total_cost,
                transaction.payment_method.as_str(),
                transaction.completed_at.timestamp_millis(),
            ],
        )?;

        // Cars deleted from inventory mid-session are simply skipped
        for car_id in &transaction.car_ids {
            tx.execute(
                "UPDATE cars SET status = ?1 WHERE id = ?2",
                params![CarStatus::Ready.as_str(), car_id],
            )?;
        }

        let affected = tx.execute(
            "DELETE FROM active_sessions WHERE id = ?1",
            params![transaction.id],
        )?;
        expect_one(affected, "session", &transaction.id)?;

        insert_event(
            &tx,
            &Event::new(
                "session_completed",
                "session",
                &transaction.id,
                serde_json::json!({
                    "total_cost": transaction.total_cost,
                    "payment_method": transaction.payment_method.as_str(),
                }),
                &self.actor,
            ),
        )?;

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::BillingConfig;
    use crate::entities::{CarKind, ExpenseCategory};
    use crate::session::{OrderItem, PaymentMethod, ProposedSession};
    use chrono::Duration;

    fn test_car(id: &str) -> Car {
        Car::new(
            id,
            &format!("Racing #{}", id),
            CarKind::Racing,
            2_000_000,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            24,
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    fn store_with_cars(ids: &[&str]) -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for id in ids {
            store.upsert_car(&test_car(id)).unwrap();
        }
        store
    }

    fn start(store: &SqliteStore, zone: &str, cars: &[&str]) -> ActiveSession {
        let fleet = store.fetch_cars().unwrap();
        let ids: Vec<String> = cars.iter().map(|s| s.to_string()).collect();
        ProposedSession::new(zone, &[])
            .unwrap()
            .start(&ids, &fleet, t0())
            .unwrap()
    }

    #[test]
    fn test_car_upsert_and_order() {
        let mut store = store_with_cars(&["R2", "C1", "R1"]);

        let mut edited = test_car("R1");
        edited.name = "Red Racer".to_string();
        store.upsert_car(&edited).unwrap();

        let cars = store.fetch_cars().unwrap();
        let ids: Vec<&str> = cars.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "R1", "R2"]);
        assert_eq!(cars[1].name, "Red Racer");
        assert_eq!(cars[1].purchase_date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }

    #[test]
    fn test_missing_rows_report_not_found() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        assert!(matches!(
            store.set_car_status("R1", CarStatus::Charging),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(store.delete_menu_item(42), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.delete_expense("nope"), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_menu_ids_assigned_by_store() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let a = store.insert_menu_item(&MenuItemDraft::new("Black coffee", 18_000)).unwrap();
        let b = store.insert_menu_item(&MenuItemDraft::new("Milk coffee", 22_000)).unwrap();
        assert!(b.id > a.id);

        let mut renamed = b.clone();
        renamed.price = 24_000;
        store.update_menu_item(&renamed).unwrap();
        assert_eq!(store.fetch_menu_items().unwrap()[1].price, 24_000);
    }

    #[test]
    fn test_expenses_newest_first() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for (name, day) in [("Rent", 1), ("Wages", 15), ("Batteries", 7)] {
            store
                .insert_expense(&ExpenseDraft {
                    name: name.to_string(),
                    amount: 100_000,
                    date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
                    category: ExpenseCategory::Other,
                })
                .unwrap();
        }

        let names: Vec<String> = store
            .fetch_expenses()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Wages", "Batteries", "Rent"]);
    }

    #[test]
    fn test_billing_config_singleton() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.fetch_billing_config().unwrap(), None);

        store.upsert_billing_config(&BillingConfig::default()).unwrap();
        let custom = BillingConfig {
            play_rate_per_minute: 1500,
            free_play_minutes: 10,
        };
        store.upsert_billing_config(&custom).unwrap();

        assert_eq!(store.fetch_billing_config().unwrap(), Some(custom));
    }

    #[test]
    fn test_session_lifecycle_round_trip() {
        let mut store = store_with_cars(&["R1", "R2"]);
        let mut session = start(&store, "Track 1", &["R1", "R2"]);

        store.begin_session(&session).unwrap();
        assert!(store
            .fetch_cars()
            .unwrap()
            .iter()
            .all(|c| c.status == CarStatus::InUse));

        session.add_order(vec![OrderItem { menu_item_id: 1, quantity: 2 }]);
        store.update_session_order(&session).unwrap();
        assert_eq!(store.fetch_active_sessions().unwrap(), vec![session.clone()]);

        let txn = session.checkout(
            t0() + Duration::minutes(30),
            PaymentMethod::BankTransfer,
            &BillingConfig::default(),
            &[],
        );
        store.complete_session(&txn).unwrap();

        assert!(store.fetch_active_sessions().unwrap().is_empty());
        assert_eq!(store.fetch_transactions().unwrap(), vec![txn]);
        assert!(store
            .fetch_cars()
            .unwrap()
            .iter()
            .all(|c| c.status == CarStatus::Ready));

        let events = store.events_for_entity("session", &session.id).unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(kinds, vec!["session_completed", "order_updated", "session_started"]);
    }

    #[test]
    fn test_begin_session_rolls_back_when_a_car_is_busy() {
        let mut store = store_with_cars(&["R1", "R2"]);
        let session = start(&store, "Track 1", &["R1", "R2"]);
        store.set_car_status("R2", CarStatus::Maintenance).unwrap();

        let err = store.begin_session(&session).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let cars = store.fetch_cars().unwrap();
        assert_eq!(cars[0].status, CarStatus::Ready, "R1 must not stay in use");
        assert!(store.fetch_active_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_complete_session_is_atomic() {
        let mut store = store_with_cars(&["R1"]);
        let session = start(&store, "Track 4", &["R1"]);
        store.begin_session(&session).unwrap();

        let txn = session.checkout(t0(), PaymentMethod::Cash, &BillingConfig::default(), &[]);
        store.complete_session(&txn).unwrap();

        // Second checkout: the transaction insert conflicts, nothing changes
        store.set_car_status("R1", CarStatus::Charging).unwrap();
        let err = store.complete_session(&txn).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.fetch_cars().unwrap()[0].status, CarStatus::Charging);
        assert_eq!(store.fetch_transactions().unwrap().len(), 1);
    }

    #[test]
    fn test_one_active_session_per_zone() {
        let mut store = store_with_cars(&["R1", "R2"]);
        let first = start(&store, "Track 1", &["R1"]);
        store.begin_session(&first).unwrap();

        let second = start(&store, "Track 1", &["R2"]);
        assert!(matches!(
            store.begin_session(&second),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.fetch_cars().unwrap()[1].status, CarStatus::Ready);
    }

    #[test]
    fn test_table_counts() {
        let store = store_with_cars(&["R1", "R2"]);
        let counts = store.table_counts().unwrap();
        assert_eq!(counts.cars, 2);
        assert_eq!(counts.active_sessions, 0);
    }
}
