// 🎮 Play sessions - explicit lifecycle
//
//   ProposedSession --start--> ActiveSession --checkout--> CompletedTransaction
//         |
//         +-- dropped (abandoned, nothing persisted)
//
// Each state is its own type, so an "active" session without cars or a
// completed one without costs cannot be constructed.

use crate::billing::{compute_bill, Bill, BillingConfig};
use crate::entities::{find_item, Car, CarStatus, MenuItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;

/// Fixed play areas, each hosting at most one active session
pub const PLAY_ZONES: [&str; 6] = [
    "Track 1",
    "Track 2",
    "Track 3",
    "Track 4",
    "Construction A",
    "Construction B",
];

pub fn is_known_zone(zone: &str) -> bool {
    PLAY_ZONES.contains(&zone)
}

/// Zones not occupied by any of `sessions`, in fixed order
pub fn available_zones(sessions: &[ActiveSession]) -> Vec<&'static str> {
    PLAY_ZONES
        .iter()
        .copied()
        .filter(|zone| !sessions.iter().any(|s| s.zone == *zone))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a session needs at least one car")]
    NoCars,

    #[error("car '{0}' was selected twice")]
    DuplicateCar(String),

    #[error("car '{0}' does not exist")]
    UnknownCar(String),

    #[error("car '{id}' is not ready (status: {status})")]
    CarNotReady { id: String, status: CarStatus },

    #[error("car '{0}' is in an active session")]
    CarInUse(String),

    #[error("zone '{0}' does not exist")]
    UnknownZone(String),

    #[error("zone '{0}' already has an active session")]
    ZoneOccupied(String),

    #[error("no active session '{0}'")]
    UnknownSession(String),
}

// ============================================================================
// ORDER LINES & PAYMENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub menu_item_id: i64,
    pub quantity: u32,
}

/// Drop zero-quantity lines
pub fn normalize_order(lines: impl IntoIterator<Item = OrderItem>) -> Vec<OrderItem> {
    lines.into_iter().filter(|line| line.quantity > 0).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    EWallet,
}

impl PaymentMethod {
    pub fn all() -> [PaymentMethod; 3] {
        [
            PaymentMethod::Cash,
            PaymentMethod::BankTransfer,
            PaymentMethod::EWallet,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::BankTransfer => "BankTransfer",
            PaymentMethod::EWallet => "EWallet",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "banktransfer" | "transfer" => Ok(PaymentMethod::BankTransfer),
            "ewallet" | "wallet" => Ok(PaymentMethod::EWallet),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PROPOSED
// ============================================================================

/// A zone picked on the dashboard, waiting for cars
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedSession {
    zone: String,
}

impl ProposedSession {
    pub fn new(zone: &str, active: &[ActiveSession]) -> Result<Self, SessionError> {
        if !is_known_zone(zone) {
            return Err(SessionError::UnknownZone(zone.to_string()));
        }
        if active.iter().any(|s| s.zone == zone) {
            return Err(SessionError::ZoneOccupied(zone.to_string()));
        }
        Ok(ProposedSession {
            zone: zone.to_string(),
        })
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Assign cars and start the clock. Every car must exist and be ready.
    pub fn start(
        self,
        car_ids: &[String],
        fleet: &[Car],
        now: DateTime<Utc>,
    ) -> Result<ActiveSession, SessionError> {
        if car_ids.is_empty() {
            return Err(SessionError::NoCars);
        }

        let mut seen = HashSet::new();
        for id in car_ids {
            if !seen.insert(id.as_str()) {
                return Err(SessionError::DuplicateCar(id.clone()));
            }
            let car = fleet
                .iter()
                .find(|c| &c.id == id)
                .ok_or_else(|| SessionError::UnknownCar(id.clone()))?;
            if !car.is_ready() {
                return Err(SessionError::CarNotReady {
                    id: id.clone(),
                    status: car.status,
                });
            }
        }

        Ok(ActiveSession {
            id: format!("S{}", uuid::Uuid::new_v4().simple()),
            zone: self.zone,
            car_ids: car_ids.to_vec(),
            started_at: now,
            order: Vec::new(),
        })
    }
}

// ============================================================================
// ACTIVE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub id: String,
    pub zone: String,
    pub car_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub order: Vec<OrderItem>,
}

impl ActiveSession {
    /// Append non-zero lines; returns how many were appended
    pub fn add_order(&mut self, lines: impl IntoIterator<Item = OrderItem>) -> usize {
        let lines = normalize_order(lines);
        let added = lines.len();
        self.order.extend(lines);
        added
    }

    pub fn bill(&self, at: DateTime<Utc>, config: &BillingConfig, menu: &[MenuItem]) -> Bill {
        compute_bill(self.started_at, at, config, &self.order, menu)
    }

    /// Price the session at `at` and freeze it into a transaction.
    ///
    /// Line prices are snapshotted here; later menu edits do not touch the
    /// returned record.
    pub fn checkout(
        &self,
        at: DateTime<Utc>,
        method: PaymentMethod,
        config: &BillingConfig,
        menu: &[MenuItem],
    ) -> CompletedTransaction {
        let bill = self.bill(at, config, menu);

        let lines = self
            .order
            .iter()
            .filter_map(|line| {
                find_item(menu, line.menu_item_id).map(|item| PricedLine {
                    menu_item_id: item.id,
                    name: item.name.clone(),
                    unit_price: item.price,
                    quantity: line.quantity,
                    amount: item.price * i64::from(line.quantity),
                })
            })
            .collect();

        CompletedTransaction {
            id: self.id.clone(),
            zone: self.zone.clone(),
            car_ids: self.car_ids.clone(),
            started_at: self.started_at,
            ended_at: at,
            order: self.order.clone(),
            lines,
            elapsed_seconds: bill.elapsed_seconds,
            chargeable_minutes: bill.chargeable_minutes,
            play_cost: bill.play_cost,
            order_cost: bill.order_cost,
            total_cost: bill.total_cost,
            payment_method: method,
            completed_at: at,
        }
    }
}

// ============================================================================
// COMPLETED
// ============================================================================

/// Order line priced at checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub menu_item_id: i64,
    pub name: String,
    pub unit_price: i64,
    pub quantity: u32,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTransaction {
    pub id: String,
    pub zone: String,
    pub car_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub order: Vec<OrderItem>,
    pub lines: Vec<PricedLine>,
    pub elapsed_seconds: i64,
    pub chargeable_minutes: i64,
    pub play_cost: i64,
    pub order_cost: i64,
    pub total_cost: i64,
    pub payment_method: PaymentMethod,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CarKind, MenuItemDraft};
    use chrono::{Duration, NaiveDate, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap()
    }

    fn fleet() -> Vec<Car> {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut charging = Car::new("R2", "Racing #2", CarKind::Racing, 2_000_000, date, 24);
        charging.status = CarStatus::Charging;
        vec![
            Car::new("R1", "Racing #1", CarKind::Racing, 2_000_000, date, 24),
            charging,
            Car::new("C1", "Digger #1", CarKind::Construction, 3_500_000, date, 36),
        ]
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_start_requires_cars() {
        let proposed = ProposedSession::new("Track 1", &[]).unwrap();
        assert_eq!(
            proposed.start(&[], &fleet(), t0()).unwrap_err(),
            SessionError::NoCars
        );
    }

    #[test]
    fn test_start_requires_ready_cars() {
        let proposed = ProposedSession::new("Track 1", &[]).unwrap();
        let err = proposed.start(&ids(&["R1", "R2"]), &fleet(), t0()).unwrap_err();
        assert_eq!(
            err,
            SessionError::CarNotReady {
                id: "R2".into(),
                status: CarStatus::Charging
            }
        );
    }

    #[test]
    fn test_start_rejects_unknown_and_duplicate_cars() {
        let err = ProposedSession::new("Track 1", &[])
            .unwrap()
            .start(&ids(&["R9"]), &fleet(), t0())
            .unwrap_err();
        assert_eq!(err, SessionError::UnknownCar("R9".into()));

        let err = ProposedSession::new("Track 1", &[])
            .unwrap()
            .start(&ids(&["R1", "R1"]), &fleet(), t0())
            .unwrap_err();
        assert_eq!(err, SessionError::DuplicateCar("R1".into()));
    }

    #[test]
    fn test_zone_must_be_known_and_free() {
        assert_eq!(
            ProposedSession::new("Moon base", &[]).unwrap_err(),
            SessionError::UnknownZone("Moon base".into())
        );

        let active = ProposedSession::new("Track 2", &[])
            .unwrap()
            .start(&ids(&["R1"]), &fleet(), t0())
            .unwrap();
        let sessions = vec![active];

        assert_eq!(
            ProposedSession::new("Track 2", &sessions).unwrap_err(),
            SessionError::ZoneOccupied("Track 2".into())
        );
        assert!(!available_zones(&sessions).contains(&"Track 2"));
        assert_eq!(available_zones(&sessions).len(), PLAY_ZONES.len() - 1);
    }

    #[test]
    fn test_add_order_drops_zero_lines() {
        let mut session = ProposedSession::new("Track 1", &[])
            .unwrap()
            .start(&ids(&["R1", "C1"]), &fleet(), t0())
            .unwrap();
        assert!(session.order.is_empty());

        let added = session.add_order(vec![
            OrderItem { menu_item_id: 1, quantity: 2 },
            OrderItem { menu_item_id: 2, quantity: 0 },
        ]);
        assert_eq!(added, 1);
        assert_eq!(session.order.len(), 1);
    }

    #[test]
    fn test_checkout_snapshots_prices() {
        let mut menu = vec![MenuItemDraft::new("Peach tea", 25_000).with_id(5)];
        let mut session = ProposedSession::new("Track 3", &[])
            .unwrap()
            .start(&ids(&["R1"]), &fleet(), t0())
            .unwrap();
        session.add_order(vec![OrderItem { menu_item_id: 5, quantity: 1 }]);

        let txn = session.checkout(
            t0() + Duration::minutes(20),
            PaymentMethod::Cash,
            &BillingConfig::default(),
            &menu,
        );
        assert_eq!(txn.play_cost, 5_000);
        assert_eq!(txn.order_cost, 25_000);
        assert_eq!(txn.total_cost, 30_000);
        assert_eq!(txn.lines[0].unit_price, 25_000);

        // Later price change leaves the frozen record alone
        menu[0].price = 40_000;
        assert_eq!(txn.total_cost, 30_000);
        assert_eq!(txn.lines[0].amount, 25_000);
        assert_eq!(session.bill(t0() + Duration::minutes(20), &BillingConfig::default(), &menu).order_cost, 40_000);
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("e-wallet".parse::<PaymentMethod>().unwrap(), PaymentMethod::EWallet);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }
}
