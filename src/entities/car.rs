// 🚗 Car Entity - rental fleet
//
// A car's id is chosen by the operator and never changes. Its status is
// driven by session start/checkout, or by a manual override from inventory.

use crate::error::{FieldError, ValidationResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// CAR KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarKind {
    /// Racing car, played on the tracks
    Racing,

    /// Construction vehicle (excavators, loaders)
    Construction,
}

impl CarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarKind::Racing => "Racing",
            CarKind::Construction => "Construction",
        }
    }
}

impl FromStr for CarKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "racing" | "race" => Ok(CarKind::Racing),
            "construction" => Ok(CarKind::Construction),
            other => Err(format!("unknown car kind '{}'", other)),
        }
    }
}

// ============================================================================
// CAR STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarStatus {
    Ready,
    InUse,
    Charging,
    Maintenance,
}

impl CarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarStatus::Ready => "Ready",
            CarStatus::InUse => "InUse",
            CarStatus::Charging => "Charging",
            CarStatus::Maintenance => "Maintenance",
        }
    }

    /// Statuses an operator may pick by hand. `InUse` is only ever set by
    /// starting a session.
    pub fn manual_choices() -> [CarStatus; 3] {
        [CarStatus::Ready, CarStatus::Charging, CarStatus::Maintenance]
    }

    pub fn is_manual_choice(&self) -> bool {
        *self != CarStatus::InUse
    }
}

impl FromStr for CarStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "ready" => Ok(CarStatus::Ready),
            "inuse" => Ok(CarStatus::InUse),
            "charging" => Ok(CarStatus::Charging),
            "maintenance" => Ok(CarStatus::Maintenance),
            other => Err(format!("unknown car status '{}'", other)),
        }
    }
}

impl std::fmt::Display for CarStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CAR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    /// Operator-chosen identifier, e.g. "R1"
    pub id: String,
    pub name: String,
    pub kind: CarKind,
    pub status: CarStatus,
    pub purchase_price: i64,
    pub purchase_date: NaiveDate,
    pub lifespan_months: u32,
}

impl Car {
    pub fn new(
        id: &str,
        name: &str,
        kind: CarKind,
        purchase_price: i64,
        purchase_date: NaiveDate,
        lifespan_months: u32,
    ) -> Self {
        Car {
            id: id.trim().to_string(),
            name: name.trim().to_string(),
            kind,
            status: CarStatus::Ready,
            purchase_price,
            purchase_date,
            lifespan_months,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == CarStatus::Ready
    }

    /// Case-insensitive match on name or id
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term) || self.id.to_lowercase().contains(&term)
    }
}

/// Validate a car form before it is saved.
///
/// `existing_ids` is only consulted for new cars: an id already in the
/// fleet is a duplicate.
pub fn validate_car(car: &Car, existing_ids: &[&str], is_new: bool) -> ValidationResult {
    let mut errors = Vec::new();

    if car.id.trim().is_empty() {
        errors.push(FieldError::new("id", "Required field is empty"));
    }

    if car.name.trim().is_empty() {
        errors.push(FieldError::new("name", "Required field is empty"));
    }

    if is_new && existing_ids.iter().any(|id| *id == car.id.trim()) {
        errors.push(FieldError::new(
            "id",
            &format!("Car id '{}' already exists", car.id.trim()),
        ));
    }

    if car.purchase_price <= 0 {
        errors.push(FieldError::new("purchase_price", "Must be greater than 0"));
    }

    if car.lifespan_months == 0 {
        errors.push(FieldError::new("lifespan_months", "Must be greater than 0"));
    }

    if is_new && car.status == CarStatus::InUse {
        errors.push(FieldError::new(
            "status",
            "A new car cannot start in use",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
