// 💸 Operating expenses

use crate::error::{FieldError, ValidationResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Rent,
    Staff,
    Supplies,
    CarMaintenance,
    Other,
}

impl ExpenseCategory {
    pub fn all() -> [ExpenseCategory; 5] {
        [
            ExpenseCategory::Rent,
            ExpenseCategory::Staff,
            ExpenseCategory::Supplies,
            ExpenseCategory::CarMaintenance,
            ExpenseCategory::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Rent => "Rent",
            ExpenseCategory::Staff => "Staff",
            ExpenseCategory::Supplies => "Supplies",
            ExpenseCategory::CarMaintenance => "CarMaintenance",
            ExpenseCategory::Other => "Other",
        }
    }
}

impl FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "rent" => Ok(ExpenseCategory::Rent),
            "staff" => Ok(ExpenseCategory::Staff),
            "supplies" => Ok(ExpenseCategory::Supplies),
            "carmaintenance" => Ok(ExpenseCategory::CarMaintenance),
            "other" => Ok(ExpenseCategory::Other),
            other => Err(format!("unknown expense category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub name: String,
    pub amount: i64,
    pub date: NaiveDate,
    pub category: ExpenseCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub name: String,
    pub amount: i64,
    pub date: NaiveDate,
    pub category: ExpenseCategory,
}

impl ExpenseDraft {
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "Required field is empty"));
        }
        if self.amount <= 0 {
            errors.push(FieldError::new("amount", "Must be greater than 0"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn with_id(self, id: String) -> Expense {
        Expense {
            id,
            name: self.name.trim().to_string(),
            amount: self.amount,
            date: self.date,
            category: self.category,
        }
    }
}
