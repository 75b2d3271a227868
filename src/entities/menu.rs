// ☕ Café menu items
//
// Ids are assigned by the store on insert. Prices are read at billing time,
// so editing a price changes the running bill of active sessions but never a
// completed transaction.

use crate::error::{FieldError, ValidationResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub price: i64,
}

/// Menu item form contents, before the store assigns an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItemDraft {
    pub name: String,
    pub price: i64,
}

impl MenuItemDraft {
    pub fn new(name: &str, price: i64) -> Self {
        MenuItemDraft {
            name: name.trim().to_string(),
            price,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "Required field is empty"));
        }
        if self.price <= 0 {
            errors.push(FieldError::new("price", "Must be greater than 0"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn with_id(self, id: i64) -> MenuItem {
        MenuItem {
            id,
            name: self.name,
            price: self.price,
        }
    }
}

/// Find a menu item by id
pub fn find_item(menu: &[MenuItem], id: i64) -> Option<&MenuItem> {
    menu.iter().find(|item| item.id == id)
}
