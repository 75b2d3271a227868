// Entity Models
//
// Flat records persisted one table each:
// - cars (fleet inventory, status lifecycle)
// - menu items (café catalogue)
// - expenses (operating costs)

pub mod car;
pub mod expense;
pub mod menu;

pub use car::{validate_car, Car, CarKind, CarStatus};
pub use expense::{Expense, ExpenseCategory, ExpenseDraft};
pub use menu::{find_item, MenuItem, MenuItemDraft};
