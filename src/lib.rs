// Playzone POS - Core Library
// RC-car zone rentals plus café sales: billing, session lifecycle, storage
// and reports. Used by the CLI, the TUI, the API server and tests.

pub mod billing;
pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod invoice;
pub mod reports;
pub mod session;
pub mod store;
pub mod venue;

// Re-export commonly used types
pub use billing::{compute_bill, Bill, BillingConfig};
pub use catalog::{seed_defaults, SeedSummary};
pub use config::AppConfig;
pub use db::{Event, SqliteStore, TableCounts};
pub use entities::{
    Car, CarKind, CarStatus, Expense, ExpenseCategory, ExpenseDraft, MenuItem, MenuItemDraft,
};
pub use error::{FieldError, PosError, PosResult};
pub use invoice::{format_currency, format_duration, render_invoice, render_invoice_preview};
pub use reports::{
    car_depreciation, daily_report, expense_summary, profit_and_loss, write_transactions_csv,
    DailyReport, Depreciation, ExpenseSummary, ProfitAndLoss,
};
pub use session::{
    ActiveSession, CompletedTransaction, OrderItem, PaymentMethod, PricedLine, ProposedSession,
    SessionError, PLAY_ZONES,
};
pub use store::{Store, StoreError, StoreResult};
pub use venue::Venue;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
