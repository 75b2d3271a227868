// 🏁 Venue - the one piece of shared state
//
// Holds the last known-good copy of every table. Each mutation writes to the
// store first and touches local state only after the store succeeded, so a
// failed write leaves the venue exactly as it was.

use crate::billing::{Bill, BillingConfig};
use crate::entities::{
    find_item, validate_car, Car, CarStatus, Expense, ExpenseDraft, MenuItem, MenuItemDraft,
};
use crate::error::{FieldError, PosError, PosResult};
use crate::session::{
    available_zones, normalize_order, ActiveSession, CompletedTransaction, OrderItem,
    PaymentMethod, ProposedSession, SessionError,
};
use crate::store::{Store, StoreResult};
use chrono::{DateTime, Utc};

pub struct Venue<S: Store> {
    store: S,
    cars: Vec<Car>,
    menu: Vec<MenuItem>,
    expenses: Vec<Expense>,
    transactions: Vec<CompletedTransaction>,
    config: BillingConfig,
    sessions: Vec<ActiveSession>,
}

/// Log a store failure before handing it to the caller
fn remote<T>(result: StoreResult<T>, action: &str) -> PosResult<T> {
    result.map_err(|e| {
        log::error!("{} failed: {}", action, e);
        PosError::Store(e)
    })
}

impl<S: Store> Venue<S> {
    /// Fetch every table from the store
    pub fn load(store: S) -> PosResult<Self> {
        let mut venue = Venue {
            store,
            cars: Vec::new(),
            menu: Vec::new(),
            expenses: Vec::new(),
            transactions: Vec::new(),
            config: BillingConfig::default(),
            sessions: Vec::new(),
        };
        venue.reload()?;
        Ok(venue)
    }

    /// Replace local state with a fresh copy; on failure nothing changes
    pub fn reload(&mut self) -> PosResult<()> {
        let cars = remote(self.store.fetch_cars(), "fetch cars")?;
        let menu = remote(self.store.fetch_menu_items(), "fetch menu items")?;
        let expenses = remote(self.store.fetch_expenses(), "fetch expenses")?;
        let transactions = remote(self.store.fetch_transactions(), "fetch transactions")?;
        let sessions = remote(self.store.fetch_active_sessions(), "fetch active sessions")?;

        let config = match remote(self.store.fetch_billing_config(), "fetch billing config")? {
            Some(config) => config,
            None => {
                log::warn!("No billing config stored, using defaults");
                BillingConfig::default()
            }
        };

        self.cars = cars;
        self.menu = menu;
        self.expenses = expenses;
        self.transactions = transactions;
        self.sessions = sessions;
        self.config = config;

        log::debug!(
            "Loaded {} cars, {} menu items, {} active sessions",
            self.cars.len(),
            self.menu.len(),
            self.sessions.len()
        );
        Ok(())
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn car(&self, car_id: &str) -> Option<&Car> {
        self.cars.iter().find(|c| c.id == car_id)
    }

    pub fn menu(&self) -> &[MenuItem] {
        &self.menu
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    /// Completed transactions, newest first
    pub fn transactions(&self) -> &[CompletedTransaction] {
        &self.transactions
    }

    pub fn transaction(&self, id: &str) -> Option<&CompletedTransaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn billing_config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn active_sessions(&self) -> &[ActiveSession] {
        &self.sessions
    }

    pub fn session(&self, session_id: &str) -> PosResult<&ActiveSession> {
        self.sessions
            .iter()
            .find(|s| s.id == session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()).into())
    }

    pub fn available_zones(&self) -> Vec<&'static str> {
        available_zones(&self.sessions)
    }

    pub fn ready_cars(&self) -> Vec<&Car> {
        self.cars.iter().filter(|c| c.is_ready()).collect()
    }

    /// Ready cars whose name or id contains `term`
    pub fn search_ready_cars(&self, term: &str) -> Vec<&Car> {
        self.cars
            .iter()
            .filter(|c| c.is_ready() && c.matches(term))
            .collect()
    }

    // ========================================================================
    // SESSION LIFECYCLE
    // ========================================================================

    pub fn start_session(
        &mut self,
        zone: &str,
        car_ids: &[String],
        now: DateTime<Utc>,
    ) -> PosResult<ActiveSession> {
        let session = ProposedSession::new(zone, &self.sessions)?.start(car_ids, &self.cars, now)?;

        remote(self.store.begin_session(&session), "start session")?;

        for car in self.cars.iter_mut().filter(|c| session.car_ids.contains(&c.id)) {
            car.status = CarStatus::InUse;
        }
        self.sessions.push(session.clone());

        log::info!(
            "Session {} started in {} with {} car(s)",
            session.id,
            session.zone,
            session.car_ids.len()
        );
        Ok(session)
    }

    pub fn add_order(
        &mut self,
        session_id: &str,
        lines: Vec<OrderItem>,
    ) -> PosResult<ActiveSession> {
        let index = self.session_index(session_id)?;
        let lines = normalize_order(lines);

        if let Some(unknown) = lines
            .iter()
            .find(|line| find_item(&self.menu, line.menu_item_id).is_none())
        {
            return Err(PosError::not_found("menu item", unknown.menu_item_id));
        }

        let mut updated = self.sessions[index].clone();
        if updated.add_order(lines) == 0 {
            return Ok(updated);
        }

        remote(self.store.update_session_order(&updated), "add order")?;
        self.sessions[index] = updated.clone();

        log::info!("Session {} now has {} order line(s)", session_id, updated.order.len());
        Ok(updated)
    }

    /// Bill for an active session as of `now`
    pub fn running_bill(&self, session_id: &str, now: DateTime<Utc>) -> PosResult<Bill> {
        let session = self.session(session_id)?;
        Ok(session.bill(now, &self.config, &self.menu))
    }

    /// What checkout would record at `now`, without recording it
    pub fn preview_checkout(
        &self,
        session_id: &str,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> PosResult<CompletedTransaction> {
        let session = self.session(session_id)?;
        Ok(session.checkout(now, method, &self.config, &self.menu))
    }

    pub fn checkout(
        &mut self,
        session_id: &str,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> PosResult<CompletedTransaction> {
        let index = self.session_index(session_id)?;
        let transaction = self.sessions[index].checkout(now, method, &self.config, &self.menu);

        remote(self.store.complete_session(&transaction), "checkout")?;

        let session = self.sessions.remove(index);
        for car in self.cars.iter_mut().filter(|c| session.car_ids.contains(&c.id)) {
            car.status = CarStatus::Ready;
        }
        self.transactions.insert(0, transaction.clone());

        log::info!(
            "Session {} checked out: total {} via {}",
            transaction.id,
            transaction.total_cost,
            transaction.payment_method
        );
        Ok(transaction)
    }

    fn session_index(&self, session_id: &str) -> PosResult<usize> {
        self.sessions
            .iter()
            .position(|s| s.id == session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()).into())
    }

    // ========================================================================
    // INVENTORY
    // ========================================================================

    /// Manual status override from the inventory view
    pub fn set_car_status(&mut self, car_id: &str, status: CarStatus) -> PosResult<()> {
        if !status.is_manual_choice() {
            return Err(PosError::Validation(vec![FieldError::new(
                "status",
                "InUse is only set by starting a session",
            )]));
        }

        let car = self
            .car(car_id)
            .ok_or_else(|| PosError::not_found("car", car_id))?;
        if car.status == CarStatus::InUse {
            return Err(SessionError::CarInUse(car_id.to_string()).into());
        }

        remote(self.store.set_car_status(car_id, status), "update car status")?;

        if let Some(car) = self.cars.iter_mut().find(|c| c.id == car_id) {
            car.status = status;
        }
        log::info!("Car {} set to {}", car_id, status);
        Ok(())
    }

    /// Create (`is_new`) or edit a car. Edits keep the stored status.
    pub fn save_car(&mut self, mut car: Car, is_new: bool) -> PosResult<Car> {
        car.id = car.id.trim().to_string();
        car.name = car.name.trim().to_string();

        let existing_ids: Vec<&str> = self.cars.iter().map(|c| c.id.as_str()).collect();
        validate_car(&car, &existing_ids, is_new)?;

        if !is_new {
            let existing = self
                .car(&car.id)
                .ok_or_else(|| PosError::not_found("car", &car.id))?;
            car.status = existing.status;
        }

        let saved = remote(self.store.upsert_car(&car), "save car")?;

        match self.cars.iter_mut().find(|c| c.id == saved.id) {
            Some(slot) => *slot = saved.clone(),
            None => {
                self.cars.push(saved.clone());
                self.cars.sort_by(|a, b| a.id.cmp(&b.id));
            }
        }
        log::info!("Car {} saved", saved.id);
        Ok(saved)
    }

    pub fn delete_car(&mut self, car_id: &str) -> PosResult<()> {
        let car = self
            .car(car_id)
            .ok_or_else(|| PosError::not_found("car", car_id))?;
        if car.status == CarStatus::InUse {
            return Err(SessionError::CarInUse(car_id.to_string()).into());
        }

        remote(self.store.delete_car(car_id), "delete car")?;
        self.cars.retain(|c| c.id != car_id);
        log::info!("Car {} deleted", car_id);
        Ok(())
    }

    // ========================================================================
    // MENU
    // ========================================================================

    /// Insert when `id` is None, update otherwise
    pub fn save_menu_item(&mut self, id: Option<i64>, draft: MenuItemDraft) -> PosResult<MenuItem> {
        let draft = MenuItemDraft::new(&draft.name, draft.price);
        draft.validate()?;

        let saved = match id {
            None => remote(self.store.insert_menu_item(&draft), "add menu item")?,
            Some(id) => {
                if find_item(&self.menu, id).is_none() {
                    return Err(PosError::not_found("menu item", id));
                }
                remote(self.store.update_menu_item(&draft.with_id(id)), "update menu item")?
            }
        };

        match self.menu.iter_mut().find(|m| m.id == saved.id) {
            Some(slot) => *slot = saved.clone(),
            None => self.menu.push(saved.clone()),
        }
        log::info!("Menu item {} saved at {}", saved.name, saved.price);
        Ok(saved)
    }

    /// Lines in active sessions that reference the item are kept; they bill 0
    pub fn delete_menu_item(&mut self, id: i64) -> PosResult<()> {
        if find_item(&self.menu, id).is_none() {
            return Err(PosError::not_found("menu item", id));
        }

        remote(self.store.delete_menu_item(id), "delete menu item")?;
        self.menu.retain(|m| m.id != id);
        log::info!("Menu item {} deleted", id);
        Ok(())
    }

    // ========================================================================
    // EXPENSES & SETTINGS
    // ========================================================================

    pub fn save_expense(&mut self, id: Option<&str>, draft: ExpenseDraft) -> PosResult<Expense> {
        draft.validate()?;

        let saved = match id {
            None => remote(self.store.insert_expense(&draft), "add expense")?,
            Some(id) => {
                if !self.expenses.iter().any(|e| e.id == id) {
                    return Err(PosError::not_found("expense", id));
                }
                let expense = draft.with_id(id.to_string());
                remote(self.store.update_expense(&expense), "update expense")?
            }
        };

        self.expenses.retain(|e| e.id != saved.id);
        self.expenses.push(saved.clone());
        self.expenses
            .sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));

        log::info!("Expense {} saved", saved.id);
        Ok(saved)
    }

    pub fn delete_expense(&mut self, id: &str) -> PosResult<()> {
        if !self.expenses.iter().any(|e| e.id == id) {
            return Err(PosError::not_found("expense", id));
        }

        remote(self.store.delete_expense(id), "delete expense")?;
        self.expenses.retain(|e| e.id != id);
        log::info!("Expense {} deleted", id);
        Ok(())
    }

    pub fn save_billing_config(&mut self, config: BillingConfig) -> PosResult<()> {
        config.validate()?;
        remote(self.store.upsert_billing_config(&config), "save billing config")?;
        self.config = config;
        log::info!(
            "Billing config saved: {} per minute, {} free minutes",
            config.play_rate_per_minute,
            config.free_play_minutes
        );
        Ok(())
    }
}
