// 📦 Default catalogue for a fresh venue
//
// Seeding only fills empty tables, so running `init` twice is harmless.

use crate::billing::BillingConfig;
use crate::entities::{Car, CarKind, MenuItemDraft};
use crate::store::{Store, StoreResult};
use chrono::NaiveDate;

const RACING_FLEET: u32 = 15;
const CONSTRUCTION_FLEET: u32 = 10;

pub fn default_cars() -> Vec<Car> {
    let racing_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default();
    let construction_date = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap_or_default();

    let racing = (1..=RACING_FLEET).map(|n| {
        Car::new(
            &format!("R{}", n),
            &format!("Racing #{}", n),
            CarKind::Racing,
            2_000_000,
            racing_date,
            24,
        )
    });

    let construction = (1..=CONSTRUCTION_FLEET).map(|n| {
        Car::new(
            &format!("C{}", n),
            &format!("Construction #{}", n),
            CarKind::Construction,
            3_500_000,
            construction_date,
            36,
        )
    });

    racing.chain(construction).collect()
}

pub fn default_menu() -> Vec<MenuItemDraft> {
    vec![
        MenuItemDraft::new("Black coffee", 18_000),
        MenuItemDraft::new("Milk coffee", 22_000),
        MenuItemDraft::new("Bac xiu", 25_000),
        MenuItemDraft::new("Orange juice", 28_000),
        MenuItemDraft::new("Peach tea", 25_000),
        MenuItemDraft::new("Breadsticks", 15_000),
        MenuItemDraft::new("Potato chips", 20_000),
    ]
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub cars: usize,
    pub menu_items: usize,
    pub billing_config: bool,
}

pub fn seed_defaults<S: Store>(store: &mut S) -> StoreResult<SeedSummary> {
    let mut summary = SeedSummary::default();

    if store.fetch_cars()?.is_empty() {
        for car in default_cars() {
            store.upsert_car(&car)?;
            summary.cars += 1;
        }
    }

    if store.fetch_menu_items()?.is_empty() {
        for item in default_menu() {
            store.insert_menu_item(&item)?;
            summary.menu_items += 1;
        }
    }

    if store.fetch_billing_config()?.is_none() {
        store.upsert_billing_config(&BillingConfig::default())?;
        summary.billing_config = true;
    }

    log::info!(
        "Seeded {} cars, {} menu items, billing config: {}",
        summary.cars,
        summary.menu_items,
        summary.billing_config
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;

    #[test]
    fn test_default_fleet() {
        let cars = default_cars();
        assert_eq!(cars.len(), 25);
        assert_eq!(cars[0].id, "R1");
        assert_eq!(cars[24].id, "C10");
        assert!(cars.iter().all(|c| c.is_ready()));
    }

    #[test]
    fn test_seed_is_idempotent() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let first = seed_defaults(&mut store).unwrap();
        assert_eq!(first.cars, 25);
        assert_eq!(first.menu_items, 7);
        assert!(first.billing_config);

        let second = seed_defaults(&mut store).unwrap();
        assert_eq!(second, SeedSummary::default());
        assert_eq!(store.fetch_cars().unwrap().len(), 25);
    }
}
