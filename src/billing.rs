// ⏱️ Billing - elapsed-time metering with a free allowance
//
// One pure function prices a session. The dashboard ticker, the running-bill
// endpoint, the invoice preview and checkout all call `compute_bill`, so the
// figure an operator sees is the figure that gets recorded.

use crate::entities::{find_item, MenuItem};
use crate::error::{FieldError, ValidationResult};
use crate::session::OrderItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PLAY_RATE_PER_MINUTE: i64 = 1000;
pub const DEFAULT_FREE_PLAY_MINUTES: u32 = 15;

// ============================================================================
// BILLING CONFIG
// ============================================================================

/// Singleton pricing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    pub play_rate_per_minute: i64,
    pub free_play_minutes: u32,
}

impl Default for BillingConfig {
    fn default() -> Self {
        BillingConfig {
            play_rate_per_minute: DEFAULT_PLAY_RATE_PER_MINUTE,
            free_play_minutes: DEFAULT_FREE_PLAY_MINUTES,
        }
    }
}

impl BillingConfig {
    pub fn validate(&self) -> ValidationResult {
        if self.play_rate_per_minute < 0 {
            return Err(vec![FieldError::new(
                "play_rate_per_minute",
                "Must not be negative",
            )]);
        }
        Ok(())
    }

    pub fn free_allowance_seconds(&self) -> i64 {
        i64::from(self.free_play_minutes) * 60
    }
}

// ============================================================================
// BILL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub elapsed_seconds: i64,
    pub chargeable_minutes: i64,
    pub play_cost: i64,
    pub order_cost: i64,
    pub total_cost: i64,
}

/// Whole seconds between `start` and `at`, floored. Negative spans clamp to 0.
pub fn elapsed_seconds(start: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let millis = (at - start).num_milliseconds();
    millis.max(0).div_euclid(1000)
}

/// Minutes beyond the free allowance, partial minutes rounded up
pub fn chargeable_minutes(elapsed_seconds: i64, config: &BillingConfig) -> i64 {
    let chargeable_seconds = (elapsed_seconds - config.free_allowance_seconds()).max(0);
    (chargeable_seconds + 59) / 60
}

pub fn play_cost(elapsed_seconds: i64, config: &BillingConfig) -> i64 {
    chargeable_minutes(elapsed_seconds, config) * config.play_rate_per_minute
}

/// Sum of current price × quantity. Lines for deleted menu items count as 0.
pub fn order_cost(order: &[OrderItem], menu: &[MenuItem]) -> i64 {
    order
        .iter()
        .map(|line| {
            find_item(menu, line.menu_item_id)
                .map(|item| item.price * i64::from(line.quantity))
                .unwrap_or(0)
        })
        .sum()
}

pub fn compute_bill(
    start: DateTime<Utc>,
    at: DateTime<Utc>,
    config: &BillingConfig,
    order: &[OrderItem],
    menu: &[MenuItem],
) -> Bill {
    let elapsed = elapsed_seconds(start, at);
    let chargeable = chargeable_minutes(elapsed, config);
    let play = chargeable * config.play_rate_per_minute;
    let orders = order_cost(order, menu);

    Bill {
        elapsed_seconds: elapsed,
        chargeable_minutes: chargeable,
        play_cost: play,
        order_cost: orders,
        total_cost: play + orders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MenuItemDraft;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn config(rate: i64, free: u32) -> BillingConfig {
        BillingConfig {
            play_rate_per_minute: rate,
            free_play_minutes: free,
        }
    }

    fn line(menu_item_id: i64, quantity: u32) -> OrderItem {
        OrderItem {
            menu_item_id,
            quantity,
        }
    }

    #[test]
    fn test_chargeable_minutes_round_up() {
        // 1000s with 15 free minutes: 100 chargeable seconds → 2 minutes
        assert_eq!(chargeable_minutes(1000, &config(1000, 15)), 2);
        assert_eq!(chargeable_minutes(960, &config(1000, 15)), 1);
        assert_eq!(chargeable_minutes(961, &config(1000, 15)), 2);
    }

    #[test]
    fn test_within_free_allowance_is_free() {
        let cfg = config(1000, 15);
        assert_eq!(play_cost(0, &cfg), 0);
        assert_eq!(play_cost(899, &cfg), 0);
        assert_eq!(play_cost(900, &cfg), 0);
        assert_eq!(play_cost(901, &cfg), 1000);
    }

    #[test]
    fn test_elapsed_floors_milliseconds() {
        let start = t0();
        assert_eq!(elapsed_seconds(start, start + Duration::milliseconds(59_999)), 59);
        assert_eq!(elapsed_seconds(start, start - Duration::seconds(5)), 0);
    }

    #[test]
    fn test_order_cost() {
        let menu = vec![
            MenuItemDraft::new("Milk coffee", 22_000).with_id(2),
            MenuItemDraft::new("Breadstick", 15_000).with_id(6),
        ];

        assert_eq!(order_cost(&[], &menu), 0);
        assert_eq!(order_cost(&[line(2, 2), line(6, 1)], &menu), 59_000);
    }

    #[test]
    fn test_deleted_menu_item_counts_zero() {
        let menu = vec![MenuItemDraft::new("Milk coffee", 22_000).with_id(2)];
        assert_eq!(order_cost(&[line(2, 1), line(99, 3)], &menu), 22_000);
    }

    #[test]
    fn test_twenty_minute_session_scenario() {
        let menu = vec![MenuItemDraft::new("Peach tea", 25_000).with_id(5)];
        let bill = compute_bill(
            t0(),
            t0() + Duration::minutes(20),
            &config(1000, 15),
            &[line(5, 1)],
            &menu,
        );

        assert_eq!(bill.chargeable_minutes, 5);
        assert_eq!(bill.play_cost, 5_000);
        assert_eq!(bill.order_cost, 25_000);
        assert_eq!(bill.total_cost, 30_000);
    }

    #[test]
    fn test_zero_duration_session() {
        let bill = compute_bill(t0(), t0(), &BillingConfig::default(), &[], &[]);
        assert_eq!(bill.elapsed_seconds, 0);
        assert_eq!(bill.total_cost, 0);
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(config(-1, 0).validate().is_err());
        assert!(config(0, 0).validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_chargeable_minutes_formula(elapsed in 0i64..1_000_000, free in 0u32..240) {
            let cfg = config(1000, free);
            let chargeable = (elapsed - i64::from(free) * 60).max(0);
            let expected = (chargeable as f64 / 60.0).ceil() as i64;
            prop_assert_eq!(chargeable_minutes(elapsed, &cfg), expected);
        }

        #[test]
        fn prop_play_cost_monotonic(a in 0i64..500_000, b in 0i64..500_000, rate in 0i64..10_000, free in 0u32..120) {
            let cfg = config(rate, free);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(play_cost(lo, &cfg) <= play_cost(hi, &cfg));
        }

        #[test]
        fn prop_bill_never_negative(secs in -3_600i64..100_000, rate in 0i64..10_000, free in 0u32..120) {
            let bill = compute_bill(t0(), t0() + Duration::seconds(secs), &config(rate, free), &[], &[]);
            prop_assert!(bill.total_cost >= 0);
            prop_assert_eq!(bill.total_cost, bill.play_cost + bill.order_cost);
        }
    }
}
