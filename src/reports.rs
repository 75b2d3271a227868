// 📊 Reports - revenue, expenses, profit and car depreciation
//
// Everything here is a pure function over already-loaded records. Calendar
// dates are taken in the venue's local offset, timestamps stay UTC.

use crate::entities::{Car, Expense, ExpenseCategory};
use crate::session::{CompletedTransaction, PaymentMethod};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use std::io::Write;

/// Offset for a whole number of hours east of UTC, clamped to a valid range
pub fn venue_offset(hours: i32) -> FixedOffset {
    let hours = hours.clamp(-23, 23);
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}

/// Calendar date of `at` as seen at the venue
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

// ============================================================================
// DAILY REVENUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentTotal {
    pub method: PaymentMethod,
    pub count: usize,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub total_revenue: i64,
    pub play_revenue: i64,
    pub cafe_revenue: i64,
    pub by_payment: Vec<PaymentTotal>,
    /// Newest first
    pub transactions: Vec<CompletedTransaction>,
}

pub fn daily_report(
    transactions: &[CompletedTransaction],
    date: NaiveDate,
    offset: FixedOffset,
) -> DailyReport {
    let mut todays: Vec<CompletedTransaction> = transactions
        .iter()
        .filter(|t| local_date(t.completed_at, offset) == date)
        .cloned()
        .collect();
    todays.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

    let by_payment = PaymentMethod::all()
        .into_iter()
        .map(|method| {
            let paid: Vec<&CompletedTransaction> =
                todays.iter().filter(|t| t.payment_method == method).collect();
            PaymentTotal {
                method,
                count: paid.len(),
                amount: paid.iter().map(|t| t.total_cost).sum(),
            }
        })
        .collect();

    DailyReport {
        date,
        total_revenue: todays.iter().map(|t| t.total_cost).sum(),
        play_revenue: todays.iter().map(|t| t.play_cost).sum(),
        cafe_revenue: todays.iter().map(|t| t.order_cost).sum(),
        by_payment,
        transactions: todays,
    }
}

// ============================================================================
// EXPENSES & PROFIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: ExpenseCategory,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub by_category: Vec<CategoryTotal>,
    pub total: i64,
}

/// Expenses dated within `from..=to`, per category
pub fn expense_summary(expenses: &[Expense], from: NaiveDate, to: NaiveDate) -> ExpenseSummary {
    let in_range: Vec<&Expense> = expenses
        .iter()
        .filter(|e| e.date >= from && e.date <= to)
        .collect();

    let by_category = ExpenseCategory::all()
        .into_iter()
        .map(|category| CategoryTotal {
            category,
            amount: in_range
                .iter()
                .filter(|e| e.category == category)
                .map(|e| e.amount)
                .sum(),
        })
        .collect();

    ExpenseSummary {
        from,
        to,
        by_category,
        total: in_range.iter().map(|e| e.amount).sum(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfitAndLoss {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub revenue: i64,
    pub play_revenue: i64,
    pub cafe_revenue: i64,
    pub expenses: i64,
    pub profit: i64,
}

pub fn profit_and_loss(
    transactions: &[CompletedTransaction],
    expenses: &[Expense],
    from: NaiveDate,
    to: NaiveDate,
    offset: FixedOffset,
) -> ProfitAndLoss {
    let sold: Vec<&CompletedTransaction> = transactions
        .iter()
        .filter(|t| {
            let day = local_date(t.completed_at, offset);
            day >= from && day <= to
        })
        .collect();

    let revenue: i64 = sold.iter().map(|t| t.total_cost).sum();
    let spent = expense_summary(expenses, from, to).total;

    ProfitAndLoss {
        from,
        to,
        revenue,
        play_revenue: sold.iter().map(|t| t.play_cost).sum(),
        cafe_revenue: sold.iter().map(|t| t.order_cost).sum(),
        expenses: spent,
        profit: revenue - spent,
    }
}

// ============================================================================
// DEPRECIATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Depreciation {
    pub car_id: String,
    pub monthly: i64,
    pub months_elapsed: u32,
    pub accumulated: i64,
    pub book_value: i64,
}

/// Whole calendar months from `start` to `end`, 0 if `end` is earlier
pub fn months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if end.day() < start.day() {
        months -= 1;
    }
    months.max(0) as u32
}

/// Straight-line depreciation over the car's lifespan
pub fn car_depreciation(car: &Car, on: NaiveDate) -> Depreciation {
    let lifespan = car.lifespan_months.max(1);
    let monthly = car.purchase_price / i64::from(lifespan);
    let months_elapsed = months_between(car.purchase_date, on).min(lifespan);

    let accumulated = if months_elapsed >= lifespan {
        car.purchase_price
    } else {
        monthly * i64::from(months_elapsed)
    };

    Depreciation {
        car_id: car.id.clone(),
        monthly,
        months_elapsed,
        accumulated,
        book_value: (car.purchase_price - accumulated).max(0),
    }
}

// ============================================================================
// CSV EXPORT
// ============================================================================

#[derive(Serialize)]
struct TransactionRow<'a> {
    id: &'a str,
    zone: &'a str,
    cars: String,
    started_at: String,
    ended_at: String,
    elapsed_seconds: i64,
    chargeable_minutes: i64,
    play_cost: i64,
    order_cost: i64,
    total_cost: i64,
    payment_method: &'static str,
}

/// Write one CSV row per transaction; returns the number of rows
pub fn write_transactions_csv<W: Write>(
    writer: W,
    transactions: &[CompletedTransaction],
) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for t in transactions {
        csv_writer
            .serialize(TransactionRow {
                id: &t.id,
                zone: &t.zone,
                cars: t.car_ids.join(" "),
                started_at: t.started_at.to_rfc3339(),
                ended_at: t.ended_at.to_rfc3339(),
                elapsed_seconds: t.elapsed_seconds,
                chargeable_minutes: t.chargeable_minutes,
                play_cost: t.play_cost,
                order_cost: t.order_cost,
                total_cost: t.total_cost,
                payment_method: t.payment_method.as_str(),
            })
            .with_context(|| format!("Failed to write transaction {}", t.id))?;
    }

    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(transactions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CarKind;
    use chrono::TimeZone;

    fn txn(id: &str, completed: DateTime<Utc>, play: i64, order: i64, method: PaymentMethod) -> CompletedTransaction {
        CompletedTransaction {
            id: id.to_string(),
            zone: "Track 1".to_string(),
            car_ids: vec!["R1".to_string(), "R2".to_string()],
            started_at: completed - chrono::Duration::minutes(30),
            ended_at: completed,
            order: Vec::new(),
            lines: Vec::new(),
            elapsed_seconds: 1800,
            chargeable_minutes: 15,
            play_cost: play,
            order_cost: order,
            total_cost: play + order,
            payment_method: method,
            completed_at: completed,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_report_uses_venue_offset() {
        let offset = venue_offset(7);
        let transactions = vec![
            // 01:00 local on June 2nd
            txn("a", Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap(), 5_000, 25_000, PaymentMethod::Cash),
            // 16:00 local on June 1st
            txn("b", Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(), 10_000, 0, PaymentMethod::EWallet),
            txn("c", Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(), 2_000, 18_000, PaymentMethod::Cash),
        ];

        let report = daily_report(&transactions, date(2024, 6, 1), offset);
        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.transactions[0].id, "c");
        assert_eq!(report.total_revenue, 30_000);
        assert_eq!(report.play_revenue, 12_000);
        assert_eq!(report.cafe_revenue, 18_000);

        let cash = &report.by_payment[0];
        assert_eq!(cash.method, PaymentMethod::Cash);
        assert_eq!((cash.count, cash.amount), (1, 20_000));
        assert_eq!(report.by_payment[1].amount, 0);

        let next_day = daily_report(&transactions, date(2024, 6, 2), offset);
        assert_eq!(next_day.total_revenue, 30_000);
    }

    #[test]
    fn test_empty_day() {
        let report = daily_report(&[], date(2024, 6, 1), venue_offset(7));
        assert_eq!(report.total_revenue, 0);
        assert!(report.transactions.is_empty());
        assert_eq!(report.by_payment.len(), 3);
    }

    #[test]
    fn test_profit_and_loss() {
        let expenses = vec![
            Expense {
                id: "e1".into(),
                name: "Rent".into(),
                amount: 20_000,
                date: date(2024, 6, 1),
                category: ExpenseCategory::Rent,
            },
            Expense {
                id: "e2".into(),
                name: "Batteries".into(),
                amount: 5_000,
                date: date(2024, 6, 20),
                category: ExpenseCategory::CarMaintenance,
            },
            Expense {
                id: "e3".into(),
                name: "Old invoice".into(),
                amount: 99_000,
                date: date(2024, 5, 31),
                category: ExpenseCategory::Other,
            },
        ];
        let transactions = vec![txn(
            "a",
            Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap(),
            30_000,
            10_000,
            PaymentMethod::BankTransfer,
        )];

        let summary = expense_summary(&expenses, date(2024, 6, 1), date(2024, 6, 30));
        assert_eq!(summary.total, 25_000);
        let maintenance = summary
            .by_category
            .iter()
            .find(|c| c.category == ExpenseCategory::CarMaintenance)
            .unwrap();
        assert_eq!(maintenance.amount, 5_000);

        let pnl = profit_and_loss(
            &transactions,
            &expenses,
            date(2024, 6, 1),
            date(2024, 6, 30),
            venue_offset(7),
        );
        assert_eq!(pnl.revenue, 40_000);
        assert_eq!(pnl.expenses, 25_000);
        assert_eq!(pnl.profit, 15_000);
    }

    #[test]
    fn test_depreciation() {
        let car = Car::new("R1", "Racing #1", CarKind::Racing, 2_400_000, date(2023, 1, 15), 24);

        let early = car_depreciation(&car, date(2023, 1, 31));
        assert_eq!(early.months_elapsed, 0);
        assert_eq!(early.book_value, 2_400_000);

        let mid = car_depreciation(&car, date(2023, 7, 14));
        assert_eq!(mid.monthly, 100_000);
        assert_eq!(mid.months_elapsed, 5);
        assert_eq!(mid.book_value, 1_900_000);

        let done = car_depreciation(&car, date(2030, 1, 1));
        assert_eq!(done.months_elapsed, 24);
        assert_eq!(done.book_value, 0);

        let before_purchase = car_depreciation(&car, date(2022, 1, 1));
        assert_eq!(before_purchase.months_elapsed, 0);
    }

    #[test]
    fn test_csv_export() {
        let transactions = vec![txn(
            "S1",
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            5_000,
            25_000,
            PaymentMethod::Cash,
        )];

        let mut out = Vec::new();
        let rows = write_transactions_csv(&mut out, &transactions).unwrap();
        assert_eq!(rows, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("id,zone,cars,started_at"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("S1,Track 1,R1 R2,"));
        assert!(row.ends_with(",5000,25000,30000,Cash"));
    }
}
