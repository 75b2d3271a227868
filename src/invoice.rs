// 🧾 Invoice rendering and display formatting

use crate::session::CompletedTransaction;
use chrono::FixedOffset;

const INVOICE_WIDTH: usize = 52;

/// Group thousands with dots and append the dong sign: `25.000 ₫`
pub fn format_currency(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{} ₫", sign, grouped)
}

/// `HH:MM:SS` for a duration in milliseconds; hours keep growing past 99
pub fn format_duration(millis: i64) -> String {
    let total = millis.max(0) / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

fn centered(text: &str) -> String {
    let len = text.chars().count();
    let pad = INVOICE_WIDTH.saturating_sub(len) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

fn split_line(left: &str, right: &str) -> String {
    let used = left.chars().count() + right.chars().count();
    let gap = INVOICE_WIDTH.saturating_sub(used).max(1);
    format!("{}{}{}", left, " ".repeat(gap), right)
}

fn item_row(name: &str, quantity: u32, unit: i64, amount: i64) -> String {
    let name: String = name.chars().take(20).collect();
    format!(
        "{:<20}{:>4}{:>14}{:>14}",
        name,
        quantity,
        format_currency(unit),
        format_currency(amount)
    )
}

/// Plain-text invoice for a checked-out (or previewed) session.
///
/// Only lines priced at checkout appear; items removed from the menu
/// before checkout are left out, matching their zero cost.
pub fn render_invoice(
    venue_name: &str,
    transaction: &CompletedTransaction,
    offset: FixedOffset,
) -> String {
    render(
        venue_name,
        "INVOICE",
        transaction,
        offset,
        ("Paid by:", transaction.payment_method.as_str()),
    )
}

/// Invoice for a session that has not been paid yet; no payment method is shown
pub fn render_invoice_preview(
    venue_name: &str,
    transaction: &CompletedTransaction,
    offset: FixedOffset,
) -> String {
    render(
        venue_name,
        "INVOICE PREVIEW",
        transaction,
        offset,
        ("Status:", "Unpaid"),
    )
}

fn render(
    venue_name: &str,
    title: &str,
    transaction: &CompletedTransaction,
    offset: FixedOffset,
    payment: (&str, &str),
) -> String {
    let local = transaction.completed_at.with_timezone(&offset);
    let rule = "-".repeat(INVOICE_WIDTH);
    let mut out = Vec::new();

    out.push(centered(&venue_name.to_uppercase()));
    out.push(centered(title));
    out.push(rule.clone());
    out.push(split_line(
        &format!("Date: {}", local.format("%d/%m/%Y")),
        &format!("Time: {}", local.format("%H:%M:%S")),
    ));
    out.push(split_line(
        &format!("Zone: {}", transaction.zone),
        &format!("Cars: {}", transaction.car_ids.join(", ")),
    ));
    out.push(format!("Invoice: {}", transaction.id));
    out.push(format!(
        "Play time: {} ({} chargeable min)",
        format_duration(transaction.elapsed_seconds * 1000),
        transaction.chargeable_minutes
    ));
    out.push(rule.clone());

    out.push(format!("{:<20}{:>4}{:>14}{:>14}", "Item", "Qty", "Unit", "Amount"));
    out.push(item_row(
        "RC play fee",
        1,
        transaction.play_cost,
        transaction.play_cost,
    ));
    for line in &transaction.lines {
        out.push(item_row(&line.name, line.quantity, line.unit_price, line.amount));
    }

    out.push(rule.clone());
    out.push(split_line("TOTAL:", &format_currency(transaction.total_cost)));
    out.push(split_line(payment.0, payment.1));
    out.push(rule);
    out.push(centered("Thank you and see you again!"));

    out.join("\n")
}
