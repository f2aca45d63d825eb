//! Billing period dates. Cashback categories are chosen per calendar month,
//! so every row is dated to the first day of the month it was recorded in.

use chrono::{Datelike, Local, NaiveDate};

/// First day of the month containing `date`.
pub fn period_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Start of the current month in local time, formatted `YYYY-MM-DD`.
pub fn current_period() -> String {
    period_start(Local::now().date_naive())
        .format("%Y-%m-%d")
        .to_string()
}
