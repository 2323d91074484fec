//! Totals by type and category, and the recent daily cash flow.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;
use time::{Date, Duration};

use crate::{Error, UserID};

/// The number of days covered by [TransactionSummary::daily], including today.
pub const DAILY_SERIES_DAYS: i64 = 14;

/// The total amount for a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The category, "Uncategorized" for transactions without one.
    pub category: String,
    /// The total amount, rounded to cents.
    pub total: f64,
}

/// The income and expenses for a single day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    /// The day.
    pub date: Date,
    /// Money earned on the day.
    pub income: f64,
    /// Money spent on the day.
    pub expense: f64,
    /// `income - expense`.
    pub net: f64,
}

/// An overview of a user's transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSummary {
    /// The all time total for each transaction type that has transactions.
    pub totals: BTreeMap<String, f64>,
    /// The all time total for each category, largest first.
    pub by_category: Vec<CategoryTotal>,
    /// One entry per day for the last [DAILY_SERIES_DAYS] days, oldest first.
    pub daily: Vec<DailyTotal>,
}

/// Summarize the transactions of `user_id` as of `today`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn summarize_transactions(
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<TransactionSummary, Error> {
    let totals = connection
        .prepare(
            "SELECT type, ROUND(SUM(amount), 2) FROM transactions
             WHERE user_id = ?1
             GROUP BY type",
        )?
        .query_map([user_id.as_i64()], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<BTreeMap<String, f64>, _>>()?;

    let by_category = connection
        .prepare(
            "SELECT COALESCE(category, 'Uncategorized') AS category, ROUND(SUM(amount), 2) AS total
             FROM transactions
             WHERE user_id = ?1
             GROUP BY COALESCE(category, 'Uncategorized')
             ORDER BY total DESC, category ASC",
        )?
        .query_map([user_id.as_i64()], |row| {
            Ok(CategoryTotal {
                category: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let first_day = today - Duration::days(DAILY_SERIES_DAYS - 1);

    let mut daily_rows = connection
        .prepare(
            "SELECT date(created_at) AS day,
                    COALESCE(SUM(CASE WHEN type = 'income' THEN amount END), 0),
                    COALESCE(SUM(CASE WHEN type = 'expense' THEN amount END), 0)
             FROM transactions
             WHERE user_id = ?1 AND date(created_at) BETWEEN ?2 AND ?3
             GROUP BY day",
        )?
        .query_map(
            (user_id.as_i64(), first_day.to_string(), today.to_string()),
            |row| Ok((row.get::<_, Date>(0)?, (row.get(1)?, row.get(2)?))),
        )?
        .collect::<Result<BTreeMap<Date, (f64, f64)>, _>>()?;

    let daily = (0..DAILY_SERIES_DAYS)
        .map(|offset| {
            let date = first_day + Duration::days(offset);
            let (income, expense) = daily_rows.remove(&date).unwrap_or((0.0, 0.0));

            DailyTotal {
                date,
                income: round_cents(income),
                expense: round_cents(expense),
                net: round_cents(income - expense),
            }
        })
        .collect();

    Ok(TransactionSummary {
        totals,
        by_category,
        daily,
    })
}

/// Round `amount` to two decimal places.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
