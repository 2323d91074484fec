//! Filtering and listing a user's transactions.

use rusqlite::{Connection, params_from_iter, types::Value};
use time::Date;

use crate::{
    Error, UserID,
    transaction::{Transaction, TransactionType, core::map_transaction_row},
};

/// The number of transactions listed when no valid page size is given.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// The largest page size a client may ask for.
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Defines which transactions should be fetched by [query_transactions].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionQuery {
    /// Include transactions on or after this date.
    pub start_date: Option<Date>,
    /// Include transactions on or before this date.
    pub end_date: Option<Date>,
    /// Only include income or only include expenses.
    pub transaction_type: Option<TransactionType>,
    /// Only include transactions with exactly this category.
    pub category: Option<String>,
    /// Selects up to the first N transactions.
    pub limit: Option<u64>,
}

/// Parse a client supplied page size, falling back to [DEFAULT_PAGE_SIZE]
/// for missing, unparsable or out of range values.
pub fn page_size(raw: Option<&str>) -> u64 {
    raw.and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|size| *size > 0 && *size as u64 <= MAX_PAGE_SIZE)
        .map_or(DEFAULT_PAGE_SIZE, |size| size as u64)
}

/// Query the transactions of `user_id`, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is a SQL error.
pub fn query_transactions(
    user_id: UserID,
    filter: &TransactionQuery,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut where_clause_parts = vec!["user_id = ?1".to_owned()];
    let mut query_parameters = vec![Value::Integer(user_id.as_i64())];

    if let Some(transaction_type) = filter.transaction_type {
        query_parameters.push(Value::Text(transaction_type.as_str().to_owned()));
        where_clause_parts.push(format!("type = ?{}", query_parameters.len()));
    }

    if let Some(category) = &filter.category {
        query_parameters.push(Value::Text(category.clone()));
        where_clause_parts.push(format!("category = ?{}", query_parameters.len()));
    }

    if let Some(start_date) = filter.start_date {
        query_parameters.push(Value::Text(start_date.to_string()));
        where_clause_parts.push(format!(
            "date(created_at) >= date(?{})",
            query_parameters.len()
        ));
    }

    if let Some(end_date) = filter.end_date {
        query_parameters.push(Value::Text(end_date.to_string()));
        where_clause_parts.push(format!(
            "date(created_at) <= date(?{})",
            query_parameters.len()
        ));
    }

    let mut query_string = format!(
        "SELECT id, type, amount, category, description, created_at FROM transactions
         WHERE {}
         ORDER BY created_at DESC, id DESC",
        where_clause_parts.join(" AND ")
    );

    if let Some(limit) = filter.limit {
        query_string.push_str(&format!(" LIMIT {limit}"));
    }

    let params = params_from_iter(query_parameters.iter());

    connection
        .prepare(&query_string)?
        .query_map(params, map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}
