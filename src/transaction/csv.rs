//! Exporting transactions to CSV and importing them back.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::{
    Error, UserID,
    request::non_empty,
    timestamp::Timestamp,
    transaction::{
        NewTransaction, Transaction, TransactionType,
        category::{DEFAULT_CATEGORY_KEYWORDS, auto_category},
        create_transaction,
    },
};

/// The columns written by [write_transactions_csv], in order.
pub const CSV_HEADER: [&str; 5] = ["date", "type", "amount", "category", "description"];

const DATE_COLUMNS: &[&str] = &["date", "created_at"];
const TYPE_COLUMNS: &[&str] = &["type"];
const AMOUNT_COLUMNS: &[&str] = &["amount"];
const CATEGORY_COLUMNS: &[&str] = &["category"];
const DESCRIPTION_COLUMNS: &[&str] = &["description", "memo", "note"];

/// Write `transactions` as CSV with a header row.
///
/// # Errors
/// Returns [Error::CsvError] if a record could not be written.
pub fn write_transactions_csv(transactions: &[Transaction]) -> Result<String, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(CSV_HEADER)
        .map_err(|error| Error::CsvError(error.to_string()))?;

    for transaction in transactions {
        writer
            .write_record([
                transaction.created_at.to_string(),
                transaction.transaction_type.to_string(),
                format!("{:.2}", transaction.amount),
                transaction.category.clone().unwrap_or_default(),
                transaction.description.clone().unwrap_or_default(),
            ])
            .map_err(|error| Error::CsvError(error.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::CsvError(error.to_string()))?;

    String::from_utf8(bytes).map_err(|error| Error::CsvError(error.to_string()))
}

/// The outcome of importing a CSV file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// The number of transactions inserted.
    pub created: usize,
    /// The number of rows that were malformed or duplicates.
    pub skipped: usize,
}

/// Import the transactions in the CSV file `data` for `user_id`.
///
/// Columns are matched by their lower-cased header. Rows with a bad type,
/// amount or date are skipped, as are rows matching an existing transaction
/// with the same type, amount, description and minute. A row without a date
/// is recorded at `now`. Either every row is committed or none are.
///
/// # Errors
/// Returns [Error::Validation] if `data` is not UTF-8 or has no header row,
/// or [Error::SqlError] if the transactions could not be stored.
pub fn import_transactions_csv(
    user_id: UserID,
    data: &[u8],
    now: Timestamp,
    connection: &Connection,
) -> Result<ImportSummary, Error> {
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::Validation("CSV must be UTF-8 encoded".to_owned()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|_| Error::Validation("Missing header row".to_owned()))?
        .iter()
        .map(|header| header.trim().to_lowercase())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(Error::Validation("Missing header row".to_owned()));
    }

    let sql_transaction = connection.unchecked_transaction()?;
    let mut summary = ImportSummary::default();

    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(error) => {
                tracing::debug!("Skipping unreadable CSV row {}: {error}", line + 2);
                summary.skipped += 1;
                continue;
            }
        };

        let row: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(record.iter())
            .collect();

        let Some(new_transaction) = parse_row(&row, now) else {
            summary.skipped += 1;
            continue;
        };

        if is_duplicate(user_id, &new_transaction, &sql_transaction)? {
            summary.skipped += 1;
            continue;
        }

        create_transaction(user_id, new_transaction, &sql_transaction)?;
        summary.created += 1;
    }

    sql_transaction.commit()?;

    tracing::info!(
        "Imported {} transactions for user {user_id}, skipped {}",
        summary.created,
        summary.skipped
    );

    Ok(summary)
}

fn pick<'a>(row: &HashMap<&str, &'a str>, columns: &[&str]) -> &'a str {
    columns
        .iter()
        .filter_map(|column| row.get(column))
        .find(|value| !value.is_empty())
        .copied()
        .unwrap_or("")
}

fn parse_row(row: &HashMap<&str, &str>, now: Timestamp) -> Option<NewTransaction> {
    let transaction_type = TransactionType::parse(pick(row, TYPE_COLUMNS))?;

    let amount = pick(row, AMOUNT_COLUMNS)
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount > 0.0)?;

    let created_at = match pick(row, DATE_COLUMNS) {
        "" => now,
        date => Timestamp::parse(date)?,
    };

    let description = non_empty(Some(pick(row, DESCRIPTION_COLUMNS)));
    let category = non_empty(Some(pick(row, CATEGORY_COLUMNS))).unwrap_or_else(|| {
        auto_category(
            transaction_type,
            description.as_deref().unwrap_or_default(),
            DEFAULT_CATEGORY_KEYWORDS,
        )
    });

    Some(NewTransaction {
        transaction_type,
        amount,
        category: Some(category),
        description,
        created_at,
    })
}

fn is_duplicate(
    user_id: UserID,
    new_transaction: &NewTransaction,
    connection: &Connection,
) -> Result<bool, Error> {
    let existing: Option<i64> = connection
        .query_row(
            "SELECT id FROM transactions
             WHERE user_id = ?1 AND type = ?2 AND ABS(amount - ?3) < 0.0001
               AND IFNULL(description, '') = ?4
               AND substr(created_at, 1, 16) = substr(?5, 1, 16)
             LIMIT 1",
            (
                user_id.as_i64(),
                new_transaction.transaction_type,
                new_transaction.amount,
                new_transaction.description.as_deref().unwrap_or_default(),
                new_transaction.created_at,
            ),
            |row| row.get(0),
        )
        .optional()?;

    Ok(existing.is_some())
}
