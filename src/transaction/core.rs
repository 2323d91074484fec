//! Defines the core data models and database queries for transactions.

use std::fmt::Display;

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, UserID, timestamp::Timestamp};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money earned, e.g. salary.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionType {
    /// Parse a transaction type case-insensitively, ignoring surrounding whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    /// The name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        Self::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("invalid transaction type \"{text}\"").into()))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: i64,
    /// Whether the money was earned or spent.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned, always positive.
    pub amount: f64,
    /// The category, e.g. "Groceries".
    pub category: Option<String>,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// When the transaction happened.
    pub created_at: Timestamp,
}

/// The data needed to record a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Whether the money was earned or spent.
    pub transaction_type: TransactionType,
    /// Must be greater than zero.
    pub amount: f64,
    /// The category, `None` if there is none.
    pub category: Option<String>,
    /// The description, `None` if there is none.
    pub description: Option<String>,
    /// When the transaction happened.
    pub created_at: Timestamp,
}

/// A partial update to a transaction. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionUpdate {
    /// The new type.
    pub transaction_type: Option<TransactionType>,
    /// The new amount, must be greater than zero.
    pub amount: Option<f64>,
    /// The new category, `Some(None)` clears it.
    pub category: Option<Option<String>>,
    /// The new description, `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// The new time.
    pub created_at: Option<Timestamp>,
}

impl TransactionUpdate {
    /// Whether the update would not change anything.
    pub fn is_empty(&self) -> bool {
        self.transaction_type.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.created_at.is_none()
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transactions table and its indexes.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                amount REAL NOT NULL CHECK (amount > 0),
                category TEXT,
                description TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_user ON transactions(user_id)",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_user_date ON transactions(user_id, created_at)",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_user_type ON transactions(user_id, type)",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_user_cat ON transactions(user_id, category)",
        (),
    )?;

    Ok(())
}

/// Create a new transaction for `user_id`.
///
/// # Errors
/// Returns an [Error::SqlError] if the amount is not positive or there is some other SQL error.
pub fn create_transaction(
    user_id: UserID,
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "INSERT INTO transactions (user_id, type, amount, category, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, type, amount, category, description, created_at",
        )?
        .query_row(
            (
                user_id.as_i64(),
                new_transaction.transaction_type,
                new_transaction.amount,
                new_transaction.category,
                new_transaction.description,
                new_transaction.created_at,
            ),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Get the transaction `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist or belongs to another user.
pub fn get_transaction(
    id: i64,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, type, amount, category, description, created_at
             FROM transactions WHERE id = ?1 AND user_id = ?2",
        )?
        .query_row((id, user_id.as_i64()), map_transaction_row)
        .map_err(Error::from)
}

/// Apply `update` to the transaction `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist or belongs to another user.
pub fn update_transaction(
    id: i64,
    user_id: UserID,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "UPDATE transactions SET
                type = COALESCE(?1, type),
                amount = COALESCE(?2, amount),
                category = CASE WHEN ?3 THEN ?4 ELSE category END,
                description = CASE WHEN ?5 THEN ?6 ELSE description END,
                created_at = COALESCE(?7, created_at)
             WHERE id = ?8 AND user_id = ?9
             RETURNING id, type, amount, category, description, created_at",
        )?
        .query_row(
            (
                update.transaction_type,
                update.amount,
                update.category.is_some(),
                update.category.flatten(),
                update.description.is_some(),
                update.description.flatten(),
                update.created_at,
                id,
                user_id.as_i64(),
            ),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// Delete the transaction `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no transaction was deleted.
pub fn delete_transaction(id: i64, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM transactions WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Count the transactions owned by `user_id`.
#[cfg(test)]
pub fn count_transactions(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM transactions WHERE user_id = ?1",
            [user_id.as_i64()],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count as usize)
        .map_err(Error::from)
}

/// Map a row selecting `id, type, amount, category, description, created_at`.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        transaction_type: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}
