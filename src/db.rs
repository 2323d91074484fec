//! Creates the application's database schema.

use rusqlite::{Connection, TransactionBehavior, Transaction as SqlTransaction};

use crate::{
    Error,
    auth::{create_password_reset_table, create_user_table},
    budget::create_budget_table,
    goal::create_goal_tables,
    settings::create_settings_table,
    transaction::create_transaction_table,
};

/// Create the all of the database tables for the application.
///
/// Every table is created with `IF NOT EXISTS`, so calling this on an existing
/// database is a no-op.
///
/// # Errors
/// This function may return a [rusqlite::Error] if something went wrong creating the tables.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_password_reset_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_goal_tables(&transaction)?;
    create_settings_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
