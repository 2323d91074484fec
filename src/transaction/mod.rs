//! Transaction management for the budgeting application.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the database functions for storing, querying, and managing transactions
//! - Guessing categories from descriptions
//! - CSV export and import
//! - The JSON route handlers

mod category;
mod core;
mod csv;
mod endpoints;
mod query;
mod summary;

pub use core::{
    NewTransaction, Transaction, TransactionType, TransactionUpdate, create_transaction,
    create_transaction_table,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, edit_transaction_endpoint,
    export_transactions_endpoint, import_transactions_endpoint, list_transactions_endpoint,
    transaction_summary_endpoint,
};
pub use query::TransactionQuery;

#[cfg(test)]
pub use core::count_transactions;
#[cfg(test)]
pub use query::query_transactions;
