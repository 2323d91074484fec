//! Money put towards a goal and the ledger of past contributions.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::{
    Error, UserID,
    goal::{Goal, get_goal},
    timestamp::Timestamp,
    transaction::{NewTransaction, TransactionType, create_transaction},
};

/// The category of the expense recorded for a contribution.
pub const SAVINGS_CATEGORY: &str = "Savings";

/// One entry in a goal's contribution history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    /// The ID of the contribution.
    pub id: i64,
    /// The amount added to the goal.
    pub amount: f64,
    /// An optional note from the user.
    pub note: Option<String>,
    /// When the contribution was made.
    pub created_at: Timestamp,
}

/// The data for contributing to a goal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContribution {
    /// The amount to add, must be greater than zero.
    pub amount: f64,
    /// An optional note from the user.
    pub note: Option<String>,
    /// When the contribution was made.
    pub created_at: Timestamp,
    /// Whether to also record the contribution as a "Savings" expense.
    pub record_transaction: bool,
}

/// Add `contribution` to the goal `goal_id` owned by `user_id` and return the
/// updated goal.
///
/// The saved amount is incremented in place, a history entry is appended and,
/// if requested, a matching expense is recorded. Either all of these happen or
/// none do.
///
/// # Errors
/// Returns [Error::GoalNotFound] if the user has no such goal.
pub fn contribute(
    goal_id: i64,
    user_id: UserID,
    contribution: NewContribution,
    connection: &Connection,
) -> Result<Goal, Error> {
    let transaction = connection.unchecked_transaction()?;

    let name: String = transaction
        .query_row(
            "SELECT name FROM goals WHERE id = ?1 AND user_id = ?2",
            (goal_id, user_id.as_i64()),
            |row| row.get(0),
        )
        .optional()?
        .ok_or(Error::GoalNotFound)?;

    transaction.execute(
        "UPDATE goals SET saved_amount = saved_amount + ?1 WHERE id = ?2 AND user_id = ?3",
        (contribution.amount, goal_id, user_id.as_i64()),
    )?;
    transaction.execute(
        "INSERT INTO goal_contributions (user_id, goal_id, amount, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            user_id.as_i64(),
            goal_id,
            contribution.amount,
            &contribution.note,
            contribution.created_at,
        ),
    )?;

    if contribution.record_transaction {
        create_transaction(
            user_id,
            NewTransaction {
                transaction_type: TransactionType::Expense,
                amount: contribution.amount,
                category: Some(SAVINGS_CATEGORY.to_owned()),
                description: Some(format!("Contribution to Goal: {name}")),
                created_at: contribution.created_at,
            },
            &transaction,
        )?;
    }

    let goal = get_goal(goal_id, user_id, &transaction)?;
    transaction.commit()?;

    tracing::debug!(
        "User {user_id} contributed {} to goal {goal_id}",
        contribution.amount
    );

    Ok(goal)
}

/// Get the contributions to the goal `goal_id` owned by `user_id`, newest first.
///
/// An unknown goal has no history.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn contribution_history(
    goal_id: i64,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Contribution>, Error> {
    connection
        .prepare(
            "SELECT id, amount, note, created_at FROM goal_contributions
             WHERE user_id = ?1 AND goal_id = ?2
             ORDER BY created_at DESC, id DESC",
        )?
        .query_map((user_id.as_i64(), goal_id), |row| {
            Ok(Contribution {
                id: row.get(0)?,
                amount: row.get(1)?,
                note: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .map(|contribution| contribution.map_err(Error::SqlError))
        .collect()
}
