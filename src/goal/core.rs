//! Defines the savings goal model and its database queries.

use std::fmt::Display;

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::Serialize;
use time::Date;

use crate::{Error, UserID, timestamp::Timestamp};

/// Where a goal is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    /// Still being saved towards.
    Active,
    /// Marked as reached by the user.
    Achieved,
    /// Hidden from the goal list.
    Archived,
}

impl GoalStatus {
    /// Parse a status case-insensitively, ignoring surrounding whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "achieved" => Some(Self::Achieved),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// The name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Achieved => "achieved",
            Self::Archived => "archived",
        }
    }
}

impl Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for GoalStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for GoalStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        Self::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("invalid goal status \"{text}\"").into()))
    }
}

/// An amount the user is saving towards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    /// The ID of the goal.
    pub id: i64,
    /// What the user is saving for.
    pub name: String,
    /// An optional label for grouping goals.
    pub category: Option<String>,
    /// The amount to save, always greater than zero.
    pub target_amount: f64,
    /// The sum of all contributions so far.
    pub saved_amount: f64,
    /// When the user wants to reach the target.
    pub target_date: Option<Date>,
    /// Where the goal is in its lifecycle.
    pub status: GoalStatus,
    /// When the goal was created.
    pub created_at: Timestamp,
}

impl Goal {
    /// `saved_amount / target_amount`, or zero if the target is not positive.
    pub fn progress_pct(&self) -> f64 {
        if self.target_amount > 0.0 {
            self.saved_amount / self.target_amount
        } else {
            0.0
        }
    }

    /// How much is left to save, never negative.
    pub fn remaining(&self) -> f64 {
        (self.target_amount - self.saved_amount).max(0.0)
    }

    /// Whole days from `today` until the target date, negative once it has passed.
    pub fn days_left(&self, today: Date) -> Option<i64> {
        self.target_date
            .map(|target_date| (target_date - today).whole_days())
    }

    /// The goal with the values derived from it as of `today`.
    pub fn progress(self, today: Date) -> GoalProgress {
        let days_left = self.days_left(today);
        let remaining = self.remaining();

        GoalProgress {
            progress_pct: self.progress_pct(),
            remaining,
            days_left,
            per_day_needed: days_left.map(|days| remaining / days.max(1) as f64),
            goal: self,
        }
    }
}

/// A goal together with its progress, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    #[serde(flatten)]
    goal: Goal,
    /// See [Goal::progress_pct].
    pub progress_pct: f64,
    /// See [Goal::remaining].
    pub remaining: f64,
    /// See [Goal::days_left].
    pub days_left: Option<i64>,
    /// How much has to be saved each day to reach the target on time.
    pub per_day_needed: Option<f64>,
}

/// The data for creating a goal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoal {
    /// What the user is saving for.
    pub name: String,
    /// An optional label for grouping goals.
    pub category: Option<String>,
    /// The amount to save, must be greater than zero.
    pub target_amount: f64,
    /// When the user wants to reach the target.
    pub target_date: Option<Date>,
    /// When the goal was created.
    pub created_at: Timestamp,
}

/// A partial update to a goal. `None` fields are left unchanged.
///
/// The nullable fields use `Some(None)` to clear the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalUpdate {
    /// The new name.
    pub name: Option<String>,
    /// The new category.
    pub category: Option<Option<String>>,
    /// The new target, must be greater than zero.
    pub target_amount: Option<f64>,
    /// The new target date.
    pub target_date: Option<Option<Date>>,
    /// The new status.
    pub status: Option<GoalStatus>,
}

/// Create the goals and goal contributions tables.
///
/// Deleting a goal deletes its contributions.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_goal_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                category TEXT,
                target_amount REAL NOT NULL CHECK (target_amount > 0),
                saved_amount REAL NOT NULL DEFAULT 0,
                target_date TEXT,
                status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'achieved', 'archived')),
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS goal_contributions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                goal_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                note TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(goal_id) REFERENCES goals(id) ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id)",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_goal_contributions_goal ON goal_contributions(goal_id)",
        (),
    )?;

    Ok(())
}

const GOAL_COLUMNS: &str =
    "id, name, category, target_amount, saved_amount, target_date, status, created_at";

/// Create a goal for `user_id` with nothing saved yet.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn create_goal(user_id: UserID, goal: NewGoal, connection: &Connection) -> Result<Goal, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO goals (user_id, name, category, target_amount, target_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {GOAL_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                goal.name,
                goal.category,
                goal.target_amount,
                goal.target_date,
                goal.created_at,
            ),
            map_goal_row,
        )
        .map_err(Error::from)
}

/// Get the goal `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the user has no such goal.
pub fn get_goal(id: i64, user_id: UserID, connection: &Connection) -> Result<Goal, Error> {
    connection
        .prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, user_id.as_i64()), map_goal_row)
        .map_err(Error::from)
}

/// Get the goals of `user_id` that are not archived, active goals before
/// achieved ones and then newest first.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn list_goals(user_id: UserID, connection: &Connection) -> Result<Vec<Goal>, Error> {
    connection
        .prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals
             WHERE user_id = ?1 AND status != 'archived'
             ORDER BY status DESC, created_at DESC, id DESC"
        ))?
        .query_map([user_id.as_i64()], map_goal_row)?
        .map(|goal| goal.map_err(Error::SqlError))
        .collect()
}

/// Apply `update` to the goal `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the user has no such goal.
pub fn update_goal(
    id: i64,
    user_id: UserID,
    update: GoalUpdate,
    connection: &Connection,
) -> Result<Goal, Error> {
    connection
        .prepare(&format!(
            "UPDATE goals SET
                name = COALESCE(?1, name),
                category = CASE WHEN ?2 THEN ?3 ELSE category END,
                target_amount = COALESCE(?4, target_amount),
                target_date = CASE WHEN ?5 THEN ?6 ELSE target_date END,
                status = COALESCE(?7, status)
             WHERE id = ?8 AND user_id = ?9
             RETURNING {GOAL_COLUMNS}"
        ))?
        .query_row(
            (
                update.name,
                update.category.is_some(),
                update.category.flatten(),
                update.target_amount,
                update.target_date.is_some(),
                update.target_date.flatten(),
                update.status,
                id,
                user_id.as_i64(),
            ),
            map_goal_row,
        )
        .map_err(Error::from)
}

/// Delete the goal `id` owned by `user_id` together with its contributions.
///
/// # Errors
/// Returns [Error::NotFound] if no goal was deleted.
pub fn delete_goal(id: i64, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "DELETE FROM goal_contributions WHERE goal_id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;
    let rows_affected = transaction.execute(
        "DELETE FROM goals WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    transaction.commit()?;

    Ok(())
}

fn map_goal_row(row: &Row) -> Result<Goal, rusqlite::Error> {
    Ok(Goal {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        target_amount: row.get(3)?,
        saved_amount: row.get(4)?,
        target_date: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}
