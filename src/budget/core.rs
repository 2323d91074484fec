//! Defines the budget model and its database queries.

use rusqlite::{Connection, Row};
use serde::Serialize;
use time::Date;

use crate::{Error, UserID, timestamp::Timestamp};

/// A monthly spending limit for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: i64,
    /// The expense category the limit applies to. Unique per user.
    pub category: String,
    /// The most the user wants to spend in the category each month.
    pub monthly_limit: f64,
    /// When the budget was created.
    pub created_at: Timestamp,
}

/// A budget together with what has been spent against it this month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetProgress {
    /// The ID of the budget.
    pub id: i64,
    /// The expense category the limit applies to.
    pub category: String,
    /// The most the user wants to spend in the category each month.
    pub monthly_limit: f64,
    /// The expenses in the category from the first of the month to today.
    pub spent_mtd: f64,
    /// `spent_mtd / monthly_limit` rounded to four decimal places, zero if the limit is not positive.
    pub used_ratio: f64,
    /// When the budget was created.
    pub created_at: Timestamp,
}

/// A partial update to a budget. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BudgetUpdate {
    /// The new category.
    pub category: Option<String>,
    /// The new limit, must be greater than zero.
    pub monthly_limit: Option<f64>,
}

/// Create the budgets table.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budgets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                monthly_limit REAL NOT NULL CHECK (monthly_limit > 0),
                created_at TEXT NOT NULL,
                UNIQUE(user_id, category),
                FOREIGN KEY(user_id) REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Set the monthly limit of `category` for `user_id`.
///
/// An existing budget for the category keeps its ID and gets the new limit.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn upsert_budget(
    user_id: UserID,
    category: &str,
    monthly_limit: f64,
    created_at: Timestamp,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection
        .prepare(
            "INSERT INTO budgets (user_id, category, monthly_limit, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, category) DO UPDATE SET monthly_limit = excluded.monthly_limit
             RETURNING id, category, monthly_limit, created_at",
        )?
        .query_row(
            (user_id.as_i64(), category, monthly_limit, created_at),
            map_budget_row,
        )
        .map_err(Error::from)
}

/// Apply `update` to the budget `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the user has no such budget, or
/// [Error::DuplicateBudgetCategory] if the new category already has a budget.
pub fn update_budget(
    id: i64,
    user_id: UserID,
    update: BudgetUpdate,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection
        .prepare(
            "UPDATE budgets SET
                category = COALESCE(?1, category),
                monthly_limit = COALESCE(?2, monthly_limit)
             WHERE id = ?3 AND user_id = ?4
             RETURNING id, category, monthly_limit, created_at",
        )?
        .query_row(
            (&update.category, update.monthly_limit, id, user_id.as_i64()),
            map_budget_row,
        )
        .map_err(|error| match Error::from(error) {
            Error::DuplicateBudgetCategory(_) => {
                Error::DuplicateBudgetCategory(update.category.clone().unwrap_or_default())
            }
            error => error,
        })
}

/// Delete the budget `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no budget was deleted.
pub fn delete_budget(id: i64, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM budgets WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get every budget of `user_id` with its month-to-date spending as of `today`,
/// ordered by category ignoring case.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_budget_progress(
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<Vec<BudgetProgress>, Error> {
    let month_start = today.replace_day(1).unwrap_or(today);

    connection
        .prepare(
            "SELECT b.id, b.category, b.monthly_limit, b.created_at,
                IFNULL((
                    SELECT SUM(t.amount) FROM transactions t
                    WHERE t.user_id = b.user_id
                      AND t.type = 'expense'
                      AND t.category = b.category
                      AND date(t.created_at) BETWEEN ?2 AND ?3
                ), 0) AS spent_mtd
             FROM budgets b
             WHERE b.user_id = ?1
             ORDER BY lower(b.category)",
        )?
        .query_map(
            (user_id.as_i64(), month_start.to_string(), today.to_string()),
            |row| {
                let monthly_limit: f64 = row.get(2)?;
                let spent_mtd: f64 = row.get(4)?;

                Ok(BudgetProgress {
                    id: row.get(0)?,
                    category: row.get(1)?,
                    monthly_limit,
                    spent_mtd,
                    used_ratio: used_ratio(spent_mtd, monthly_limit),
                    created_at: row.get(3)?,
                })
            },
        )?
        .map(|progress| progress.map_err(Error::SqlError))
        .collect()
}

/// `spent / limit` rounded to four decimal places, or zero if `limit` is not positive.
pub fn used_ratio(spent: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        return 0.0;
    }

    (spent / limit * 10_000.0).round() / 10_000.0
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        category: row.get(1)?,
        monthly_limit: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::{date, datetime};

    use crate::{
        Error, UserID,
        auth::create_user,
        db::initialize,
        test_utils::new_test_user,
        timestamp::Timestamp,
        transaction::{NewTransaction, TransactionType, create_transaction},
    };

    use super::{
        BudgetUpdate, delete_budget, get_budget_progress, update_budget, upsert_budget,
        used_ratio,
    };

    fn get_test_connection() -> (Connection, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user(new_test_user("alice@example.com"), &connection).unwrap();

        (connection, user.id)
    }

    fn created_at() -> Timestamp {
        Timestamp::new(datetime!(2025-03-01 08:00:00))
    }

    fn spend(connection: &Connection, user_id: UserID, category: &str, amount: f64, at: Timestamp) {
        create_transaction(
            user_id,
            NewTransaction {
                transaction_type: TransactionType::Expense,
                amount,
                category: Some(category.to_owned()),
                description: None,
                created_at: at,
            },
            connection,
        )
        .unwrap();
    }

    #[test]
    fn upsert_replaces_limit() {
        let (connection, user_id) = get_test_connection();

        let first = upsert_budget(user_id, "Groceries", 200.0, created_at(), &connection).unwrap();
        let second = upsert_budget(user_id, "Groceries", 300.0, created_at(), &connection).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.monthly_limit, 300.0);
        let progress = get_budget_progress(user_id, date!(2025 - 03 - 15), &connection).unwrap();
        assert_eq!(progress.len(), 1);
    }

    #[test]
    fn progress_counts_only_this_months_expenses() {
        let (connection, user_id) = get_test_connection();
        upsert_budget(user_id, "Groceries", 200.0, created_at(), &connection).unwrap();
        spend(
            &connection,
            user_id,
            "Groceries",
            150.0,
            Timestamp::new(datetime!(2025-03-02 10:00:00)),
        );
        spend(
            &connection,
            user_id,
            "Groceries",
            30.0,
            Timestamp::new(datetime!(2025-03-15 23:59:00)),
        );
        // Last month, another category and the future are all excluded.
        spend(
            &connection,
            user_id,
            "Groceries",
            500.0,
            Timestamp::new(datetime!(2025-02-28 10:00:00)),
        );
        spend(
            &connection,
            user_id,
            "Dining",
            500.0,
            Timestamp::new(datetime!(2025-03-03 10:00:00)),
        );
        spend(
            &connection,
            user_id,
            "Groceries",
            500.0,
            Timestamp::new(datetime!(2025-03-20 10:00:00)),
        );

        let progress = get_budget_progress(user_id, date!(2025 - 03 - 15), &connection).unwrap();

        assert_eq!(progress[0].spent_mtd, 180.0);
        assert_eq!(progress[0].used_ratio, 0.9);
    }

    #[test]
    fn progress_is_ordered_by_category_ignoring_case() {
        let (connection, user_id) = get_test_connection();
        for category in ["rent", "Dining", "Groceries"] {
            upsert_budget(user_id, category, 100.0, created_at(), &connection).unwrap();
        }

        let progress = get_budget_progress(user_id, date!(2025 - 03 - 15), &connection).unwrap();

        let categories: Vec<&str> = progress.iter().map(|p| p.category.as_str()).collect();
        assert_eq!(categories, vec!["Dining", "Groceries", "rent"]);
    }

    #[test]
    fn renaming_onto_existing_category_conflicts() {
        let (connection, user_id) = get_test_connection();
        upsert_budget(user_id, "Rent", 100.0, created_at(), &connection).unwrap();
        let dining = upsert_budget(user_id, "Dining", 100.0, created_at(), &connection).unwrap();

        let result = update_budget(
            dining.id,
            user_id,
            BudgetUpdate {
                category: Some("Rent".to_owned()),
                monthly_limit: None,
            },
            &connection,
        );

        assert_eq!(result, Err(Error::DuplicateBudgetCategory("Rent".to_owned())));
    }

    #[test]
    fn update_and_delete_are_scoped_to_owner() {
        let (connection, user_id) = get_test_connection();
        let budget = upsert_budget(user_id, "Rent", 100.0, created_at(), &connection).unwrap();
        let other_user = UserID::new(user_id.as_i64() + 1);

        assert_eq!(
            update_budget(
                budget.id,
                other_user,
                BudgetUpdate {
                    monthly_limit: Some(5.0),
                    ..Default::default()
                },
                &connection
            ),
            Err(Error::NotFound)
        );
        assert_eq!(
            delete_budget(budget.id, other_user, &connection),
            Err(Error::NotFound)
        );
        assert_eq!(delete_budget(budget.id, user_id, &connection), Ok(()));
    }

    #[test]
    fn used_ratio_never_divides_by_zero() {
        assert_eq!(used_ratio(50.0, 0.0), 0.0);
        assert_eq!(used_ratio(50.0, -10.0), 0.0);
        assert_eq!(used_ratio(1.0, 3.0), 0.3333);
    }
}
