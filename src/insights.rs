//! Spending advice drawn from the last 30 days of transactions.

use axum::{Extension, Json, extract::State};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Value, json};
use time::{Date, Duration};

use crate::{Error, UserID, app_state::DatabaseState, transaction::TransactionType};

/// How many days back the advice looks.
const WINDOW_DAYS: i64 = 30;
const MAX_ADVICE: usize = 3;

/// A short piece of advice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advice {
    /// The headline.
    pub title: String,
    /// One or two sentences of detail.
    pub text: String,
}

impl Advice {
    fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Income and expense totals over a window of days.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpendingWindow {
    /// The number of transactions in the window.
    pub transaction_count: i64,
    /// Total income.
    pub income: f64,
    /// Total expenses.
    pub expense: f64,
    /// Expense totals per category, largest first.
    pub expense_by_category: Vec<(String, f64)>,
}

/// Total the transactions of `user_id` from `WINDOW_DAYS` days before `today` onwards.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn spending_window(
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<SpendingWindow, Error> {
    let window_start = today - Duration::days(WINDOW_DAYS);
    let mut window = SpendingWindow::default();

    let mut statement = connection.prepare(
        "SELECT type, IFNULL(category, 'Uncategorized') AS category_name, SUM(amount), COUNT(id)
         FROM transactions
         WHERE user_id = ?1 AND date(created_at) >= ?2
         GROUP BY type, category_name
         ORDER BY SUM(amount) DESC, category_name",
    )?;
    let rows = statement.query_map((user_id.as_i64(), window_start.to_string()), |row| {
        Ok((
            row.get::<_, TransactionType>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    for row in rows {
        let (transaction_type, category, total, count) = row?;
        window.transaction_count += count;

        match transaction_type {
            TransactionType::Income => window.income += total,
            TransactionType::Expense => {
                window.expense += total;
                window.expense_by_category.push((category, total));
            }
        }
    }

    Ok(window)
}

/// Turn a [SpendingWindow] into at most three pieces of advice.
pub fn advise(window: &SpendingWindow) -> Vec<Advice> {
    if window.transaction_count == 0 {
        return vec![Advice::new(
            "Add your first transactions",
            "Start by logging income and a few expenses. We'll analyze and tailor advice automatically.",
        )];
    }

    let mut advice = Vec::new();

    if window.expense > window.income {
        advice.push(Advice::new(
            "Spending exceeds income",
            "In the last 30 days, expenses are higher than income. Consider setting category budgets and reducing top-spend areas.",
        ));
    }

    let top_category = window
        .expense_by_category
        .first()
        .filter(|_| window.expense > 0.0);

    if let Some((category, total)) = top_category {
        let share = total / window.expense * 100.0;
        advice.push(Advice::new(
            format!("High spend in {category}"),
            format!(
                "{category} accounts for ~{share:.0}% of your expenses. Set a monthly limit and track it."
            ),
        ));
    }

    advice.push(Advice::new(
        "Build a savings buffer",
        "Aim to save 10-20% of your income. Create a saving goal and move it automatically on payday.",
    ));

    advice.truncate(MAX_ADVICE);
    advice
}

/// A route handler for spending advice.
pub async fn get_advice_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let today = state.today()?;
    let window = spending_window(user_id, today, &*state.connection()?)?;

    Ok(Json(json!({ "success": true, "advice": advise(&window) })))
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use serde_json::{Value, json};
    use time::macros::{date, datetime};

    use crate::{
        UserID,
        auth::create_user,
        db::initialize,
        endpoints,
        test_utils::{get_test_server, new_test_user, register_test_user},
        timestamp::Timestamp,
        transaction::{NewTransaction, TransactionType, create_transaction},
    };

    use super::{SpendingWindow, advise, spending_window};

    fn get_test_connection() -> (Connection, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user(new_test_user("alice@example.com"), &connection).unwrap();

        (connection, user.id)
    }

    fn add(
        connection: &Connection,
        user_id: UserID,
        transaction_type: TransactionType,
        amount: f64,
        category: Option<&str>,
        at: Timestamp,
    ) {
        create_transaction(
            user_id,
            NewTransaction {
                transaction_type,
                amount,
                category: category.map(ToOwned::to_owned),
                description: None,
                created_at: at,
            },
            connection,
        )
        .unwrap();
    }

    #[test]
    fn window_excludes_old_transactions() {
        let (connection, user_id) = get_test_connection();
        let recent = Timestamp::new(datetime!(2025-03-10 12:00:00));
        add(&connection, user_id, TransactionType::Income, 1000.0, Some("Salary"), recent);
        add(&connection, user_id, TransactionType::Expense, 300.0, Some("Rent"), recent);
        add(&connection, user_id, TransactionType::Expense, 100.0, None, recent);
        add(
            &connection,
            user_id,
            TransactionType::Expense,
            999.0,
            Some("Rent"),
            Timestamp::new(datetime!(2025-01-01 12:00:00)),
        );

        let window = spending_window(user_id, date!(2025 - 03 - 15), &connection).unwrap();

        assert_eq!(window.transaction_count, 3);
        assert_eq!(window.income, 1000.0);
        assert_eq!(window.expense, 400.0);
        assert_eq!(
            window.expense_by_category,
            vec![("Rent".to_owned(), 300.0), ("Uncategorized".to_owned(), 100.0)]
        );
    }

    #[test]
    fn missing_and_explicit_uncategorized_are_one_category() {
        let (connection, user_id) = get_test_connection();
        let at = Timestamp::new(datetime!(2025-03-10 12:00:00));
        add(&connection, user_id, TransactionType::Expense, 100.0, Some("Dining"), at);
        add(&connection, user_id, TransactionType::Expense, 60.0, Some("Uncategorized"), at);
        add(&connection, user_id, TransactionType::Expense, 50.0, None, at);

        let window = spending_window(user_id, date!(2025 - 03 - 15), &connection).unwrap();
        let advice = advise(&window);

        assert_eq!(
            window.expense_by_category,
            vec![("Uncategorized".to_owned(), 110.0), ("Dining".to_owned(), 100.0)]
        );
        assert_eq!(advice[1].title, "High spend in Uncategorized");
        assert_eq!(
            advice[1].text,
            "Uncategorized accounts for ~52% of your expenses. Set a monthly limit and track it."
        );
    }

    #[test]
    fn empty_window_suggests_logging_transactions() {
        let advice = advise(&SpendingWindow::default());

        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].title, "Add your first transactions");
    }

    #[test]
    fn overspending_is_flagged_first() {
        let advice = advise(&SpendingWindow {
            transaction_count: 3,
            income: 100.0,
            expense: 400.0,
            expense_by_category: vec![("Dining".to_owned(), 300.0), ("Fuel".to_owned(), 100.0)],
        });

        let titles: Vec<&str> = advice.iter().map(|advice| advice.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Spending exceeds income",
                "High spend in Dining",
                "Build a savings buffer"
            ]
        );
        assert_eq!(
            advice[1].text,
            "Dining accounts for ~75% of your expenses. Set a monthly limit and track it."
        );
    }

    #[test]
    fn income_only_gets_savings_tip() {
        let advice = advise(&SpendingWindow {
            transaction_count: 1,
            income: 100.0,
            ..Default::default()
        });

        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].title, "Build a savings buffer");
    }

    #[tokio::test]
    async fn endpoint_returns_advice() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        server
            .post(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .json(&json!({"type": "expense", "amount": 20, "category": "Dining"}))
            .await;

        let body: Value = server
            .get(endpoints::INSIGHTS_ADVICE)
            .authorization_bearer(&token)
            .await
            .json();

        assert_eq!(body["success"], true);
        assert_eq!(body["advice"][0]["title"], "Spending exceeds income");
        assert_eq!(body["advice"][1]["title"], "High spend in Dining");
        assert_eq!(body["advice"].as_array().unwrap().len(), 3);
    }
}
