//! The list of alerts emailed to a user: budgets near or over their limit and
//! goals that need attention.

use rusqlite::Connection;
use time::Date;

use crate::{
    Error, UserID,
    budget::{budget_alerts, get_budget_progress},
    goal::{Goal, GoalStatus, list_goals},
    settings::get_alert_preferences,
};

/// Goals due within this many days get a reminder.
const DUE_SOON_DAYS: i64 = 7;
/// How far the saved fraction may trail the elapsed fraction of a goal's time.
const BEHIND_SCHEDULE_MARGIN: f64 = 0.15;

/// Build the alert digest for `user_id` as of `today`.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn build_digest(
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<Vec<String>, Error> {
    let preferences = get_alert_preferences(user_id, connection)?;
    let progress = get_budget_progress(user_id, today, connection)?;
    let goals = list_goals(user_id, connection)?;

    let mut digest: Vec<String> = budget_alerts(&progress, &preferences)
        .iter()
        .map(|alert| alert.digest_line())
        .collect();
    digest.extend(goal_alerts(&goals, today));

    Ok(digest)
}

/// The alerts for the active goals in `goals` as of `today`.
pub fn goal_alerts(goals: &[Goal], today: Date) -> Vec<String> {
    let mut alerts = Vec::new();

    for goal in goals.iter().filter(|goal| goal.status == GoalStatus::Active) {
        let remaining = goal.remaining();

        let Some(target_date) = goal.target_date else {
            if remaining > 0.0 && goal.saved_amount == 0.0 {
                alerts.push(format!(
                    "Consider contributing to goal '{}' this week.",
                    goal.name
                ));
            }
            continue;
        };

        let days_left = (target_date - today).whole_days();

        if days_left <= DUE_SOON_DAYS && remaining > 0.0 {
            alerts.push(format!(
                "Goal '{}': {remaining:.2} remaining, {days_left} day(s) left.",
                goal.name
            ));
        }

        let created = goal.created_at.date();
        let total_days = (target_date - created).whole_days().max(1);
        let elapsed_days = (today - created).whole_days().max(0);
        let elapsed_pct = elapsed_days as f64 / total_days as f64;

        if elapsed_pct - goal.progress_pct() >= BEHIND_SCHEDULE_MARGIN && days_left > 0 {
            alerts.push(format!("Goal '{}' is behind schedule.", goal.name));
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::{
        Date,
        macros::{date, datetime},
    };

    use crate::{
        UserID,
        auth::create_user,
        budget::upsert_budget,
        db::initialize,
        goal::{Goal, GoalStatus, NewGoal, create_goal},
        test_utils::new_test_user,
        timestamp::Timestamp,
        transaction::{NewTransaction, TransactionType, create_transaction},
    };

    use super::{build_digest, goal_alerts};

    fn goal(saved_amount: f64, target_date: Option<Date>, created: Date) -> Goal {
        Goal {
            id: 1,
            name: "Trip".to_owned(),
            category: None,
            target_amount: 1000.0,
            saved_amount,
            target_date,
            status: GoalStatus::Active,
            created_at: Timestamp::start_of_day(created),
        }
    }

    #[test]
    fn due_soon_goal() {
        let today = date!(2025 - 06 - 10);
        let goals = [goal(200.0, Some(date!(2025 - 06 - 15)), date!(2025 - 06 - 05))];

        let alerts = goal_alerts(&goals, today);

        assert_eq!(
            alerts,
            vec![
                "Goal 'Trip': 800.00 remaining, 5 day(s) left.".to_owned(),
                "Goal 'Trip' is behind schedule.".to_owned(),
            ]
        );
    }

    #[test]
    fn behind_schedule_goal() {
        let today = date!(2025 - 06 - 01);
        // Half the time has passed but only a fifth is saved.
        let goals = [goal(200.0, Some(date!(2025 - 11 - 01)), date!(2025 - 01 - 01))];

        assert_eq!(
            goal_alerts(&goals, today),
            vec!["Goal 'Trip' is behind schedule.".to_owned()]
        );
    }

    #[test]
    fn on_track_goal_has_no_alerts() {
        let today = date!(2025 - 06 - 01);
        let goals = [goal(500.0, Some(date!(2025 - 11 - 01)), date!(2025 - 01 - 01))];

        assert!(goal_alerts(&goals, today).is_empty());
    }

    #[test]
    fn undated_goal_without_savings_gets_a_nudge() {
        let today = date!(2025 - 06 - 01);
        let goals = [
            goal(0.0, None, date!(2025 - 01 - 01)),
            goal(10.0, None, date!(2025 - 01 - 01)),
        ];

        assert_eq!(
            goal_alerts(&goals, today),
            vec!["Consider contributing to goal 'Trip' this week.".to_owned()]
        );
    }

    #[test]
    fn achieved_goals_are_ignored() {
        let today = date!(2025 - 06 - 10);
        let mut achieved = goal(0.0, Some(date!(2025 - 06 - 12)), date!(2025 - 01 - 01));
        achieved.status = GoalStatus::Achieved;

        assert!(goal_alerts(&[achieved], today).is_empty());
    }

    #[test]
    fn digest_lists_budgets_before_goals() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user_id: UserID = create_user(new_test_user("alice@example.com"), &connection)
            .unwrap()
            .id;
        let created_at = Timestamp::new(datetime!(2025-06-01 09:00:00));
        upsert_budget(user_id, "Dining", 100.0, created_at, &connection).unwrap();
        create_transaction(
            user_id,
            NewTransaction {
                transaction_type: TransactionType::Expense,
                amount: 120.0,
                category: Some("Dining".to_owned()),
                description: None,
                created_at,
            },
            &connection,
        )
        .unwrap();
        create_goal(
            user_id,
            NewGoal {
                name: "Car".to_owned(),
                category: None,
                target_amount: 5000.0,
                target_date: None,
                created_at,
            },
            &connection,
        )
        .unwrap();

        let digest = build_digest(user_id, date!(2025 - 06 - 10), &connection).unwrap();

        assert_eq!(
            digest,
            vec![
                "Budget exceeded for Dining: 120.00/100.00.".to_owned(),
                "Consider contributing to goal 'Car' this week.".to_owned(),
            ]
        );
    }
}
