//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/goals/{goal_id}', use [format_endpoint].

/// The root route, a short description of the service.
pub const ROOT: &str = "/";
/// The route for liveness checks.
pub const HEALTH: &str = "/api/health";

/// The route for registering a new user.
pub const REGISTER: &str = "/api/auth/register";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/auth/login";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/auth/logout";
/// The route for getting the current user.
pub const ME: &str = "/api/auth/me";
/// The route for changing the current user's password.
pub const CHANGE_PASSWORD: &str = "/api/auth/change-password";
/// The route for requesting a password reset email.
pub const FORGOT_START: &str = "/api/auth/forgot-start";
/// The route for setting a new password with a reset token.
pub const FORGOT_COMPLETE: &str = "/api/auth/forgot-complete";

/// The route to create and list transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// Alias of [TRANSACTIONS] for creating transactions.
pub const TRANSACTIONS_ADD: &str = "/api/transactions/add";
/// Alias of [TRANSACTIONS] for listing transactions.
pub const TRANSACTIONS_ALL: &str = "/api/transactions/all";
/// The route to update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to download transactions as CSV.
pub const TRANSACTIONS_EXPORT: &str = "/api/transactions/export";
/// The route to upload a CSV file of transactions.
pub const TRANSACTIONS_IMPORT: &str = "/api/transactions/import";
/// The route for transaction totals and the recent daily series.
pub const TRANSACTIONS_SUMMARY: &str = "/api/transactions/summary";

/// The route to create and list budgets.
pub const BUDGETS: &str = "/api/budgets";
/// Alias of [BUDGETS] for creating budgets.
pub const BUDGETS_ADD: &str = "/api/budgets/add";
/// Alias of [BUDGETS] for listing budgets.
pub const BUDGETS_ALL: &str = "/api/budgets/all";
/// The route to update or delete a single budget.
pub const BUDGET: &str = "/api/budgets/{budget_id}";
/// The route for month-to-date spending against each budget.
pub const BUDGETS_PROGRESS: &str = "/api/budgets/progress";
/// The route for budgets that are close to or over their limit.
pub const BUDGETS_ALERTS: &str = "/api/budgets/alerts";

/// The route to create and list goals.
pub const GOALS: &str = "/api/goals";
/// Alias of [GOALS] for creating goals.
pub const GOALS_ADD: &str = "/api/goals/add";
/// Alias of [GOALS] for listing goals.
pub const GOALS_ALL: &str = "/api/goals/all";
/// The route to update or delete a single goal.
pub const GOAL: &str = "/api/goals/{goal_id}";
/// The route to contribute to the goal named in the request body.
pub const GOALS_CONTRIBUTE: &str = "/api/goals/contribute";
/// The route to contribute to a single goal.
pub const GOAL_CONTRIBUTE: &str = "/api/goals/{goal_id}/contribute";
/// The route to list a goal's contributions.
pub const GOAL_HISTORY: &str = "/api/goals/{goal_id}/history";

/// Alias of [INSIGHTS_ADVICE].
pub const INSIGHTS: &str = "/api/insights";
/// The route for spending advice.
pub const INSIGHTS_ADVICE: &str = "/api/insights/advice";

/// The route to read and update the current user's settings.
pub const SETTINGS: &str = "/api/settings";

/// The route to see the current user's alert digest.
pub const NOTIFICATIONS_PREVIEW: &str = "/api/notifications/preview";
/// The route to email the current user their alert digest.
pub const NOTIFICATIONS_SEND: &str = "/api/notifications/send";
/// The route to email every user their alert digest.
pub const NOTIFICATIONS_RUN_ALL: &str = "/api/notifications/run-all";
/// Alias of [NOTIFICATIONS_PREVIEW].
pub const NOTIFY_CHECK: &str = "/api/notify/check";
/// Alias of [NOTIFICATIONS_SEND].
pub const NOTIFY_DISPATCH: &str = "/api/notify/dispatch";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/goals/{goal_id}', '{goal_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::ROOT,
            endpoints::HEALTH,
            endpoints::REGISTER,
            endpoints::LOG_IN,
            endpoints::LOG_OUT,
            endpoints::ME,
            endpoints::CHANGE_PASSWORD,
            endpoints::FORGOT_START,
            endpoints::FORGOT_COMPLETE,
            endpoints::TRANSACTIONS,
            endpoints::TRANSACTIONS_ADD,
            endpoints::TRANSACTIONS_ALL,
            endpoints::TRANSACTION,
            endpoints::TRANSACTIONS_EXPORT,
            endpoints::TRANSACTIONS_IMPORT,
            endpoints::TRANSACTIONS_SUMMARY,
            endpoints::BUDGETS,
            endpoints::BUDGETS_ADD,
            endpoints::BUDGETS_ALL,
            endpoints::BUDGET,
            endpoints::BUDGETS_PROGRESS,
            endpoints::BUDGETS_ALERTS,
            endpoints::GOALS,
            endpoints::GOALS_ADD,
            endpoints::GOALS_ALL,
            endpoints::GOAL,
            endpoints::GOALS_CONTRIBUTE,
            endpoints::GOAL_CONTRIBUTE,
            endpoints::GOAL_HISTORY,
            endpoints::INSIGHTS,
            endpoints::INSIGHTS_ADVICE,
            endpoints::SETTINGS,
            endpoints::NOTIFICATIONS_PREVIEW,
            endpoints::NOTIFICATIONS_SEND,
            endpoints::NOTIFICATIONS_RUN_ALL,
            endpoints::NOTIFY_CHECK,
            endpoints::NOTIFY_DISPATCH,
        ] {
            assert_endpoint_is_valid_uri(endpoint);
        }
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());

        // Parameter with single word should also work.
        let formatted_path = format_endpoint("/hello/{world}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint(endpoints::GOAL_HISTORY, 7);

        assert_eq!(formatted_path, "/api/goals/7/history");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
