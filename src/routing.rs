//! Application router configuration with protected and unprotected route definitions.

use std::time::Duration;

use axum::{
    Json, Router,
    extract::FromRef,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{
    AppState,
    auth::{
        AuthState, auth_guard, change_password, complete_password_reset, get_current_user,
        log_in, log_out, register_user, start_password_reset,
    },
    budget::{
        budget_alerts_endpoint, budget_progress_endpoint, create_budget_endpoint,
        delete_budget_endpoint, edit_budget_endpoint, list_budgets_endpoint,
    },
    endpoints,
    goal::{
        contribute_endpoint, contribute_to_goal_endpoint, create_goal_endpoint,
        delete_goal_endpoint, edit_goal_endpoint, goal_history_endpoint, list_goals_endpoint,
    },
    insights::get_advice_endpoint,
    notification::{check_endpoint, preview_endpoint, run_all_endpoint, send_endpoint},
    settings::{get_settings_endpoint, update_settings_endpoint},
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, edit_transaction_endpoint,
        export_transactions_endpoint, import_transactions_endpoint, list_transactions_endpoint,
        transaction_summary_endpoint,
    },
};

/// How long browsers may cache a preflight response.
const CORS_MAX_AGE: Duration = Duration::from_secs(600);

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index))
        .route(endpoints::HEALTH, get(get_health))
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(log_in))
        .route(endpoints::LOG_OUT, post(log_out))
        .route(endpoints::FORGOT_START, post(start_password_reset))
        .route(endpoints::FORGOT_COMPLETE, post(complete_password_reset))
        .route(endpoints::NOTIFICATIONS_RUN_ALL, post(run_all_endpoint));

    let protected_routes = Router::new()
        .route(endpoints::ME, get(get_current_user))
        .route(endpoints::CHANGE_PASSWORD, post(change_password))
        .route(
            endpoints::TRANSACTIONS,
            post(create_transaction_endpoint).get(list_transactions_endpoint),
        )
        .route(endpoints::TRANSACTIONS_ADD, post(create_transaction_endpoint))
        .route(endpoints::TRANSACTIONS_ALL, get(list_transactions_endpoint))
        .route(
            endpoints::TRANSACTION,
            patch(edit_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_EXPORT,
            get(export_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_IMPORT,
            post(import_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_SUMMARY,
            get(transaction_summary_endpoint),
        )
        .route(
            endpoints::BUDGETS,
            post(create_budget_endpoint).get(list_budgets_endpoint),
        )
        .route(endpoints::BUDGETS_ADD, post(create_budget_endpoint))
        .route(endpoints::BUDGETS_ALL, get(list_budgets_endpoint))
        .route(
            endpoints::BUDGET,
            patch(edit_budget_endpoint).delete(delete_budget_endpoint),
        )
        .route(endpoints::BUDGETS_PROGRESS, get(budget_progress_endpoint))
        .route(endpoints::BUDGETS_ALERTS, get(budget_alerts_endpoint))
        .route(
            endpoints::GOALS,
            post(create_goal_endpoint).get(list_goals_endpoint),
        )
        .route(endpoints::GOALS_ADD, post(create_goal_endpoint))
        .route(endpoints::GOALS_ALL, get(list_goals_endpoint))
        .route(
            endpoints::GOAL,
            patch(edit_goal_endpoint).delete(delete_goal_endpoint),
        )
        .route(endpoints::GOALS_CONTRIBUTE, post(contribute_endpoint))
        .route(endpoints::GOAL_CONTRIBUTE, post(contribute_to_goal_endpoint))
        .route(endpoints::GOAL_HISTORY, get(goal_history_endpoint))
        .route(endpoints::INSIGHTS, get(get_advice_endpoint))
        .route(endpoints::INSIGHTS_ADVICE, get(get_advice_endpoint))
        .route(
            endpoints::SETTINGS,
            get(get_settings_endpoint).post(update_settings_endpoint),
        )
        .route(endpoints::NOTIFICATIONS_PREVIEW, get(preview_endpoint))
        .route(endpoints::NOTIFICATIONS_SEND, post(send_endpoint))
        .route(endpoints::NOTIFY_CHECK, get(check_endpoint))
        .route(endpoints::NOTIFY_DISPATCH, post(send_endpoint))
        .route_layer(middleware::from_fn_with_state(
            AuthState::from_ref(&state),
            auth_guard,
        ));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Build the CORS layer allowing `allowed_origins`.
///
/// Origins that are not valid header values are logged and skipped.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!("Ignoring invalid CORS origin \"{origin}\": {error}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(CORS_MAX_AGE)
}

async fn get_index() -> Json<Value> {
    Json(json!({ "service": "MoneyMate API", "docs": endpoints::HEALTH }))
}

async fn get_health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "ok": false, "error": "Not found" })),
    )
        .into_response()
}
