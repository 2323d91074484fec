//! HTTP handlers for savings goals and contributions.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use time::Date;

use crate::{
    Error, UserID,
    app_state::DatabaseState,
    goal::{
        GoalStatus, GoalUpdate, NewContribution, NewGoal, contribute, contribution_history,
        create_goal, delete_goal, list_goals, update_goal,
    },
    request::{Flag, JsonOrForm, Number, double_option, non_empty},
    timestamp::Timestamp,
};

/// The form data for creating a goal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoalForm {
    /// What the user is saving for.
    pub name: Option<String>,
    /// An optional label.
    pub category: Option<String>,
    /// The amount to save.
    pub target_amount: Option<Number>,
    /// A date, or a date and time whose time is ignored.
    pub target_date: Option<String>,
}

/// Parse a target date given as a date or an ISO 8601 date and time.
///
/// Empty text means no target date.
fn parse_target_date(text: Option<&str>) -> Result<Option<Date>, Error> {
    match text.map(str::trim).filter(|text| !text.is_empty()) {
        None => Ok(None),
        Some(text) => Timestamp::parse(text)
            .map(|timestamp| Some(timestamp.date()))
            .ok_or_else(|| Error::Validation("Invalid target_date".to_owned())),
    }
}

/// A route handler for creating a goal.
///
/// # Errors
///
/// Returns a 400 if the name is empty, the target is not positive or the
/// target date cannot be parsed.
pub async fn create_goal_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    JsonOrForm(form): JsonOrForm<GoalForm>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let target_date = parse_target_date(form.target_date.as_deref())?;
    let name = non_empty(form.name.as_deref());
    let target_amount = form
        .target_amount
        .as_ref()
        .and_then(Number::value)
        .filter(|amount| *amount > 0.0);

    let (Some(name), Some(target_amount)) = (name, target_amount) else {
        return Err(Error::Validation("Invalid goal payload".to_owned()));
    };

    let now = state.now()?;
    let goal = create_goal(
        user_id,
        NewGoal {
            name,
            category: non_empty(form.category.as_deref()),
            target_amount,
            target_date,
            created_at: now,
        },
        &*state.connection()?,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "goal": goal.progress(now.date()) })),
    ))
}

/// A route handler for listing the goals that are not archived.
pub async fn list_goals_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let today = state.today()?;
    let goals: Vec<_> = list_goals(user_id, &*state.connection()?)?
        .into_iter()
        .map(|goal| goal.progress(today))
        .collect();

    Ok(Json(json!({ "success": true, "goals": goals })))
}

/// The form data for editing a goal. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EditGoalForm {
    /// The new name.
    #[serde(deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    /// The new category, empty or null clears it.
    #[serde(deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    /// The new target amount.
    #[serde(deserialize_with = "double_option")]
    pub target_amount: Option<Option<Number>>,
    /// The new target date, empty or null clears it.
    #[serde(deserialize_with = "double_option")]
    pub target_date: Option<Option<String>>,
    /// One of "active", "achieved" or "archived".
    #[serde(deserialize_with = "double_option")]
    pub status: Option<Option<String>>,
}

/// A route handler for editing a goal.
///
/// # Errors
///
/// Returns a 400 if a field is invalid or nothing would change, or a 404 if
/// the user has no goal with the ID.
pub async fn edit_goal_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    Path(goal_id): Path<i64>,
    JsonOrForm(form): JsonOrForm<EditGoalForm>,
) -> Result<Json<Value>, Error> {
    let mut update = GoalUpdate::default();

    if let Some(name) = form.name {
        update.name = Some(
            non_empty(name.as_deref())
                .ok_or_else(|| Error::Validation("Invalid goal payload".to_owned()))?,
        );
    }

    if let Some(category) = form.category {
        update.category = Some(non_empty(category.as_deref()));
    }

    if let Some(target_amount) = form.target_amount {
        update.target_amount = Some(
            target_amount
                .as_ref()
                .and_then(Number::value)
                .filter(|amount| *amount > 0.0)
                .ok_or_else(|| Error::Validation("Invalid target_amount".to_owned()))?,
        );
    }

    if let Some(target_date) = form.target_date {
        update.target_date = Some(parse_target_date(target_date.as_deref())?);
    }

    if let Some(status) = form.status {
        update.status = Some(
            status
                .as_deref()
                .and_then(GoalStatus::parse)
                .ok_or_else(|| Error::Validation("Invalid status".to_owned()))?,
        );
    }

    if update == GoalUpdate::default() {
        return Err(Error::Validation("No changes".to_owned()));
    }

    let today = state.today()?;
    let goal = update_goal(goal_id, user_id, update, &*state.connection()?)?;

    Ok(Json(json!({ "success": true, "goal": goal.progress(today) })))
}

/// A route handler for deleting a goal and its contribution history.
///
/// # Errors
///
/// Returns a 404 if the user has no goal with the ID.
pub async fn delete_goal_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    Path(goal_id): Path<i64>,
) -> Result<Json<Value>, Error> {
    delete_goal(goal_id, user_id, &*state.connection()?)?;

    Ok(Json(json!({ "success": true })))
}

/// The form data for contributing to a goal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContributionForm {
    /// The goal, only read when it is not part of the path.
    pub goal_id: Option<Number>,
    /// The amount to add.
    pub amount: Option<Number>,
    /// An optional note.
    pub note: Option<String>,
    /// When the contribution was made, defaults to now.
    pub created_at: Option<String>,
    /// Whether to also record a "Savings" expense, defaults to true.
    pub record_transaction: Option<Flag>,
}

/// A route handler for contributing to the goal named by `goal_id` in the body.
///
/// # Errors
///
/// Returns a 400 if the goal ID is missing or the amount is not positive, or
/// a 404 if the user has no goal with the ID.
pub async fn contribute_endpoint(
    state: State<DatabaseState>,
    user_id: Extension<UserID>,
    JsonOrForm(form): JsonOrForm<ContributionForm>,
) -> Result<Json<Value>, Error> {
    let goal_id = form
        .goal_id
        .as_ref()
        .and_then(Number::value)
        .filter(|id| *id >= 1.0 && id.fract() == 0.0)
        .ok_or_else(|| Error::Validation("Missing goal_id".to_owned()))?;

    contribute_to(goal_id as i64, state, user_id, form).await
}

/// A route handler for contributing to the goal in the path.
///
/// # Errors
///
/// Returns a 400 if the amount is not positive, or a 404 if the user has no
/// goal with the ID.
pub async fn contribute_to_goal_endpoint(
    state: State<DatabaseState>,
    user_id: Extension<UserID>,
    Path(goal_id): Path<i64>,
    JsonOrForm(form): JsonOrForm<ContributionForm>,
) -> Result<Json<Value>, Error> {
    contribute_to(goal_id, state, user_id, form).await
}

async fn contribute_to(
    goal_id: i64,
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    form: ContributionForm,
) -> Result<Json<Value>, Error> {
    let amount = form
        .amount
        .as_ref()
        .and_then(Number::value)
        .filter(|amount| *amount > 0.0)
        .ok_or_else(|| Error::Validation("Invalid amount".to_owned()))?;

    let now = state.now()?;
    let created_at = form
        .created_at
        .as_deref()
        .and_then(Timestamp::parse)
        .unwrap_or(now);
    let record_transaction = form.record_transaction.as_ref().is_none_or(Flag::is_set);

    let goal = contribute(
        goal_id,
        user_id,
        NewContribution {
            amount,
            note: non_empty(form.note.as_deref()),
            created_at,
            record_transaction,
        },
        &*state.connection()?,
    )?;

    Ok(Json(json!({ "success": true, "goal": goal.progress(now.date()) })))
}

/// A route handler for the contributions to a goal, newest first.
pub async fn goal_history_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    Path(goal_id): Path<i64>,
) -> Result<Json<Value>, Error> {
    let contributions = contribution_history(goal_id, user_id, &*state.connection()?)?;

    Ok(Json(json!({ "success": true, "contributions": contributions })))
}

#[cfg(test)]
mod tests {
    use axum::{extract::FromRef, http::StatusCode};
    use axum_test::TestServer;
    use serde_json::{Value, json};
    use time::Duration;

    use crate::{
        AppState,
        app_state::DatabaseState,
        endpoints::{self, format_endpoint},
        test_utils::{get_test_server, register_test_user},
    };

    async fn create_goal(server: &TestServer, token: &str, payload: Value) -> Value {
        let response = server
            .post(endpoints::GOALS)
            .authorization_bearer(token)
            .json(&payload)
            .await;
        response.assert_status(StatusCode::CREATED);

        response.json::<Value>()["goal"].clone()
    }

    fn today_plus(state: &AppState, days: i64) -> String {
        (DatabaseState::from_ref(state).today().unwrap() + Duration::days(days)).to_string()
    }

    #[tokio::test]
    async fn create_validates_payload() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;

        for (payload, message) in [
            (json!({"name": "", "target_amount": 100}), "Invalid goal payload"),
            (json!({"name": "Car", "target_amount": -1}), "Invalid goal payload"),
            (
                json!({"name": "Car", "target_amount": 100, "target_date": "soon"}),
                "Invalid target_date",
            ),
        ] {
            let response = server
                .post(endpoints::GOALS_ADD)
                .authorization_bearer(&token)
                .json(&payload)
                .await;

            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({"success": false, "message": message}));
        }
    }

    #[tokio::test]
    async fn create_returns_derived_fields() {
        let (server, _, state) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;

        let goal = create_goal(
            &server,
            &token,
            json!({
                "name": "Holiday",
                "target_amount": "1,000",
                "target_date": format!("{}T00:00:00Z", today_plus(&state, 10)),
            }),
        )
        .await;

        assert_eq!(goal["target_date"], today_plus(&state, 10));
        assert_eq!(goal["status"], "active");
        assert_eq!(goal["saved_amount"], 0.0);
        assert_eq!(goal["progress_pct"], 0.0);
        assert_eq!(goal["remaining"], 1000.0);
        assert_eq!(goal["days_left"], 10);
        assert_eq!(goal["per_day_needed"], 100.0);
    }

    #[tokio::test]
    async fn contributing_the_full_target_completes_progress() {
        let (server, _, state) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        let goal = create_goal(
            &server,
            &token,
            json!({"name": "Laptop", "target_amount": 1000, "target_date": today_plus(&state, 5)}),
        )
        .await;

        let response = server
            .post(endpoints::GOALS_CONTRIBUTE)
            .authorization_bearer(&token)
            .json(&json!({"goal_id": goal["id"], "amount": 1000, "note": "bonus"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["goal"]["saved_amount"], 1000.0);
        assert_eq!(body["goal"]["progress_pct"], 1.0);
        assert_eq!(body["goal"]["remaining"], 0.0);

        let transactions: Value = server
            .get(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(transactions["transactions"][0]["category"], "Savings");
        assert_eq!(
            transactions["transactions"][0]["description"],
            "Contribution to Goal: Laptop"
        );
    }

    #[tokio::test]
    async fn contribute_by_path_without_transaction() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        let goal = create_goal(&server, &token, json!({"name": "Car", "target_amount": 500})).await;
        let goal_id = goal["id"].as_i64().unwrap();

        server
            .post(&format_endpoint(endpoints::GOAL_CONTRIBUTE, goal_id))
            .authorization_bearer(&token)
            .json(&json!({"amount": 50, "record_transaction": false}))
            .await
            .assert_status_ok();

        let history: Value = server
            .get(&format_endpoint(endpoints::GOAL_HISTORY, goal_id))
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(history["contributions"].as_array().unwrap().len(), 1);
        assert_eq!(history["contributions"][0]["amount"], 50.0);
        assert_eq!(history["contributions"][0]["note"], Value::Null);

        let transactions: Value = server
            .get(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(transactions["transactions"], json!([]));
    }

    #[tokio::test]
    async fn contribute_errors() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        let goal = create_goal(&server, &token, json!({"name": "Car", "target_amount": 500})).await;

        let response = server
            .post(endpoints::GOALS_CONTRIBUTE)
            .authorization_bearer(&token)
            .json(&json!({"amount": 50}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"success": false, "message": "Missing goal_id"}));

        let response = server
            .post(endpoints::GOALS_CONTRIBUTE)
            .authorization_bearer(&token)
            .json(&json!({"goal_id": goal["id"], "amount": 0}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"success": false, "message": "Invalid amount"}));

        let response = server
            .post(endpoints::GOALS_CONTRIBUTE)
            .authorization_bearer(&token)
            .json(&json!({"goal_id": 9999, "amount": 10}))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({"success": false, "message": "Goal not found"}));
    }

    #[tokio::test]
    async fn edit_validates_and_archives() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        let goal = create_goal(&server, &token, json!({"name": "Car", "target_amount": 500})).await;
        let path = format_endpoint(endpoints::GOAL, goal["id"].as_i64().unwrap());

        for (payload, message) in [
            (json!({}), "No changes"),
            (json!({"target_amount": 0}), "Invalid target_amount"),
            (json!({"status": "paused"}), "Invalid status"),
            (json!({"target_date": "31/12/2025"}), "Invalid target_date"),
        ] {
            let response = server
                .patch(&path)
                .authorization_bearer(&token)
                .json(&payload)
                .await;

            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({"success": false, "message": message}));
        }

        let response = server
            .patch(&path)
            .authorization_bearer(&token)
            .json(&json!({"status": "Archived", "target_date": "2030-01-01"}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["goal"]["status"], "archived");

        let goals: Value = server
            .get(endpoints::GOALS_ALL)
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(goals["goals"], json!([]));
    }

    #[tokio::test]
    async fn delete_goal_and_missing_goal() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        let goal = create_goal(&server, &token, json!({"name": "Car", "target_amount": 500})).await;
        let path = format_endpoint(endpoints::GOAL, goal["id"].as_i64().unwrap());

        server
            .delete(&path)
            .authorization_bearer(&token)
            .await
            .assert_status_ok();
        server
            .delete(&path)
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .patch(&path)
            .authorization_bearer(&token)
            .json(&json!({"name": "Bike"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
