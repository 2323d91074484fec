//! HTTP handlers for budgets.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    Error, UserID,
    app_state::DatabaseState,
    budget::{
        BudgetUpdate, budget_alerts, delete_budget, get_budget_progress, update_budget,
        upsert_budget,
    },
    request::{JsonOrForm, Number, double_option},
    settings::get_alert_preferences,
};

/// The form data for creating a budget.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BudgetForm {
    /// The expense category.
    pub category: Option<String>,
    /// The monthly limit, must be greater than zero.
    pub monthly_limit: Option<Number>,
}

/// A route handler for creating a budget, or replacing the limit of the
/// existing budget for the same category.
///
/// # Errors
///
/// Returns a 400 if the category is empty or the limit is not positive.
pub async fn create_budget_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    JsonOrForm(form): JsonOrForm<BudgetForm>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let category = form.category.as_deref().map(str::trim).unwrap_or_default();
    let monthly_limit = form
        .monthly_limit
        .as_ref()
        .and_then(Number::value)
        .filter(|limit| *limit > 0.0);

    let Some(monthly_limit) = monthly_limit.filter(|_| !category.is_empty()) else {
        return Err(Error::Validation(
            "Provide category and positive monthly_limit".to_owned(),
        ));
    };

    let now = state.now()?;
    let budget = upsert_budget(
        user_id,
        category,
        monthly_limit,
        now,
        &*state.connection()?,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "budget": budget })),
    ))
}

/// A route handler for listing budgets with their month-to-date spending.
pub async fn list_budgets_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let today = state.today()?;
    let budgets = get_budget_progress(user_id, today, &*state.connection()?)?;

    Ok(Json(json!({ "success": true, "budgets": budgets })))
}

/// The form data for editing a budget. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EditBudgetForm {
    /// The new category.
    #[serde(deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    /// The new monthly limit.
    #[serde(deserialize_with = "double_option")]
    pub monthly_limit: Option<Option<Number>>,
}

/// A route handler for editing a budget.
///
/// # Errors
///
/// Returns a 400 if a field is invalid or nothing would change, a 404 if the
/// user has no budget with the ID, or a 409 if the new category already has
/// a budget.
pub async fn edit_budget_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<i64>,
    JsonOrForm(form): JsonOrForm<EditBudgetForm>,
) -> Result<Json<Value>, Error> {
    let mut update = BudgetUpdate::default();

    if let Some(category) = form.category {
        let category = category.as_deref().map(str::trim).unwrap_or_default();

        if category.is_empty() {
            return Err(Error::Validation("Category cannot be empty".to_owned()));
        }

        update.category = Some(category.to_owned());
    }

    if let Some(monthly_limit) = form.monthly_limit {
        update.monthly_limit = Some(
            monthly_limit
                .as_ref()
                .and_then(Number::value)
                .filter(|limit| *limit > 0.0)
                .ok_or_else(|| Error::Validation("monthly_limit must be > 0".to_owned()))?,
        );
    }

    if update == BudgetUpdate::default() {
        return Err(Error::Validation("No changes".to_owned()));
    }

    let budget = update_budget(budget_id, user_id, update, &*state.connection()?)?;

    Ok(Json(json!({ "success": true, "budget": budget })))
}

/// A route handler for deleting a budget.
///
/// # Errors
///
/// Returns a 404 if the user has no budget with the ID.
pub async fn delete_budget_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<i64>,
) -> Result<Json<Value>, Error> {
    delete_budget(budget_id, user_id, &*state.connection()?)?;

    Ok(Json(json!({ "success": true })))
}

/// A route handler for the month-to-date spending of each budget.
pub async fn budget_progress_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let today = state.today()?;
    let progress: Vec<Value> = get_budget_progress(user_id, today, &*state.connection()?)?
        .into_iter()
        .map(|budget| {
            json!({
                "category": budget.category,
                "monthly_limit": budget.monthly_limit,
                "spent_mtd": budget.spent_mtd,
                "pct": budget.used_ratio,
            })
        })
        .collect();

    Ok(Json(json!({ "success": true, "progress": progress })))
}

/// A route handler for the budgets that have reached the user's warning or
/// critical threshold this month.
pub async fn budget_alerts_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let today = state.today()?;
    let connection = state.connection()?;
    let preferences = get_alert_preferences(user_id, &connection)?;
    let progress = get_budget_progress(user_id, today, &connection)?;

    Ok(Json(json!({
        "success": true,
        "alerts": budget_alerts(&progress, &preferences),
    })))
}
