//! HTTP handlers for previewing and emailing alert digests.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    http::HeaderMap,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error, UserID,
    app_state::lock_connection,
    auth::{get_all_users, get_user_by_id},
    notification::{Email, Mailer, build_digest},
    timezone::local_today,
};

/// The header that may carry the admin key instead of the `key` query parameter.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// The state needed to build and send alert digests.
#[derive(Clone)]
pub struct NotificationState {
    /// Sends the digests.
    pub mailer: Mailer,
    /// Name used in the email subject.
    pub app_name: String,
    /// Key required to email every user, `None` disables that endpoint.
    pub admin_api_key: Option<String>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Ho_Chi_Minh".
    pub local_timezone: String,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for NotificationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            mailer: state.mailer.clone(),
            app_name: state.app_name.clone(),
            admin_api_key: state.admin_api_key.clone(),
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl NotificationState {
    fn digest_email(&self, to: String, alerts: &[String]) -> Email {
        let title = format!("Your {} alerts", self.app_name);
        let lines: String = alerts.iter().map(|alert| format!("- {alert}\n")).collect();

        Email {
            to,
            body: format!("{title}\n\n{lines}"),
            subject: title,
        }
    }
}

/// A route handler for the current user's alert digest.
pub async fn preview_endpoint(
    State(state): State<NotificationState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let today = local_today(&state.local_timezone)?;
    let alerts = build_digest(user_id, today, &*lock_connection(&state.db_connection)?)?;

    Ok(Json(json!({ "success": true, "alerts": alerts })))
}

/// Same as [preview_endpoint] with an empty goal list added for older clients.
pub async fn check_endpoint(
    state: State<NotificationState>,
    user_id: Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let Json(mut body) = preview_endpoint(state, user_id).await?;
    body["goals"] = json!([]);

    Ok(Json(body))
}

/// A route handler for emailing the current user their alert digest.
///
/// Nothing is sent when there are no alerts. A failed delivery is reported in
/// the response body, not as an error status.
pub async fn send_endpoint(
    State(state): State<NotificationState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let today = local_today(&state.local_timezone)?;

    let (user, alerts) = {
        let connection = lock_connection(&state.db_connection)?;
        let alerts = build_digest(user_id, today, &connection)?;

        if alerts.is_empty() {
            return Ok(Json(
                json!({ "success": true, "sent": false, "message": "No alerts." }),
            ));
        }

        (get_user_by_id(user_id, &connection)?, alerts)
    };

    let sent = state
        .mailer
        .send(state.digest_email(user.email, &alerts))
        .await;

    if !sent {
        tracing::warn!("Alert digest for user {user_id} was not delivered");
    }

    Ok(Json(
        json!({ "success": sent, "sent": sent, "count": alerts.len() }),
    ))
}

/// The query parameters for [run_all_endpoint].
#[derive(Debug, Default, Deserialize)]
pub struct RunAllQuery {
    /// The admin key.
    pub key: Option<String>,
}

/// A route handler that emails every user with alerts their digest.
///
/// Meant to be called by a scheduler. The admin key is read from the `key`
/// query parameter or the `X-API-Key` header.
///
/// # Errors
///
/// Returns a 403 if no admin key is configured or the given key does not match.
pub async fn run_all_endpoint(
    State(state): State<NotificationState>,
    Query(query): Query<RunAllQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, Error> {
    let given_key = query.key.or_else(|| {
        headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned)
    });

    match (&state.admin_api_key, given_key) {
        (Some(expected), Some(given)) if *expected == given => {}
        _ => {
            tracing::warn!("Rejected request to email all users: bad or missing admin key");
            return Err(Error::InvalidApiKey);
        }
    }

    let today = local_today(&state.local_timezone)?;

    let (user_count, outgoing) = {
        let connection = lock_connection(&state.db_connection)?;
        let users = get_all_users(&connection)?;
        let mut outgoing = Vec::new();

        for user in &users {
            let alerts = build_digest(user.id, today, &connection)?;

            if !alerts.is_empty() {
                outgoing.push(state.digest_email(user.email.clone(), &alerts));
            }
        }

        (users.len(), outgoing)
    };

    let mut delivered = 0;

    for email in outgoing {
        if state.mailer.send(email).await {
            delivered += 1;
        }
    }

    tracing::info!("Delivered {delivered} alert digests to {user_count} users");

    Ok(Json(
        json!({ "success": true, "delivered": delivered, "users": user_count }),
    ))
}
