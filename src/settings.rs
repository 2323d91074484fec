//! Per-user preferences: currency symbol, budget alert thresholds and the
//! first day of the week.

use axum::{Extension, Json, extract::State};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Error, UserID,
    app_state::DatabaseState,
    request::{Flag, JsonOrForm, Number},
};

const DEFAULT_CURRENCY_SYMBOL: &str = "$";
const MAX_CURRENCY_SYMBOL_CHARS: usize = 3;

/// The fraction of a budget at which a warning is raised, by default.
pub const DEFAULT_WARN_THRESHOLD: f64 = 0.8;
/// The fraction of a budget at which it counts as exceeded, by default.
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 1.0;

const WARN_THRESHOLD_RANGE: (f64, f64) = (0.5, 1.5);
const CRITICAL_THRESHOLD_RANGE: (f64, f64) = (0.6, 2.0);

/// A user's preferences.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSettings {
    /// The user the settings belong to.
    pub user_id: UserID,
    /// Up to three characters shown before amounts.
    pub currency_symbol: String,
    /// See [AlertThresholds::warn].
    pub warn_threshold: f64,
    /// See [AlertThresholds::critical].
    pub critical_threshold: f64,
    /// Whether weeks start on Monday instead of Sunday.
    pub week_starts_monday: bool,
}

/// The fractions of a monthly budget that trigger alerts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Spending at or above this fraction of the limit raises a warning.
    pub warn: f64,
    /// Spending at or above this fraction of the limit means the budget is exceeded.
    pub critical: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warn: DEFAULT_WARN_THRESHOLD,
            critical: DEFAULT_CRITICAL_THRESHOLD,
        }
    }
}

/// Create the user settings table.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_settings_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user_settings (
                user_id INTEGER PRIMARY KEY,
                currency_symbol TEXT NOT NULL DEFAULT '$',
                warn_threshold REAL NOT NULL DEFAULT 0.8,
                critical_threshold REAL NOT NULL DEFAULT 1.0,
                week_starts_monday INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(user_id) REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

/// Get the settings of `user_id`, storing the defaults first if they have none.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_or_create_settings(
    user_id: UserID,
    connection: &Connection,
) -> Result<UserSettings, Error> {
    connection.execute(
        "INSERT OR IGNORE INTO user_settings (user_id) VALUES (?1)",
        [user_id.as_i64()],
    )?;

    connection
        .prepare(
            "SELECT user_id, currency_symbol, warn_threshold, critical_threshold, week_starts_monday
             FROM user_settings WHERE user_id = ?1",
        )?
        .query_row([user_id.as_i64()], map_settings_row)
        .map_err(Error::from)
}

/// The settings that shape a user's budget alerts.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPreferences {
    /// When alerts are raised.
    pub thresholds: AlertThresholds,
    /// Shown before amounts in alert messages.
    pub currency_symbol: String,
}

impl Default for AlertPreferences {
    fn default() -> Self {
        Self {
            thresholds: AlertThresholds::default(),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_owned(),
        }
    }
}

/// Get the alert preferences of `user_id` without storing anything.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn get_alert_preferences(
    user_id: UserID,
    connection: &Connection,
) -> Result<AlertPreferences, Error> {
    let preferences = connection
        .query_row(
            "SELECT warn_threshold, critical_threshold, currency_symbol
             FROM user_settings WHERE user_id = ?1",
            [user_id.as_i64()],
            |row| {
                Ok(AlertPreferences {
                    thresholds: AlertThresholds {
                        warn: row.get(0)?,
                        critical: row.get(1)?,
                    },
                    currency_symbol: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(preferences.unwrap_or_default())
}

/// The requested changes to a user's settings.
///
/// Every field falls back to its default when missing or invalid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsForm {
    /// Trimmed and cut to three characters.
    pub currency_symbol: Option<String>,
    /// Clamped to `[0.5, 1.5]`.
    pub warn_threshold: Option<Number>,
    /// Clamped to `[0.6, 2.0]`.
    pub critical_threshold: Option<Number>,
    /// Whether weeks start on Monday.
    pub week_starts_monday: Option<Flag>,
}

/// Store the settings in `form` for `user_id`, replacing any existing settings.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn save_settings(
    user_id: UserID,
    form: &SettingsForm,
    connection: &Connection,
) -> Result<UserSettings, Error> {
    let currency_symbol: String = form
        .currency_symbol
        .as_deref()
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty())
        .unwrap_or(DEFAULT_CURRENCY_SYMBOL)
        .chars()
        .take(MAX_CURRENCY_SYMBOL_CHARS)
        .collect();
    let warn_threshold = threshold(
        form.warn_threshold.as_ref(),
        DEFAULT_WARN_THRESHOLD,
        WARN_THRESHOLD_RANGE,
    );
    let critical_threshold = threshold(
        form.critical_threshold.as_ref(),
        DEFAULT_CRITICAL_THRESHOLD,
        CRITICAL_THRESHOLD_RANGE,
    );
    let week_starts_monday = form
        .week_starts_monday
        .as_ref()
        .is_some_and(Flag::is_set);

    connection
        .prepare(
            "INSERT INTO user_settings
                (user_id, currency_symbol, warn_threshold, critical_threshold, week_starts_monday)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                currency_symbol = excluded.currency_symbol,
                warn_threshold = excluded.warn_threshold,
                critical_threshold = excluded.critical_threshold,
                week_starts_monday = excluded.week_starts_monday
             RETURNING user_id, currency_symbol, warn_threshold, critical_threshold, week_starts_monday",
        )?
        .query_row(
            (
                user_id.as_i64(),
                currency_symbol,
                warn_threshold,
                critical_threshold,
                week_starts_monday,
            ),
            map_settings_row,
        )
        .map_err(Error::from)
}

// Zero counts as missing.
fn threshold(raw: Option<&Number>, default: f64, (min, max): (f64, f64)) -> f64 {
    raw.and_then(Number::value)
        .filter(|value| *value != 0.0)
        .unwrap_or(default)
        .clamp(min, max)
}

fn map_settings_row(row: &Row) -> Result<UserSettings, rusqlite::Error> {
    Ok(UserSettings {
        user_id: UserID::new(row.get(0)?),
        currency_symbol: row.get(1)?,
        warn_threshold: row.get(2)?,
        critical_threshold: row.get(3)?,
        week_starts_monday: row.get(4)?,
    })
}

/// A route handler for reading the user's settings.
pub async fn get_settings_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let settings = get_or_create_settings(user_id, &*state.connection()?)?;

    Ok(Json(json!({ "success": true, "settings": settings })))
}

/// A route handler for replacing the user's settings.
pub async fn update_settings_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    JsonOrForm(form): JsonOrForm<SettingsForm>,
) -> Result<Json<Value>, Error> {
    let settings = save_settings(user_id, &form, &*state.connection()?)?;

    tracing::debug!("Saved settings for user {user_id}: {settings:?}");

    Ok(Json(json!({ "success": true, "settings": settings })))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{
        endpoints,
        test_utils::{get_test_server, register_test_user},
    };

    #[tokio::test]
    async fn get_creates_defaults() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;

        let response = server
            .get(endpoints::SETTINGS)
            .authorization_bearer(&token)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["settings"]["currency_symbol"], "$");
        assert_eq!(body["settings"]["warn_threshold"], 0.8);
        assert_eq!(body["settings"]["critical_threshold"], 1.0);
        assert_eq!(body["settings"]["week_starts_monday"], false);
    }

    #[tokio::test]
    async fn post_clamps_and_trims() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;

        let body: Value = server
            .post(endpoints::SETTINGS)
            .authorization_bearer(&token)
            .json(&json!({
                "currency_symbol": "  EURO ",
                "warn_threshold": 0.1,
                "critical_threshold": "5",
                "week_starts_monday": true,
            }))
            .await
            .json();

        assert_eq!(body["settings"]["currency_symbol"], "EUR");
        assert_eq!(body["settings"]["warn_threshold"], 0.5);
        assert_eq!(body["settings"]["critical_threshold"], 2.0);
        assert_eq!(body["settings"]["week_starts_monday"], true);
    }

    #[tokio::test]
    async fn post_replaces_previous_settings() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        server
            .post(endpoints::SETTINGS)
            .authorization_bearer(&token)
            .json(&json!({"currency_symbol": "₫", "warn_threshold": 0.9}))
            .await
            .assert_status_ok();

        server
            .post(endpoints::SETTINGS)
            .authorization_bearer(&token)
            .json(&json!({"warn_threshold": "abc"}))
            .await
            .assert_status_ok();

        let body: Value = server
            .get(endpoints::SETTINGS)
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(body["settings"]["currency_symbol"], "$");
        assert_eq!(body["settings"]["warn_threshold"], 0.8);
    }
}
