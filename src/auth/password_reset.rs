//! Password reset by emailed single-use token.
//!
//! Starting a reset never reveals whether an email is registered: the caller
//! always gets a success response.

use std::sync::{Arc, Mutex};

use axum::{Json, extract::FromRef, extract::State};
use rand::{Rng, distributions::Alphanumeric};
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::{Value, json};
use time::Duration;

use crate::{
    AppState, Error,
    app_state::lock_connection,
    auth::{
        PasswordHash, UserID, ValidatedPassword,
        user::{get_user_by_email, normalize_email, update_password},
    },
    notification::{Email, Mailer},
    request::JsonOrForm,
    timestamp::Timestamp,
    timezone::local_now,
};

/// How long a reset token can be used for.
const RESET_TOKEN_DURATION: Duration = Duration::hours(2);
const RESET_TOKEN_LENGTH: usize = 43;

/// The state needed to start and complete password resets.
#[derive(Clone)]
pub struct PasswordResetState {
    /// Sends the reset link.
    pub mailer: Mailer,
    /// Name used in the email subject and body.
    pub app_name: String,
    /// Base URL of the web client, used to build the reset link.
    pub frontend_url: String,
    /// The bcrypt cost used when hashing the new password.
    pub password_hash_cost: u32,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Ho_Chi_Minh".
    pub local_timezone: String,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for PasswordResetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            mailer: state.mailer.clone(),
            app_name: state.app_name.clone(),
            frontend_url: state.frontend_url.clone(),
            password_hash_cost: state.password_hash_cost,
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A stored reset request.
#[derive(Debug, Clone, PartialEq)]
struct PasswordReset {
    id: i64,
    user_id: UserID,
    expires_at: Timestamp,
    used: bool,
}

/// Create the password reset table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_password_reset_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS password_resets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                token TEXT NOT NULL UNIQUE,
                expires_at TEXT NOT NULL,
                used INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Store a reset token for `user_id` that expires [RESET_TOKEN_DURATION]
/// after `created_at`.
fn create_password_reset(
    user_id: UserID,
    token: &str,
    created_at: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO password_resets (user_id, token, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        (
            user_id.as_i64(),
            token,
            created_at + RESET_TOKEN_DURATION,
            created_at,
        ),
    )?;

    Ok(())
}

fn get_password_reset(token: &str, connection: &Connection) -> Result<PasswordReset, Error> {
    connection
        .query_row(
            "SELECT id, user_id, expires_at, used FROM password_resets WHERE token = ?1",
            [token],
            |row| {
                Ok(PasswordReset {
                    id: row.get(0)?,
                    user_id: UserID::new(row.get(1)?),
                    expires_at: row.get(2)?,
                    used: row.get(3)?,
                })
            },
        )
        .optional()?
        .ok_or(Error::InvalidResetToken)
}

/// Replace the password of the user that owns `token` and mark the token used.
///
/// `now` is the current UTC time. Both writes happen in one transaction.
fn reset_password(
    token: &str,
    password_hash: &PasswordHash,
    now: Timestamp,
    connection: &Connection,
) -> Result<UserID, Error> {
    let transaction = connection.unchecked_transaction()?;
    let reset = get_password_reset(token, &transaction)?;

    if reset.used {
        return Err(Error::ResetTokenUsed);
    }

    if now > reset.expires_at {
        return Err(Error::ResetTokenExpired);
    }

    update_password(reset.user_id, password_hash, &transaction)?;
    transaction.execute(
        "UPDATE password_resets SET used = 1 WHERE id = ?1",
        [reset.id],
    )?;
    transaction.commit()?;

    Ok(reset.user_id)
}

fn reset_email(name: &str, link: &str, app_name: &str) -> (String, String) {
    let subject = format!("{app_name} - Reset your password");
    let body = format!(
        "Hello {name},\n\n\
        We received a request to reset your {app_name} password.\n\n\
        Reset link (valid for 2 hours): {link}\n\n\
        If you didn't request this, you can ignore this email."
    );

    (subject, body)
}

/// The data submitted to start a password reset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForgotStartForm {
    /// The email of the account to reset.
    pub email: String,
}

/// Handler that emails a reset link to the account registered with the email, if any.
///
/// Always responds with success.
pub async fn start_password_reset(
    State(state): State<PasswordResetState>,
    form: Result<JsonOrForm<ForgotStartForm>, Error>,
) -> Json<Value> {
    let raw_email = form.map(|JsonOrForm(form)| form.email).unwrap_or_default();

    if let Err(error) = send_reset_link(&state, &raw_email).await {
        tracing::error!("Could not start password reset: {error}");
    }

    Json(json!({ "success": true }))
}

async fn send_reset_link(state: &PasswordResetState, raw_email: &str) -> Result<(), Error> {
    let Some(email) = normalize_email(raw_email) else {
        return Ok(());
    };

    let token = generate_reset_token();

    let user = {
        let connection = lock_connection(&state.db_connection)?;

        let user = match get_user_by_email(&email, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Ok(()),
            Err(error) => return Err(error),
        };

        create_password_reset(
            user.id,
            &token,
            local_now(&state.local_timezone)?,
            &connection,
        )?;

        user
    };

    let link = format!("{}/reset.html?token={token}", state.frontend_url);
    let (subject, body) = reset_email(&user.name, &link, &state.app_name);

    if !state
        .mailer
        .send(Email {
            to: email,
            subject,
            body,
        })
        .await
    {
        tracing::warn!("Reset email for user {} was not delivered", user.id);
    }

    Ok(())
}

/// The data submitted to finish a password reset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForgotCompleteForm {
    /// The token from the reset link.
    pub token: String,
    /// The replacement password.
    pub new_password: String,
    /// Must match `new_password` when given.
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
}

/// Handler that sets a new password using a reset token.
///
/// # Errors
///
/// Returns a 400 if the data is invalid or the token is unknown, used or expired.
pub async fn complete_password_reset(
    State(state): State<PasswordResetState>,
    JsonOrForm(form): JsonOrForm<ForgotCompleteForm>,
) -> Result<Json<Value>, Error> {
    let token = form.token.trim();

    let new_password = match ValidatedPassword::new(&form.new_password) {
        Ok(password) if !token.is_empty() => password,
        _ => return Err(Error::Validation("Invalid data".to_owned())),
    };

    if !form.confirm_password.is_empty() && form.new_password != form.confirm_password {
        return Err(Error::Validation("Passwords do not match".to_owned()));
    }

    // Fail fast on bad tokens before paying for the hash.
    {
        let connection = lock_connection(&state.db_connection)?;
        let reset = get_password_reset(token, &connection)?;

        if reset.used {
            return Err(Error::ResetTokenUsed);
        }
    }

    let password_hash = PasswordHash::new(new_password, state.password_hash_cost)?;
    let user_id = reset_password(
        token,
        &password_hash,
        local_now(&state.local_timezone)?,
        &*lock_connection(&state.db_connection)?,
    )?;

    tracing::info!("User {user_id} reset their password");

    Ok(Json(
        json!({ "success": true, "message": "Password reset successful" }),
    ))
}
