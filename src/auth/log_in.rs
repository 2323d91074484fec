//! This file defines the routes for logging in, logging out and fetching the current user.
//! The auth module handles the lower level session and token logic.

use axum::{Extension, Json, extract::State};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    Error,
    app_state::lock_connection,
    auth::{
        AuthResponse, AuthState, UserID,
        cookie::{invalidate_session_cookie, set_session_cookie},
        password::verify_password,
        token::encode_access_token,
        user::{get_user_by_email, get_user_by_id, normalize_email},
    },
    request::JsonOrForm,
};

/// The raw data entered by the user in the log-in form.
///
/// The password is stored as a plain string. There is no need for validation here since
/// it will be compared against the password in the database, which has been verified.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogInForm {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Handler for log-in requests.
///
/// On success a session cookie is set and an access token is returned.
///
/// # Errors
///
/// - 400 if the email is malformed or the password is empty.
/// - 401 if the email is not registered or the password is wrong.
pub async fn log_in(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    JsonOrForm(form): JsonOrForm<LogInForm>,
) -> Result<(PrivateCookieJar, Json<AuthResponse>), Error> {
    let email = normalize_email(&form.email)
        .filter(|_| !form.password.is_empty())
        .ok_or_else(|| Error::Validation("Invalid email or password".to_owned()))?;

    let user = match get_user_by_email(&email, &*lock_connection(&state.db_connection)?) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    if !verify_password(&user.password_hash, &form.password)? {
        return Err(Error::InvalidCredentials);
    }

    let access_token =
        encode_access_token(user.id, &user.email, state.token_duration, &state.jwt_keys)?;
    let jar = set_session_cookie(jar, user.id, state.token_duration)?;

    Ok((jar, Json(AuthResponse::new(access_token, user))))
}

/// Handler for log-out requests.
///
/// Clears the session cookie. Access tokens stay valid until they expire.
pub async fn log_out(jar: PrivateCookieJar) -> (PrivateCookieJar, Json<Value>) {
    (invalidate_session_cookie(jar), Json(json!({ "success": true })))
}

/// Handler that returns the authenticated user.
///
/// # Errors
///
/// Returns a 401 if the user no longer exists.
pub async fn get_current_user(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let user = match get_user_by_id(user_id, &*lock_connection(&state.db_connection)?) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::Unauthorized),
        Err(error) => return Err(error),
    };

    Ok(Json(json!({ "success": true, "data": user })))
}
