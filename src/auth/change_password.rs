//! Lets an authenticated user change their password.

use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    Error,
    app_state::lock_connection,
    auth::{
        AuthState, PasswordHash, UserID, ValidatedPassword,
        password::{MIN_PASSWORD_LENGTH, verify_password},
        user::{get_user_by_id, update_password},
    },
    request::JsonOrForm,
};

/// The data submitted to change a password.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordForm {
    /// The password the user currently logs in with.
    pub current_password: String,
    /// The replacement password.
    pub new_password: String,
    /// Must match `new_password` when given.
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
}

/// Handler for changing the authenticated user's password.
///
/// # Errors
///
/// Returns a 400 if the new password is too short, the confirmation does not
/// match or the current password is wrong.
pub async fn change_password(
    State(state): State<AuthState>,
    Extension(user_id): Extension<UserID>,
    JsonOrForm(form): JsonOrForm<ChangePasswordForm>,
) -> Result<Json<Value>, Error> {
    let new_password = ValidatedPassword::new(&form.new_password).map_err(|_| {
        Error::Validation(format!(
            "New password must be at least {MIN_PASSWORD_LENGTH} characters"
        ))
    })?;

    if !form.confirm_password.is_empty() && form.new_password != form.confirm_password {
        return Err(Error::Validation("Passwords do not match".to_owned()));
    }

    let user = match get_user_by_id(user_id, &*lock_connection(&state.db_connection)?) {
        Ok(user) => user,
        Err(Error::NotFound) => return Err(Error::IncorrectPassword),
        Err(error) => return Err(error),
    };

    if !verify_password(&user.password_hash, &form.current_password)? {
        return Err(Error::IncorrectPassword);
    }

    let password_hash = PasswordHash::new(new_password, state.password_hash_cost)?;
    update_password(
        user_id,
        &password_hash,
        &*lock_connection(&state.db_connection)?,
    )?;

    tracing::info!("User {user_id} changed their password");

    Ok(Json(json!({ "success": true, "message": "Password changed" })))
}
