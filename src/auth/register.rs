//! Handles user registration requests.

use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use crate::{
    Error,
    app_state::lock_connection,
    auth::{
        AuthResponse, AuthState, PasswordHash, ValidatedPassword,
        cookie::set_session_cookie,
        token::encode_access_token,
        user::{NewUser, create_user, get_user_by_email, normalize_email},
    },
    request::JsonOrForm,
    timezone::local_now,
};

/// The data submitted to create an account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    /// The user's display name.
    #[serde(alias = "fullName", alias = "fullname", alias = "full_name")]
    pub name: String,
    /// The user's email address.
    pub email: String,
    /// The new password.
    pub password: String,
    /// Must match `password` when given.
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
}

/// A registration that passed validation.
struct ValidRegistration {
    name: String,
    email: String,
    password: ValidatedPassword,
}

fn validate_registration(form: RegisterForm) -> Result<ValidRegistration, Error> {
    let name = form.name.trim().to_owned();

    if name.is_empty() {
        return Err(Error::Validation("Name is required".to_owned()));
    }

    let email = normalize_email(&form.email)
        .ok_or_else(|| Error::Validation("Please enter a valid email".to_owned()))?;
    let password = ValidatedPassword::new(&form.password)?;

    if !form.confirm_password.is_empty() && form.password != form.confirm_password {
        return Err(Error::Validation("Passwords do not match".to_owned()));
    }

    Ok(ValidRegistration {
        name,
        email,
        password,
    })
}

/// Handler for registration requests.
///
/// Creates the user, starts a session and returns an access token.
///
/// # Errors
///
/// - 400 if a field is missing or invalid.
/// - 409 if the email is already registered.
pub async fn register_user(
    State(state): State<AuthState>,
    jar: PrivateCookieJar,
    JsonOrForm(form): JsonOrForm<RegisterForm>,
) -> Result<(StatusCode, PrivateCookieJar, Json<AuthResponse>), Error> {
    let registration = validate_registration(form)?;

    {
        let connection = lock_connection(&state.db_connection)?;

        match get_user_by_email(&registration.email, &connection) {
            Ok(_) => return Err(Error::DuplicateEmail),
            Err(Error::NotFound) => {}
            Err(error) => return Err(error),
        }
    }

    let password_hash = PasswordHash::new(registration.password, state.password_hash_cost)?;

    let user = create_user(
        NewUser {
            name: registration.name,
            email: registration.email,
            password_hash,
            created_at: local_now(&state.local_timezone)?,
        },
        &*lock_connection(&state.db_connection)?,
    )?;

    tracing::info!("Registered user {}", user.id);

    let access_token =
        encode_access_token(user.id, &user.email, state.token_duration, &state.jwt_keys)?;
    let jar = set_session_cookie(jar, user.id, state.token_duration)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse::new(access_token, user)),
    ))
}
