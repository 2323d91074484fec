//! Defines functions for handling user sessions with a private cookie.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{UserID, token::SessionToken},
};

pub(crate) const COOKIE_SESSION: &str = "session";

/// Add a session cookie to the cookie jar, indicating that a user is logged in and authenticated.
///
/// The session expires `duration` from now.
///
/// # Errors
///
/// Returns an [Error::TokenCreationError] if the session token could not be serialized.
pub(crate) fn set_session_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> Result<PrivateCookieJar, Error> {
    let expires_at = OffsetDateTime::now_utc() + duration;
    let token = SessionToken {
        user_id,
        expires_at,
    };
    let token_string = serde_json::to_string(&token)
        .map_err(|error| Error::TokenCreationError(error.to_string()))?;

    Ok(jar.add(
        Cookie::build((COOKIE_SESSION, token_string))
            .path("/")
            .expires(expires_at)
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(true),
    ))
}

/// Set the session cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION, "deleted"))
            .path("/")
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(true),
    )
}

/// Get the user ID from a session cookie that has not expired.
pub(crate) fn get_user_id_from_session(jar: &PrivateCookieJar) -> Option<UserID> {
    let cookie = jar.get(COOKIE_SESSION)?;
    let token: SessionToken = serde_json::from_str(cookie.value_trimmed()).ok()?;

    (token.expires_at > OffsetDateTime::now_utc()).then_some(token.user_id)
}
