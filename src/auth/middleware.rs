//! Authentication middleware that accepts a session cookie or a bearer token.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    extract::{PrivateCookieJar, cookie::Key},
    headers::{Authorization, authorization::Bearer},
};
use rusqlite::Connection;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{
        UserID,
        cookie::get_user_id_from_session,
        token::{JwtKeys, decode_access_token},
    },
};

/// The state needed to authenticate requests and issue credentials.
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The keys used to sign and verify access tokens.
    pub jwt_keys: JwtKeys,
    /// How long access tokens and session cookies are valid for.
    pub token_duration: Duration,
    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Ho_Chi_Minh".
    pub local_timezone: String,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            jwt_keys: state.jwt_keys.clone(),
            token_duration: state.token_duration,
            password_hash_cost: state.password_hash_cost,
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Middleware function that checks for a valid session cookie or bearer token.
///
/// The session cookie is checked first, then the `Authorization: Bearer` header.
/// The user ID is placed into the request and the request executed normally if
/// either is valid, otherwise a 401 JSON response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>` to receive the user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let Some(user_id) = authenticate(&mut parts, &state).await else {
        return Error::Unauthorized.into_response();
    };

    parts.extensions.insert(user_id);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}

async fn authenticate(parts: &mut Parts, state: &AuthState) -> Option<UserID> {
    match PrivateCookieJar::<Key>::from_request_parts(parts, state).await {
        Ok(jar) => {
            if let Some(user_id) = get_user_id_from_session(&jar) {
                return Some(user_id);
            }
        }
        Err(error) => tracing::error!("Error getting cookie jar: {error:?}"),
    }

    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok()?;

    decode_access_token(bearer.token(), &state.jwt_keys).ok()
}
