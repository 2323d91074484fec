//! User accounts, password hashing, sessions and bearer tokens.
//!
//! A request is authenticated by either a private session cookie or an
//! `Authorization: Bearer` access token, checked in that order by
//! [auth_guard]. Route handlers receive the user with
//! `Extension(user_id): Extension<UserID>`.

mod change_password;
mod cookie;
mod log_in;
mod middleware;
mod password;
mod password_reset;
mod register;
mod token;
mod user;

pub use change_password::change_password;
pub use log_in::{get_current_user, log_in, log_out};
pub use middleware::{AuthState, auth_guard};
pub use password::{PasswordHash, ValidatedPassword};
pub use password_reset::{
    complete_password_reset, create_password_reset_table, start_password_reset,
};
pub use register::register_user;
pub use token::JwtKeys;
pub use user::{User, UserID, create_user_table, get_all_users, get_user_by_id};

#[cfg(test)]
pub use token::encode_access_token;
#[cfg(test)]
pub use user::{NewUser, create_user};

use serde::Serialize;

/// The body returned after registering or logging in.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    success: bool,
    access_token: String,
    user: User,
}

impl AuthResponse {
    fn new(access_token: String, user: User) -> Self {
        Self {
            success: true,
            access_token,
            user,
        }
    }
}
