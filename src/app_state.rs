//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::{Date, Duration};

use crate::{
    Config, Error,
    auth::{JwtKeys, PasswordHash},
    db::initialize,
    notification::Mailer,
    timestamp::Timestamp,
    timezone::{local_now, local_today},
};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
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

    /// Sends password reset and alert emails.
    pub mailer: Mailer,

    /// Name used in email subjects and bodies.
    pub app_name: String,

    /// Base URL of the web client, used to build password reset links.
    pub frontend_url: String,

    /// Key required by the endpoint that emails every user. `None` disables that endpoint.
    pub admin_api_key: Option<String>,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will try to initialize the database by adding the tables
    /// for the domain models. A failure is logged and the server carries on
    /// with whatever schema already exists.
    pub fn new(db_connection: Connection, config: &Config, mailer: Mailer) -> Self {
        if let Err(error) = initialize(&db_connection) {
            tracing::error!("Could not initialize the database schema: {error}");
        }

        Self {
            cookie_key: create_cookie_key(&config.secret_key),
            jwt_keys: JwtKeys::new(&config.secret_key),
            token_duration: Duration::hours(config.token_expiry_hours),
            password_hash_cost: PasswordHash::DEFAULT_COST,
            local_timezone: config.local_timezone.clone(),
            mailer,
            app_name: config.app_name.clone(),
            frontend_url: config.frontend_url.trim_end_matches('/').to_owned(),
            admin_api_key: config
                .admin_api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            db_connection: Arc::new(Mutex::new(db_connection)),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}

/// The state needed by handlers that only read and write user data.
#[derive(Debug, Clone)]
pub struct DatabaseState {
    /// The local timezone as a canonical timezone name, e.g. "Asia/Ho_Chi_Minh".
    pub local_timezone: String,
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl DatabaseState {
    /// Lock the database connection.
    ///
    /// # Errors
    ///
    /// Returns [Error::DatabaseLockError] if the lock is poisoned.
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        lock_connection(&self.db_connection)
    }

    /// The current local time.
    pub fn now(&self) -> Result<Timestamp, Error> {
        local_now(&self.local_timezone)
    }

    /// Today's local date.
    pub fn today(&self) -> Result<Date, Error> {
        local_today(&self.local_timezone)
    }
}

impl FromRef<AppState> for DatabaseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Lock `db_connection`, logging and mapping a poisoned lock to [Error::DatabaseLockError].
pub fn lock_connection(
    db_connection: &Mutex<Connection>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}
