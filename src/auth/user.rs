//! Code for creating the user table and fetching users from the database.

use std::{fmt::Display, str::FromStr};

use email_address::EmailAddress;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, auth::PasswordHash, timestamp::Timestamp};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user of the application.
///
/// Only the ID, name and email are sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's display name.
    pub name: String,
    /// The user's email address, lower-cased.
    pub email: String,
    /// The user's password hash.
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    /// When the account was created.
    #[serde(skip_serializing)]
    pub created_at: Timestamp,
}

/// The data needed to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// The user's display name.
    pub name: String,
    /// A normalized email, see [normalize_email].
    pub email: String,
    /// The hashed password.
    pub password_hash: PasswordHash,
    /// When the account is created, in local time.
    pub created_at: Timestamp,
}

/// Trim and lower-case `raw_email`, returning `None` if it is not a usable address.
///
/// A usable address has a single `@`, no whitespace, a non-empty local part and
/// a domain containing a dot.
pub fn normalize_email(raw_email: &str) -> Option<String> {
    let email = raw_email.trim().to_lowercase();

    if email.chars().any(char::is_whitespace) || email.matches('@').count() != 1 {
        return None;
    }

    let parsed = EmailAddress::from_str(&email).ok()?;
    let domain = parsed.domain();

    if parsed.local_part().is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return None;
    }

    Some(email)
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a [Error::DuplicateEmail] if the email is already registered,
/// or [Error::SqlError] if another SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "INSERT INTO users (name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)
            RETURNING id, name, email, password_hash, created_at",
        )?
        .query_row(
            (
                &new_user.name,
                &new_user.email,
                new_user.password_hash.as_ref(),
                new_user.created_at,
            ),
            map_user_row,
        )
        .map_err(|error| error.into())
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE id = :id",
        )?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `email`, which should already be normalized.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has that email.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = :email",
        )?
        .query_row(&[(":email", &email)], map_user_row)
        .map_err(|error| error.into())
}

/// Get every registered user, oldest first.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_all_users(connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare("SELECT id, name, email, password_hash, created_at FROM users ORDER BY id")?
        .query_map([], map_user_row)?
        .map(|maybe_user| maybe_user.map_err(Error::from))
        .collect()
}

/// Replace the password hash of `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(3)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        created_at: row.get(4)?,
    })
}
