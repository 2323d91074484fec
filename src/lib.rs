//! MoneyMate is a personal finance tracker.
//!
//! This library provides a JSON REST API for recording income and expenses,
//! setting monthly category budgets, tracking savings goals and receiving
//! budget and goal alerts by email.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
mod auth;
mod budget;
mod config;
mod db;
mod endpoints;
mod goal;
mod insights;
mod logging;
mod notification;
mod request;
mod routing;
mod settings;
mod timestamp;
mod timezone;
mod transaction;

#[cfg(test)]
mod test_utils;

pub use app_state::{AppState, create_cookie_key};
pub use auth::{PasswordHash, User, UserID, ValidatedPassword};
pub use config::Config;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use notification::{Email, Mailer, Outbox};
pub use routing::{build_router, cors_layer};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request was missing a field or a field had an invalid value.
    ///
    /// The string is shown to the client as is.
    #[error("{0}")]
    Validation(String),

    /// The email and password combination did not match a registered user.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The request did not carry a valid session cookie or bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// The current password given when changing passwords was wrong.
    #[error("Current password is incorrect")]
    IncorrectPassword,

    /// The email address is already registered to another user.
    #[error("Email already registered")]
    DuplicateEmail,

    /// The user already has a budget for the category.
    #[error("A budget for \"{0}\" already exists")]
    DuplicateBudgetCategory(String),

    /// The password reset token does not exist.
    #[error("Invalid token")]
    InvalidResetToken,

    /// The password reset token has already been used.
    #[error("Token already used")]
    ResetTokenUsed,

    /// The password reset token is past its expiry time.
    #[error("Token expired")]
    ResetTokenExpired,

    /// The admin key was missing, wrong or not configured.
    #[error("Forbidden")]
    InvalidApiKey,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("Not found")]
    NotFound,

    /// The goal being contributed to does not exist or belongs to another user.
    #[error("Goal not found")]
    GoalNotFound,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An access token could not be created.
    #[error("could not create access token: {0}")]
    TokenCreationError(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The transactions could not be written as CSV.
    #[error("could not write CSV: {0}")]
    CsvError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("users.email") =>
            {
                Error::DuplicateEmail
            }
            // The category is filled in by callers that know it.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("budgets.category") =>
            {
                Error::DuplicateBudgetCategory(String::new())
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::IncorrectPassword => StatusCode::BAD_REQUEST,
            Error::InvalidResetToken | Error::ResetTokenUsed | Error::ResetTokenExpired => {
                StatusCode::BAD_REQUEST
            }
            Error::InvalidCredentials | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::InvalidApiKey => StatusCode::FORBIDDEN,
            Error::NotFound | Error::GoalNotFound => StatusCode::NOT_FOUND,
            Error::DuplicateEmail | Error::DuplicateBudgetCategory(_) => StatusCode::CONFLICT,
            Error::HashingError(_)
            | Error::TokenCreationError(_)
            | Error::InvalidTimezoneError(_)
            | Error::CsvError(_)
            | Error::DatabaseLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal details are only for the server logs.
            tracing::error!("An unexpected error occurred: {}", self);
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use serde_json::Value;

    use crate::Error;

    async fn body_json(error: Error) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_shows_message() {
        let (status, body) = body_json(Error::Validation("Amount must be > 0".to_owned())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Amount must be > 0");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_json(Error::HashingError("bad salt".to_owned())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn conflicts_map_to_409() {
        let (status, _) = body_json(Error::DuplicateEmail).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = body_json(Error::DuplicateBudgetCategory("Rent".to_owned())).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn unique_violations_map_to_conflicts() {
        let connection = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::initialize(&connection).unwrap();
        let insert_user = "INSERT INTO users (name, email, password_hash, created_at)
             VALUES ('Alice', 'alice@example.com', 'hash', '2025-01-01 00:00:00')";
        let insert_budget = "INSERT INTO budgets (user_id, category, monthly_limit, created_at)
             VALUES (1, 'Rent', 100, '2025-01-01 00:00:00')";
        connection.execute(insert_user, ()).unwrap();
        connection.execute(insert_budget, ()).unwrap();

        let duplicate_user = connection.execute(insert_user, ()).unwrap_err();
        let duplicate_budget = connection.execute(insert_budget, ()).unwrap_err();

        assert_eq!(Error::from(duplicate_user), Error::DuplicateEmail);
        assert_eq!(
            Error::from(duplicate_budget),
            Error::DuplicateBudgetCategory(String::new())
        );
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
