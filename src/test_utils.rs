#![allow(missing_docs)]

use std::sync::MutexGuard;

use axum_test::TestServer;
use clap::Parser;
use rusqlite::Connection;
use serde_json::{Value, json};
use time::macros::datetime;

use crate::{
    AppState, Config, Mailer, Outbox, PasswordHash,
    app_state::lock_connection,
    auth::NewUser,
    build_router, endpoints,
    timestamp::Timestamp,
};

/// The password of users created with [register_test_user].
pub(crate) const TEST_PASSWORD: &str = "hunter22";
/// The admin key configured in [get_test_app_state].
pub(crate) const TEST_ADMIN_KEY: &str = "admin-key";

/// An app state backed by an in-memory database and mail collector.
pub(crate) fn get_test_app_state() -> (AppState, Outbox) {
    let mut config = Config::try_parse_from(["server", "--secret-key", "test-secret"])
        .expect("Could not parse test config");
    config.app_name = "MoneyMate".to_owned();
    config.local_timezone = "Etc/UTC".to_owned();
    config.admin_api_key = Some(TEST_ADMIN_KEY.to_owned());
    config.frontend_url = "http://localhost:5173".to_owned();

    let connection = Connection::open_in_memory().expect("Could not open database in memory");
    let (mailer, outbox) = Mailer::memory();
    let mut state = AppState::new(connection, &config, mailer);
    // The lowest cost bcrypt allows, hashing at the default cost makes tests slow.
    state.password_hash_cost = 4;

    (state, outbox)
}

/// A user named Alice with a placeholder password hash, for storage tests.
pub(crate) fn new_test_user(email: &str) -> NewUser {
    NewUser {
        name: "Alice".to_owned(),
        email: email.to_owned(),
        password_hash: PasswordHash::new_unchecked("hash"),
        created_at: Timestamp::new(datetime!(2025-01-01 09:00:00)),
    }
}

/// A test server for the full router.
pub(crate) fn get_test_server() -> (TestServer, Outbox, AppState) {
    let (state, outbox) = get_test_app_state();
    let server = TestServer::new(build_router(state.clone()));

    (server, outbox, state)
}

#[track_caller]
pub(crate) fn lock_test_connection(state: &AppState) -> MutexGuard<'_, Connection> {
    lock_connection(&state.db_connection).expect("Could not lock database")
}

/// Register a user named "Test User" and return their access token.
pub(crate) async fn register_test_user(server: &TestServer, email: &str) -> String {
    let response = server
        .post(endpoints::REGISTER)
        .json(&json!({
            "name": "Test User",
            "email": email,
            "password": TEST_PASSWORD,
            "confirm_password": TEST_PASSWORD,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    response.json::<Value>()["access_token"]
        .as_str()
        .expect("Registration did not return an access token")
        .to_owned()
}
