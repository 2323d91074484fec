//! HTTP handlers for creating, listing, editing, deleting, exporting,
//! importing and summarizing transactions.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use time::Date;

use crate::{
    Error, UserID,
    app_state::DatabaseState,
    request::{JsonOrForm, Number, double_option, non_empty},
    timestamp::Timestamp,
    transaction::{
        NewTransaction, TransactionQuery, TransactionType, TransactionUpdate,
        category::{DEFAULT_CATEGORY_KEYWORDS, auto_category},
        core::{create_transaction, delete_transaction, get_transaction, update_transaction},
        csv::{import_transactions_csv, write_transactions_csv},
        query::{page_size, query_transactions},
        summary::summarize_transactions,
    },
};

/// The form data for creating a transaction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionForm {
    /// "income" or "expense".
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// Must be greater than zero.
    pub amount: Option<Number>,
    /// Guessed from the description when empty.
    pub category: Option<String>,
    /// What the transaction was for.
    pub description: Option<String>,
    /// When the transaction happened, defaults to now.
    pub created_at: Option<String>,
}

/// A route handler for creating a new transaction.
///
/// Responds with 201 and the stored transaction.
///
/// # Errors
///
/// Returns a 400 if the type is not "income" or "expense" or the amount is not positive.
pub async fn create_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    JsonOrForm(form): JsonOrForm<TransactionForm>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let invalid = || Error::Validation("Invalid transaction payload".to_owned());

    let transaction_type = form
        .transaction_type
        .as_deref()
        .and_then(TransactionType::parse)
        .ok_or_else(invalid)?;
    let amount = form
        .amount
        .as_ref()
        .and_then(Number::value)
        .filter(|amount| *amount > 0.0)
        .ok_or_else(invalid)?;

    let description = non_empty(form.description.as_deref());
    let category = non_empty(form.category.as_deref()).unwrap_or_else(|| {
        auto_category(
            transaction_type,
            description.as_deref().unwrap_or_default(),
            DEFAULT_CATEGORY_KEYWORDS,
        )
    });
    let created_at = match form.created_at.as_deref().and_then(Timestamp::parse) {
        Some(created_at) => created_at,
        None => state.now()?,
    };

    let transaction = create_transaction(
        user_id,
        NewTransaction {
            transaction_type,
            amount,
            category: Some(category),
            description,
            created_at,
        },
        &*state.connection()?,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "transaction": transaction })),
    ))
}

/// The query parameters for listing transactions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListTransactionsQuery {
    /// Include transactions on or after this date.
    #[serde(alias = "from")]
    pub start_date: Option<String>,
    /// Include transactions on or before this date.
    #[serde(alias = "to")]
    pub end_date: Option<String>,
    /// "income" or "expense", anything else is ignored.
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// Only include this category.
    pub category: Option<String>,
    /// The maximum number of transactions to return.
    pub page_size: Option<String>,
}

/// A route handler for listing the user's transactions, newest first.
///
/// # Errors
///
/// Returns a 400 if a date filter is not a date.
pub async fn list_transactions_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Value>, Error> {
    let filter = TransactionQuery {
        start_date: parse_date_filter("start_date", query.start_date.as_deref())?,
        end_date: parse_date_filter("end_date", query.end_date.as_deref())?,
        transaction_type: query
            .transaction_type
            .as_deref()
            .and_then(TransactionType::parse),
        category: non_empty(query.category.as_deref()),
        limit: Some(page_size(query.page_size.as_deref())),
    };

    let transactions = query_transactions(user_id, &filter, &*state.connection()?)?;

    Ok(Json(
        json!({ "success": true, "transactions": transactions }),
    ))
}

/// The form data for editing a transaction. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EditTransactionForm {
    /// The new type.
    #[serde(rename = "type", deserialize_with = "double_option")]
    pub transaction_type: Option<Option<String>>,
    /// The new amount.
    #[serde(deserialize_with = "double_option")]
    pub amount: Option<Option<Number>>,
    /// The new description, an empty string or `null` clears it.
    #[serde(deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    /// The new category, an empty string or `null` clears it.
    #[serde(deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    /// The new time. Empty values are ignored.
    pub created_at: Option<String>,
}

/// A route handler for editing a transaction.
///
/// When the description changes and no category is given, the category is
/// guessed again from the new description.
///
/// # Errors
///
/// Returns a 400 if a field is invalid or nothing would change, or a 404 if
/// the user has no transaction with the ID.
pub async fn edit_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<i64>,
    JsonOrForm(form): JsonOrForm<EditTransactionForm>,
) -> Result<Json<Value>, Error> {
    let mut update = TransactionUpdate::default();

    if let Some(transaction_type) = form.transaction_type {
        update.transaction_type = Some(
            transaction_type
                .as_deref()
                .and_then(TransactionType::parse)
                .ok_or_else(|| Error::Validation("Invalid type".to_owned()))?,
        );
    }

    if let Some(amount) = form.amount {
        update.amount = Some(
            amount
                .as_ref()
                .and_then(Number::value)
                .filter(|amount| *amount > 0.0)
                .ok_or_else(|| Error::Validation("Invalid amount".to_owned()))?,
        );
    }

    if let Some(created_at) = non_empty(form.created_at.as_deref()) {
        update.created_at = Some(
            Timestamp::parse(&created_at)
                .ok_or_else(|| Error::Validation("created_at must be ISO 8601".to_owned()))?,
        );
    }

    if let Some(category) = form.category {
        update.category = Some(non_empty(category.as_deref()));
    }

    let connection = state.connection()?;

    if let Some(description) = form.description {
        let description = non_empty(description.as_deref());

        if update.category.is_none() {
            let transaction_type = match update.transaction_type {
                Some(transaction_type) => transaction_type,
                None => get_transaction(transaction_id, user_id, &connection)?.transaction_type,
            };

            update.category = Some(Some(auto_category(
                transaction_type,
                description.as_deref().unwrap_or_default(),
                DEFAULT_CATEGORY_KEYWORDS,
            )));
        }

        update.description = Some(description);
    }

    if update.is_empty() {
        return Err(Error::Validation("No changes".to_owned()));
    }

    let transaction = update_transaction(transaction_id, user_id, update, &connection)?;

    Ok(Json(json!({ "success": true, "transaction": transaction })))
}

/// A route handler for deleting a transaction.
///
/// # Errors
///
/// Returns a 404 if the user has no transaction with the ID.
pub async fn delete_transaction_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<i64>,
) -> Result<Json<Value>, Error> {
    delete_transaction(transaction_id, user_id, &*state.connection()?)?;

    Ok(Json(json!({ "success": true })))
}

/// The query parameters for exporting transactions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportQuery {
    /// Include transactions on or after this date.
    pub start_date: Option<String>,
    /// Include transactions on or before this date.
    pub end_date: Option<String>,
}

/// A route handler for downloading the user's transactions as a CSV file, newest first.
///
/// # Errors
///
/// Returns a 400 if a date filter is not a date.
pub async fn export_transactions_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, Error> {
    let start_date = parse_date_filter("start_date", query.start_date.as_deref())?;
    let end_date = parse_date_filter("end_date", query.end_date.as_deref())?;

    let transactions = query_transactions(
        user_id,
        &TransactionQuery {
            start_date,
            end_date,
            ..Default::default()
        },
        &*state.connection()?,
    )?;

    let csv = write_transactions_csv(&transactions)?;

    let file_name = format!(
        "transactions_{}_{}.csv",
        start_date.map_or_else(|| "all".to_owned(), |date| date.to_string()),
        end_date.map_or_else(|| "all".to_owned(), |date| date.to_string()),
    );

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
            (CACHE_CONTROL, "no-store".to_owned()),
        ],
        csv,
    )
        .into_response())
}

/// A route handler for importing transactions from a CSV file.
///
/// The file is read from the multipart field "file", or from the raw body
/// for any other content type.
///
/// # Errors
///
/// Returns a 400 if no file was sent, or the file is not UTF-8 or has no header row.
pub async fn import_transactions_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
    request: Request,
) -> Result<Json<Value>, Error> {
    let data = read_csv_upload(request).await?;

    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::Validation("No CSV uploaded".to_owned()));
    }

    let now = state.now()?;
    let summary = import_transactions_csv(user_id, &data, now, &*state.connection()?)?;

    Ok(Json(json!({
        "success": true,
        "created": summary.created,
        "skipped": summary.skipped,
    })))
}

/// A route handler for the user's totals by type and category, and their
/// daily income and expenses over the last two weeks.
pub async fn transaction_summary_endpoint(
    State(state): State<DatabaseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let today = state.today()?;
    let summary = summarize_transactions(user_id, today, &*state.connection()?)?;

    Ok(Json(json!({
        "success": true,
        "totals": summary.totals,
        "by_category": summary.by_category,
        "daily": summary.daily,
    })))
}

fn parse_date_filter(name: &str, raw: Option<&str>) -> Result<Option<Date>, Error> {
    match non_empty(raw) {
        None => Ok(None),
        Some(raw) => Timestamp::parse(&raw)
            .map(|timestamp| Some(timestamp.date()))
            .ok_or_else(|| Error::Validation(format!("{name} must be a date (YYYY-MM-DD)"))),
    }
}

async fn read_csv_upload(request: Request) -> Result<Bytes, Error> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("multipart/form-data"));

    if !is_multipart {
        return Bytes::from_request(request, &())
            .await
            .map_err(|rejection| Error::Validation(rejection.body_text()));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| Error::Validation(rejection.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::Validation(error.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        if let Some(file_name) = field.file_name() {
            tracing::debug!("Received CSV upload '{file_name}'");
        }

        return field
            .bytes()
            .await
            .map_err(|error| Error::Validation(error.body_text()));
    }

    Err(Error::Validation("No CSV uploaded".to_owned()))
}

#[cfg(test)]
mod tests {
    use axum::http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
    };
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{get_test_server, register_test_user},
    };

    #[track_caller]
    fn transaction_id(body: &Value) -> i64 {
        body["transaction"]["id"].as_i64().unwrap()
    }

    async fn create(server: &TestServer, token: &str, payload: Value) -> Value {
        let response = server
            .post(endpoints::TRANSACTIONS)
            .authorization_bearer(token)
            .json(&payload)
            .await;
        response.assert_status(StatusCode::CREATED);

        response.json()
    }

    #[tokio::test]
    async fn create_guesses_category() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;

        let body = create(
            &server,
            &token,
            json!({
                "type": "Expense",
                "amount": "1,250.50",
                "description": "  Uber to airport ",
                "created_at": "2025-03-04T10:30:00Z",
            }),
        )
        .await;

        assert_eq!(body["success"], true);
        assert_eq!(body["transaction"]["type"], "expense");
        assert_eq!(body["transaction"]["amount"], 1250.5);
        assert_eq!(body["transaction"]["category"], "Transport");
        assert_eq!(body["transaction"]["description"], "Uber to airport");
        assert_eq!(body["transaction"]["created_at"], "2025-03-04 10:30:00");
    }

    #[tokio::test]
    async fn create_accepts_forms_and_aliases() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;

        let response = server
            .post(endpoints::TRANSACTIONS_ADD)
            .authorization_bearer(&token)
            .form(&[("type", "income"), ("amount", "20"), ("description", "")])
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["transaction"]["category"], "Income");
        assert_eq!(body["transaction"]["description"], Value::Null);
    }

    #[tokio::test]
    async fn create_rejects_invalid_payloads() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;

        for payload in [
            json!({"type": "transfer", "amount": 5}),
            json!({"type": "expense", "amount": 0}),
            json!({"type": "expense", "amount": -3}),
            json!({"type": "expense", "amount": "abc"}),
            json!({"type": "expense"}),
        ] {
            let response = server
                .post(endpoints::TRANSACTIONS)
                .authorization_bearer(&token)
                .json(&payload)
                .await;

            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({
                "success": false,
                "message": "Invalid transaction payload",
            }));
        }

        let list: Value = server
            .get(endpoints::TRANSACTIONS)
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(list["transactions"], json!([]));
    }

    #[tokio::test]
    async fn transactions_require_authentication() {
        let (server, _, _) = get_test_server();

        server
            .get(endpoints::TRANSACTIONS)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_filters_and_hides_other_users() {
        let (server, _, _) = get_test_server();
        let alice = register_test_user(&server, "alice@example.com").await;
        let bob = register_test_user(&server, "bob@example.com").await;
        create(
            &server,
            &alice,
            json!({"type": "expense", "amount": 10, "category": "Rent", "created_at": "2025-01-05"}),
        )
        .await;
        create(
            &server,
            &alice,
            json!({"type": "income", "amount": 99, "created_at": "2025-01-10"}),
        )
        .await;
        create(
            &server,
            &bob,
            json!({"type": "expense", "amount": 7, "created_at": "2025-01-06"}),
        )
        .await;

        let body: Value = server
            .get(endpoints::TRANSACTIONS_ALL)
            .authorization_bearer(&alice)
            .add_query_param("from", "2025-01-01")
            .add_query_param("to", "2025-01-31")
            .add_query_param("type", "expense")
            .await
            .json();

        let transactions = body["transactions"].as_array().unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0]["category"], "Rent");
    }

    #[tokio::test]
    async fn edit_rederives_category_from_description() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        let created = create(
            &server,
            &token,
            json!({"type": "expense", "amount": 10, "description": "stuff"}),
        )
        .await;
        let id = transaction_id(&created);

        let response = server
            .patch(&format_endpoint(endpoints::TRANSACTION, id))
            .authorization_bearer(&token)
            .json(&json!({"description": "Netflix", "amount": "12.99"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["transaction"]["category"], "Entertainment");
        assert_eq!(body["transaction"]["amount"], 12.99);
    }

    #[tokio::test]
    async fn edit_keeps_explicit_category() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        let id = transaction_id(
            &create(&server, &token, json!({"type": "expense", "amount": 10})).await,
        );

        let body: Value = server
            .patch(&format_endpoint(endpoints::TRANSACTION, id))
            .authorization_bearer(&token)
            .json(&json!({"description": "Netflix", "category": "Gifts"}))
            .await
            .json();

        assert_eq!(body["transaction"]["category"], "Gifts");
    }

    #[tokio::test]
    async fn edit_rejects_bad_fields() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        let id = transaction_id(
            &create(&server, &token, json!({"type": "expense", "amount": 10})).await,
        );
        let path = format_endpoint(endpoints::TRANSACTION, id);

        for (payload, message) in [
            (json!({"type": "gift"}), "Invalid type"),
            (json!({"amount": 0}), "Invalid amount"),
            (json!({"created_at": "last week"}), "created_at must be ISO 8601"),
            (json!({}), "No changes"),
        ] {
            let response = server
                .patch(&path)
                .authorization_bearer(&token)
                .json(&payload)
                .await;

            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({"success": false, "message": message}));
        }
    }

    #[tokio::test]
    async fn edit_and_delete_other_users_transaction_is_not_found() {
        let (server, _, _) = get_test_server();
        let alice = register_test_user(&server, "alice@example.com").await;
        let bob = register_test_user(&server, "bob@example.com").await;
        let id = transaction_id(
            &create(&server, &alice, json!({"type": "expense", "amount": 10})).await,
        );
        let path = format_endpoint(endpoints::TRANSACTION, id);

        server
            .patch(&path)
            .authorization_bearer(&bob)
            .json(&json!({"amount": 1}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&path)
            .authorization_bearer(&bob)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .delete(&path)
            .authorization_bearer(&alice)
            .await
            .assert_json(&json!({"success": true}));
    }

    #[tokio::test]
    async fn export_sets_download_headers() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        create(
            &server,
            &token,
            json!({"type": "expense", "amount": 4.5, "description": "Coffee", "created_at": "2025-03-04 08:15:00"}),
        )
        .await;

        let response = server
            .get(endpoints::TRANSACTIONS_EXPORT)
            .authorization_bearer(&token)
            .add_query_param("start_date", "2025-03-01")
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header(CONTENT_TYPE),
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            response.header(CONTENT_DISPOSITION),
            "attachment; filename=\"transactions_2025-03-01_all.csv\""
        );
        assert_eq!(response.header(CACHE_CONTROL), "no-store");
        response.assert_text(
            "date,type,amount,category,description\n\
             2025-03-04 08:15:00,expense,4.50,Dining,Coffee\n",
        );
    }

    #[tokio::test]
    async fn import_from_multipart_then_raw_body() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        let csv = "date,type,amount,description\n\
                   2025-03-01 09:00:00,expense,12.50,Pizza\n\
                   2025-03-02 09:00:00,expense,oops,Pizza\n";

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(csv.as_bytes().to_vec())
                .file_name("transactions.csv")
                .mime_type("text/csv"),
        );
        let response = server
            .post(endpoints::TRANSACTIONS_IMPORT)
            .authorization_bearer(&token)
            .multipart(form)
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({"success": true, "created": 1, "skipped": 1}));

        let response = server
            .post(endpoints::TRANSACTIONS_IMPORT)
            .authorization_bearer(&token)
            .text(csv)
            .content_type("text/csv")
            .await;

        response.assert_json(&json!({"success": true, "created": 0, "skipped": 2}));
    }

    #[tokio::test]
    async fn import_without_file_is_bad_request() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;

        let response = server
            .post(endpoints::TRANSACTIONS_IMPORT)
            .authorization_bearer(&token)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({"success": false, "message": "No CSV uploaded"}));
    }

    #[tokio::test]
    async fn summary_has_fourteen_days() {
        let (server, _, _) = get_test_server();
        let token = register_test_user(&server, "alice@example.com").await;
        create(&server, &token, json!({"type": "income", "amount": 100})).await;
        create(&server, &token, json!({"type": "expense", "amount": 40})).await;

        let body: Value = server
            .get(endpoints::TRANSACTIONS_SUMMARY)
            .authorization_bearer(&token)
            .await
            .json();

        assert_eq!(body["totals"], json!({"income": 100.0, "expense": 40.0}));
        let daily = body["daily"].as_array().unwrap();
        assert_eq!(daily.len(), 14);
        assert_eq!(daily[13]["net"], 60.0);
    }
}
