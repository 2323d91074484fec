use std::{fs::OpenOptions, net::SocketAddr, path::PathBuf, process::ExitCode, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use moneymate::{
    AppState, Config, Mailer, build_router, cors_layer, graceful_shutdown, logging_middleware,
};

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let config = Config::parse();

    let connection = match Connection::open(&config.db_path) {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not open database {}: {error}", config.db_path);
            return ExitCode::FAILURE;
        }
    };

    let allowed_origins = config.allowed_origins();
    tracing::info!("CORS allowed origins: {allowed_origins:?}");

    let state = AppState::new(connection, &config, Mailer::from_config(&config));
    let router = build_router(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors_layer(&allowed_origins));
    let router = add_tracing_layer(router);

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let result = match &config.cert_path {
        Some(cert_path) => {
            let tls_config = match RustlsConfig::from_pem_file(
                PathBuf::from(cert_path).join("cert.pem"),
                PathBuf::from(cert_path).join("key.pem"),
            )
            .await
            {
                Ok(tls_config) => tls_config,
                Err(error) => {
                    tracing::error!("Could not open TLS certificates in {cert_path}: {error}");
                    return ExitCode::FAILURE;
                }
            };

            tracing::info!("HTTPS server listening on {}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        }
        None => {
            tracing::info!("HTTP server listening on {}", addr);
            axum_server::bind(addr)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        }
    };

    if let Err(error) = result {
        tracing::error!("Server error: {error}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let debug_log = match OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
    {
        Ok(log_file) => Some(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(Arc::new(log_file)),
        ),
        Err(error) => {
            eprintln!("Could not create log file, logging to stdout only: {error}");
            None
        }
    };

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
