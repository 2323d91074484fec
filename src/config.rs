//! Command line and environment configuration for the server.

use clap::Parser;

/// Origins that are always allowed to make cross-origin requests.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];

/// The REST API server for MoneyMate.
///
/// Every option can also be set with the environment variable shown in its help text.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// File path to the application SQLite database.
    #[arg(long, env = "DATABASE_PATH", default_value = "moneymate.db")]
    pub db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory containing a TLS certificate `cert.pem` and key `key.pem`.
    ///
    /// The server uses plain HTTP when this is not set.
    #[arg(long, env = "CERT_PATH")]
    pub cert_path: Option<String>,

    /// Secret used to sign access tokens and encrypt session cookies.
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// How long access tokens and session cookies stay valid.
    #[arg(long, env = "JWT_EXP_HOURS", default_value_t = 12)]
    pub token_expiry_hours: i64,

    /// Extra origins allowed to make cross-origin requests, separated by commas.
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// The canonical name of the timezone used to decide what "today" is, e.g. "Asia/Ho_Chi_Minh".
    #[arg(long, env = "LOCAL_TIMEZONE", default_value = "Etc/UTC")]
    pub local_timezone: String,

    /// SMTP relay used to send email. Email is only logged when this is not set.
    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// Port of the SMTP relay. The connection is upgraded with STARTTLS.
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    /// Username for the SMTP relay.
    #[arg(long, env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    /// Password for the SMTP relay.
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Sender address for outgoing email. Defaults to the SMTP username.
    #[arg(long, env = "EMAIL_FROM")]
    pub email_from: Option<String>,

    /// Display name for outgoing email. Defaults to the application name.
    #[arg(long, env = "EMAIL_FROM_NAME")]
    pub email_from_name: Option<String>,

    /// Name used in email subjects and bodies.
    #[arg(long, env = "APP_NAME", default_value = "MoneyMate")]
    pub app_name: String,

    /// Base URL of the web client, used to build password reset links.
    #[arg(long, env = "FRONTEND_URL", default_value = "http://127.0.0.1:5000")]
    pub frontend_url: String,

    /// Key required by the endpoint that sends alert emails to every user.
    ///
    /// The endpoint refuses all requests when this is not set.
    #[arg(long, env = "ADMIN_API_KEY", hide_env_values = true)]
    pub admin_api_key: Option<String>,
}

impl Config {
    /// The allowed CORS origins: the defaults plus any configured extras.
    ///
    /// Origins are trimmed, lower-cased, de-duplicated and sorted.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|origin| origin.to_string())
            .chain(
                self.allowed_origins
                    .iter()
                    .map(|origin| origin.trim().to_lowercase())
                    .filter(|origin| !origin.is_empty()),
            )
            .collect();

        origins.sort();
        origins.dedup();

        origins
    }
}
