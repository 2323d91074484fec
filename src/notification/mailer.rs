//! Outgoing email.
//!
//! Mail goes over SMTP with STARTTLS when a relay and credentials are
//! configured, otherwise it is written to the log. Delivery failures are
//! logged and reported as `false`, they never fail the calling request.

use std::sync::{Arc, Mutex};

use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::Config;

/// A plain text email.
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    /// The recipient's address.
    pub to: String,
    /// The subject line.
    pub subject: String,
    /// The plain text body.
    pub body: String,
}

/// Emails collected by [Mailer::Memory].
pub type Outbox = Arc<Mutex<Vec<Email>>>;

/// Sends [Email]s.
#[derive(Clone)]
pub enum Mailer {
    /// Deliver through an SMTP relay.
    Smtp {
        /// The pooled connection to the relay.
        transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
        /// The sender, also used as the reply-to address.
        from: Mailbox,
    },
    /// Log each email instead of sending it.
    Log,
    /// Keep each email in memory.
    Memory(Outbox),
}

impl Mailer {
    /// Build the mailer described by `config`.
    ///
    /// Falls back to [Mailer::Log] when the SMTP host, username or password is
    /// missing, or when the relay settings are invalid.
    pub fn from_config(config: &Config) -> Self {
        let (Some(host), Some(username), Some(password)) = (
            non_blank(config.smtp_host.as_deref()),
            non_blank(config.smtp_username.as_deref()),
            non_blank(config.smtp_password.as_deref()),
        ) else {
            tracing::info!("SMTP is not configured, emails will be logged instead of sent");
            return Mailer::Log;
        };

        let from_address = non_blank(config.email_from.as_deref()).unwrap_or(username);
        let from_name = non_blank(config.email_from_name.as_deref()).unwrap_or(&config.app_name);

        let from = match from_address.parse::<Address>() {
            Ok(address) => Mailbox::new(Some(from_name.to_owned()), address),
            Err(error) => {
                tracing::error!("Invalid sender address \"{from_address}\": {error}");
                return Mailer::Log;
            }
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host) {
            Ok(builder) => builder
                .port(config.smtp_port)
                .credentials(Credentials::new(username.to_owned(), password.to_owned()))
                .build(),
            Err(error) => {
                tracing::error!("Could not set up SMTP relay {host}: {error}");
                return Mailer::Log;
            }
        };

        tracing::info!("Sending email through {host}:{}", config.smtp_port);

        Mailer::Smtp {
            transport: Arc::new(transport),
            from,
        }
    }

    /// A mailer that keeps emails in the returned [Outbox].
    pub fn memory() -> (Self, Outbox) {
        let outbox = Outbox::default();

        (Mailer::Memory(outbox.clone()), outbox)
    }

    /// Send `email`, returning whether it was handed off successfully.
    pub async fn send(&self, email: Email) -> bool {
        match self {
            Mailer::Smtp { transport, from } => send_smtp(transport, from, email).await,
            Mailer::Log => {
                tracing::info!(
                    "--- DEV EMAIL (no SMTP configured) ---\nTo: {}\nSubject: {}\n\n{}\n--- END DEV EMAIL ---",
                    email.to,
                    email.subject,
                    email.body
                );
                true
            }
            Mailer::Memory(outbox) => match outbox.lock() {
                Ok(mut outbox) => {
                    outbox.push(email);
                    true
                }
                Err(error) => {
                    tracing::error!("Could not lock outbox: {error}");
                    false
                }
            },
        }
    }
}

async fn send_smtp(
    transport: &AsyncSmtpTransport<Tokio1Executor>,
    from: &Mailbox,
    email: Email,
) -> bool {
    let to = match email.to.parse::<Mailbox>() {
        Ok(to) => to,
        Err(error) => {
            tracing::error!("Invalid recipient \"{}\": {error}", email.to);
            return false;
        }
    };

    let message = Message::builder()
        .from(from.clone())
        .reply_to(from.clone())
        .to(to)
        .subject(email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.body);

    let message = match message {
        Ok(message) => message,
        Err(error) => {
            tracing::error!("Could not build email to {}: {error}", email.to);
            return false;
        }
    };

    match transport.send(message).await {
        Ok(_) => true,
        Err(error) => {
            tracing::error!("Email send failed: {error}");
            false
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
