//! Budget and goal alerts, and the email that delivers them.

mod digest;
mod endpoints;
mod mailer;

pub use digest::build_digest;
pub use endpoints::{check_endpoint, preview_endpoint, run_all_endpoint, send_endpoint};
pub use mailer::{Email, Mailer, Outbox};
