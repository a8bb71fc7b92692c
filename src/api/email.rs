//! Outbound mail abstraction.
//!
//! Token flows hand a message to an `EmailSender` and carry on; delivery
//! failures are logged by the caller and never change the HTTP response.
//! The default sender for local dev is `LogEmailSender`, which logs the
//! recipient and template and returns `Ok(())`.

use anyhow::Result;
use serde_json::Value;
use tracing::info;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload: Value,
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender. The payload carries token plaintexts, so it is not logged.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            "email send stub"
        );
        Ok(())
    }
}
