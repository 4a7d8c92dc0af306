//! Email notification delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send plain-text
//! "account created" / "account updated" emails. Configuration is loaded from
//! environment variables; if `SMTP_HOST` is not set, [`EmailConfig::from_env`]
//! returns `None` and notifications are only logged.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::event::{UserEvent, TOPIC_USER_CREATED};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@roster.local";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set.
    ///
    /// | Variable        | Required | Default                 |
    /// |-----------------|----------|-------------------------|
    /// | `SMTP_HOST`     | yes      | --                      |
    /// | `SMTP_PORT`     | no       | `587`                   |
    /// | `SMTP_FROM`     | no       | `noreply@roster.local`  |
    /// | `SMTP_USER`     | no       | --                      |
    /// | `SMTP_PASSWORD` | no       | --                      |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends notification emails for user events via SMTP.
pub struct EmailDelivery {
    from_address: String,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDelivery {
    /// Build the SMTP transport for `config`. No connection is opened yet.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (config.smtp_user, config.smtp_password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            from_address: config.from_address,
            mailer: builder.build(),
        })
    }

    /// Send the notification email for `event` published on `topic`.
    pub async fn deliver(
        &self,
        to_email: &str,
        topic: &str,
        event: &UserEvent,
    ) -> Result<(), EmailError> {
        let (subject, body) = compose(topic, event);

        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.mailer.send(email).await?;

        tracing::info!(to = to_email, topic, user_id = %event.id, "Notification email sent");
        Ok(())
    }
}

/// Subject and plain-text body for a user notification.
fn compose(topic: &str, event: &UserEvent) -> (String, String) {
    let name = event.display_name();
    if topic == TOPIC_USER_CREATED {
        (
            "Welcome to Roster".to_string(),
            format!(
                "Hello {name},\n\nYour account has been created.\nAccount id: {}",
                event.id
            ),
        )
    } else {
        (
            "Your Roster account was updated".to_string(),
            format!(
                "Hello {name},\n\nYour account details have been updated.\nAccount id: {}",
                event.id
            ),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
