//! Mail Dispatch Infrastructure
//!
//! Transport-level mail sending. Message composition (subjects, bodies,
//! links) belongs to the domain crates; this module only moves a
//! finished message to a provider.

use thiserror::Error;

/// A composed mail message ready for dispatch
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub text_body: String,
}

/// Mail dispatch errors
#[derive(Debug, Error)]
pub enum MailError {
    /// Could not reach the provider
    #[error("Mail provider request failed: {0}")]
    Transport(String),

    /// Provider reached, message refused
    #[error("Mail provider rejected the message: {0}")]
    Rejected(String),
}

/// Trait for mail transport backends
#[trait_variant::make(Mailer: Send)]
pub trait LocalMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

// ============================================================================
// Log Mailer (development)
// ============================================================================

/// Mailer that writes messages to the log instead of sending them
///
/// Used in development and tests where no provider is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Mail dispatched to log sink"
        );
        tracing::debug!(body = %message.text_body, "Mail body");

        Ok(())
    }
}

// ============================================================================
// HTTP Mailer (production)
// ============================================================================

/// Mailer backed by an HTTP JSON mail provider API
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
    from_address: String,
    from_name: String,
}

impl HttpMailer {
    pub fn new(
        api_url: impl Into<String>,
        api_token: impl Into<String>,
        from_address: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_token: api_token.into(),
            from_address: from_address.into(),
            from_name: from_name.into(),
        }
    }
}

impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let payload = serde_json::json!({
            "from": { "email": self.from_address, "name": self.from_name },
            "to": [{ "email": message.to, "name": message.to_name }],
            "subject": message.subject,
            "text": message.text_body,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Mail provider rejected message");
            return Err(MailError::Rejected(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}

// ============================================================================
// Runtime Selection
// ============================================================================

/// Mailer backend selected at startup from configuration
#[derive(Debug, Clone)]
pub enum AnyMailer {
    Log(LogMailer),
    Http(HttpMailer),
}

impl Mailer for AnyMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        // Qualified calls: inside this module both the Send-bounded trait
        // and its generated local variant apply to the backends.
        match self {
            AnyMailer::Log(mailer) => Mailer::send(mailer, message).await,
            AnyMailer::Http(mailer) => Mailer::send(mailer, message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mailer = LogMailer;
        let message = MailMessage {
            to: "client@example.com".to_string(),
            to_name: "Test Client".to_string(),
            subject: "Hello".to_string(),
            text_body: "Body".to_string(),
        };

        assert!(Mailer::send(&mailer, &message).await.is_ok());
    }

    #[tokio::test]
    async fn test_any_mailer_delegates_to_log() {
        let mailer = AnyMailer::Log(LogMailer);
        let message = MailMessage {
            to: "client@example.com".to_string(),
            to_name: "Test Client".to_string(),
            subject: "Hello".to_string(),
            text_body: "Body".to_string(),
        };

        assert!(Mailer::send(&mailer, &message).await.is_ok());
    }
}
