//! Port for optional email notifications.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Best-effort email delivery.
///
/// Failures never roll back task state or notifications; callers log and
/// move on.
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] when delivery fails.
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

/// Errors returned by email implementations.
#[derive(Debug, Clone, Error)]
#[error("email delivery failed: {0}")]
pub struct EmailError(pub Arc<dyn std::error::Error + Send + Sync>);
