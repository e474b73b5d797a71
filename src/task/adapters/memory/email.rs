//! In-memory email notifier that records outgoing messages.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::task::ports::{EmailError, EmailMessage, EmailNotifier};

/// Records every message instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmailNotifier {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl RecordingEmailNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EmailNotifier for RecordingEmailNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|err| EmailError(Arc::new(std::io::Error::other(err.to_string()))))?;
        sent.push(message);
        Ok(())
    }
}
