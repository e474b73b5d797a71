//! In-memory dead-letter store.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::notification::ports::{DeadLetter, DeadLetterError, DeadLetterResult, DeadLetterStore};

/// Keeps parked deliveries in arrival order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeadLetterStore {
    letters: Arc<Mutex<Vec<DeadLetter>>>,
}

impl InMemoryDeadLetterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(err: impl ToString) -> DeadLetterError {
    DeadLetterError::new(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn park(&self, letter: DeadLetter) -> DeadLetterResult<()> {
        self.letters.lock().map_err(poisoned)?.push(letter);
        Ok(())
    }

    async fn list(&self) -> DeadLetterResult<Vec<DeadLetter>> {
        Ok(self.letters.lock().map_err(poisoned)?.clone())
    }
}
