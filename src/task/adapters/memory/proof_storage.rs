//! In-memory proof storage that hands out `memory://` locators.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::task::{
    domain::{ProofFile, StoredProof},
    ports::{ProofStorage, ProofStorageError},
};

/// Keeps uploaded proof files in memory, keyed by their locator.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProofStorage {
    files: Arc<RwLock<HashMap<String, ProofFile>>>,
}

impl InMemoryProofStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the file stored under `url`.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<ProofFile> {
        self.files
            .read()
            .ok()
            .and_then(|files| files.get(url).cloned())
    }

    /// Returns how many files are stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().map_or(0, |files| files.len())
    }

    /// Returns `true` when no file is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unavailable(err: impl ToString) -> ProofStorageError {
    ProofStorageError::Unavailable(Arc::new(std::io::Error::other(err.to_string())))
}

/// Derives a short file-type tag from the MIME type, falling back to the
/// file extension.
fn file_type_tag(file: &ProofFile) -> String {
    let from_mime = file
        .content_type
        .split('/')
        .nth(1)
        .filter(|subtype| !subtype.is_empty());
    let from_name = file.file_name.rsplit_once('.').map(|(_, ext)| ext);
    from_mime
        .or(from_name)
        .unwrap_or("bin")
        .to_ascii_lowercase()
}

#[async_trait]
impl ProofStorage for InMemoryProofStorage {
    async fn store(&self, file: &ProofFile) -> Result<StoredProof, ProofStorageError> {
        if file.bytes.is_empty() {
            return Err(ProofStorageError::Rejected {
                file_name: file.file_name.clone(),
                reason: "file is empty".to_owned(),
            });
        }
        let url = format!("memory://proofs/{}/{}", Uuid::new_v4(), file.file_name);
        let mut files = self.files.write().map_err(unavailable)?;
        files.insert(url.clone(), file.clone());
        Ok(StoredProof {
            url,
            file_type: file_type_tag(file),
        })
    }

    async fn discard(&self, url: &str) -> Result<(), ProofStorageError> {
        let mut files = self.files.write().map_err(unavailable)?;
        files.remove(url);
        Ok(())
    }
}
