//! Proof artefacts attached to requests.

use super::{ProofId, TaskId, TaskRequestId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// File handed to the proof storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofFile {
    /// Original file name.
    pub file_name: String,
    /// MIME type reported by the uploader.
    pub content_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl ProofFile {
    /// Creates a proof file.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Stable locator returned by the proof storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProof {
    /// External URL of the stored file.
    pub url: String,
    /// File-type tag assigned by storage.
    pub file_type: String,
}

/// Immutable record of an uploaded proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    id: ProofId,
    task_id: TaskId,
    request_id: TaskRequestId,
    url: String,
    file_type: String,
    uploaded_by: UserId,
    uploaded_at: DateTime<Utc>,
}

impl Proof {
    /// Records a stored proof for a request.
    #[must_use]
    pub fn new(
        id: ProofId,
        request_id: TaskRequestId,
        task_id: TaskId,
        stored: StoredProof,
        uploaded_by: UserId,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id,
            task_id,
            request_id,
            url: stored.url,
            file_type: stored.file_type,
            uploaded_by,
            uploaded_at: clock.utc(),
        }
    }

    /// Returns the proof identifier.
    #[must_use]
    pub const fn id(&self) -> ProofId {
        self.id
    }

    /// Returns the owning task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the request the proof supports.
    #[must_use]
    pub const fn request_id(&self) -> TaskRequestId {
        self.request_id
    }

    /// Returns the external file locator.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the file-type tag.
    #[must_use]
    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// Returns the uploading user.
    #[must_use]
    pub const fn uploaded_by(&self) -> UserId {
        self.uploaded_by
    }

    /// Returns the upload timestamp.
    #[must_use]
    pub const fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }
}
