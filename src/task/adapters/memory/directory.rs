//! In-memory user and department directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{DepartmentId, User, UserId},
    ports::{DirectoryError, DirectoryPort, DirectoryResult},
};

/// Thread-safe in-memory directory seeded by tests and the daemon.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: HashMap<UserId, User>,
    heads: HashMap<DepartmentId, UserId>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub fn add_user(&self, user: User) {
        if let Ok(mut state) = self.state.write() {
            state.users.insert(user.id, user);
        }
    }

    /// Sets the head of a department.
    pub fn set_head(&self, department: DepartmentId, head: UserId) {
        if let Ok(mut state) = self.state.write() {
            state.heads.insert(department, head);
        }
    }
}

fn poisoned(err: impl ToString) -> DirectoryError {
    DirectoryError::unavailable(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl DirectoryPort for InMemoryDirectory {
    async fn find_user(&self, id: UserId) -> DirectoryResult<Option<User>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.users.get(&id).cloned())
    }

    async fn head_of_department(
        &self,
        department: DepartmentId,
    ) -> DirectoryResult<Option<UserId>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.heads.get(&department).copied())
    }
}
