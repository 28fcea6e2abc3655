//! User document store.

use std::path::PathBuf;

use tutor_models::{User, UserId};

use crate::atomic::{atomic_write_json, load_all_json, read_json_optional};
use crate::error::{PersistenceError, Result};

/// Stores one JSON document per user:
/// ```text
/// base_path/
/// └── users/
///     ├── 1001.json
///     └── 1002.json
/// ```
pub struct UserStore {
    base_path: PathBuf,
}

impl UserStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn users_dir(&self) -> PathBuf {
        self.base_path.join("users")
    }

    fn user_path(&self, id: UserId) -> PathBuf {
        self.users_dir().join(format!("{}.json", id))
    }

    /// Insert or replace a user.
    pub fn upsert(&self, user: &User) -> Result<()> {
        atomic_write_json(&self.user_path(user.id), user)
    }

    pub fn get(&self, id: UserId) -> Result<Option<User>> {
        read_json_optional(&self.user_path(id))
    }

    /// Like [`get`](Self::get) but missing users are an error.
    pub fn require(&self, id: UserId) -> Result<User> {
        self.get(id)?
            .ok_or_else(|| PersistenceError::not_found("user", id))
    }

    /// All users, ordered by id.
    pub fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = load_all_json(&self.users_dir())?;
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    /// Authenticated members of a lab group.
    pub fn list_group(&self, group: &str) -> Result<Vec<User>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|u| u.authenticated && u.in_group(group))
            .collect())
    }
}
