//! User records and the identity lookups the authentication core relies on.
//!
//! # Usage
//!
//! ```
//! use warden_storage::{MemoryUserStore, UserRecord, UserStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryUserStore::new();
//! let user = UserRecord::builder()
//!     .name("Ada")
//!     .email("ada@example.com")
//!     .roles(vec!["USER".to_owned()])
//!     .password_hash("$argon2id$...")
//!     .build();
//! store.insert(user.clone())?;
//!
//! let found = store.query_by_email("ada@example.com").await?;
//! assert_eq!(found.map(|u| u.id), Some(user.id));
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    error::{StorageError, StorageResult},
    types::UserId,
};

/// A stored user.
///
/// Roles are kept as the strings the backend stores. The authentication core
/// parses them and treats an unknown role as corrupt data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct UserRecord {
    /// Identifier; also the owner id of the user resource itself.
    #[builder(default = UserId::new_v4())]
    pub id: UserId,

    /// Display name.
    #[builder(into)]
    pub name: String,

    /// Login address. Unique across the store.
    #[builder(into)]
    pub email: String,

    /// Role names, e.g. `"ADMIN"`, `"USER"`.
    #[builder(default)]
    pub roles: Vec<String>,

    /// Salted password hash in PHC string format.
    #[builder(into)]
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Disabled users cannot authenticate.
    #[builder(default = true)]
    pub enabled: bool,
}

/// Identity lookups over stored users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Looks up a user by login address. `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend fails.
    async fn query_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>>;

    /// Looks up a user by id. `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend fails.
    async fn query_by_id(&self, id: UserId) -> StorageResult<Option<UserRecord>>;
}

/// In-memory [`UserStore`] for tests and development.
///
/// Cloning shares the underlying map.
#[derive(Debug, Default, Clone)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, UserRecord>>>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the id or email is already taken.
    pub fn insert(&self, user: UserRecord) -> StorageResult<()> {
        let mut users = self.users.write();
        if users.contains_key(&user.id) {
            return Err(StorageError::internal(format!("user {} already exists", user.id)));
        }
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StorageError::internal("email already registered"));
        }
        users.insert(user.id, user);
        Ok(())
    }

    /// Replaces an existing user or inserts a new one.
    pub fn upsert(&self, user: UserRecord) {
        self.users.write().insert(user.id, user);
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Returns `true` if no users are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn query_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>> {
        Ok(self.users.read().values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn query_by_id(&self, id: UserId) -> StorageResult<Option<UserRecord>> {
        Ok(self.users.read().get(&id).cloned())
    }
}
