//! Owned resources: products and homes.
//!
//! Only the query-by-id contract is needed by the authorization layer. Each
//! record carries the id of the user that owns it.

use std::{collections::HashMap, hash::Hash, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    error::StorageResult,
    types::{HomeId, ProductId, UserId},
};

/// A product listed by a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct ProductRecord {
    /// Identifier.
    #[builder(default = ProductId::new_v4())]
    pub id: ProductId,
    /// Owning user.
    pub user_id: UserId,
    /// Display name.
    #[builder(into)]
    pub name: String,
    /// Unit cost in the smallest currency unit.
    #[builder(default)]
    pub cost: i64,
    /// Units in stock.
    #[builder(default)]
    pub quantity: i64,
}

/// Postal address of a home.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street line.
    pub address1: String,
    /// Optional second line.
    #[serde(default)]
    pub address2: String,
    /// Postal code.
    pub zip_code: String,
    /// City.
    pub city: String,
    /// State or region.
    pub state: String,
    /// ISO country code.
    pub country: String,
}

/// A home registered by a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct HomeRecord {
    /// Identifier.
    #[builder(default = HomeId::new_v4())]
    pub id: HomeId,
    /// Owning user.
    pub user_id: UserId,
    /// Free-form kind, e.g. `"SINGLE FAMILY"`.
    #[builder(into)]
    pub kind: String,
    /// Postal address.
    #[builder(default)]
    pub address: Address,
}

/// Product lookups.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Looks up a product by id. `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`](crate::StorageError) if the backend fails.
    async fn query_by_id(&self, id: ProductId) -> StorageResult<Option<ProductRecord>>;
}

/// Home lookups.
#[async_trait]
pub trait HomeStore: Send + Sync {
    /// Looks up a home by id. `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`](crate::StorageError) if the backend fails.
    async fn query_by_id(&self, id: HomeId) -> StorageResult<Option<HomeRecord>>;
}

/// A record addressable by its own id.
pub trait Keyed {
    /// Identifier type.
    type Id: Copy + Eq + Hash + std::fmt::Debug + Send + Sync;

    /// Returns the record's id.
    fn key(&self) -> Self::Id;
}

impl Keyed for ProductRecord {
    type Id = ProductId;

    fn key(&self) -> ProductId {
        self.id
    }
}

impl Keyed for HomeRecord {
    type Id = HomeId;

    fn key(&self) -> HomeId {
        self.id
    }
}

/// In-memory record store keyed by record id.
///
/// Uses [`parking_lot::RwLock`]; the lock is never held across an await.
/// Cloning shares the underlying map.
#[derive(Debug)]
pub struct MemoryRecordStore<R: Keyed> {
    records: Arc<RwLock<HashMap<R::Id, R>>>,
}

impl<R: Keyed> Clone for MemoryRecordStore<R> {
    fn clone(&self) -> Self {
        Self { records: Arc::clone(&self.records) }
    }
}

impl<R: Keyed> Default for MemoryRecordStore<R> {
    fn default() -> Self {
        Self { records: Arc::new(RwLock::new(HashMap::new())) }
    }
}

impl<R: Keyed + Clone> MemoryRecordStore<R> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, record: R) {
        self.records.write().insert(record.key(), record);
    }

    /// Removes a record, returning it if present.
    pub fn remove(&self, id: R::Id) -> Option<R> {
        self.records.write().remove(&id)
    }

    /// Fetches a record by id.
    #[must_use]
    pub fn get(&self, id: R::Id) -> Option<R> {
        self.records.read().get(&id).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

/// In-memory [`ProductStore`].
pub type MemoryProductStore = MemoryRecordStore<ProductRecord>;

/// In-memory [`HomeStore`].
pub type MemoryHomeStore = MemoryRecordStore<HomeRecord>;

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn query_by_id(&self, id: ProductId) -> StorageResult<Option<ProductRecord>> {
        Ok(self.get(id))
    }
}

#[async_trait]
impl HomeStore for MemoryHomeStore {
    async fn query_by_id(&self, id: HomeId) -> StorageResult<Option<HomeRecord>> {
        Ok(self.get(id))
    }
}
