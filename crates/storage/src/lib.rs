//! Collaborator contracts for the warden authentication core.
//!
//! The authentication core never talks to a database directly. It depends on
//! the small set of lookups defined here, each implemented by whatever backend
//! the surrounding service uses.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    warden-authn                             │
//! │   KeyStore │ CredentialVerifier │ OwnershipResolver          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    warden-storage                           │
//! │  SigningKeySource │ UserStore │ ProductStore │ HomeStore     │
//! ├──────────────────┬──────────────────────────────────────────┤
//! │ Memory*          │        service-provided backends         │
//! │ FileKeySource    │                                          │
//! └──────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use warden_storage::{MemoryProductStore, ProductRecord, ProductStore, UserId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let products = MemoryProductStore::new();
//!     let owner = UserId::new_v4();
//!     let product = ProductRecord::builder().user_id(owner).name("Comic Books").build();
//!     products.insert(product.clone());
//!
//!     let found = ProductStore::query_by_id(&products, product.id).await?;
//!     assert_eq!(found.map(|p| p.user_id), Some(owner));
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All lookups return [`StorageResult<T>`]. An absent record is `Ok(None)`,
//! never an error; [`StorageError`] is reserved for backend failures.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod keys;
pub mod resources;
pub mod types;
pub mod users;

pub use error::{BoxError, StorageError, StorageResult};
pub use keys::{FileKeySource, MemoryKeySource, SigningKeyRecord, SigningKeySource};
pub use resources::{
    Address, HomeRecord, HomeStore, Keyed, MemoryHomeStore, MemoryProductStore,
    MemoryRecordStore, ProductRecord, ProductStore,
};
pub use types::{HomeId, ProductId, UserId};
pub use users::{MemoryUserStore, UserRecord, UserStore};
pub use zeroize::Zeroizing;
