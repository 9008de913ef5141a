//! Signing key records and the sources they are loaded from.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   load_keys()   ┌──────────────────┐
//! │ SigningKeySource │────────────────►│ KeyStore (authn) │
//! │ file / memory    │                 │ snapshot + swap  │
//! └──────────────────┘                 └──────────────────┘
//! ```
//!
//! A source is read at startup and on explicit reload only. Verification
//! never touches the source.

mod signing_key;
mod source;

pub use signing_key::SigningKeyRecord;
pub use source::{FileKeySource, MemoryKeySource, SigningKeySource};
