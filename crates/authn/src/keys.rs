//! In-memory key store for token verification and issuance.
//!
//! [`KeyStore`] holds the decoded Ed25519 key set for the lifetime of the
//! process. It is loaded once from a [`SigningKeySource`] and afterwards only
//! changes through [`rotate`](KeyStore::rotate), [`remove`](KeyStore::remove)
//! or [`reload`](KeyStore::reload).
//!
//! # Architecture
//!
//! ```text
//! verify(token) → extract kid
//!              → clone Arc<KeySet> under a read lock (lock released)
//!              → look up entry, check rotation grace
//!              → verify signature against the entry's DecodingKey
//!
//! rotate(record) → decode + validate new key
//!               → build a new KeySet (previous active key retired)
//!               → swap Arc<KeySet> under a write lock
//! ```
//!
//! # Rotation
//!
//! A key retired by [`rotate`](KeyStore::rotate) keeps verifying tokens for the
//! configured grace period, then behaves exactly like an unknown key. Keys that
//! arrive inactive from the source are trusted until removed.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//! use warden_authn::KeyStore;
//! use warden_storage::FileKeySource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = FileKeySource::new("/etc/warden/keys.json");
//! let store = KeyStore::load(&source, Duration::from_secs(3600)).await?;
//! println!("active key: {:?}", store.active_key_id());
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SigningKey, VerifyingKey};
use fail::fail_point;
use jsonwebtoken::{DecodingKey, EncodingKey};
use parking_lot::RwLock;
use warden_storage::{SigningKeyRecord, SigningKeySource, StorageError};
use zeroize::Zeroizing;

use crate::{
    error::{AuthError, Result},
    validation::validate_kid,
};

/// DER prefix of a PKCS#8 v1 Ed25519 private key (RFC 8410), followed by the
/// 32-byte seed.
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

/// Private key usable for signing new tokens.
#[derive(Clone)]
pub struct IssuingKey {
    /// Key ID written to the token header.
    pub kid: String,
    /// Encoding key for `jsonwebtoken`.
    pub key: Arc<EncodingKey>,
}

impl fmt::Debug for IssuingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuingKey").field("kid", &self.kid).finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct KeyEntry {
    decoding: Arc<DecodingKey>,
    encoding: Option<Arc<EncodingKey>>,
    retired_at: Option<DateTime<Utc>>,
}

impl KeyEntry {
    fn usable_at(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        let Some(retired_at) = self.retired_at else {
            return true;
        };
        let Ok(grace) = chrono::Duration::from_std(grace) else {
            return true;
        };
        match retired_at.checked_add_signed(grace) {
            Some(deadline) => now < deadline,
            None => true,
        }
    }
}

/// Immutable key set. Replaced wholesale on every mutation.
#[derive(Clone, Default)]
struct KeySet {
    entries: HashMap<String, KeyEntry>,
    active: Option<String>,
}

impl KeySet {
    fn from_records(records: Vec<SigningKeyRecord>) -> Result<Self> {
        let mut set = Self::default();
        for record in records {
            if set.entries.contains_key(&record.kid) {
                return Err(AuthError::invalid_key_material(format!(
                    "duplicate kid: {}",
                    record.kid
                )));
            }
            if record.active {
                if let Some(active) = &set.active {
                    return Err(AuthError::invalid_key_material(format!(
                        "more than one active key: {active}, {}",
                        record.kid
                    )));
                }
                set.active = Some(record.kid.clone());
            }
            let entry = decode_record(&record)?;
            set.entries.insert(record.kid, entry);
        }
        Ok(set)
    }
}

/// Thread-safe, copy-on-write store of Ed25519 keys indexed by key id.
///
/// Reads clone an `Arc` under a short read lock; no lock is held while a
/// caller verifies a signature. Mutations build a fresh key set and swap it in,
/// so an in-flight lookup keeps the snapshot it started with.
pub struct KeyStore {
    snapshot: RwLock<Arc<KeySet>>,
    grace: Duration,
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("kids", &self.kids())
            .field("active", &self.active_key_id())
            .field("grace", &self.grace)
            .finish()
    }
}

impl KeyStore {
    /// Builds a store from already-loaded records.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidKeyMaterial`] on a duplicate kid, more than one
    ///   active record, a malformed kid or private key, or a private key that
    ///   does not match its public key
    /// - [`AuthError::InvalidPublicKey`] if a public key is not a valid
    ///   base64url Ed25519 key
    pub fn from_records(records: Vec<SigningKeyRecord>, grace: Duration) -> Result<Self> {
        let set = KeySet::from_records(records)?;
        Ok(Self { snapshot: RwLock::new(Arc::new(set)), grace })
    }

    /// Loads every record from `source` and builds a store.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] if the source fails, otherwise as
    /// [`from_records`](Self::from_records).
    #[tracing::instrument(skip(source))]
    pub async fn load(source: &dyn SigningKeySource, grace: Duration) -> Result<Self> {
        fail_point!("keystore-before-load", |_| {
            Err(AuthError::Backend(StorageError::internal("injected failure before key load")))
        });
        let records = source.load_keys().await?;
        let store = Self::from_records(records, grace)?;
        tracing::info!(keys = store.len(), active = ?store.active_key_id(), "key store loaded");
        Ok(store)
    }

    fn current(&self) -> Arc<KeySet> {
        Arc::clone(&self.snapshot.read())
    }

    /// Returns the verification key for `kid` at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownKey`] if the kid is absent or was retired
    /// longer ago than the rotation grace.
    pub fn lookup(&self, kid: &str) -> Result<Arc<DecodingKey>> {
        self.lookup_at(kid, Utc::now())
    }

    /// Returns the verification key for `kid` as of `now`.
    ///
    /// A retired key is usable while `now` is before its retirement plus the
    /// rotation grace.
    ///
    /// # Errors
    ///
    /// As [`lookup`](Self::lookup).
    pub fn lookup_at(&self, kid: &str, now: DateTime<Utc>) -> Result<Arc<DecodingKey>> {
        let set = self.current();
        match set.entries.get(kid) {
            Some(entry) if entry.usable_at(now, self.grace) => {
                Ok(Arc::clone(&entry.decoding))
            },
            Some(_) => {
                tracing::debug!(kid, "key retired past grace period");
                Err(AuthError::unknown_key(kid))
            },
            None => Err(AuthError::unknown_key(kid)),
        }
    }

    /// Key id new tokens are signed with, if any key is active.
    #[must_use]
    pub fn active_key_id(&self) -> Option<String> {
        self.current().active.clone()
    }

    /// Private key of the active key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningKeyUnavailable`] if no key is active or the
    /// active key was loaded without a private half.
    pub fn active_signing_key(&self) -> Result<IssuingKey> {
        let set = self.current();
        let kid = set
            .active
            .as_deref()
            .ok_or_else(|| AuthError::SigningKeyUnavailable("no active key".into()))?;
        issuing_key(&set, kid)
    }

    /// Private key for a specific kid.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownKey`] if the kid is absent and
    /// [`AuthError::SigningKeyUnavailable`] if it has no private half.
    pub fn signing_key(&self, kid: &str) -> Result<IssuingKey> {
        let set = self.current();
        if !set.entries.contains_key(kid) {
            return Err(AuthError::unknown_key(kid));
        }
        issuing_key(&set, kid)
    }

    /// Installs `record` as the new active key.
    ///
    /// The previously active key is retired and keeps verifying for the
    /// rotation grace period. Keys whose grace has elapsed are dropped.
    /// The record's own `active` flag is ignored.
    ///
    /// An audit event is emitted at INFO level.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] if the kid is already present
    /// or the material is invalid. The store is unchanged on error.
    #[tracing::instrument(skip(self, record), fields(kid = %record.kid))]
    pub fn rotate(&self, record: SigningKeyRecord) -> Result<()> {
        let kid = record.kid.clone();
        let result = self.try_rotate(record);
        audit("rotate_key", &kid, &result);
        result
    }

    fn try_rotate(&self, record: SigningKeyRecord) -> Result<()> {
        let entry = decode_record(&record)?;
        let now = Utc::now();

        let mut guard = self.snapshot.write();
        let mut next = KeySet::clone(&guard);
        next.entries.retain(|_, e| e.usable_at(now, self.grace));
        if next.entries.contains_key(&record.kid) {
            return Err(AuthError::invalid_key_material(format!(
                "kid already present: {}",
                record.kid
            )));
        }

        if let Some(previous) = next.active.take()
            && let Some(e) = next.entries.get_mut(&previous)
        {
            e.retired_at = Some(now);
        }
        next.entries.insert(record.kid.clone(), entry);
        next.active = Some(record.kid);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Removes a key. Tokens signed with it stop verifying immediately.
    ///
    /// Removing the active key leaves the store without an active key.
    /// An audit event is emitted at INFO level.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownKey`] if the kid is absent.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, kid: &str) -> Result<()> {
        let result = {
            let mut guard = self.snapshot.write();
            if guard.entries.contains_key(kid) {
                let mut next = KeySet::clone(&guard);
                next.entries.remove(kid);
                if next.active.as_deref() == Some(kid) {
                    next.active = None;
                }
                *guard = Arc::new(next);
                Ok(())
            } else {
                Err(AuthError::unknown_key(kid))
            }
        };
        audit("remove_key", kid, &result);
        result
    }

    /// Replaces the whole key set.
    ///
    /// An audit event is emitted at INFO level.
    ///
    /// # Errors
    ///
    /// As [`from_records`](Self::from_records). The store is unchanged on error.
    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    pub fn reload(&self, records: Vec<SigningKeyRecord>) -> Result<()> {
        let result = KeySet::from_records(records).map(|set| {
            *self.snapshot.write() = Arc::new(set);
        });
        audit("reload_keys", "all_signing_keys", &result);
        result
    }

    /// Number of keys held, including retired ones still in grace.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current().entries.len()
    }

    /// Returns `true` if no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current().entries.is_empty()
    }

    /// Sorted key ids.
    #[must_use]
    pub fn kids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.current().entries.keys().cloned().collect();
        kids.sort();
        kids
    }

    /// Rotation grace period.
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }
}

fn audit(action: &'static str, resource: &str, result: &Result<()>) {
    match result {
        Ok(()) => tracing::info!(
            audit.action = action,
            audit.resource = resource,
            audit.result = "success",
            "audit_event"
        ),
        Err(e) => tracing::warn!(
            audit.action = action,
            audit.resource = resource,
            audit.result = "failure",
            error = %e,
            "audit_event"
        ),
    }
}

fn issuing_key(set: &KeySet, kid: &str) -> Result<IssuingKey> {
    set.entries
        .get(kid)
        .and_then(|e| e.encoding.clone())
        .map(|key| IssuingKey { kid: kid.to_owned(), key })
        .ok_or_else(|| AuthError::SigningKeyUnavailable(format!("no private key for {kid}")))
}

fn decode_record(record: &SigningKeyRecord) -> Result<KeyEntry> {
    validate_kid(&record.kid)
        .map_err(|e| AuthError::invalid_key_material(format!("kid {:?}: {e}", record.kid)))?;

    let public_bytes = decode_public_key(&record.public_key)?;
    let decoding = DecodingKey::from_ed_components(&record.public_key)
        .map_err(|e| AuthError::InvalidPublicKey(e.to_string()))?;

    let encoding = match &record.private_key {
        Some(private_key) => Some(Arc::new(decode_private_key(
            &record.kid,
            private_key,
            &public_bytes,
        )?)),
        None => None,
    };

    Ok(KeyEntry { decoding: Arc::new(decoding), encoding, retired_at: None })
}

/// Decodes and validates a base64url Ed25519 public key.
fn decode_public_key(encoded: &str) -> Result<[u8; PUBLIC_KEY_LENGTH]> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.as_bytes())
        .map_err(|e| AuthError::InvalidPublicKey(format!("base64 decode: {e}")))?;

    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
        AuthError::InvalidPublicKey(format!(
            "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
            bytes.len()
        ))
    })?;

    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| AuthError::InvalidPublicKey(format!("invalid Ed25519 key: {e}")))?;
    Ok(bytes)
}

/// Decodes a base64url PKCS#8 private key and checks it matches `public`.
fn decode_private_key(
    kid: &str,
    encoded: &Zeroizing<String>,
    public: &[u8; PUBLIC_KEY_LENGTH],
) -> Result<EncodingKey> {
    let der: Zeroizing<Vec<u8>> =
        Zeroizing::new(URL_SAFE_NO_PAD.decode(encoded.as_bytes()).map_err(|e| {
            AuthError::invalid_key_material(format!("{kid}: private key base64 decode: {e}"))
        })?);

    if der.len() != ED25519_PKCS8_PREFIX.len() + SECRET_KEY_LENGTH
        || der[..ED25519_PKCS8_PREFIX.len()] != ED25519_PKCS8_PREFIX
    {
        return Err(AuthError::invalid_key_material(format!(
            "{kid}: private key is not a PKCS#8 Ed25519 document"
        )));
    }

    let seed: Zeroizing<[u8; SECRET_KEY_LENGTH]> = Zeroizing::new(
        der[ED25519_PKCS8_PREFIX.len()..]
            .try_into()
            .map_err(|_| AuthError::invalid_key_material(format!("{kid}: bad seed length")))?,
    );
    let derived = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
    if &derived != public {
        return Err(AuthError::invalid_key_material(format!(
            "{kid}: private key does not match public key"
        )));
    }

    Ok(EncodingKey::from_ed_der(&der))
}
