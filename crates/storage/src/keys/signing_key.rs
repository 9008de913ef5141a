//! Signing key record as loaded from a key source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Ed25519 key material for one key identifier.
///
/// The public half verifies bearer tokens. The private half is optional: a
/// process that only verifies tokens never needs it, while a process that
/// also issues tokens loads it for the active key.
///
/// # Encoding
///
/// - `public_key`: the raw 32-byte Ed25519 public key, base64url without padding (43 characters).
/// - `private_key`: the PKCS#8 v1 DER document, base64url without padding.
///
/// Both are wrapped in [`Zeroizing`] so the encoded material is scrubbed
/// from memory on drop.
///
/// # Example
///
/// ```
/// use warden_storage::SigningKeyRecord;
///
/// let record = SigningKeyRecord::builder()
///     .kid("2024-q1")
///     .public_key("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo".to_owned())
///     .build();
///
/// assert!(record.active);
/// assert!(record.private_key.is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct SigningKeyRecord {
    /// Key ID, matched against the token header `kid`.
    #[builder(into)]
    pub kid: String,

    /// Ed25519 public key (base64url, no padding).
    #[builder(into)]
    pub public_key: Zeroizing<String>,

    /// PKCS#8 DER private key (base64url, no padding), if this process signs.
    #[builder(into)]
    #[serde(default)]
    pub private_key: Option<Zeroizing<String>>,

    /// When the key was generated.
    #[builder(default = Utc::now())]
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Whether this is the key new tokens are signed with.
    ///
    /// At most one record in a key set may be active. Inactive records still
    /// verify tokens signed before a rotation.
    #[builder(default = true)]
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl SigningKeyRecord {
    /// Returns `true` when the record carries a private half.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.private_key.is_some()
    }
}
