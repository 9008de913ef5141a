//! Identifier newtypes shared by every store.
//!
//! Each id wraps a [`Uuid`] so a `ProductId` can never be passed where a
//! `UserId` is expected.

use std::{fmt, str::FromStr};

use uuid::Uuid;

/// Macro to define a newtype wrapper around [`Uuid`] with standard trait
/// implementations.
///
/// Each generated type:
/// - Is a transparent wrapper around `Uuid`
/// - Derives `Copy`, `Clone`, `Debug`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Derives `Serialize` and `Deserialize` (transparent)
/// - Implements `From<Uuid>`, `Into<Uuid>`, `FromStr` and `Display`
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(#[doc = "Underlying UUID."] pub Uuid);

        impl $name {
            /// Generates a fresh random (v4) identifier.
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            /// The all-zero identifier. Never assigned to a stored record.
            #[must_use]
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Returns `true` for the all-zero identifier.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Returns the wrapped [`Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

define_id!(
    /// Identifier of a user record. Also the subject of authenticated claims
    /// and the owner of products and homes.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_storage::UserId;
    ///
    /// let id: UserId = "45b5fbd3-755f-4379-8f07-a58d4a30fa2f".parse().unwrap();
    /// assert_eq!(id.to_string(), "45b5fbd3-755f-4379-8f07-a58d4a30fa2f");
    /// assert!(UserId::nil().is_nil());
    /// ```
    UserId
);

define_id!(
    /// Identifier of a product record.
    ProductId
);

define_id!(
    /// Identifier of a home record.
    HomeId
);
