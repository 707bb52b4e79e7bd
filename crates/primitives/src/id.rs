//! 32-byte identifiers exchanged as unpadded URL-safe base64 (43 chars).
//!
//! Two wire-compatible but semantically distinct kinds share this shape:
//! transaction/data-item [`Identifier`]s and content-addressed [`ContentHash`]es.
//! They are kept as separate types so a hash can never be passed where an id
//! is expected, even though the byte layout and encoding are identical.

use core::fmt;
use core::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::GatewayError;

macro_rules! define_id32 {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        impl $name {
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Raw big-endian byte ordering, as used for `sortTransactionIds`
            /// style comparisons (spec §4.4) — distinct from base64-string
            /// ordering.
            #[must_use]
            pub fn cmp_raw(&self, other: &Self) -> core::cmp::Ordering {
                self.0.cmp(&other.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.to_string()).finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&URL_SAFE_NO_PAD.encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = GatewayError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = URL_SAFE_NO_PAD
                    .decode(s)
                    .map_err(|e| GatewayError::Internal(format!("invalid base64 id {s:?}: {e}")))?;
                let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
                    GatewayError::Internal(format!("id {s:?} decodes to {} bytes, want 32", v.len()))
                })?;
                Ok(Self(arr))
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(DeError::custom)
            }
        }
    };
}

define_id32!(
    Identifier,
    "A transaction id or data-item id: 32 raw bytes, unpadded URL-safe base64 on the wire."
);
define_id32!(
    ContentHash,
    "SHA-256 of a contiguous byte stream, unpadded URL-safe base64 on the wire. The content cache's primary key."
);

impl ContentHash {
    /// Computes the content hash of a complete in-memory buffer. Streaming
    /// callers should use [`Sha256`] directly and finish with
    /// [`ContentHash::from_bytes`].
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(digest.into())
    }
}

/// Sorts identifiers by their raw 32-byte binary form, not their base64
/// encoding (spec §4.4's "related helper").
pub fn sort_by_raw_bytes(ids: &mut [Identifier]) {
    ids.sort_by(Identifier::cmp_raw);
}
