//! Arbitrary-precision weave offsets.
//!
//! Weave sizes are cumulative byte counts over the whole chain and already
//! exceed `2^53` today (spec §3, §9). They must be carried as arbitrary
//! precision integers throughout and narrowed to a machine integer only at
//! one explicit, checked boundary.

use core::fmt;
use core::ops::{Add, Sub};

use num_bigint::BigUint;

use crate::error::GatewayError;

/// The largest integer a double-precision float (and therefore a JS-derived
/// reference implementation) can represent exactly: `2^53 - 1`.
pub const MAX_SAFE_INTEGER: u64 = (1u64 << 53) - 1;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct WeaveOffset(BigUint);

impl WeaveOffset {
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    #[must_use]
    pub fn zero() -> Self {
        Self(BigUint::from(0u64))
    }

    /// The single checked narrowing boundary: fails loudly rather than
    /// silently truncating when the value exceeds `MAX_SAFE_INTEGER`.
    pub fn try_into_machine(&self) -> Result<u64, GatewayError> {
        let limit = BigUint::from(MAX_SAFE_INTEGER);
        if self.0 > limit {
            return Err(GatewayError::OutOfRange(format!(
                "weave offset {} exceeds MAX_SAFE_INTEGER ({MAX_SAFE_INTEGER})",
                self.0
            )));
        }
        // `self.0 <= MAX_SAFE_INTEGER < u64::MAX`, so a single digit suffices.
        Ok(self.0.to_u64_digits().first().copied().unwrap_or(0))
    }

    #[must_use]
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    /// Encodes as a fixed 32-byte big-endian buffer, matching the
    /// `tx_end_offset`/`boundary` encoding used in tx_path nodes (spec §3).
    #[must_use]
    pub fn to_be_bytes_32(&self) -> [u8; 32] {
        let be = self.0.to_bytes_be();
        let mut out = [0u8; 32];
        let start = 32 - be.len().min(32);
        out[start..].copy_from_slice(&be[be.len().saturating_sub(32)..]);
        out
    }
}

impl fmt::Display for WeaveOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for WeaveOffset {
    type Output = WeaveOffset;
    fn add(self, rhs: WeaveOffset) -> WeaveOffset {
        WeaveOffset(self.0 + rhs.0)
    }
}

impl Sub for WeaveOffset {
    type Output = WeaveOffset;
    fn sub(self, rhs: WeaveOffset) -> WeaveOffset {
        WeaveOffset(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrows_when_within_bounds() {
        let w = WeaveOffset::from_u64(12345);
        assert_eq!(w.try_into_machine().unwrap(), 12345);
    }

    #[test]
    fn rejects_narrowing_beyond_max_safe_integer() {
        let w = WeaveOffset::from_u64(MAX_SAFE_INTEGER) + WeaveOffset::from_u64(1);
        assert!(matches!(
            w.try_into_machine(),
            Err(GatewayError::OutOfRange(_))
        ));
    }

    #[test]
    fn round_trips_32_byte_encoding() {
        let w = WeaveOffset::from_u64(345_449_412_246_841);
        let bytes = w.to_be_bytes_32();
        let back = WeaveOffset::from_bytes_be(&bytes);
        assert_eq!(w, back);
    }

    #[test]
    fn handles_values_larger_than_2_53() {
        // weave sizes documented in spec §8 S5 exceed 2^53 already.
        let w = WeaveOffset::from_u64(345_449_412_468_982);
        assert!(w.try_into_machine().is_ok());
    }
}
