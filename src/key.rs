use core::fmt;

use subtle::ConstantTimeEq;
#[cfg(feature = "zeroize")]
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::backend::FieldElement;

/// The size in bytes of a POLYVAL key.
pub const KEY_SIZE: usize = 16;

/// A POLYVAL key.
#[derive(Clone)]
pub struct Key(pub(crate) FieldElement);

impl Key {
    const ZERO: &'static [u8; KEY_SIZE] = &[0u8; KEY_SIZE];

    /// Creates a POLYVAL key.
    ///
    /// It returns `None` if the key is all zero.
    pub fn new(key: &[u8; KEY_SIZE]) -> Option<Self> {
        if bool::from(key.ct_eq(Self::ZERO)) {
            None
        } else {
            Some(Self::new_unchecked(key))
        }
    }

    /// Creates a POLYVAL key from a known non-zero key.
    ///
    /// # Warning
    ///
    /// Only use this method if `key` is known to be non-zero.
    /// Using an all zero key fixes the hash to zero, regardless
    /// of the input.
    #[inline]
    pub fn new_unchecked(key: &[u8; KEY_SIZE]) -> Self {
        Self(FieldElement::from_le_bytes(key))
    }
}

#[cfg(feature = "zeroize")]
#[cfg_attr(docsrs, doc(cfg(feature = "zeroize")))]
impl ZeroizeOnDrop for Key {}

impl Drop for Key {
    fn drop(&mut self) {
        #[cfg(feature = "zeroize")]
        {
            self.0.zeroize();
        }
        #[cfg(not(feature = "zeroize"))]
        {
            self.0 ^= self.0;
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key").finish_non_exhaustive()
    }
}

/// The first eight powers of a POLYVAL key, precomputed.
///
/// The table holds `H^8, H^7, .., H^1` in that order, each entry
/// carrying the Montgomery factor `x^128`. Batched updates pair
/// the `j`-th block of an eight-block chunk with entry `j`, and
/// a ragged prefix of `r` blocks with the last `r` entries, so
/// both paths read the table with contiguous aligned loads.
///
/// Construction walks the chain `H^{i+1} = H^i * H`; the raw key
/// itself serves as the `H^1` entry because the block multiply
/// contributes the matching `x^-128`.
///
/// The table is read-only once built and may be shared across
/// threads.
pub struct KeyPowers {
    pub(crate) pow: [FieldElement; 8],
}

impl KeyPowers {
    /// Precomputes the powers of `key`.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn new(key: &Key) -> Self {
        let h = key.0;
        let mut pow = [h; 8];
        let mut prev = h;
        for v in pow.iter_mut().rev().skip(1) {
            *v = prev * h;
            prev = *v;
        }
        Self { pow }
    }

    /// The `H^1` entry.
    #[inline]
    pub(crate) fn h(&self) -> FieldElement {
        self.pow[7]
    }
}

impl Clone for KeyPowers {
    #[inline]
    fn clone(&self) -> Self {
        Self { pow: self.pow }
    }

    #[inline]
    fn clone_from(&mut self, other: &Self) {
        self.pow = other.pow;
    }
}

#[cfg(feature = "zeroize")]
#[cfg_attr(docsrs, doc(cfg(feature = "zeroize")))]
impl ZeroizeOnDrop for KeyPowers {}

impl Drop for KeyPowers {
    fn drop(&mut self) {
        #[cfg(feature = "zeroize")]
        {
            self.pow.zeroize();
        }
        #[cfg(not(feature = "zeroize"))]
        {
            for h in &mut self.pow {
                *h ^= *h;
            }
        }
    }
}

impl fmt::Debug for KeyPowers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPowers").finish_non_exhaustive()
    }
}
