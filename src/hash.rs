use core::{error, fmt, slice};

use subtle::{Choice, ConstantTimeEq};
#[cfg(feature = "zeroize")]
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    backend::FieldElement,
    key::{Key, KeyPowers},
};

/// The size in bytes of a POLYVAL block.
pub const BLOCK_SIZE: usize = 16;

/// A single 16-byte block, little-endian.
///
/// Byte `i` contributes bits `8i..8i+7`; within a byte, bit 0 is
/// the lowest-degree coefficient.
pub type Block = [u8; BLOCK_SIZE];

/// The length of the input is not divisible by [`BLOCK_SIZE`].
#[derive(Copy, Clone, Debug)]
pub struct InvalidInputLength;

impl fmt::Display for InvalidInputLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid input length")
    }
}

impl error::Error for InvalidInputLength {}

/// Replaces `acc` with `acc * op * x^-128` in `GF(2¹²⁸)`.
///
/// When both operands carry the Montgomery factor `x^128`, the
/// result does too. When exactly one does, the factors cancel
/// and the result is the plain field product.
#[allow(clippy::arithmetic_side_effects)]
pub fn block_mul(acc: &mut Block, op: &Block) {
    let x = FieldElement::from_le_bytes(acc);
    let y = FieldElement::from_le_bytes(op);
    *acc = (x * y).to_le_bytes();
}

/// Folds `blocks` into the running accumulator `acc`.
///
/// With `N = blocks.len()` and `H` the hash key behind `keys`,
/// `acc` on return holds
///
/// ```text
/// H^N*acc + H^N*m[0] + H^(N-1)*m[1] + .. + H^1*m[N-1]
/// ```
///
/// Empty input leaves `acc` unchanged. Successive calls compose:
/// hashing a message in two `update` calls, split at any block
/// boundary, yields the same accumulator as one call.
pub fn update(acc: &mut Block, keys: &KeyPowers, blocks: &[Block]) {
    let y = FieldElement::from_le_bytes(acc);
    *acc = y.fold_blocks(&keys.pow, blocks).to_le_bytes();
}

/// An implementation of POLYVAL.
///
/// POLYVAL is similar to GHASH. It operates in `GF(2¹²⁸)`
/// defined by the irreducible polynomial
///
/// ```text
/// x^128 + x^127 + x^126 + x^121 + 1
/// ```
///
/// The field has characteristic 2, so addition is performed with
/// XOR. Multiplication is polynomial multiplication reduced
/// modulo the polynomial.
///
/// For more information on POLYVAL, see [RFC 8452].
///
/// [RFC 8452]: https://datatracker.ietf.org/doc/html/rfc8452
#[derive(Clone)]
pub struct Polyval {
    /// The running accumulator.
    pub(crate) y: FieldElement,
    /// Precomputed powers of the key for batched updates.
    keys: KeyPowers,
}

impl Polyval {
    /// Creates an instance of POLYVAL.
    #[inline]
    pub fn new(key: &Key) -> Self {
        Self {
            y: FieldElement::default(),
            keys: KeyPowers::new(key),
        }
    }

    /// Writes a single block to the running hash.
    #[inline]
    #[allow(clippy::arithmetic_side_effects)]
    pub fn update_block(&mut self, block: &Block) {
        let fe = FieldElement::from_le_bytes(block);
        self.y = (self.y ^ fe) * self.keys.h();
    }

    /// Writes one or more blocks to the running hash.
    #[inline]
    pub fn update(&mut self, blocks: &[Block]) {
        self.y = self.y.fold_blocks(&self.keys.pow, blocks);
    }

    /// Writes whole blocks of bytes to the running hash.
    ///
    /// Fails if the length of `data` is not a multiple of
    /// [`BLOCK_SIZE`].
    #[inline]
    pub fn update_bytes(&mut self, data: &[u8]) -> Result<(), InvalidInputLength> {
        let (blocks, tail) = as_blocks(data);
        if !tail.is_empty() {
            return Err(InvalidInputLength);
        }
        self.update(blocks);
        Ok(())
    }

    /// Writes bytes to the running hash.
    ///
    /// If the length of `data` is non-zero and is not a multiple
    /// of [`BLOCK_SIZE`], it's padded with zeros.
    #[inline]
    pub fn update_padded(&mut self, data: &[u8]) {
        let (blocks, tail) = as_blocks(data);
        if !blocks.is_empty() {
            self.update(blocks);
        }
        if !tail.is_empty() {
            let mut block = [0u8; BLOCK_SIZE];
            #[allow(
                clippy::indexing_slicing,
                reason = "The compiler can prove the slice is in bounds."
            )]
            block[..tail.len()].copy_from_slice(tail);
            self.update_block(&block);
        }
    }

    /// Returns the current authentication tag.
    #[inline]
    pub fn tag(self) -> Tag {
        Tag(self.y.to_le_bytes())
    }

    /// Reports whether the current authentication tag matches
    /// `expected_tag`.
    #[inline]
    pub fn verify(self, expected_tag: &Tag) -> Choice {
        self.tag().ct_eq(expected_tag)
    }
}

#[cfg(feature = "zeroize")]
#[cfg_attr(docsrs, doc(cfg(feature = "zeroize")))]
impl ZeroizeOnDrop for Polyval {}

impl Drop for Polyval {
    fn drop(&mut self) {
        #[cfg(feature = "zeroize")]
        {
            self.y.zeroize();
        }
        #[cfg(not(feature = "zeroize"))]
        {
            self.y ^= self.y;
        }
    }
}

impl fmt::Debug for Polyval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Polyval").finish_non_exhaustive()
    }
}

/// An authentication tag.
#[derive(Copy, Clone, Debug)]
pub struct Tag(pub(crate) [u8; 16]);

impl ConstantTimeEq for Tag {
    #[inline]
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl From<Tag> for [u8; 16] {
    #[inline]
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

// See https://doc.rust-lang.org/std/primitive.slice.html#method.as_chunks
const fn as_blocks(data: &[u8]) -> (&[Block], &[u8]) {
    #[allow(clippy::arithmetic_side_effects)]
    let len_rounded_down = (data.len() / BLOCK_SIZE) * BLOCK_SIZE;
    // SAFETY: The rounded-down value is always the same or
    // smaller than the original length, and thus must be
    // in-bounds of the slice.
    let (head, tail) = unsafe { data.split_at_unchecked(len_rounded_down) };
    let new_len = head.len() / BLOCK_SIZE;
    // SAFETY: We cast a slice of `new_len * BLOCK_SIZE` elements
    // into a slice of `new_len` many `BLOCK_SIZE` element chunks.
    let head = unsafe { slice::from_raw_parts(head.as_ptr().cast(), new_len) };
    (head, tail)
}
