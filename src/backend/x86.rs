//! The x86 implementation.

#![cfg(all(
    not(feature = "soft"),
    any(target_arch = "x86", target_arch = "x86_64")
))]
#![allow(clippy::undocumented_unsafe_blocks, reason = "Too many unsafe blocks.")]
#![allow(clippy::indexing_slicing)]
#![allow(unused_unsafe)]

use core::{
    ops::{BitXor, BitXorAssign, Mul, MulAssign},
    ptr,
};

use cfg_if::cfg_if;
#[cfg(feature = "zeroize")]
use zeroize::Zeroize;

use super::generic;
use crate::hash::Block;

cfg_if! {
    if #[cfg(target_arch = "x86")] {
        use core::arch::x86::{
            __m128i, _mm_clmulepi64_si128, _mm_loadu_si128, _mm_setzero_si128, _mm_shuffle_epi32,
            _mm_slli_si128, _mm_srli_si128, _mm_storeu_si128, _mm_xor_si128,
        };
    } else {
        use core::arch::x86_64::{
            __m128i, _mm_clmulepi64_si128, _mm_loadu_si128, _mm_setzero_si128, _mm_shuffle_epi32,
            _mm_slli_si128, _mm_srli_si128, _mm_storeu_si128, _mm_xor_si128,
        };
    }
}

cpufeatures::new!(have_pclmulqdq, "pclmulqdq");

fn have_clmul() -> bool {
    // Feature detection misreports `pclmulqdq` under Rosetta 2,
    // which otherwise emulates the instruction fine.
    if cfg!(target_os = "macos") {
        true
    } else {
        have_pclmulqdq::get()
    }
}

#[derive(Copy, Clone, Debug)]
#[repr(transparent)]
pub(crate) struct FieldElement(__m128i);

impl FieldElement {
    #[inline]
    pub fn from_le_bytes(data: &Block) -> Self {
        // SAFETY: `_mm_loadu_si128` performs an unaligned load
        // from a pointer that spans all 16 bytes of `data`.
        let fe = unsafe { _mm_loadu_si128(data.as_ptr().cast()) };
        Self(fe)
    }

    #[inline]
    pub fn to_le_bytes(self) -> Block {
        let mut out = [0u8; 16];
        // SAFETY: `_mm_storeu_si128` performs an unaligned store
        // through a pointer that spans all 16 bytes of `out`.
        unsafe { _mm_storeu_si128(out.as_mut_ptr().cast(), self.0) }
        out
    }

    /// Folds `blocks` into the accumulator `self` using the
    /// power table `pow`.
    #[must_use = "this returns the result of the operation \
                      without modifying the original"]
    pub fn fold_blocks(self, pow: &[Self; 8], blocks: &[Block]) -> Self {
        if have_clmul() {
            // SAFETY: `__m128i` and `FieldElement` have the same
            // layout in memory. The pointer came from
            // a reference, so it is safe to dereference.
            let pow = unsafe { &*(pow as *const [FieldElement; 8]).cast() };
            // SAFETY: `fold_blocks_clmul` requires the `sse2`
            // and `pclmulqdq` target features, which we have.
            let fe = unsafe { fold_blocks_clmul(self.0, pow, blocks) };
            FieldElement(fe)
        } else {
            let pow = pow.map(Into::into);
            generic::FieldElement::from(self)
                .fold_blocks(&pow, blocks)
                .into()
        }
    }
}

impl Default for FieldElement {
    #[inline]
    fn default() -> Self {
        // SAFETY: This intrinsic requires the `sse2` target
        // feature, which we have.
        let fe = unsafe { _mm_setzero_si128() };
        Self(fe)
    }
}

impl BitXor for FieldElement {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        // SAFETY: This intrinsic requires the `sse2` target
        // feature, which we have.
        let fe = unsafe { _mm_xor_si128(self.0, rhs.0) };
        Self(fe)
    }
}
impl BitXorAssign for FieldElement {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        // SAFETY: This intrinsic requires the `sse2` target
        // feature, which we have.
        self.0 = unsafe { _mm_xor_si128(self.0, rhs.0) };
    }
}

impl Mul for FieldElement {
    type Output = Self;

    #[inline]
    #[allow(clippy::arithmetic_side_effects)]
    fn mul(self, rhs: Self) -> Self {
        if have_clmul() {
            // SAFETY: `polymul_clmul` requires the `sse2` and
            // `pclmulqdq` target features, which we have.
            let fe = unsafe { polymul_clmul(self.0, rhs.0) };
            Self(fe)
        } else {
            let fe = generic::FieldElement::from(self) * generic::FieldElement::from(rhs);
            fe.into()
        }
    }
}
impl MulAssign for FieldElement {
    #[inline]
    #[allow(clippy::arithmetic_side_effects)]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

#[cfg(feature = "zeroize")]
impl Zeroize for FieldElement {
    fn zeroize(&mut self) {
        // SAFETY: This intrinsic requires the `sse2` target
        // feature, which we have.
        self.0 = unsafe { _mm_setzero_si128() };
    }
}

#[cfg(test)]
impl Eq for FieldElement {}

#[cfg(test)]
impl PartialEq for FieldElement {
    fn eq(&self, other: &Self) -> bool {
        cfg_if! {
            if #[cfg(target_arch = "x86")] {
                use core::arch::x86::{_mm_cmpeq_epi8, _mm_movemask_epi8};
            } else {
                use core::arch::x86_64::{_mm_cmpeq_epi8, _mm_movemask_epi8};
            }
        }

        // SAFETY: These intrinsics require the `sse2` target
        // feature, which we have.
        let v = unsafe { _mm_movemask_epi8(_mm_cmpeq_epi8(self.0, other.0)) };
        v == 0xffff
    }
}

impl From<FieldElement> for generic::FieldElement {
    #[inline]
    fn from(fe: FieldElement) -> Self {
        Self::from_le_bytes(&fe.to_le_bytes())
    }
}

impl From<generic::FieldElement> for FieldElement {
    #[inline]
    fn from(fe: generic::FieldElement) -> Self {
        Self::from_le_bytes(&fe.to_le_bytes())
    }
}

/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn polymul_clmul(x: __m128i, y: __m128i) -> __m128i {
    let (h, m, l) = unsafe { schoolbook(x, y) };
    let (ph, pl) = unsafe { fold_middle(h, m, l) };
    unsafe { mont_reduce(ph, pl) }
}

/// Folds `blocks` into `acc` using the power table `pow`.
///
/// A ragged prefix of `r = blocks.len() % 8` blocks is consumed
/// first against the last `r` table entries, so block j meets
/// H^(r-j); what remains is a whole number of eight-block
/// strides.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn fold_blocks_clmul(
    mut acc: __m128i,
    pow: &[__m128i; 8],
    blocks: &[Block],
) -> __m128i {
    let rem = blocks.len() % pow.len();
    let (tail, body) = blocks.split_at(rem);

    if !tail.is_empty() {
        let (ph, pl) = unsafe { tail_product(acc, &pow[pow.len() - rem..], tail) };
        acc = unsafe { mont_reduce(ph, pl) };
    }

    // Each stride hands back its unreduced 256-bit sum; the
    // reduction sits between strides, and the next stride folds
    // the reduced value into its first block.
    for chunk in body.chunks_exact(pow.len()) {
        let (ph, pl) = unsafe { stride_product(acc, pow, chunk) };
        acc = unsafe { mont_reduce(ph, pl) };
    }

    acc
}

/// Accumulates the eight products `pow[j] * m[j]`, with `acc`
/// folded into `m[0]`, into one 256-bit sum.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn stride_product(
    acc: __m128i,
    pow: &[__m128i; 8],
    blocks: &[Block],
) -> (__m128i, __m128i) {
    debug_assert_eq!(blocks.len(), pow.len());

    let mut h = unsafe { _mm_setzero_si128() };
    let mut m = unsafe { _mm_setzero_si128() };
    let mut l = unsafe { _mm_setzero_si128() };

    macro_rules! absorb {
        ($i:literal) => {
            let mut y = unsafe { _mm_loadu_si128(blocks.as_ptr().add($i).cast()) };
            if $i == 0 {
                y = unsafe { _mm_xor_si128(y, acc) }; // fold in the accumulator
            }
            let x = unsafe { _mm_loadu_si128(ptr::addr_of!(pow[$i])) };
            let (hh, mm, ll) = unsafe { schoolbook(x, y) };
            h = unsafe { _mm_xor_si128(h, hh) };
            m = unsafe { _mm_xor_si128(m, mm) };
            l = unsafe { _mm_xor_si128(l, ll) };
        };
    }
    absorb!(7);
    absorb!(6);
    absorb!(5);
    absorb!(4);
    absorb!(3);
    absorb!(2);
    absorb!(1);
    absorb!(0);

    unsafe { fold_middle(h, m, l) }
}

/// Accumulates a ragged prefix of fewer than eight blocks.
///
/// `pow` holds the matching suffix of the power table. The match
/// arms differ only in how many block loads they unroll; every
/// arm produces the same sum for the same prefix.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn tail_product(
    acc: __m128i,
    pow: &[__m128i],
    blocks: &[Block],
) -> (__m128i, __m128i) {
    debug_assert!(!blocks.is_empty());
    debug_assert!(blocks.len() < 8);
    debug_assert_eq!(blocks.len(), pow.len());

    let mut h = unsafe { _mm_setzero_si128() };
    let mut m = unsafe { _mm_setzero_si128() };
    let mut l = unsafe { _mm_setzero_si128() };

    macro_rules! absorb {
        ($($j:literal),+) => {
            $(
                let mut y = unsafe { _mm_loadu_si128(blocks.as_ptr().add($j).cast()) };
                if $j == 0 {
                    y = unsafe { _mm_xor_si128(y, acc) }; // fold in the accumulator
                }
                let x = unsafe { _mm_loadu_si128(pow.as_ptr().add($j)) };
                let (hh, mm, ll) = unsafe { schoolbook(x, y) };
                h = unsafe { _mm_xor_si128(h, hh) };
                m = unsafe { _mm_xor_si128(m, mm) };
                l = unsafe { _mm_xor_si128(l, ll) };
            )+
        };
    }
    match blocks.len() {
        1 => {
            absorb!(0);
        }
        2 => {
            absorb!(0, 1);
        }
        3 => {
            absorb!(0, 1, 2);
        }
        4 => {
            absorb!(0, 1, 2, 3);
        }
        5 => {
            absorb!(0, 1, 2, 3, 4);
        }
        6 => {
            absorb!(0, 1, 2, 3, 4, 5);
        }
        7 => {
            absorb!(0, 1, 2, 3, 4, 5, 6);
        }
        _ => unreachable!(),
    }

    unsafe { fold_middle(h, m, l) }
}

/// Schoolbook decomposition for `x*y`.
///
/// PCLMULQDQ provides all four half-products equally cheaply, so
/// the middle terms are computed directly instead of through the
/// Karatsuba rearrangement.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn schoolbook(x: __m128i, y: __m128i) -> (__m128i, __m128i, __m128i) {
    // (x1,x0)*(y1,y0) = (x1*y1) + (x1*y0 + x0*y1) + (x0*y0)
    //                       H            M              L
    let h = unsafe { clmul_hh(x, y) };
    let m = unsafe { _mm_xor_si128(clmul_hl(x, y), clmul_lh(x, y)) };
    let l = unsafe { clmul_ll(x, y) };
    (h, m, l)
}

/// Places the middle terms across the 64-bit boundary of the
/// 256-bit product: `pl = {l0, l1 ^ m0}`, `ph = {h0 ^ m1, h1}`.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn fold_middle(h: __m128i, m: __m128i, l: __m128i) -> (__m128i, __m128i) {
    let pl = unsafe { _mm_xor_si128(l, _mm_slli_si128::<8>(m)) };
    let ph = unsafe { _mm_xor_si128(h, _mm_srli_si128::<8>(m)) };
    (ph, pl)
}

/// Montgomery-reduces the 256-bit product `(ph, pl)` to the
/// field element `(ph*x^128 + pl) * x^-128`.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn mont_reduce(ph: __m128i, pl: __m128i) -> __m128i {
    //    [A1:A0] = PL0 • g*
    //    [B1:B0] = [PL0 ⊕ A1 : PL1 ⊕ A0]
    //    [C1:C0] = B0 • g*
    // Output: [B1 ⊕ C1 ⊕ PH1 : B0 ⊕ C0 ⊕ PH0]
    //
    // Both halves of g* hold the low 64 bits of the reduction
    // polynomial, pre-rotated so one carryless multiply per step
    // yields the reduction quotient.
    static GSTAR: u128 = (0xc200000000000000 << 64) | 0xc200000000000000;
    let g = unsafe { _mm_loadu_si128(ptr::addr_of!(GSTAR).cast()) };
    let a = unsafe { clmul_ll(pl, g) };
    let b = unsafe { _mm_xor_si128(pl, _mm_shuffle_epi32::<0x4e>(a)) };
    let c = unsafe { clmul_hh(b, g) };
    unsafe { _mm_xor_si128(ph, _mm_xor_si128(c, b)) }
}

/// Multiplies the low bits in `a` and `b`.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn clmul_ll(a: __m128i, b: __m128i) -> __m128i {
    unsafe { _mm_clmulepi64_si128::<0x00>(a, b) }
}

/// Multiplies the low bits in `a` by the high bits in `b`.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn clmul_lh(a: __m128i, b: __m128i) -> __m128i {
    unsafe { _mm_clmulepi64_si128::<0x10>(a, b) }
}

/// Multiplies the high bits in `a` by the low bits in `b`.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn clmul_hl(a: __m128i, b: __m128i) -> __m128i {
    unsafe { _mm_clmulepi64_si128::<0x01>(a, b) }
}

/// Multiplies the high bits in `a` and `b`.
///
/// # Safety
///
/// The SSE2 and PCLMULQDQ target features must be enabled.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn clmul_hh(a: __m128i, b: __m128i) -> __m128i {
    unsafe { _mm_clmulepi64_si128::<0x11>(a, b) }
}
