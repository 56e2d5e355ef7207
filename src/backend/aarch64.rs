//! The AArch64 implementation.

#![cfg(all(
    not(feature = "soft"),
    target_arch = "aarch64",
    target_feature = "neon",
))]
#![allow(clippy::undocumented_unsafe_blocks, reason = "Too many unsafe blocks.")]
#![allow(clippy::indexing_slicing)]
#![allow(unused_unsafe)]

use core::{
    arch::aarch64::{
        uint8x16_t, uint8x16x4_t, vdupq_n_u8, veorq_u8, vextq_u8, vgetq_lane_u64, vld1q_u8,
        vld1q_u8_x4, vmull_p64, vreinterpretq_u64_u8, vreinterpretq_u8_p128, vst1q_u8,
    },
    ops::{BitXor, BitXorAssign, Mul, MulAssign},
};

#[cfg(feature = "zeroize")]
use zeroize::Zeroize;

use super::generic;
use crate::hash::Block;

// NB: PMULL ships with the `aes` feature set.
cpufeatures::new!(have_pmull, "aes");

#[derive(Copy, Clone, Debug)]
#[repr(transparent)]
pub(crate) struct FieldElement(uint8x16_t);

impl FieldElement {
    #[inline]
    pub fn from_le_bytes(data: &Block) -> Self {
        // SAFETY: This intrinsic requires the `neon` target
        // feature, which we have.
        let fe = unsafe { vld1q_u8(data.as_ptr()) };
        Self(fe)
    }

    #[inline]
    pub fn to_le_bytes(self) -> Block {
        let mut out = [0u8; 16];
        // SAFETY: This intrinsic requires the `neon` target
        // feature, which we have.
        unsafe { vst1q_u8(out.as_mut_ptr(), self.0) }
        out
    }

    /// Folds `blocks` into the accumulator `self` using the
    /// power table `pow`.
    #[must_use = "this returns the result of the operation \
                      without modifying the original"]
    pub fn fold_blocks(self, pow: &[Self; 8], blocks: &[Block]) -> Self {
        if have_pmull::get() {
            // SAFETY: `uint8x16_t` and `FieldElement` have the
            // same layout in memory. The pointer came from
            // a reference, so it is safe to dereference.
            let pow = unsafe { &*(pow as *const [FieldElement; 8]).cast() };
            // SAFETY: `fold_blocks_pmull` requires the `neon`
            // and `aes` target features, which we have.
            let fe = unsafe { fold_blocks_pmull(self.0, pow, blocks) };
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
        // SAFETY: This intrinsic requires the `neon` target
        // feature, which we have.
        let fe = unsafe { vdupq_n_u8(0) };
        Self(fe)
    }
}

impl BitXor for FieldElement {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        // SAFETY: This intrinsic requires the `neon` target
        // feature, which we have.
        let fe = unsafe { veorq_u8(self.0, rhs.0) };
        Self(fe)
    }
}
impl BitXorAssign for FieldElement {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        // SAFETY: This intrinsic requires the `neon` target
        // feature, which we have.
        self.0 = unsafe { veorq_u8(self.0, rhs.0) };
    }
}

impl Mul for FieldElement {
    type Output = Self;

    #[inline]
    #[allow(clippy::arithmetic_side_effects)]
    fn mul(self, rhs: Self) -> Self {
        if have_pmull::get() {
            // SAFETY: `polymul_pmull` requires the `neon` and
            // `aes` target features, which we have.
            let fe = unsafe { polymul_pmull(self.0, rhs.0) };
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
        // SAFETY: This intrinsic requires the `neon` target
        // feature, which we have.
        self.0 = unsafe { vdupq_n_u8(0) };
    }
}

#[cfg(test)]
impl Eq for FieldElement {}

#[cfg(test)]
impl PartialEq for FieldElement {
    fn eq(&self, other: &Self) -> bool {
        use core::arch::aarch64::vceqq_u8;

        // SAFETY: This intrinsic requires the `neon` target
        // feature, which we have.
        let v = unsafe { vceqq_u8(self.0, other.0) };

        // SAFETY: `uint8x16_t` has the same size as `u128`.
        let v = unsafe { core::mem::transmute::<uint8x16_t, u128>(v) };

        v == u128::MAX
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
/// The NEON and AES architectural features must be enabled.
#[inline]
#[target_feature(enable = "neon,aes")]
unsafe fn polymul_pmull(x: uint8x16_t, y: uint8x16_t) -> uint8x16_t {
    let (h, m, l) = unsafe { karatsuba_split(x, y) };
    let (ph, pl) = unsafe { karatsuba_combine(h, m, l) };
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
/// The NEON and AES architectural features must be enabled.
#[inline]
#[target_feature(enable = "neon,aes")]
unsafe fn fold_blocks_pmull(
    mut acc: uint8x16_t,
    pow: &[uint8x16_t; 8],
    blocks: &[Block],
) -> uint8x16_t {
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
/// The NEON and AES architectural features must be enabled.
#[inline]
#[target_feature(enable = "neon,aes")]
unsafe fn stride_product(
    acc: uint8x16_t,
    pow: &[uint8x16_t; 8],
    blocks: &[Block],
) -> (uint8x16_t, uint8x16_t) {
    debug_assert_eq!(blocks.len(), pow.len());

    let uint8x16x4_t(h0, h1, h2, h3) = unsafe { vld1q_u8_x4(pow.as_ptr().cast::<u8>()) };
    let uint8x16x4_t(h4, h5, h6, h7) = unsafe { vld1q_u8_x4(pow.as_ptr().add(4).cast::<u8>()) };
    let uint8x16x4_t(m0, m1, m2, m3) = unsafe { vld1q_u8_x4(blocks.as_ptr().cast::<u8>()) };
    let uint8x16x4_t(m4, m5, m6, m7) = unsafe { vld1q_u8_x4(blocks.as_ptr().add(4).cast::<u8>()) };

    let mut h = unsafe { vdupq_n_u8(0) };
    let mut m = unsafe { vdupq_n_u8(0) };
    let mut l = unsafe { vdupq_n_u8(0) };

    macro_rules! accumulate {
        ($m:expr, $h:expr) => {
            let (hh, mm, ll) = unsafe { karatsuba_split($m, $h) };
            h = unsafe { veorq_u8(h, hh) };
            m = unsafe { veorq_u8(m, mm) };
            l = unsafe { veorq_u8(l, ll) };
        };
    }
    accumulate!(m7, h7);
    accumulate!(m6, h6);
    accumulate!(m5, h5);
    accumulate!(m4, h4);
    accumulate!(m3, h3);
    accumulate!(m2, h2);
    accumulate!(m1, h1);
    let m0 = unsafe { veorq_u8(m0, acc) }; // fold in the accumulator
    accumulate!(m0, h0);

    unsafe { karatsuba_combine(h, m, l) }
}

/// Accumulates a ragged prefix of fewer than eight blocks.
///
/// `pow` holds the matching suffix of the power table. The match
/// arms differ only in how many block loads they unroll; every
/// arm produces the same sum for the same prefix.
///
/// # Safety
///
/// The NEON and AES architectural features must be enabled.
#[inline]
#[target_feature(enable = "neon,aes")]
unsafe fn tail_product(
    acc: uint8x16_t,
    pow: &[uint8x16_t],
    blocks: &[Block],
) -> (uint8x16_t, uint8x16_t) {
    debug_assert!(!blocks.is_empty());
    debug_assert!(blocks.len() < 8);
    debug_assert_eq!(blocks.len(), pow.len());

    let mut h = unsafe { vdupq_n_u8(0) };
    let mut m = unsafe { vdupq_n_u8(0) };
    let mut l = unsafe { vdupq_n_u8(0) };

    macro_rules! absorb {
        ($($j:literal),+) => {
            $(
                let mut y = unsafe { vld1q_u8(blocks.as_ptr().add($j).cast::<u8>()) };
                if $j == 0 {
                    y = unsafe { veorq_u8(y, acc) }; // fold in the accumulator
                }
                let x = unsafe { vld1q_u8(pow.as_ptr().add($j).cast::<u8>()) };
                let (hh, mm, ll) = unsafe { karatsuba_split(x, y) };
                h = unsafe { veorq_u8(h, hh) };
                m = unsafe { veorq_u8(m, mm) };
                l = unsafe { veorq_u8(l, ll) };
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

    unsafe { karatsuba_combine(h, m, l) }
}

/// Karatsuba decomposition for `x*y`.
///
/// # Safety
///
/// The NEON and AES architectural features must be enabled.
#[inline]
#[target_feature(enable = "neon,aes")]
unsafe fn karatsuba_split(x: uint8x16_t, y: uint8x16_t) -> (uint8x16_t, uint8x16_t, uint8x16_t) {
    // First Karatsuba step: decompose x and y.
    //
    // (x1*y0 + x0*y1) = (x1+x0) * (y1+y0) + (x1*y1) + (x0*y0)
    //        M                                 H         L
    //
    // m = x.hi^x.lo * y.hi^y.lo
    let m = unsafe {
        pmull(
            veorq_u8(x, vextq_u8::<8>(x, x)), // x.hi^x.lo
            veorq_u8(y, vextq_u8::<8>(y, y)), // y.hi^y.lo
        )
    };
    let h = unsafe { pmull2(x, y) }; // h = x.hi * y.hi
    let l = unsafe { pmull(x, y) }; // l = x.lo * y.lo
    (h, m, l)
}

/// Karatsuba combine into the 256-bit product `(ph, pl)`.
///
/// # Safety
///
/// The NEON and AES architectural features must be enabled.
#[inline]
#[target_feature(enable = "neon,aes")]
unsafe fn karatsuba_combine(
    h: uint8x16_t,
    m: uint8x16_t,
    l: uint8x16_t,
) -> (uint8x16_t, uint8x16_t) {
    // Second Karatsuba step: the middle contribution
    // m' = m ^ l ^ h straddles the 64-bit boundary, so its low
    // half lands in the top of L and its high half in the bottom
    // of H:
    //
    // pl = {l0, l1 ^ m'0}
    // ph = {h0 ^ m'1, h1}
    let t = unsafe {
        //   {m0, m1} ^ {l1, h0}
        // = {m0^l1, m1^h0}
        let t0 = veorq_u8(m, vextq_u8::<8>(l, h));

        //   {h0, h1} ^ {l0, l1}
        // = {h0^l0, h1^l1}
        let t1 = veorq_u8(h, l);

        //   {m0^l1, m1^h0} ^ {h0^l0, h1^l1}
        // = {m0^l1^h0^l0, m1^h0^h1^l1}
        veorq_u8(t0, t1)
    };

    // {l0, m0^l0^h0^l1}
    let pl = unsafe {
        vextq_u8::<8>(
            vextq_u8::<8>(l, l), // {l1, l0}
            t,
        )
    };

    // {m1^h0^h1^l1, h1}
    let ph = unsafe {
        vextq_u8::<8>(
            t,
            vextq_u8::<8>(h, h), // {h1, h0}
        )
    };

    (ph, pl)
}

/// Montgomery-reduces the 256-bit product `(ph, pl)` to the
/// field element `(ph*x^128 + pl) * x^-128`.
///
/// # Safety
///
/// The NEON and AES architectural features must be enabled.
#[inline]
#[target_feature(enable = "neon,aes")]
unsafe fn mont_reduce(ph: uint8x16_t, pl: uint8x16_t) -> uint8x16_t {
    //    [A1:A0] = PL0 • g*
    //    [B1:B0] = [PL0 ⊕ A1 : PL1 ⊕ A0]
    //    [C1:C0] = B0 • g*
    // Output: [B1 ⊕ C1 ⊕ PH1 : B0 ⊕ C0 ⊕ PH0]
    //
    // Both halves of g* hold the low 64 bits of the reduction
    // polynomial, pre-rotated so one carryless multiply per step
    // yields the reduction quotient.
    const GSTAR: u128 = (0xc200000000000000 << 64) | 0xc200000000000000;
    let g = unsafe { vreinterpretq_u8_p128(GSTAR) };
    let a = unsafe { pmull(pl, g) };
    let b = unsafe { veorq_u8(pl, vextq_u8::<8>(a, a)) };
    let c = unsafe { pmull2(b, g) };
    unsafe { veorq_u8(ph, veorq_u8(c, b)) }
}

/// Multiplies the low bits in `a` and `b`.
///
/// # Safety
///
/// The NEON and AES architectural features must be enabled.
#[inline]
#[target_feature(enable = "neon,aes")]
unsafe fn pmull(a: uint8x16_t, b: uint8x16_t) -> uint8x16_t {
    let p = unsafe {
        vmull_p64(
            vgetq_lane_u64::<0>(vreinterpretq_u64_u8(a)),
            vgetq_lane_u64::<0>(vreinterpretq_u64_u8(b)),
        )
    };
    unsafe { vreinterpretq_u8_p128(p) }
}

/// Multiplies the high bits in `a` and `b`.
///
/// # Safety
///
/// The NEON and AES architectural features must be enabled.
#[inline]
#[target_feature(enable = "neon,aes")]
unsafe fn pmull2(a: uint8x16_t, b: uint8x16_t) -> uint8x16_t {
    let p = unsafe {
        vmull_p64(
            vgetq_lane_u64::<1>(vreinterpretq_u64_u8(a)),
            vgetq_lane_u64::<1>(vreinterpretq_u64_u8(b)),
        )
    };
    unsafe { vreinterpretq_u8_p128(p) }
}
