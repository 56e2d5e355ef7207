//! POLYVAL per [RFC 8452].
//!
//! POLYVAL evaluates a polynomial over `GF(2¹²⁸)` defined by
//!
//! ```text
//! x^128 + x^127 + x^126 + x^121 + 1
//! ```
//!
//! and is the universal hash underneath AES-GCM-SIV and HCTR2.
//! Hardware carryless multiplication is used on aarch64 (PMULL)
//! and x86/x86-64 (PCLMULQDQ), with a portable constant-time
//! fallback everywhere else.
//!
//! [RFC 8452]: https://datatracker.ietf.org/doc/html/rfc8452

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(any(test, doctest, feature = "std")), no_std)]
#![cfg_attr(not(any(feature = "std", test)), deny(clippy::std_instead_of_core))]
#![deny(
    clippy::alloc_instead_of_core,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::expect_used,
    clippy::implicit_saturating_sub,
    clippy::indexing_slicing,
    clippy::missing_panics_doc,
    clippy::panic,
    clippy::ptr_as_ptr,
    clippy::string_slice,
    clippy::transmute_ptr_to_ptr,
    clippy::undocumented_unsafe_blocks,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications
)]

mod backend;
pub mod experimental;
mod hash;
mod key;
mod tests;

pub use {hash::*, key::*};
