mod aarch64;
pub mod generic;
mod soft;
mod x86;

cfg_if::cfg_if! {
    if #[cfg(feature = "soft")] {
        use soft as imp;
    } else if #[cfg(all(target_arch = "aarch64", target_feature = "neon"))] {
        use aarch64 as imp;
    } else if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        use x86 as imp;
    } else {
        use soft as imp;
    }
}

/// An element in the field
///
/// ```text
/// x^128 + x^127 + x^126 + x^121 + 1
/// ```
pub(crate) use imp::FieldElement;
