//! Raw FFI definitions.
//!
//! Everything in here mirrors the C headers and is `unsafe` to use directly.
//! Prefer the wrappers in [`crate::jni_wrapper`].

pub mod jni;
