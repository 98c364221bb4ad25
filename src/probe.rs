//! Probe sinks: where marshaled arguments end up.
//!
//! The sink is a fixed-arity function of two optional strings, two ints and
//! a result slot. It returns nothing directly; anything it wants to report
//! goes into the slot.
//!
//! | Sink | Behavior |
//! |------|----------|
//! | [`DisabledProbe`] | Does nothing. |
//! | [`TracingProbe`] | Emits one `tracing` event per call. |
//! | [`SdtProbe`] | Fires the `btrace:event` USDT probe (feature `usdt`). |
//! | [`DynamicProbe`] | Calls a probe function loaded at runtime (feature `dynamic-probe`). |
//!
//! Plain functions and closures work as sinks too:
//!
//! ```rust
//! use btrace_native::probe::{ProbeArgs, ProbeSink};
//!
//! fn sum(args: &ProbeArgs<'_>, result: &mut i32) {
//!     *result = args.i1 + args.i2;
//! }
//!
//! let mut result = 0;
//! sum.fire(&ProbeArgs::ints(1, 2), &mut result);
//! assert_eq!(result, 3);
//! ```

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr;

use tracing::info;

use crate::sys::jni;

/// Arguments of one probe firing.
///
/// The strings borrow from the marshaler's views and cannot outlive them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeArgs<'a> {
    pub first: Option<&'a CStr>,
    pub second: Option<&'a CStr>,
    pub i1: jni::jint,
    pub i2: jni::jint,
}

impl<'a> ProbeArgs<'a> {
    /// Value BTrace scripts pass for an integer they leave out.
    pub const UNSET: jni::jint = -1;

    /// Both strings, both integers left out.
    pub fn texts(first: Option<&'a CStr>, second: Option<&'a CStr>) -> Self {
        ProbeArgs {
            first,
            second,
            i1: Self::UNSET,
            i2: Self::UNSET,
        }
    }

    /// Both integers, no strings.
    pub fn ints(i1: jni::jint, i2: jni::jint) -> Self {
        ProbeArgs {
            first: None,
            second: None,
            i1,
            i2,
        }
    }

    pub fn with_first_int(mut self, i1: jni::jint) -> Self {
        self.i1 = i1;
        self
    }

    pub fn with_second_int(mut self, i2: jni::jint) -> Self {
        self.i2 = i2;
        self
    }

    /// First string as a C pointer, null if absent.
    pub fn first_ptr(&self) -> *const c_char {
        self.first.map_or(ptr::null(), CStr::as_ptr)
    }

    /// Second string as a C pointer, null if absent.
    pub fn second_ptr(&self) -> *const c_char {
        self.second.map_or(ptr::null(), CStr::as_ptr)
    }
}

/// A fixed-arity probe point.
///
/// Fired from whichever JVM thread made the call, so sinks must be
/// `Send + Sync`.
pub trait ProbeSink: Send + Sync {
    /// Fires the probe. The sink may write into `result`; whatever it holds
    /// afterwards is returned to the caller.
    fn fire(&self, args: &ProbeArgs<'_>, result: &mut jni::jint);
}

impl<F> ProbeSink for F
where
    F: Fn(&ProbeArgs<'_>, &mut jni::jint) + Send + Sync,
{
    fn fire(&self, args: &ProbeArgs<'_>, result: &mut jni::jint) {
        self(args, result)
    }
}

/// Sink that drops every call. The result slot stays 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProbe;

impl ProbeSink for DisabledProbe {
    fn fire(&self, _args: &ProbeArgs<'_>, _result: &mut jni::jint) {}
}

/// Sink that records each call as a `tracing` event at target
/// `btrace::event`, level INFO. Never writes the result slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProbe;

impl ProbeSink for TracingProbe {
    fn fire(&self, args: &ProbeArgs<'_>, _result: &mut jni::jint) {
        let first = args.first.map(CStr::to_string_lossy);
        let second = args.second.map(CStr::to_string_lossy);
        info!(
            target: "btrace::event",
            first = first.as_deref(),
            second = second.as_deref(),
            i1 = args.i1,
            i2 = args.i2,
            "probe fired"
        );
    }
}

/// C signature shared by the USDT shim and dynamically loaded probes.
pub type RawProbeFn = unsafe extern "C" fn(
    first: *const c_char,
    second: *const c_char,
    i1: c_int,
    i2: c_int,
    result: *mut c_int,
);

#[cfg(feature = "usdt")]
mod sdt {
    use super::*;

    extern "C" {
        // native/btrace_probe.c
        fn btrace_probe_event(
            first: *const c_char,
            second: *const c_char,
            i1: c_int,
            i2: c_int,
            result: *mut c_int,
        );
    }

    /// Sink that fires the `btrace:event` USDT probe.
    ///
    /// A D script attached to the probe sees `arg0`/`arg1` as the strings (or
    /// NULL), `arg2`/`arg3` as the ints, and can `copyout` into `arg4` to set
    /// the return value.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SdtProbe;

    impl ProbeSink for SdtProbe {
        fn fire(&self, args: &ProbeArgs<'_>, result: &mut jni::jint) {
            unsafe {
                btrace_probe_event(args.first_ptr(), args.second_ptr(), args.i1, args.i2, result);
            }
        }
    }
}

#[cfg(feature = "usdt")]
pub use sdt::SdtProbe;

#[cfg(feature = "dynamic-probe")]
mod dynamic {
    use super::*;
    use std::ffi::OsStr;

    use libloading::Library;

    /// Sink backed by a function looked up in a shared library.
    ///
    /// The library stays loaded for as long as the sink lives.
    pub struct DynamicProbe {
        func: RawProbeFn,
        _library: Library,
    }

    impl DynamicProbe {
        /// Loads `library` and resolves `symbol`, which must have the
        /// [`RawProbeFn`] signature.
        ///
        /// # Safety
        ///
        /// Loading runs the library's initializers, and nothing checks that
        /// `symbol` really has the [`RawProbeFn`] signature.
        pub unsafe fn load(
            library: impl AsRef<OsStr>,
            symbol: &str,
        ) -> Result<Self, libloading::Error> {
            let library = Library::new(library.as_ref())?;
            let func = *library.get::<RawProbeFn>(symbol.as_bytes())?;
            Ok(DynamicProbe {
                func,
                _library: library,
            })
        }
    }

    impl std::fmt::Debug for DynamicProbe {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("DynamicProbe").finish_non_exhaustive()
        }
    }

    impl ProbeSink for DynamicProbe {
        fn fire(&self, args: &ProbeArgs<'_>, result: &mut jni::jint) {
            unsafe {
                (self.func)(args.first_ptr(), args.second_ptr(), args.i1, args.i2, result);
            }
        }
    }
}

#[cfg(feature = "dynamic-probe")]
pub use dynamic::DynamicProbe;
