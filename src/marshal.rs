//! Marshaling of borrowed foreign strings into a probe call.
//!
//! A foreign runtime hands us string handles it owns. Before the probe can
//! see the text, each handle has to be converted into a native byte view,
//! and every view that was handed out has to be given back exactly once,
//! no matter which way the call exits.
//!
//! [`TextView`] is the guard that makes this automatic: a view only exists
//! while its guard does, the guard releases on drop, and [`ProbeArgs`]
//! borrows from the guards so the borrow checker rejects any use after
//! release.
//!
//! ```rust,ignore
//! use btrace_native::marshal::Marshaler;
//!
//! let env = unsafe { JniEnv::from_raw(env_ptr) };
//! let marshaler = Marshaler::new(&env, &probe);
//! let code = unsafe { marshaler.invoke(Some(s1), Some(s2), 1, 2) };
//! ```

use std::borrow::Cow;
use std::ffi::CStr;
use std::fmt;
use std::os::raw::c_char;
use std::ptr::NonNull;

use thiserror::Error;
use tracing::debug;

use crate::probe::{ProbeArgs, ProbeSink};
use crate::sys::jni;

/// Which of the two text arguments a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPosition {
    First,
    Second,
}

impl fmt::Display for ArgPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgPosition::First => f.write_str("first"),
            ArgPosition::Second => f.write_str("second"),
        }
    }
}

/// The only way marshaling can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("could not acquire a native view of the {position} string argument")]
    AcquisitionFailure { position: ArgPosition },
}

/// Acquire/release primitives of a foreign runtime's string API.
///
/// For JNI this is `GetStringUTFChars` / `ReleaseStringUTFChars`, see
/// [`crate::jni_wrapper::JniEnv`].
pub trait ForeignStrings {
    /// Opaque handle to a string owned by the foreign runtime.
    type Handle: Copy;

    /// Converts `handle` into a NUL-terminated native view.
    ///
    /// Returns `None` when the runtime could not produce one.
    ///
    /// # Safety
    ///
    /// `handle` must be a live, non-null handle owned by this runtime.
    unsafe fn acquire(&self, handle: Self::Handle) -> Option<NonNull<c_char>>;

    /// Gives a view back to the runtime.
    ///
    /// # Safety
    ///
    /// `chars` must have come from [`acquire`](Self::acquire) on the same
    /// `handle` and must not have been released already.
    unsafe fn release(&self, handle: Self::Handle, chars: NonNull<c_char>);

    /// Called after `acquire` returned `None`.
    fn acquisition_failed(&self) {}
}

/// A scoped native view of a foreign string.
///
/// Released exactly once, when dropped.
pub struct TextView<'a, S: ForeignStrings + ?Sized> {
    strings: &'a S,
    handle: S::Handle,
    chars: NonNull<c_char>,
}

impl<'a, S: ForeignStrings + ?Sized> TextView<'a, S> {
    /// Acquires a view of `handle`.
    ///
    /// # Safety
    ///
    /// Same contract as [`ForeignStrings::acquire`].
    pub unsafe fn acquire(
        strings: &'a S,
        handle: S::Handle,
        position: ArgPosition,
    ) -> Result<Self, MarshalError> {
        match strings.acquire(handle) {
            Some(chars) => Ok(TextView { strings, handle, chars }),
            None => {
                strings.acquisition_failed();
                Err(MarshalError::AcquisitionFailure { position })
            }
        }
    }

    /// Acquires a view if a handle is present.
    ///
    /// An absent handle is not an error: it yields `Ok(None)` without
    /// touching the runtime.
    ///
    /// # Safety
    ///
    /// Same contract as [`ForeignStrings::acquire`] for a present handle.
    pub unsafe fn acquire_optional(
        strings: &'a S,
        handle: Option<S::Handle>,
        position: ArgPosition,
    ) -> Result<Option<Self>, MarshalError> {
        handle
            .map(|h| Self::acquire(strings, h, position))
            .transpose()
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.chars.as_ptr()
    }

    pub fn as_c_str(&self) -> &CStr {
        // SAFETY: the runtime hands out NUL-terminated views that stay valid
        // until released, and release only happens in Drop.
        unsafe { CStr::from_ptr(self.chars.as_ptr()) }
    }

    /// Lossy UTF-8 rendering. JNI views are modified UTF-8, which differs
    /// from UTF-8 for NUL and supplementary characters.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        self.as_c_str().to_string_lossy()
    }
}

impl<S: ForeignStrings + ?Sized> Drop for TextView<'_, S> {
    fn drop(&mut self) {
        // SAFETY: `chars` came from `acquire` on `handle` and a guard is
        // dropped at most once.
        unsafe { self.strings.release(self.handle, self.chars) }
    }
}

impl<S: ForeignStrings + ?Sized> fmt::Debug for TextView<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextView").field(&self.as_c_str()).finish()
    }
}

/// Forwards one foreign call to a probe sink.
pub struct Marshaler<'a, S: ?Sized, P: ?Sized> {
    strings: &'a S,
    probe: &'a P,
}

impl<'a, S, P> Marshaler<'a, S, P>
where
    S: ForeignStrings + ?Sized,
    P: ProbeSink + ?Sized,
{
    pub fn new(strings: &'a S, probe: &'a P) -> Self {
        Marshaler { strings, probe }
    }

    /// Marshals the arguments, fires the probe once, and returns whatever
    /// the probe wrote into the result slot (0 if it wrote nothing).
    ///
    /// Acquisition failure is reported as 0, after releasing anything that
    /// was already acquired.
    ///
    /// # Safety
    ///
    /// Every present handle must satisfy [`ForeignStrings::acquire`].
    pub unsafe fn invoke(
        &self,
        first: Option<S::Handle>,
        second: Option<S::Handle>,
        i1: jni::jint,
        i2: jni::jint,
    ) -> jni::jint {
        match self.try_invoke(first, second, i1, i2) {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, i1, i2, "probe not recorded");
                0
            }
        }
    }

    /// Like [`invoke`](Self::invoke) but reports which argument failed.
    ///
    /// # Safety
    ///
    /// Every present handle must satisfy [`ForeignStrings::acquire`].
    pub unsafe fn try_invoke(
        &self,
        first: Option<S::Handle>,
        second: Option<S::Handle>,
        i1: jni::jint,
        i2: jni::jint,
    ) -> Result<jni::jint, MarshalError> {
        let first = TextView::acquire_optional(self.strings, first, ArgPosition::First)?;
        // On failure here `first` is dropped, which releases it.
        let second = TextView::acquire_optional(self.strings, second, ArgPosition::Second)?;

        let args = ProbeArgs {
            first: first.as_ref().map(TextView::as_c_str),
            second: second.as_ref().map(TextView::as_c_str),
            i1,
            i2,
        };

        let mut result: jni::jint = 0;
        self.probe.fire(&args, &mut result);
        Ok(result)
    }
}
