//! Safe wrappers around the JNI environment and the JavaVM.
//!
//! # Example
//!
//! ```rust,ignore
//! use btrace_native::jni_wrapper::JniEnv;
//! use btrace_native::marshal::{ArgPosition, TextView};
//!
//! unsafe extern "system" fn native(env: *mut jni::JNIEnv, _cls: jni::jclass, s: jni::jstring) {
//!     let env = JniEnv::from_raw(env);
//!     // Released when `view` drops; a failed conversion leaves no exception.
//!     if let Ok(view) = TextView::acquire(&env, s, ArgPosition::First) {
//!         println!("{}", view.to_string_lossy());
//!     }
//! }
//! ```

use crate::marshal::ForeignStrings;
use crate::sys::jni;
use std::ffi::c_void;
use std::os::raw::c_char;
use std::ptr::{self, NonNull};

/// Safe wrapper around a JNI environment pointer.
///
/// # Thread Safety
///
/// A `JniEnv` is tied to a specific thread and cannot be sent across threads.
/// Each JVM thread has its own JNI environment.
pub struct JniEnv {
    env: *mut jni::JNIEnv,
}

impl JniEnv {
    /// Creates a JniEnv wrapper from a raw pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure the pointer is valid and comes from the current thread.
    pub unsafe fn from_raw(env: *mut jni::JNIEnv) -> Self {
        JniEnv { env }
    }

    /// Returns the raw JNI environment pointer.
    pub fn raw(&self) -> *mut jni::JNIEnv {
        self.env
    }

    /// Returns the JNI version.
    pub fn get_version(&self) -> jni::jint {
        unsafe {
            let vtable = *self.env;
            ((*vtable).GetVersion)(self.env)
        }
    }

    // =========================================================================
    // Exception Handling
    // =========================================================================

    /// Checks if an exception is pending.
    pub fn exception_check(&self) -> bool {
        unsafe {
            let vtable = *self.env;
            ((*vtable).ExceptionCheck)(self.env) != jni::JNI_FALSE
        }
    }

    /// Clears any pending exception.
    pub fn exception_clear(&self) {
        unsafe {
            let vtable = *self.env;
            ((*vtable).ExceptionClear)(self.env);
        }
    }

    // =========================================================================
    // String Operations
    // =========================================================================

    /// Raw `GetStringUTFChars`. Returns null when the JVM is out of memory,
    /// in which case an `OutOfMemoryError` is pending.
    ///
    /// # Safety
    ///
    /// `s` must be a valid, non-null `jstring` reference.
    pub unsafe fn get_string_utf_chars(&self, s: jni::jstring) -> *const c_char {
        let vtable = *self.env;
        ((*vtable).GetStringUTFChars)(self.env, s, ptr::null_mut())
    }

    /// Raw `ReleaseStringUTFChars`.
    ///
    /// # Safety
    ///
    /// `chars` must have been returned by `get_string_utf_chars(s)` and not
    /// released yet.
    pub unsafe fn release_string_utf_chars(&self, s: jni::jstring, chars: *const c_char) {
        let vtable = *self.env;
        ((*vtable).ReleaseStringUTFChars)(self.env, s, chars);
    }
}

impl ForeignStrings for JniEnv {
    type Handle = jni::jstring;

    unsafe fn acquire(&self, handle: jni::jstring) -> Option<NonNull<c_char>> {
        NonNull::new(self.get_string_utf_chars(handle) as *mut c_char)
    }

    unsafe fn release(&self, handle: jni::jstring, chars: NonNull<c_char>) {
        self.release_string_utf_chars(handle, chars.as_ptr());
    }

    /// `GetStringUTFChars` leaves an `OutOfMemoryError` pending when it
    /// fails. The probe reports failure through its return value only, so
    /// the exception is dropped here.
    fn acquisition_failed(&self) {
        if self.exception_check() {
            self.exception_clear();
        }
    }
}

/// Safe wrapper around a `JavaVM` pointer.
pub struct JavaVm {
    vm: *mut jni::JavaVM,
}

impl JavaVm {
    /// # Safety
    ///
    /// `vm` must be the pointer the JVM passed to `JNI_OnLoad` (or obtained
    /// from it) and must outlive the wrapper.
    pub unsafe fn from_raw(vm: *mut jni::JavaVM) -> Self {
        JavaVm { vm }
    }

    pub fn raw(&self) -> *mut jni::JavaVM {
        self.vm
    }

    /// Returns the JNI environment of the current thread.
    ///
    /// Fails with the JNI status code, e.g. `JNI_EDETACHED` when the thread
    /// is not attached or `JNI_EVERSION` when `version` is unsupported.
    pub fn get_env(&self, version: jni::jint) -> Result<JniEnv, jni::jint> {
        let mut env: *mut c_void = ptr::null_mut();
        unsafe {
            let vtable = *self.vm;
            let result = ((*vtable).GetEnv)(self.vm, &mut env, version);
            if result != jni::JNI_OK {
                return Err(result);
            }
            if env.is_null() {
                return Err(jni::JNI_ERR);
            }
            Ok(JniEnv::from_raw(env as *mut jni::JNIEnv))
        }
    }
}
