// btrace-native/src/sys/jni.rs
//
// The slice of the JNI ABI the probe bridge touches.
//
// Only the function-table slots the bridge actually calls are named. The
// slots in between are kept as opaque padding so every named entry sits at
// the index the JDK header gives it. Slot indices have been stable since
// JDK 1.6; newer JDKs only append to the end of the table.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::ffi::c_void;
use std::os::raw::c_char;

// =============================================================================
// Primitive Types
// =============================================================================

pub type jint = i32;
pub type jlong = i64;
pub type jboolean = u8;
pub type jsize = jint;

// =============================================================================
// Reference Types (opaque pointers)
// =============================================================================

pub type jobject = *mut c_void;
pub type jclass = jobject;
pub type jstring = jobject;
pub type jthrowable = jobject;

// =============================================================================
// Constants
// =============================================================================

pub const JNI_OK: jint = 0;
pub const JNI_ERR: jint = -1;
pub const JNI_EDETACHED: jint = -2;
pub const JNI_EVERSION: jint = -3;

pub const JNI_TRUE: jboolean = 1;
pub const JNI_FALSE: jboolean = 0;

pub const JNI_VERSION_1_2: jint = 0x00010002;
pub const JNI_VERSION_1_4: jint = 0x00010004;
pub const JNI_VERSION_1_6: jint = 0x00010006;
pub const JNI_VERSION_1_8: jint = 0x00010008;

// =============================================================================
// JNINativeInterface_ - the JNI function table (vtable), partial
// =============================================================================
//
// Layout (slot index: entry):
//   0-3   reserved
//   4     GetVersion
//   5-16  (class, reflection, Throw/ThrowNew/ExceptionOccurred/Describe)
//   17    ExceptionClear
//   18-168 (...)
//   169   GetStringUTFChars
//   170   ReleaseStringUTFChars
//   171-227 (...)
//   228   ExceptionCheck
//
// The table is only ever read through a pointer handed to us by the JVM, so
// stopping after slot 228 is fine.

#[repr(C)]
pub struct JNINativeInterface_ {
    // 0-3: Reserved
    pub reserved0: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: *mut c_void,
    pub reserved3: *mut c_void,

    // 4: GetVersion
    pub GetVersion: unsafe extern "system" fn(env: *mut JNIEnv) -> jint,

    // 5-16
    pub _slots_5_16: [*mut c_void; 12],

    // 17: ExceptionClear
    pub ExceptionClear: unsafe extern "system" fn(env: *mut JNIEnv),

    // 18-168
    pub _slots_18_168: [*mut c_void; 151],

    // 169-170: UTF string access
    pub GetStringUTFChars: unsafe extern "system" fn(
        env: *mut JNIEnv,
        str: jstring,
        isCopy: *mut jboolean,
    ) -> *const c_char,
    pub ReleaseStringUTFChars:
        unsafe extern "system" fn(env: *mut JNIEnv, str: jstring, chars: *const c_char),

    // 171-227
    pub _slots_171_227: [*mut c_void; 57],

    // 228: Exception check (JNI 1.2)
    pub ExceptionCheck: unsafe extern "system" fn(env: *mut JNIEnv) -> jboolean,
}

// =============================================================================
// JNIEnv - Pointer to the JNI function table
// =============================================================================
//
// In C, JNIEnv is directly a pointer to the vtable:
//   typedef const struct JNINativeInterface_ *JNIEnv;

/// JNIEnv is directly the vtable pointer (C ABI definition)
pub type JNIEnv = *const JNINativeInterface_;

// =============================================================================
// JNIInvokeInterface_ - The JavaVM function table
// =============================================================================

#[repr(C)]
pub struct JNIInvokeInterface_ {
    pub reserved0: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: *mut c_void,

    pub DestroyJavaVM: unsafe extern "system" fn(vm: *mut JavaVM) -> jint,
    pub AttachCurrentThread: unsafe extern "system" fn(
        vm: *mut JavaVM,
        penv: *mut *mut c_void,
        args: *mut c_void,
    ) -> jint,
    pub DetachCurrentThread: unsafe extern "system" fn(vm: *mut JavaVM) -> jint,
    pub GetEnv:
        unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, version: jint) -> jint,
}

/// JavaVM is directly the vtable pointer (C ABI definition)
pub type JavaVM = *const JNIInvokeInterface_;
